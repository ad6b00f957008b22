//! Evaluation: turns an [`Expr`] AST into a concept-id set (§4.6).
//!
//! Evaluation depends only on the [`EclQueryable`] interface, never on
//! `snomed-store::Store` directly, so the evaluator can be exercised
//! against a test double without a real on-disk store; `Store` itself
//! implements the trait at the bottom of this module.

use std::collections::HashSet;

use snomed_types::{well_known, SctId};

use crate::ast::{Attribute, Expr, RefinementClause};
use crate::error::EclResult;

/// One active relationship edge, as needed by grouped-refinement matching:
/// unlike a plain destination set, this keeps the relationship group so
/// `{ T1 = V1, T2 = V2 }` can require both attributes to land in the same
/// group on the evaluated source concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentEdge {
    /// The relationship's type id.
    pub type_id: SctId,
    /// The relationship group (`0` means ungrouped).
    pub group: u32,
    /// The relationship's destination concept.
    pub destination_id: SctId,
}

/// The read surface the ECL evaluator needs from a component store.
///
/// Named after (and grounded on) the SNOMED CT loader's own
/// `EclQueryable` trait, which exists for the same reason: let the ECL
/// engine depend on an interface rather than a concrete store type.
pub trait EclQueryable {
    /// Strict descendants of `concept_id` (active IS_A closure).
    fn descendants(&self, concept_id: SctId) -> EclResult<HashSet<SctId>>;
    /// Strict ancestors of `concept_id`.
    fn ancestors(&self, concept_id: SctId) -> EclResult<HashSet<SctId>>;
    /// Direct IS_A children (sources) of `concept_id`.
    fn direct_children(&self, concept_id: SctId) -> EclResult<HashSet<SctId>>;
    /// Direct IS_A parents (destinations) of `concept_id`.
    fn direct_parents(&self, concept_id: SctId) -> EclResult<HashSet<SctId>>;
    /// Active members of `refset_id`. Unknown refsets yield an empty set
    /// (§7: unknown refsetId is not an error).
    fn members_of(&self, refset_id: SctId) -> EclResult<HashSet<SctId>>;
    /// Every concept id, active or not — backs the `*` wildcard.
    fn all_concept_ids(&self) -> EclResult<HashSet<SctId>>;
    /// Every active relationship edge whose source is `concept_id`.
    fn parent_edges(&self, concept_id: SctId) -> EclResult<Vec<ParentEdge>>;
    /// Cheap cardinality estimate for `^refset_id`, used to pick
    /// `AND`/`MINUS` evaluation order.
    fn refset_count(&self, refset_id: SctId) -> EclResult<u64>;
    /// Cheap cardinality estimate for `<concept_id`/`<<concept_id`.
    fn descendant_count(&self, concept_id: SctId) -> EclResult<u64>;
    /// Cheap cardinality estimate for `>concept_id`/`>>concept_id`.
    fn ancestor_count(&self, concept_id: SctId) -> EclResult<u64>;
}

/// Evaluates `expr` against `store`, returning the resulting concept-id set.
pub fn evaluate<S: EclQueryable + ?Sized>(expr: &Expr, store: &S) -> EclResult<HashSet<SctId>> {
    match expr {
        Expr::Wildcard => store.all_concept_ids(),
        Expr::Focus(id) => Ok(HashSet::from([*id])),
        Expr::RefsetMember(refset_id) => store.members_of(*refset_id),

        Expr::Descendants(inner) => fold(evaluate(inner, store)?, store, |s, id| s.descendants(id)),
        Expr::DescendantsOrSelf(inner) => {
            let base = evaluate(inner, store)?;
            let mut out = fold(base.clone(), store, |s, id| s.descendants(id))?;
            out.extend(base);
            Ok(out)
        }
        Expr::Ancestors(inner) => fold(evaluate(inner, store)?, store, |s, id| s.ancestors(id)),
        Expr::AncestorsOrSelf(inner) => {
            let base = evaluate(inner, store)?;
            let mut out = fold(base.clone(), store, |s, id| s.ancestors(id))?;
            out.extend(base);
            Ok(out)
        }
        Expr::Children(inner) => fold(evaluate(inner, store)?, store, |s, id| s.direct_children(id)),
        Expr::Parents(inner) => fold(evaluate(inner, store)?, store, |s, id| s.direct_parents(id)),

        Expr::And(a, b) => {
            // Evaluate the cheaper side first; an empty result short-
            // circuits the more expensive side entirely (§4.6).
            let (first, second) = if estimate(a, store)? <= estimate(b, store)? {
                (a, b)
            } else {
                (b, a)
            };
            let first_set = evaluate(first, store)?;
            if first_set.is_empty() {
                return Ok(first_set);
            }
            let second_set = evaluate(second, store)?;
            Ok(first_set.intersection(&second_set).copied().collect())
        }
        Expr::Or(a, b) => {
            let mut out = evaluate(a, store)?;
            out.extend(evaluate(b, store)?);
            Ok(out)
        }
        Expr::Minus(a, b) => {
            let left = evaluate(a, store)?;
            if left.is_empty() {
                return Ok(left);
            }
            let right = evaluate(b, store)?;
            Ok(left.difference(&right).copied().collect())
        }

        Expr::Refined(inner, clauses) => {
            let base = evaluate(inner, store)?;
            let mut out = HashSet::new();
            for concept_id in base {
                if matches_refinement(store, concept_id, clauses)? {
                    out.insert(concept_id);
                }
            }
            Ok(out)
        }
    }
}

/// `true` iff `concept_id` is in `eval(expr)`. Used by
/// [`crate::subsumes`]/[`crate::matches`]-style convenience checks.
pub fn contains<S: EclQueryable + ?Sized>(
    expr: &Expr,
    store: &S,
    concept_id: SctId,
) -> EclResult<bool> {
    Ok(evaluate(expr, store)?.contains(&concept_id))
}

fn fold<S: EclQueryable + ?Sized>(
    bases: HashSet<SctId>,
    store: &S,
    f: impl Fn(&S, SctId) -> EclResult<HashSet<SctId>>,
) -> EclResult<HashSet<SctId>> {
    let mut out = HashSet::new();
    for base in bases {
        out.extend(f(store, base)?);
    }
    Ok(out)
}

/// A cheap, non-materialising cardinality estimate used to choose which
/// side of `AND`/`MINUS` to evaluate first.
fn estimate<S: EclQueryable + ?Sized>(expr: &Expr, store: &S) -> EclResult<u64> {
    Ok(match expr {
        Expr::Wildcard => u64::MAX,
        Expr::Focus(_) => 1,
        Expr::RefsetMember(refset_id) => store.refset_count(*refset_id)?,
        Expr::Descendants(inner) | Expr::DescendantsOrSelf(inner) => match inner.as_ref() {
            Expr::Focus(id) => store.descendant_count(*id)?.saturating_add(1),
            other => estimate(other, store)?.saturating_mul(4),
        },
        Expr::Ancestors(inner) | Expr::AncestorsOrSelf(inner) => match inner.as_ref() {
            Expr::Focus(id) => store.ancestor_count(*id)?.saturating_add(1),
            other => estimate(other, store)?.saturating_mul(4),
        },
        Expr::Children(inner) | Expr::Parents(inner) => estimate(inner, store)?.saturating_mul(2),
        Expr::And(a, b) => estimate(a, store)?.min(estimate(b, store)?),
        Expr::Or(a, b) => estimate(a, store)?.saturating_add(estimate(b, store)?),
        Expr::Minus(a, _) => estimate(a, store)?,
        Expr::Refined(inner, _) => estimate(inner, store)?,
    })
}

/// Checks every refinement clause against `source_id`'s own active
/// relationships (§4.6: refinements select source concepts, so the
/// relationship lookup is always rooted at the concept being tested, not
/// at an ancestor).
fn matches_refinement<S: EclQueryable + ?Sized>(
    store: &S,
    source_id: SctId,
    clauses: &[RefinementClause],
) -> EclResult<bool> {
    let edges = store.parent_edges(source_id)?;
    for clause in clauses {
        let satisfied = match clause {
            RefinementClause::Attribute(attr) => attribute_matches_any_group(store, &edges, attr)?,
            RefinementClause::Group(attrs) => {
                let groups: HashSet<u32> = edges.iter().map(|e| e.group).collect();
                let mut matched = false;
                for group in groups {
                    let in_group: Vec<&ParentEdge> =
                        edges.iter().filter(|e| e.group == group).collect();
                    if attrs_match_within(store, &in_group, attrs)? {
                        matched = true;
                        break;
                    }
                }
                matched
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn attribute_matches_any_group<S: EclQueryable + ?Sized>(
    store: &S,
    edges: &[ParentEdge],
    attr: &Attribute,
) -> EclResult<bool> {
    let values = evaluate(&attr.value, store)?;
    Ok(edges
        .iter()
        .any(|e| e.type_id == attr.type_id && values.contains(&e.destination_id)))
}

fn attrs_match_within<S: EclQueryable + ?Sized>(
    store: &S,
    edges: &[&ParentEdge],
    attrs: &[Attribute],
) -> EclResult<bool> {
    for attr in attrs {
        let values = evaluate(&attr.value, store)?;
        if !edges
            .iter()
            .any(|e| e.type_id == attr.type_id && values.contains(&e.destination_id))
        {
            return Ok(false);
        }
    }
    Ok(true)
}

impl EclQueryable for snomed_store::Store {
    fn descendants(&self, concept_id: SctId) -> EclResult<HashSet<SctId>> {
        Ok(snomed_store::Store::descendants(self, concept_id)?)
    }

    fn ancestors(&self, concept_id: SctId) -> EclResult<HashSet<SctId>> {
        Ok(snomed_store::Store::ancestors(self, concept_id)?)
    }

    fn direct_children(&self, concept_id: SctId) -> EclResult<HashSet<SctId>> {
        Ok(self.children_of_type(concept_id, Some(well_known::IS_A))?)
    }

    fn direct_parents(&self, concept_id: SctId) -> EclResult<HashSet<SctId>> {
        Ok(self.parents_of_type(concept_id, Some(well_known::IS_A))?)
    }

    fn members_of(&self, refset_id: SctId) -> EclResult<HashSet<SctId>> {
        Ok(snomed_store::Store::members_of(self, refset_id)?)
    }

    fn all_concept_ids(&self) -> EclResult<HashSet<SctId>> {
        Ok(snomed_store::Store::all_concept_ids(self)?)
    }

    fn parent_edges(&self, concept_id: SctId) -> EclResult<Vec<ParentEdge>> {
        Ok(snomed_store::Store::parent_edges(self, concept_id)?
            .into_iter()
            .map(|(type_id, group, destination_id)| ParentEdge {
                type_id,
                group,
                destination_id,
            })
            .collect())
    }

    fn refset_count(&self, refset_id: SctId) -> EclResult<u64> {
        Ok(snomed_store::Store::refset_count(self, refset_id)?)
    }

    fn descendant_count(&self, concept_id: SctId) -> EclResult<u64> {
        Ok(snomed_store::Store::descendant_count(self, concept_id)?)
    }

    fn ancestor_count(&self, concept_id: SctId) -> EclResult<u64> {
        Ok(snomed_store::Store::ancestor_count(self, concept_id)?)
    }
}
