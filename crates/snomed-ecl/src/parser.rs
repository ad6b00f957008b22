//! The ECL parser: PEG grammar (`ecl.pest`) plus pairs-to-AST construction.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::{Attribute, Expr, RefinementClause};
use crate::error::{EclError, EclResult};

#[derive(Parser)]
#[grammar = "ecl.pest"]
struct EclGrammar;

/// Parses an ECL expression string into an [`Expr`] AST.
pub fn parse(input: &str) -> EclResult<Expr> {
    let mut pairs = EclGrammar::parse(Rule::program, input).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        EclError::Parse {
            line,
            column,
            message: e.variant.to_string(),
        }
    })?;

    let program = pairs.next().expect("program rule always produces one pair");
    let or_expr = program
        .into_inner()
        .find(|p| p.as_rule() == Rule::or_expression)
        .expect("program always contains an or_expression");
    build_or(or_expr)
}

fn build_or(pair: Pair<Rule>) -> EclResult<Expr> {
    let mut parts = pair.into_inner().map(build_and);
    let mut expr = parts.next().expect("or_expression always has one operand")?;
    for next in parts {
        expr = Expr::Or(Box::new(expr), Box::new(next?));
    }
    Ok(expr)
}

fn build_and(pair: Pair<Rule>) -> EclResult<Expr> {
    let mut parts = pair.into_inner().map(build_minus);
    let mut expr = parts.next().expect("and_expression always has one operand")?;
    for next in parts {
        expr = Expr::And(Box::new(expr), Box::new(next?));
    }
    Ok(expr)
}

fn build_minus(pair: Pair<Rule>) -> EclResult<Expr> {
    let mut parts = pair.into_inner().map(build_refined);
    let mut expr = parts.next().expect("minus_expression always has one operand")?;
    for next in parts {
        expr = Expr::Minus(Box::new(expr), Box::new(next?));
    }
    Ok(expr)
}

fn build_refined(pair: Pair<Rule>) -> EclResult<Expr> {
    let mut inner = pair.into_inner();
    let simple = inner
        .next()
        .expect("refined_expression always starts with a simple_expression");
    let base = build_simple(simple)?;
    match inner.next() {
        Some(refinement_pair) => {
            let clauses = build_refinement(refinement_pair)?;
            Ok(Expr::Refined(Box::new(base), clauses))
        }
        None => Ok(base),
    }
}

fn build_refinement(pair: Pair<Rule>) -> EclResult<Vec<RefinementClause>> {
    let child = pair
        .into_inner()
        .next()
        .expect("refinement always wraps a refinement_group or attribute_set");
    match child.as_rule() {
        Rule::refinement_group => {
            let attribute_set = child
                .into_inner()
                .next()
                .expect("refinement_group always wraps an attribute_set");
            let attributes = build_attribute_set(attribute_set)?;
            Ok(vec![RefinementClause::Group(attributes)])
        }
        Rule::attribute_set => {
            let attributes = build_attribute_set(child)?;
            Ok(attributes.into_iter().map(RefinementClause::Attribute).collect())
        }
        _ => unreachable!("refinement only ever wraps refinement_group or attribute_set"),
    }
}

fn build_attribute_set(pair: Pair<Rule>) -> EclResult<Vec<Attribute>> {
    pair.into_inner().map(build_attribute).collect()
}

fn build_attribute(pair: Pair<Rule>) -> EclResult<Attribute> {
    let mut inner = pair.into_inner();
    let type_ref = inner
        .next()
        .expect("attribute always starts with a concept_reference");
    let type_id = parse_concept_ref(type_ref)?;
    let value_pair = inner
        .next()
        .expect("attribute always ends with a simple_expression value");
    let value = build_simple(value_pair)?;
    Ok(Attribute { type_id, value })
}

fn build_simple(pair: Pair<Rule>) -> EclResult<Expr> {
    let mut inner = pair.into_inner().peekable();
    let operator = match inner.peek().map(|p| p.as_rule()) {
        Some(
            rule @ (Rule::descendant_or_self
            | Rule::child
            | Rule::descendant
            | Rule::ancestor_or_self
            | Rule::parent
            | Rule::ancestor),
        ) => {
            inner.next();
            Some(rule)
        }
        _ => None,
    };
    let focus_pair = inner
        .next()
        .expect("simple_expression always ends with a focus");
    let focus_expr = build_focus(focus_pair)?;

    Ok(match operator {
        Some(Rule::descendant_or_self) => Expr::DescendantsOrSelf(Box::new(focus_expr)),
        Some(Rule::child) => Expr::Children(Box::new(focus_expr)),
        Some(Rule::descendant) => Expr::Descendants(Box::new(focus_expr)),
        Some(Rule::ancestor_or_self) => Expr::AncestorsOrSelf(Box::new(focus_expr)),
        Some(Rule::parent) => Expr::Parents(Box::new(focus_expr)),
        Some(Rule::ancestor) => Expr::Ancestors(Box::new(focus_expr)),
        None => focus_expr,
        Some(_) => unreachable!("no other rule can precede a focus"),
    })
}

fn build_focus(pair: Pair<Rule>) -> EclResult<Expr> {
    let inner = pair
        .into_inner()
        .next()
        .expect("focus always wraps exactly one alternative");
    match inner.as_rule() {
        Rule::wildcard => Ok(Expr::Wildcard),
        Rule::refset_constraint => {
            let concept_ref = inner
                .into_inner()
                .next()
                .expect("refset_constraint always wraps a concept_reference");
            Ok(Expr::RefsetMember(parse_concept_ref(concept_ref)?))
        }
        Rule::concept_reference => Ok(Expr::Focus(parse_concept_ref(inner)?)),
        Rule::or_expression => build_or(inner),
        _ => unreachable!("focus only ever wraps wildcard/refset_constraint/concept_reference/or_expression"),
    }
}

fn parse_concept_ref(pair: Pair<Rule>) -> EclResult<snomed_types::SctId> {
    pair.as_str()
        .parse()
        .map_err(|_| EclError::InvalidConceptId(pair.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_concept_is_focus() {
        assert_eq!(parse("73211009").unwrap(), Expr::Focus(73211009));
    }

    #[test]
    fn test_parse_wildcard() {
        assert_eq!(parse("*").unwrap(), Expr::Wildcard);
    }

    #[test]
    fn test_parse_descendants_and_descendants_or_self() {
        assert_eq!(
            parse("<73211009").unwrap(),
            Expr::Descendants(Box::new(Expr::Focus(73211009)))
        );
        assert_eq!(
            parse("<<73211009").unwrap(),
            Expr::DescendantsOrSelf(Box::new(Expr::Focus(73211009)))
        );
    }

    #[test]
    fn test_parse_children_and_parents() {
        assert_eq!(
            parse("<!73211009").unwrap(),
            Expr::Children(Box::new(Expr::Focus(73211009)))
        );
        assert_eq!(
            parse(">!73211009").unwrap(),
            Expr::Parents(Box::new(Expr::Focus(73211009)))
        );
    }

    #[test]
    fn test_parse_refset_membership() {
        assert_eq!(parse("^447562003").unwrap(), Expr::RefsetMember(447562003));
    }

    #[test]
    fn test_parse_and_or_minus() {
        assert_eq!(
            parse("<<404684003 AND ^447562003").unwrap(),
            Expr::And(
                Box::new(Expr::DescendantsOrSelf(Box::new(Expr::Focus(404684003)))),
                Box::new(Expr::RefsetMember(447562003)),
            )
        );
        assert_eq!(
            parse("<<404684003 MINUS ^447562003").unwrap(),
            Expr::Minus(
                Box::new(Expr::DescendantsOrSelf(Box::new(Expr::Focus(404684003)))),
                Box::new(Expr::RefsetMember(447562003)),
            )
        );
        assert!(matches!(
            parse("100 OR 200").unwrap(),
            Expr::Or(_, _)
        ));
    }

    #[test]
    fn test_parse_ungrouped_refinement() {
        let expr = parse("<100:246075003=200").unwrap();
        match expr {
            Expr::Refined(base, clauses) => {
                assert_eq!(*base, Expr::Descendants(Box::new(Expr::Focus(100))));
                assert_eq!(clauses.len(), 1);
            }
            other => panic!("expected Refined, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_grouped_refinement() {
        let expr = parse("<100:{246075003=200,363698007=300}").unwrap();
        match expr {
            Expr::Refined(_, clauses) => {
                assert_eq!(clauses.len(), 1);
                match &clauses[0] {
                    RefinementClause::Group(attrs) => assert_eq!(attrs.len(), 2),
                    other => panic!("expected Group, got {other:?}"),
                }
            }
            other => panic!("expected Refined, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_parenthesised_subexpression() {
        let expr = parse("<(100 OR 200)").unwrap();
        match expr {
            Expr::Descendants(inner) => assert!(matches!(*inner, Expr::Or(_, _))),
            other => panic!("expected Descendants, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_failure_reports_position() {
        let err = parse("<<100 AND").unwrap_err();
        assert!(matches!(err, EclError::Parse { .. }));
    }
}
