//! The post-import Index Builder (§4.4): materialises relationship closure
//! and refset membership from the primary tables.
//!
//! Both phases are full rebuilds from the primary tables, not incremental
//! updates, so a crashed or partial build is always recoverable by simply
//! re-running [`build`].

use std::collections::{HashMap, HashSet};

use redb::{Database, ReadableTable};
use serde::Serialize;
use snomed_types::{well_known, Rf2Relationship, SctId};

use crate::error::StoreResult;
use crate::keys::{edge_key, pair_key, triple_key};
use crate::record::RefsetItem;
use crate::tables;

/// Summary counts from one [`build`] run, logged at `info` level and
/// returned to the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexBuildReport {
    /// Active relationships scanned while populating the parent/child maps.
    pub relationships_indexed: u64,
    /// `(ancestor, descendant)` pairs written to the IS_A closure.
    pub descendant_pairs: u64,
    /// IS_A edges excluded from the closure because they sit on a cycle.
    pub cycles_skipped: u64,
    /// Active refset items scanned while populating membership indices.
    pub refset_items_indexed: u64,
    /// Distinct refsets with at least one active member.
    pub installed_refsets: u64,
}

pub(crate) fn build(db: &Database) -> StoreResult<IndexBuildReport> {
    let mut report = IndexBuildReport::default();
    let txn = db.begin_write()?;
    {
        // Derived tables are always rebuilt from scratch: delete + recreate
        // rather than incrementally patch, so a half-finished prior build
        // never leaves stale rows behind.
        for def in [
            tables::CONCEPT_PARENT_RELATIONSHIPS,
            tables::CONCEPT_CHILD_RELATIONSHIPS,
            tables::DESCENDANT_RELATIONSHIPS,
            tables::ANCESTOR_RELATIONSHIPS,
        ] {
            txn.delete_table(def)?;
            txn.open_table(def)?;
        }
        for def in [
            tables::INSTALLED_REFSETS,
            tables::COMPONENT_REFSETS,
            tables::REFSET_MEMBERS,
            tables::REFSET_FIELD_NAMES,
            tables::DESCENDANT_COUNTS,
            tables::ANCESTOR_COUNTS,
            tables::REFSET_COUNTS,
        ] {
            txn.delete_table(def)?;
            txn.open_table(def)?;
        }

        // ---- Phase 1: relationship indices ----
        let mut children_of: HashMap<SctId, Vec<SctId>> = HashMap::new();
        let mut parents_of: HashMap<SctId, Vec<SctId>> = HashMap::new();
        {
            let relationships = txn.open_table(tables::RELATIONSHIPS)?;
            let mut parent_edges = txn.open_table(tables::CONCEPT_PARENT_RELATIONSHIPS)?;
            let mut child_edges = txn.open_table(tables::CONCEPT_CHILD_RELATIONSHIPS)?;

            for entry in relationships.iter()? {
                let (_, value) = entry?;
                let relationship: Rf2Relationship = serde_json::from_slice(value.value())
                    .map_err(|e| crate::error::StoreError::Corrupt(e.to_string()))?;
                if !relationship.active {
                    continue;
                }
                report.relationships_indexed += 1;

                let forward = edge_key(
                    relationship.source_id,
                    relationship.type_id,
                    relationship.relationship_group,
                    relationship.destination_id,
                    relationship.id,
                );
                parent_edges.insert(forward.as_slice(), ())?;

                let reverse = edge_key(
                    relationship.destination_id,
                    relationship.type_id,
                    relationship.relationship_group,
                    relationship.source_id,
                    relationship.id,
                );
                child_edges.insert(reverse.as_slice(), ())?;

                if relationship.type_id == well_known::IS_A {
                    // source IS_A destination: source is the child, destination the parent.
                    children_of
                        .entry(relationship.destination_id)
                        .or_default()
                        .push(relationship.source_id);
                    parents_of
                        .entry(relationship.source_id)
                        .or_default()
                        .push(relationship.destination_id);
                }
            }
        }

        let (descendants_of, cycles_skipped) = compute_closure(&children_of, &parents_of);
        report.cycles_skipped = cycles_skipped;

        {
            let mut descendant_table = txn.open_table(tables::DESCENDANT_RELATIONSHIPS)?;
            let mut ancestor_table = txn.open_table(tables::ANCESTOR_RELATIONSHIPS)?;
            let mut descendant_counts = txn.open_table(tables::DESCENDANT_COUNTS)?;
            let mut ancestor_counts: HashMap<SctId, u64> = HashMap::new();

            for (ancestor, descendants) in &descendants_of {
                descendant_counts.insert(*ancestor, descendants.len() as u64)?;
                report.descendant_pairs += descendants.len() as u64;
                for descendant in descendants {
                    descendant_table.insert(pair_key(*ancestor, *descendant).as_slice(), ())?;
                    ancestor_table.insert(pair_key(*descendant, *ancestor).as_slice(), ())?;
                    *ancestor_counts.entry(*descendant).or_insert(0) += 1;
                }
            }

            let mut ancestor_counts_table = txn.open_table(tables::ANCESTOR_COUNTS)?;
            for (concept_id, count) in ancestor_counts {
                ancestor_counts_table.insert(concept_id, count)?;
            }
        }

        // ---- Phase 2: refset membership indices ----
        {
            let refset_items = txn.open_table(tables::REFSET_ITEMS)?;
            let mut component_refsets = txn.open_table(tables::COMPONENT_REFSETS)?;
            let mut refset_members = txn.open_table(tables::REFSET_MEMBERS)?;
            let mut installed_refsets = txn.open_table(tables::INSTALLED_REFSETS)?;
            let mut refset_counts: HashMap<SctId, u64> = HashMap::new();
            let mut field_names: HashMap<SctId, Vec<String>> = HashMap::new();
            let mut seen_refsets: HashSet<SctId> = HashSet::new();

            for entry in refset_items.iter()? {
                let (_, value) = entry?;
                let item: RefsetItem = serde_json::from_slice(value.value())
                    .map_err(|e| crate::error::StoreError::Corrupt(e.to_string()))?;
                if !item.active() {
                    continue;
                }
                report.refset_items_indexed += 1;

                let refset_id = item.refset_id();
                let component_id = item.referenced_component_id();
                let item_id = item.id();

                component_refsets
                    .insert(triple_key(component_id, refset_id, item_id).as_slice(), ())?;
                refset_members.insert(triple_key(refset_id, component_id, item_id).as_slice(), ())?;
                if seen_refsets.insert(refset_id) {
                    installed_refsets.insert(refset_id, ())?;
                }
                *refset_counts.entry(refset_id).or_insert(0) += 1;
                field_names.entry(refset_id).or_insert_with(|| schema_field_names(&item));
            }

            report.installed_refsets = seen_refsets.len() as u64;

            let mut refset_counts_table = txn.open_table(tables::REFSET_COUNTS)?;
            for (refset_id, count) in refset_counts {
                refset_counts_table.insert(refset_id, count)?;
            }

            let mut refset_field_names_table = txn.open_table(tables::REFSET_FIELD_NAMES)?;
            for (refset_id, names) in field_names {
                let bytes = serde_json::to_vec(&names)
                    .map_err(|e| crate::error::StoreError::Corrupt(e.to_string()))?;
                refset_field_names_table.insert(refset_id, bytes.as_slice())?;
            }
        }
    }
    txn.commit()?;
    Ok(report)
}

/// The extension column names for a refset item's schema.
///
/// Named schemas have a fixed, known set of extra columns. A generic item's
/// real header names aren't recoverable at this point (they were consumed
/// when the file's header row was read, and the persisted record keeps only
/// positional values), so positional placeholders are recorded instead --
/// sufficient to recover the column *count* and order, which is what the
/// `refsetFieldNames` contract exists to support.
fn schema_field_names(item: &RefsetItem) -> Vec<String> {
    match item {
        RefsetItem::Simple(_) => vec![],
        RefsetItem::Language(_) => vec!["acceptabilityId".to_string()],
        RefsetItem::Association(_) => vec!["targetComponentId".to_string()],
        RefsetItem::OwlExpression(_) => vec!["owlExpression".to_string()],
        RefsetItem::Generic(generic) => (0..generic.fields.len())
            .map(|i| format!("field_{i}"))
            .collect(),
    }
}

/// Computes the transitive closure of active IS_A edges by processing
/// concepts leaf-first (bottom-up dynamic programming over the DAG): a
/// concept's descendant set is the union of its direct children plus each
/// child's own descendant set, so a child must be finished before its
/// parent can be.
///
/// Concepts left with unresolved children once the queue drains sit on a
/// cycle (there should be none in valid SNOMED data); those are logged and
/// excluded from the closure rather than looped over forever.
fn compute_closure(
    children_of: &HashMap<SctId, Vec<SctId>>,
    parents_of: &HashMap<SctId, Vec<SctId>>,
) -> (HashMap<SctId, HashSet<SctId>>, u64) {
    let mut all_nodes: HashSet<SctId> = HashSet::new();
    for (parent, children) in children_of {
        all_nodes.insert(*parent);
        all_nodes.extend(children.iter().copied());
    }
    for (child, parents) in parents_of {
        all_nodes.insert(*child);
        all_nodes.extend(parents.iter().copied());
    }

    let mut pending: HashMap<SctId, usize> = all_nodes
        .iter()
        .map(|&id| (id, children_of.get(&id).map_or(0, |c| c.len())))
        .collect();

    let mut queue: Vec<SctId> = pending
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut descendants: HashMap<SctId, HashSet<SctId>> = HashMap::new();
    let mut processed: HashSet<SctId> = HashSet::new();

    while let Some(node) = queue.pop() {
        if processed.contains(&node) {
            continue;
        }
        let mut set = HashSet::new();
        if let Some(children) = children_of.get(&node) {
            for &child in children {
                set.insert(child);
                if let Some(child_descendants) = descendants.get(&child) {
                    set.extend(child_descendants.iter().copied());
                }
            }
        }
        descendants.insert(node, set);
        processed.insert(node);

        if let Some(parents) = parents_of.get(&node) {
            for &parent in parents {
                if let Some(count) = pending.get_mut(&parent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 && !processed.contains(&parent) {
                        queue.push(parent);
                    }
                }
            }
        }
    }

    let cycle_members: Vec<SctId> = all_nodes
        .iter()
        .filter(|id| !processed.contains(id))
        .copied()
        .collect();
    if !cycle_members.is_empty() {
        tracing::warn!(
            count = cycle_members.len(),
            members = ?cycle_members,
            "IS_A cycle detected; excluding affected concepts from descendant closure"
        );
    }

    (descendants, cycle_members.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StoreOptions;
    use crate::Store;
    use snomed_types::Rf2Concept;
    use tempfile::tempdir;

    fn concept(id: SctId) -> Rf2Concept {
        Rf2Concept {
            id,
            effective_time: 20200101,
            active: true,
            module_id: 900000000000207008,
            definition_status_id: 900000000000074008,
        }
    }

    fn is_a(id: SctId, source: SctId, destination: SctId) -> Rf2Relationship {
        Rf2Relationship {
            id,
            effective_time: 20200101,
            active: true,
            module_id: 900000000000207008,
            source_id: source,
            destination_id: destination,
            relationship_group: 0,
            type_id: well_known::IS_A,
            characteristic_type_id: 900000000000011006,
            modifier_id: 900000000000451002,
        }
    }

    #[test]
    fn test_descendant_closure_from_scenario_fixture() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(dir.path())).unwrap();

        store
            .put_concepts(&[concept(100), concept(200), concept(300)])
            .unwrap();
        store
            .put_relationships(&[is_a(1, 200, 100), is_a(2, 300, 200)])
            .unwrap();

        let report = store.build_indices().unwrap();
        assert_eq!(report.relationships_indexed, 2);
        assert_eq!(report.cycles_skipped, 0);

        assert_eq!(
            store.descendants(100).unwrap(),
            HashSet::from([200, 300])
        );
        assert_eq!(store.descendants(200).unwrap(), HashSet::from([300]));
        assert!(store.descendants(300).unwrap().is_empty());

        assert!(store.subsumes(100, 300).unwrap());
        assert!(!store.subsumes(300, 100).unwrap());

        assert_eq!(store.descendant_count(100).unwrap(), 2);
        assert_eq!(store.ancestor_count(300).unwrap(), 2);
    }

    #[test]
    fn test_cycle_is_skipped_not_looped() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(dir.path())).unwrap();

        store
            .put_concepts(&[concept(1), concept(2)])
            .unwrap();
        // 1 IS_A 2, 2 IS_A 1: a cycle.
        store
            .put_relationships(&[is_a(10, 1, 2), is_a(11, 2, 1)])
            .unwrap();

        let report = store.build_indices().unwrap();
        assert_eq!(report.cycles_skipped, 2);
        assert!(store.descendants(1).unwrap().is_empty());
        assert!(store.descendants(2).unwrap().is_empty());
    }

    #[test]
    fn test_refset_membership_index() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(dir.path())).unwrap();

        store
            .put_concepts(&[concept(200), concept(300)])
            .unwrap();
        store
            .put_refset_items(&[
                RefsetItem::Simple(snomed_types::Rf2SimpleRefsetMember {
                    id: 1,
                    effective_time: 20200101,
                    active: true,
                    module_id: 900000000000207008,
                    refset_id: 900000000000001,
                    referenced_component_id: 200,
                }),
                RefsetItem::Simple(snomed_types::Rf2SimpleRefsetMember {
                    id: 2,
                    effective_time: 20200101,
                    active: true,
                    module_id: 900000000000207008,
                    refset_id: 900000000000001,
                    referenced_component_id: 300,
                }),
            ])
            .unwrap();

        store.build_indices().unwrap();

        assert_eq!(
            store.members_of(900000000000001).unwrap(),
            HashSet::from([200, 300])
        );
        assert!(store.refsets_for(200).unwrap().contains(&900000000000001));
        assert_eq!(store.refset_count(900000000000001).unwrap(), 2);
        assert!(store.installed_refsets().unwrap().contains(&900000000000001));
    }

    #[test]
    fn test_rebuild_is_idempotent_and_recoverable() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(dir.path())).unwrap();
        store
            .put_concepts(&[concept(100), concept(200)])
            .unwrap();
        store.put_relationships(&[is_a(1, 200, 100)]).unwrap();

        let first = store.build_indices().unwrap();
        let second = store.build_indices().unwrap();
        assert_eq!(first.descendant_pairs, second.descendant_pairs);
        assert_eq!(store.descendants(100).unwrap(), HashSet::from([200]));
    }
}
