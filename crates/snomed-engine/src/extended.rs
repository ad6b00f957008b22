//! Builds the [`ExtendedConcept`] projection (§4.8) from a [`Store`] alone.
//!
//! This never reaches into `snomed-search` or `snomed-ecl`: the projection
//! is a pure function of the component store and its materialized indices,
//! so it stays usable even from a context that never builds a search index
//! or an ECL evaluator, and it can't form a dependency cycle back through
//! [`crate::TerminologyEngine`].

use std::collections::{HashMap, HashSet};

use snomed_store::{Store, StoreResult};
use snomed_types::{ExtendedConcept, SctId};

/// Builds the extended-concept projection for `concept_id`, or `None` if no
/// concept with that id has been retained.
pub fn build(store: &Store, concept_id: SctId) -> StoreResult<Option<ExtendedConcept>> {
    let Some(concept) = store.get_concept(concept_id)? else {
        return Ok(None);
    };

    let descriptions = store.descriptions_for_concept(concept_id)?;

    let direct_parent_relationships = relationships_of(store, concept_id)?;

    let mut parent_relationships: HashMap<SctId, HashSet<SctId>> = direct_parent_relationships.clone();
    for ancestor_id in store.ancestors(concept_id)? {
        for (type_id, destinations) in relationships_of(store, ancestor_id)? {
            parent_relationships
                .entry(type_id)
                .or_default()
                .extend(destinations);
        }
    }

    let refsets = store.refsets_for(concept_id)?;

    Ok(Some(ExtendedConcept {
        concept,
        descriptions,
        parent_relationships,
        direct_parent_relationships,
        refsets,
    }))
}

fn relationships_of(store: &Store, concept_id: SctId) -> StoreResult<HashMap<SctId, HashSet<SctId>>> {
    let mut out: HashMap<SctId, HashSet<SctId>> = HashMap::new();
    for (type_id, _group, destination_id) in store.parent_edges(concept_id)? {
        out.entry(type_id).or_default().insert(destination_id);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snomed_store::StoreOptions;
    use snomed_types::{well_known, DefinitionStatus, Rf2Concept, Rf2Relationship};
    use tempfile::tempdir;

    fn concept(id: SctId) -> Rf2Concept {
        Rf2Concept {
            id,
            effective_time: 20200101,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            definition_status_id: DefinitionStatus::PRIMITIVE_ID,
        }
    }

    fn is_a(id: SctId, source: SctId, destination: SctId) -> Rf2Relationship {
        Rf2Relationship {
            id,
            effective_time: 20200101,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            source_id: source,
            destination_id: destination,
            relationship_group: 0,
            type_id: well_known::IS_A,
            characteristic_type_id: 900000000000011006,
            modifier_id: 900000000000451002,
        }
    }

    #[test]
    fn test_build_collects_transitive_and_direct_parent_relationships() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(dir.path())).unwrap();
        store
            .put_concepts(&[concept(100), concept(200), concept(300)])
            .unwrap();
        store
            .put_relationships(&[is_a(1, 200, 100), is_a(2, 300, 200)])
            .unwrap();
        store.build_indices().unwrap();

        let extended = build(&store, 300).unwrap().unwrap();
        assert_eq!(extended.concept.id, 300);
        assert_eq!(
            extended.direct_parent_relationships.get(&well_known::IS_A),
            Some(&HashSet::from([200]))
        );
        assert_eq!(
            extended.parent_relationships.get(&well_known::IS_A),
            Some(&HashSet::from([200, 100]))
        );
    }

    #[test]
    fn test_build_returns_none_for_unknown_concept() {
        let dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(dir.path())).unwrap();
        assert!(build(&store, 999).unwrap().is_none());
    }
}
