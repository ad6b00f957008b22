//! End-to-end exercise of the facade against the concrete scenarios: a
//! three-concept hierarchy (`100 <- 200 <- 300`), a refset `R1` covering
//! `{200, 300}`, and a description reconciliation case.

use std::collections::HashSet;

use snomed_engine::TerminologyEngine;
use snomed_search::SearchParams;
use snomed_store::{RefsetItem, Store, StoreOptions};
use snomed_types::{
    well_known, DefinitionStatus, Rf2Concept, Rf2Description, Rf2Relationship,
    Rf2SimpleRefsetMember, SctId,
};
use tempfile::tempdir;

const R1: SctId = 900000000000001001;

fn concept(id: SctId, term: &str) -> (Rf2Concept, Rf2Description) {
    (
        Rf2Concept {
            id,
            effective_time: 20200101,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            definition_status_id: DefinitionStatus::PRIMITIVE_ID,
        },
        Rf2Description {
            id: id * 10,
            effective_time: 20200101,
            active: true,
            module_id: well_known::SNOMED_CT_CORE_MODULE,
            concept_id: id,
            language_code: "en".into(),
            type_id: snomed_types::DescriptionType::FSN_ID,
            term: format!("{term} (finding)"),
            case_significance_id: 900000000000448009,
        },
    )
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

fn seed(path: &std::path::Path) {
    let store = Store::open(StoreOptions::new(path)).unwrap();

    let (c100, d100) = concept(100, "Clinical finding");
    let (c200, d200) = concept(200, "Disorder");
    let (c300, d300) = concept(300, "Infection");
    store.put_concepts(&[c100, c200, c300]).unwrap();
    store
        .put_descriptions(&[
            d100,
            d200,
            Rf2Description {
                id: 3001,
                term: "Infection".into(),
                type_id: snomed_types::DescriptionType::SYNONYM_ID,
                ..d300.clone()
            },
            d300,
        ])
        .unwrap();
    store.put_relationships(&[is_a(1, 200, 100), is_a(2, 300, 200)]).unwrap();

    // Two rows for the same description id: the later, inactive one wins.
    store
        .put_descriptions(&[
            Rf2Description {
                id: 9001,
                effective_time: 20200101,
                active: true,
                module_id: well_known::SNOMED_CT_CORE_MODULE,
                concept_id: 100,
                language_code: "en".into(),
                type_id: snomed_types::DescriptionType::SYNONYM_ID,
                term: "D1 first revision".into(),
                case_significance_id: 900000000000448009,
            },
            Rf2Description {
                id: 9001,
                effective_time: 20210101,
                active: false,
                module_id: well_known::SNOMED_CT_CORE_MODULE,
                concept_id: 100,
                language_code: "en".into(),
                type_id: snomed_types::DescriptionType::SYNONYM_ID,
                term: "D1 second revision".into(),
                case_significance_id: 900000000000448009,
            },
        ])
        .unwrap();

    store
        .put_refset_items(&[
            RefsetItem::Simple(Rf2SimpleRefsetMember {
                id: 1,
                effective_time: 20200101,
                active: true,
                module_id: well_known::SNOMED_CT_CORE_MODULE,
                refset_id: R1,
                referenced_component_id: 200,
            }),
            RefsetItem::Simple(Rf2SimpleRefsetMember {
                id: 2,
                effective_time: 20200101,
                active: true,
                module_id: well_known::SNOMED_CT_CORE_MODULE,
                refset_id: R1,
                referenced_component_id: 300,
            }),
        ])
        .unwrap();

    store.build_indices().unwrap();

    let retained = store.get_description(9001).unwrap().unwrap();
    assert!(!retained.active);
    assert_eq!(retained.effective_time, 20210101);
}

#[test]
fn test_hierarchy_descendants_and_subsumption() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let engine = TerminologyEngine::open(dir.path(), false).unwrap();
    engine.reindex().unwrap();

    assert!(engine.subsumes(100, 300).unwrap());
    assert!(!engine.subsumes(300, 100).unwrap());
}

#[test]
fn test_refset_membership_via_facade_and_ecl() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let engine = TerminologyEngine::open(dir.path(), false).unwrap();
    engine.reindex().unwrap();

    let members = engine.expand_ecl(&format!("^{R1}")).unwrap();
    assert_eq!(members, HashSet::from([200, 300]));
}

#[test]
fn test_ecl_set_algebra_and_refinement() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let engine = TerminologyEngine::open(dir.path(), false).unwrap();
    engine.reindex().unwrap();

    assert_eq!(
        engine.expand_ecl(&format!("<<200 AND ^{R1}")).unwrap(),
        HashSet::from([200, 300])
    );
    assert_eq!(
        engine.expand_ecl(&format!("<<200 MINUS ^{R1}")).unwrap(),
        HashSet::new()
    );
    assert_eq!(
        engine.expand_ecl("<100:116680003=200").unwrap(),
        HashSet::from([300])
    );
}

#[test]
fn test_search_with_concept_filter_ranks_the_scoped_hit_first() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let engine = TerminologyEngine::open(dir.path(), false).unwrap();
    engine.reindex().unwrap();

    let descendants_of_100 = engine.expand_ecl("<100").unwrap();
    let mut params = SearchParams::new("infec");
    params.concept_id_filter = Some(descendants_of_100);
    let hits = engine.search(&params).unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].concept_id, 300);
}

#[test]
fn test_inactive_description_is_not_indexed_for_search() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let engine = TerminologyEngine::open(dir.path(), false).unwrap();
    engine.reindex().unwrap();

    let hits = engine.search(&SearchParams::new("second revision")).unwrap();
    assert!(hits.is_empty());

    let descriptions = engine.get_descriptions(100).unwrap();
    assert!(descriptions.iter().all(|d| d.term != "D1 second revision"));
}

#[test]
fn test_compact_preserves_query_results() {
    let dir = tempdir().unwrap();
    seed(dir.path());
    let mut engine = TerminologyEngine::open(dir.path(), false).unwrap();
    engine.reindex().unwrap();

    let before = engine.expand_ecl(&format!("^{R1}")).unwrap();
    engine.compact().unwrap();
    let after = engine.expand_ecl(&format!("^{R1}")).unwrap();
    assert_eq!(before, after);
}
