//! `redb` table definitions backing the component store.
//!
//! Primary tables are keyed by the component's own id and hold a
//! `serde_json`-encoded record as the value. Secondary tables hold no
//! meaningful value (`()`) and exist purely so their composite byte key can
//! be prefix-scanned; see `keys.rs` for the encoding.

use redb::TableDefinition;

/// `conceptId -> Rf2Concept` (serde_json bytes).
pub const CONCEPTS: TableDefinition<u64, &[u8]> = TableDefinition::new("concepts");
/// `descriptionId -> Rf2Description` (serde_json bytes).
pub const DESCRIPTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("descriptions");
/// `relationshipId -> Rf2Relationship` (serde_json bytes).
pub const RELATIONSHIPS: TableDefinition<u64, &[u8]> = TableDefinition::new("relationships");
/// `itemId -> RefsetItem` (serde_json bytes). Parsed as a `u64` via
/// [`snomed_types::SctId`]'s parser rather than kept as the native RF2 UUID
/// string, consistent with every other id column in this store.
pub const REFSET_ITEMS: TableDefinition<u64, &[u8]> = TableDefinition::new("refset_items");

/// `(conceptId, descriptionId) -> ()`. Maintained inline at import time
/// (not by the index builder) since it needs no relationship traversal.
pub const CONCEPT_DESCRIPTIONS: TableDefinition<&[u8], ()> =
    TableDefinition::new("concept_descriptions");

/// `(sourceId, typeId, group, destinationId, relationshipId) -> ()`.
/// Forward edges, populated by the index builder from active relationships.
pub const CONCEPT_PARENT_RELATIONSHIPS: TableDefinition<&[u8], ()> =
    TableDefinition::new("concept_parent_relationships");

/// `(destinationId, typeId, group, sourceId, relationshipId) -> ()`.
/// Reverse edges, populated by the index builder from active relationships.
pub const CONCEPT_CHILD_RELATIONSHIPS: TableDefinition<&[u8], ()> =
    TableDefinition::new("concept_child_relationships");

/// `(ancestorId, descendantId) -> ()`. Transitive closure of active IS_A
/// edges, populated by the index builder.
pub const DESCENDANT_RELATIONSHIPS: TableDefinition<&[u8], ()> =
    TableDefinition::new("descendant_relationships");

/// `refsetId -> ()`. The set of refsets with at least one active member,
/// populated by the index builder.
pub const INSTALLED_REFSETS: TableDefinition<u64, ()> = TableDefinition::new("installed_refsets");

/// `(componentId, refsetId, itemId) -> ()`. Supports `refsetsFor(component)`
/// prefix scans; populated by the index builder.
pub const COMPONENT_REFSETS: TableDefinition<&[u8], ()> = TableDefinition::new("component_refsets");

/// `(refsetId, componentId, itemId) -> ()`. The symmetric index supporting
/// `membersOf(refset)` prefix scans; not separately named in the data model
/// table but required to make that scan a prefix scan rather than a full
/// table scan. Populated alongside `componentRefsets` by the index builder.
pub const REFSET_MEMBERS: TableDefinition<&[u8], ()> = TableDefinition::new("refset_members");

/// `refsetId -> Vec<String>` (serde_json bytes) of extension column names,
/// recorded so a generic refset's schema can be recovered from the header
/// row alone. Populated by the index builder.
pub const REFSET_FIELD_NAMES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("refset_field_names");

/// `(descendantId, ancestorId) -> ()`. The reverse of
/// `descendantRelationships`, so `ancestors(conceptId)` is a prefix scan
/// rather than a full-table scan. Populated by the index builder.
pub const ANCESTOR_RELATIONSHIPS: TableDefinition<&[u8], ()> =
    TableDefinition::new("ancestor_relationships");

/// `ancestorId -> descendant count`. Maintained alongside
/// `descendantRelationships` so an ECL evaluator can cheaply estimate the
/// cardinality of `<X`/`<<X` without materialising the set.
pub const DESCENDANT_COUNTS: TableDefinition<u64, u64> = TableDefinition::new("descendant_counts");

/// `descendantId -> ancestor count`. The symmetric estimator table for
/// `>X`/`>>X`.
pub const ANCESTOR_COUNTS: TableDefinition<u64, u64> = TableDefinition::new("ancestor_counts");

/// `refsetId -> active member count`. The estimator table for `^R`.
pub const REFSET_COUNTS: TableDefinition<u64, u64> = TableDefinition::new("refset_counts");
