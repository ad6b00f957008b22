//! `status` support: row counts across the primary tables and derived
//! indices, surfaced by [`crate::Store::status`].

use redb::{Database, ReadableTable};
use serde::Serialize;

use crate::error::StoreResult;
use crate::tables;

/// Snapshot of a store's size and freshness, mirroring the `status`
/// command's reported fields.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    /// Number of rows in the `concepts` table.
    pub concept_count: u64,
    /// Number of rows in the `descriptions` table.
    pub description_count: u64,
    /// Number of rows in the `relationships` table.
    pub relationship_count: u64,
    /// Number of rows in the `refset_items` table.
    pub refset_item_count: u64,
    /// Number of distinct refsets with at least one active member.
    pub installed_refset_count: u64,
    /// True if an import has run since the last successful index build.
    pub needs_reindex: bool,
}

pub(crate) fn collect(db: &Database, needs_reindex: bool) -> StoreResult<StoreStatus> {
    let txn = db.begin_read()?;
    let concepts = txn.open_table(tables::CONCEPTS)?;
    let descriptions = txn.open_table(tables::DESCRIPTIONS)?;
    let relationships = txn.open_table(tables::RELATIONSHIPS)?;
    let refset_items = txn.open_table(tables::REFSET_ITEMS)?;
    let installed_refsets = txn.open_table(tables::INSTALLED_REFSETS)?;

    Ok(StoreStatus {
        concept_count: concepts.len()?,
        description_count: descriptions.len()?,
        relationship_count: relationships.len()?,
        refset_item_count: refset_items.len()?,
        installed_refset_count: installed_refsets.len()?,
        needs_reindex,
    })
}
