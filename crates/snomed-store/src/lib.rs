//! # snomed-store
//!
//! The persistent component store for a SNOMED CT terminology engine:
//! ordered key-value tables over a single on-disk `redb` container, plus
//! the post-import index builder that materialises relationship closure
//! and refset membership from the primary tables.
//!
//! [`Store`] is opened once per on-disk path (a second concurrent opener
//! is rejected, see [`StoreOptions`]); all reads and writes go through the
//! one instance, there is no process-wide global.
//!
//! ## Usage
//!
//! ```no_run
//! use snomed_store::{Store, StoreOptions};
//!
//! let store = Store::open(StoreOptions::new("snomed.db"))?;
//! store.put_concepts(&[])?;
//! store.build_indices()?;
//! let concept = store.get_concept(404684003)?;
//! # Ok::<(), snomed_store::StoreError>(())
//! ```

#![warn(missing_docs)]

mod error;
mod index;
pub mod keys;
mod options;
pub mod record;
mod status;
mod tables;

pub use error::{StoreError, StoreResult};
pub use index::IndexBuildReport;
pub use options::StoreOptions;
pub use record::{should_replace, EffectiveTimeRecord, RefsetItem};
pub use status::StoreStatus;

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use fs2::FileExt;
use redb::{Database, ReadableTable};
use snomed_types::{Rf2Concept, Rf2Description, Rf2Relationship, SctId};

use keys::{decode_pair_key, decode_triple_key, pair_key, u64_key};

/// The persistent component store.
///
/// Holds one open `redb::Database` plus the advisory lockfile that makes
/// this the only live opener of `options.path`. Every method takes `&self`:
/// concurrent reads never block each other (per §5 of the engine's
/// concurrency model), and writers serialize through `redb`'s own
/// single-writer transaction semantics.
pub struct Store {
    db: Database,
    options: StoreOptions,
    _lock: File,
    dirty: AtomicBool,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.options.path)
            .field("read_only", &self.options.read_only)
            .field("dirty", &self.dirty.load(Ordering::Relaxed))
            .finish()
    }
}

impl Store {
    /// Opens (creating if absent, unless `options.read_only`) the store
    /// rooted at `options.path`.
    ///
    /// Takes an exclusive advisory lock on a lockfile under `path`; a
    /// second call against the same path (from this process or another)
    /// fails with [`StoreError::Locked`] until the first `Store` is
    /// dropped.
    pub fn open(options: StoreOptions) -> StoreResult<Self> {
        if !options.read_only {
            fs::create_dir_all(&options.path)?;
        }

        let lock_path = options.path.join("store.db.lock");
        let lock_file = File::options()
            .create(!options.read_only)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(StoreError::Io)?;
        lock_file.try_lock_exclusive().map_err(|_| StoreError::Locked {
            path: options.path.display().to_string(),
        })?;

        let db_path = options.path.join("store.db");
        let db = if options.read_only {
            Database::open(&db_path)?
        } else {
            Database::create(&db_path)?
        };

        let store = Store {
            db,
            options,
            _lock: lock_file,
            dirty: AtomicBool::new(false),
        };

        if !store.options.read_only {
            store.ensure_tables()?;
        }

        tracing::info!(path = %store.options.path.display(), read_only = store.options.read_only, "store opened");
        Ok(store)
    }

    /// The directory this store is rooted at.
    pub fn path(&self) -> &Path {
        &self.options.path
    }

    /// True if the store was opened read-only.
    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    /// True if an import has committed batches since the last successful
    /// [`Store::build_indices`] call, meaning the derived indices (and any
    /// search index built from them) may be stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Relaxed);
    }

    fn require_writable(&self) -> StoreResult<()> {
        if self.options.read_only {
            return Err(StoreError::ReadOnly {
                path: self.options.path.display().to_string(),
            });
        }
        Ok(())
    }

    /// Creates every table up front so a fresh store has a consistent
    /// schema before any data is written.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write()?;
        {
            txn.open_table(tables::CONCEPTS)?;
            txn.open_table(tables::DESCRIPTIONS)?;
            txn.open_table(tables::RELATIONSHIPS)?;
            txn.open_table(tables::REFSET_ITEMS)?;
            txn.open_table(tables::CONCEPT_DESCRIPTIONS)?;
            txn.open_table(tables::CONCEPT_PARENT_RELATIONSHIPS)?;
            txn.open_table(tables::CONCEPT_CHILD_RELATIONSHIPS)?;
            txn.open_table(tables::DESCENDANT_RELATIONSHIPS)?;
            txn.open_table(tables::ANCESTOR_RELATIONSHIPS)?;
            txn.open_table(tables::INSTALLED_REFSETS)?;
            txn.open_table(tables::COMPONENT_REFSETS)?;
            txn.open_table(tables::REFSET_MEMBERS)?;
            txn.open_table(tables::REFSET_FIELD_NAMES)?;
            txn.open_table(tables::DESCENDANT_COUNTS)?;
            txn.open_table(tables::ANCESTOR_COUNTS)?;
            txn.open_table(tables::REFSET_COUNTS)?;
        }
        txn.commit()?;
        Ok(())
    }

    // ---- primary table writes (§4.2/§4.3 effective-time reconciliation) ----

    /// Applies a batch of concept rows, keeping per-id the row with the
    /// greatest `effectiveTime` (ties broken by `active`). Returns the
    /// number of rows that changed the store's state.
    pub fn put_concepts(&self, batch: &[Rf2Concept]) -> StoreResult<usize> {
        self.require_writable()?;
        let txn = self.db.begin_write()?;
        let mut written = 0usize;
        {
            let mut table = txn.open_table(tables::CONCEPTS)?;
            for concept in batch {
                let existing = read_json::<Rf2Concept>(&table, concept.id)?;
                if should_replace(existing.as_ref(), concept) {
                    write_json(&mut table, concept.id, concept)?;
                    written += 1;
                }
            }
        }
        txn.commit()?;
        if written > 0 {
            self.mark_dirty();
        }
        Ok(written)
    }

    /// Applies a batch of description rows, maintaining the
    /// `conceptDescriptions` secondary index inline (it needs no
    /// relationship traversal, unlike the index-builder-owned tables).
    pub fn put_descriptions(&self, batch: &[Rf2Description]) -> StoreResult<usize> {
        self.require_writable()?;
        let txn = self.db.begin_write()?;
        let mut written = 0usize;
        {
            let mut descriptions = txn.open_table(tables::DESCRIPTIONS)?;
            let mut concept_descriptions = txn.open_table(tables::CONCEPT_DESCRIPTIONS)?;
            for description in batch {
                let existing = read_json::<Rf2Description>(&descriptions, description.id)?;
                if should_replace(existing.as_ref(), description) {
                    if let Some(old) = &existing {
                        if old.concept_id != description.concept_id {
                            let old_key = pair_key(old.concept_id, old.id);
                            concept_descriptions.remove(old_key.as_slice())?;
                        }
                    }
                    write_json(&mut descriptions, description.id, description)?;
                    let key = pair_key(description.concept_id, description.id);
                    concept_descriptions.insert(key.as_slice(), ())?;
                    written += 1;
                }
            }
        }
        txn.commit()?;
        if written > 0 {
            self.mark_dirty();
        }
        Ok(written)
    }

    /// Applies a batch of relationship rows to the primary `relationships`
    /// table only; `conceptParentRelationships`/`conceptChildRelationships`/
    /// `descendantRelationships` are derived later by [`Store::build_indices`].
    pub fn put_relationships(&self, batch: &[Rf2Relationship]) -> StoreResult<usize> {
        self.require_writable()?;
        let txn = self.db.begin_write()?;
        let mut written = 0usize;
        {
            let mut table = txn.open_table(tables::RELATIONSHIPS)?;
            for relationship in batch {
                let existing = read_json::<Rf2Relationship>(&table, relationship.id)?;
                if should_replace(existing.as_ref(), relationship) {
                    write_json(&mut table, relationship.id, relationship)?;
                    written += 1;
                }
            }
        }
        txn.commit()?;
        if written > 0 {
            self.mark_dirty();
        }
        Ok(written)
    }

    /// Applies a batch of refset item rows to the primary `refsetItems`
    /// table only; membership indices are derived later by
    /// [`Store::build_indices`].
    pub fn put_refset_items(&self, batch: &[RefsetItem]) -> StoreResult<usize> {
        self.require_writable()?;
        let txn = self.db.begin_write()?;
        let mut written = 0usize;
        {
            let mut table = txn.open_table(tables::REFSET_ITEMS)?;
            for item in batch {
                let existing = read_json::<RefsetItem>(&table, item.id())?;
                if should_replace(existing.as_ref(), item) {
                    write_json(&mut table, item.id(), item)?;
                    written += 1;
                }
            }
        }
        txn.commit()?;
        if written > 0 {
            self.mark_dirty();
        }
        Ok(written)
    }

    // ---- point reads ----

    /// Looks up a concept by id.
    pub fn get_concept(&self, id: SctId) -> StoreResult<Option<Rf2Concept>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::CONCEPTS)?;
        read_json(&table, id)
    }

    /// Looks up a description by id.
    pub fn get_description(&self, id: SctId) -> StoreResult<Option<Rf2Description>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::DESCRIPTIONS)?;
        read_json(&table, id)
    }

    /// Looks up a relationship by id.
    pub fn get_relationship(&self, id: SctId) -> StoreResult<Option<Rf2Relationship>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::RELATIONSHIPS)?;
        read_json(&table, id)
    }

    /// Looks up a refset item by id.
    pub fn get_refset_item(&self, id: SctId) -> StoreResult<Option<RefsetItem>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::REFSET_ITEMS)?;
        read_json(&table, id)
    }

    /// Every active description attached to `concept_id`. The
    /// `conceptDescriptions` index is populated for every retained row
    /// regardless of `active` (§4.3), so this filters on the way out.
    pub fn descriptions_for_concept(&self, concept_id: SctId) -> StoreResult<Vec<Rf2Description>> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(tables::CONCEPT_DESCRIPTIONS)?;
        let descriptions = txn.open_table(tables::DESCRIPTIONS)?;
        let prefix = u64_key(concept_id);
        let mut out = Vec::new();
        for entry in index.range(prefix.as_slice()..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(&prefix) {
                break;
            }
            let (_, description_id) = decode_pair_key(&bytes);
            if let Some(description) = read_json::<Rf2Description>(&descriptions, description_id)? {
                if description.active {
                    out.push(description);
                }
            }
        }
        Ok(out)
    }

    // ---- relationship traversal (populated by the index builder) ----

    /// Destination ids of active relationships whose source is
    /// `concept_id`, optionally restricted to a single `type_id`.
    pub fn parents_of_type(
        &self,
        concept_id: SctId,
        type_id: Option<SctId>,
    ) -> StoreResult<HashSet<SctId>> {
        self.scan_edges(tables::CONCEPT_PARENT_RELATIONSHIPS, concept_id, type_id)
    }

    /// Source ids of active relationships whose destination is
    /// `concept_id`, optionally restricted to a single `type_id`.
    pub fn children_of_type(
        &self,
        concept_id: SctId,
        type_id: Option<SctId>,
    ) -> StoreResult<HashSet<SctId>> {
        self.scan_edges(tables::CONCEPT_CHILD_RELATIONSHIPS, concept_id, type_id)
    }

    fn scan_edges(
        &self,
        table_def: redb::TableDefinition<&[u8], ()>,
        anchor_id: SctId,
        type_id: Option<SctId>,
    ) -> StoreResult<HashSet<SctId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table_def)?;
        let prefix = u64_key(anchor_id);
        let mut out = HashSet::new();
        for entry in table.range(prefix.as_slice()..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(&prefix) {
                break;
            }
            let (_, edge_type, _group, other_id, _rel_id) = keys::decode_edge_key(&bytes);
            if type_id.is_none_or(|t| t == edge_type) {
                out.insert(other_id);
            }
        }
        Ok(out)
    }

    /// The transitive closure of active IS_A edges descending from
    /// `concept_id` (excludes `concept_id` itself).
    pub fn descendants(&self, concept_id: SctId) -> StoreResult<HashSet<SctId>> {
        self.scan_pairs(tables::DESCENDANT_RELATIONSHIPS, concept_id)
    }

    /// The transitive closure of active IS_A edges ancestor to
    /// `concept_id` (excludes `concept_id` itself).
    pub fn ancestors(&self, concept_id: SctId) -> StoreResult<HashSet<SctId>> {
        self.scan_pairs(tables::ANCESTOR_RELATIONSHIPS, concept_id)
    }

    fn scan_pairs(
        &self,
        table_def: redb::TableDefinition<&[u8], ()>,
        anchor_id: SctId,
    ) -> StoreResult<HashSet<SctId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table_def)?;
        let prefix = u64_key(anchor_id);
        let mut out = HashSet::new();
        for entry in table.range(prefix.as_slice()..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(&prefix) {
                break;
            }
            let (_, other_id) = decode_pair_key(&bytes);
            out.insert(other_id);
        }
        Ok(out)
    }

    /// `true` iff `child_id` is `parent_id` or a descendant of it.
    pub fn subsumes(&self, parent_id: SctId, child_id: SctId) -> StoreResult<bool> {
        if parent_id == child_id {
            return Ok(true);
        }
        Ok(self.descendants(parent_id)?.contains(&child_id))
    }

    /// The cached descendant count for `concept_id`, as maintained by the
    /// index builder; used by the ECL evaluator's cardinality estimator.
    pub fn descendant_count(&self, concept_id: SctId) -> StoreResult<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::DESCENDANT_COUNTS)?;
        Ok(table.get(concept_id)?.map(|v| v.value()).unwrap_or(0))
    }

    /// The cached ancestor count for `concept_id`.
    pub fn ancestor_count(&self, concept_id: SctId) -> StoreResult<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::ANCESTOR_COUNTS)?;
        Ok(table.get(concept_id)?.map(|v| v.value()).unwrap_or(0))
    }

    // ---- refset membership (populated by the index builder) ----

    /// Refset ids `component_id` is an active member of.
    pub fn refsets_for(&self, component_id: SctId) -> StoreResult<HashSet<SctId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::COMPONENT_REFSETS)?;
        let prefix = u64_key(component_id);
        let mut out = HashSet::new();
        for entry in table.range(prefix.as_slice()..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(&prefix) {
                break;
            }
            let (_, refset_id, _item_id) = decode_triple_key(&bytes);
            out.insert(refset_id);
        }
        Ok(out)
    }

    /// Active component ids in `refset_id`. Per §7, an unknown refset id is
    /// not an error: this simply returns an empty set.
    pub fn members_of(&self, refset_id: SctId) -> StoreResult<HashSet<SctId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::REFSET_MEMBERS)?;
        let prefix = u64_key(refset_id);
        let mut out = HashSet::new();
        for entry in table.range(prefix.as_slice()..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(&prefix) {
                break;
            }
            let (_, component_id, _item_id) = decode_triple_key(&bytes);
            out.insert(component_id);
        }
        Ok(out)
    }

    /// The cached active-member count for `refset_id`, used by the ECL
    /// evaluator's cardinality estimator for `^R`.
    pub fn refset_count(&self, refset_id: SctId) -> StoreResult<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::REFSET_COUNTS)?;
        Ok(table.get(refset_id)?.map(|v| v.value()).unwrap_or(0))
    }

    /// Every active relationship edge whose source is `concept_id`, with
    /// full `(typeId, group, destinationId)` detail.
    ///
    /// Unlike [`Store::parents_of_type`] (which collapses to a destination
    /// set for a single type), this keeps the relationship group alongside
    /// each edge so a caller can evaluate grouped refinements: ECL's rule
    /// that every attribute in a `{ ... }` clause must match edges sharing
    /// one group id on the same source.
    pub fn parent_edges(&self, concept_id: SctId) -> StoreResult<Vec<(SctId, u32, SctId)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::CONCEPT_PARENT_RELATIONSHIPS)?;
        let prefix = u64_key(concept_id);
        let mut out = Vec::new();
        for entry in table.range(prefix.as_slice()..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(&prefix) {
                break;
            }
            let (_, type_id, group, destination_id, _rel_id) = keys::decode_edge_key(&bytes);
            out.push((type_id, group, destination_id));
        }
        Ok(out)
    }

    /// Every concept id with a retained record, active or not. Backs ECL's
    /// wildcard (`*`) primitive.
    pub fn all_concept_ids(&self) -> StoreResult<HashSet<SctId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::CONCEPTS)?;
        let mut out = HashSet::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            out.insert(key.value());
        }
        Ok(out)
    }

    /// Active language-refset memberships of `description_id`, as
    /// `(refsetId, acceptabilityId)` pairs.
    ///
    /// Used by callers assembling a search document (or resolving a
    /// preferred synonym) who need the acceptability value itself, not
    /// just refset membership ([`Store::refsets_for`] discards it).
    /// Memberships in a non-language refset are silently skipped.
    pub fn language_acceptability(&self, description_id: SctId) -> StoreResult<Vec<(SctId, SctId)>> {
        let txn = self.db.begin_read()?;
        let component_refsets = txn.open_table(tables::COMPONENT_REFSETS)?;
        let refset_items = txn.open_table(tables::REFSET_ITEMS)?;
        let prefix = u64_key(description_id);
        let mut out = Vec::new();
        for entry in component_refsets.range(prefix.as_slice()..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(&prefix) {
                break;
            }
            let (_, refset_id, item_id) = decode_triple_key(&bytes);
            if let Some(RefsetItem::Language(lang)) = read_json::<RefsetItem>(&refset_items, item_id)? {
                out.push((refset_id, lang.acceptability_id));
            }
        }
        Ok(out)
    }

    /// Every refset id with at least one active member.
    pub fn installed_refsets(&self) -> StoreResult<HashSet<SctId>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::INSTALLED_REFSETS)?;
        let mut out = HashSet::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            out.insert(key.value());
        }
        Ok(out)
    }

    /// The recorded extension column names for `refset_id`, if the index
    /// builder has seen a member of it.
    pub fn refset_field_names(&self, refset_id: SctId) -> StoreResult<Option<Vec<String>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::REFSET_FIELD_NAMES)?;
        read_json(&table, refset_id)
    }

    // ---- lifecycle ----

    /// Runs the index builder (§4.4): rebuilds relationship closure and
    /// refset membership indices from the primary tables. Safe to re-run;
    /// each run fully replaces the prior derived state.
    pub fn build_indices(&self) -> StoreResult<IndexBuildReport> {
        self.require_writable()?;
        let report = index::build(&self.db)?;
        self.dirty.store(false, Ordering::Relaxed);
        tracing::info!(?report, "index build complete");
        Ok(report)
    }

    /// Counts of each primary table and derived index, for `status`.
    pub fn status(&self) -> StoreResult<StoreStatus> {
        status::collect(&self.db, self.is_dirty())
    }

    /// Reclaims space by rewriting the on-disk container. Requires
    /// exclusive access to the store (no other thread may be mid-query)
    /// since `redb::Database::compact` itself requires `&mut self`.
    pub fn compact(&mut self) -> StoreResult<bool> {
        self.require_writable()?;
        let compacted = self.db.compact()?;
        tracing::info!(compacted, "store compaction complete");
        Ok(compacted)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: SctId,
) -> StoreResult<Option<T>> {
    match table.get(id)? {
        Some(guard) => {
            let value: T = serde_json::from_slice(guard.value())
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn write_json<T: serde::Serialize>(
    table: &mut redb::Table<u64, &'static [u8]>,
    id: SctId,
    value: &T,
) -> StoreResult<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    table.insert(id, bytes.as_slice())?;
    Ok(())
}
