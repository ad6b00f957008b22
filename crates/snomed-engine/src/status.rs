//! `status` support: combines the store's and search index's own counts.

use serde::Serialize;
use snomed_store::StoreStatus;

/// Combined row counts across the component store and the search index,
/// surfaced by [`crate::TerminologyEngine::status`].
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// The component store's own status snapshot.
    pub store: StoreStatus,
    /// Number of documents in the search index.
    pub search_document_count: u64,
}
