//! `redb` table definitions backing the search index.

use redb::TableDefinition;

/// `descriptionId -> SearchDocument` (serde_json bytes). The source of
/// truth for every field a hit needs beyond the token match itself.
pub const DOCUMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("documents");

/// `(token bytes, 0x00, descriptionId) -> ()`. Prefix-scannable both for an
/// exact token (scan `token_prefix`) and for type-ahead (scan
/// `token_stem_prefix`, which also matches longer tokens sharing the stem).
pub const TOKEN_POSTINGS: TableDefinition<&[u8], ()> = TableDefinition::new("token_postings");

/// `(conceptId, descriptionId) -> ()`. Supports resolving a concept's
/// preferred term without a second document scan.
pub const CONCEPT_DOCUMENTS: TableDefinition<&[u8], ()> = TableDefinition::new("concept_documents");
