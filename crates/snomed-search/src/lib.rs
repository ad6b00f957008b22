//! # snomed-search
//!
//! An on-disk inverted text index over SNOMED CT descriptions (§4.5),
//! built from [`SearchDocument`]s assembled by a caller (typically
//! `snomed-engine`, which reads active descriptions from `snomed-store`
//! at `index` time) and queried with [`SearchParams`].
//!
//! [`SearchIndex`] is opened once per on-disk path, mirroring
//! `snomed-store::Store`'s single-opener contract.
//!
//! ## Usage
//!
//! ```no_run
//! use snomed_search::{SearchIndex, SearchOptions, SearchParams};
//!
//! let index = SearchIndex::open(SearchOptions::new("search.db"))?;
//! index.build(&[])?;
//! let hits = index.search(&SearchParams::new("infec"))?;
//! # Ok::<(), snomed_search::IndexError>(())
//! ```

#![warn(missing_docs)]

mod document;
mod error;
mod keys;
mod options;
mod tables;
mod tokenize;

pub use document::{SearchDocument, SearchHit, SearchParams};
pub use error::{IndexError, IndexResult};
pub use options::SearchOptions;

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;

use fs2::FileExt;
use redb::{Database, ReadableTable};
use snomed_types::{DescriptionType, SctId};

/// Ranking weight for a description whose folded term exactly equals the
/// folded query text.
const SCORE_EXACT: f64 = 1000.0;
/// Ranking weight for a preferred synonym match.
const SCORE_PREFERRED_SYNONYM: f64 = 800.0;
/// Ranking weight for an acceptable (non-preferred) synonym match.
const SCORE_ACCEPTABLE_SYNONYM: f64 = 600.0;
/// Ranking weight for any other synonym match (no acceptability in scope).
const SCORE_PLAIN_SYNONYM: f64 = 400.0;
/// Ranking weight for an FSN match, the lowest-priority hit kind.
const SCORE_FSN: f64 = 200.0;
/// Per-character length penalty: shorter terms rank slightly higher among
/// ties in the same match-kind tier.
const LENGTH_PENALTY: f64 = 0.01;

/// The on-disk inverted search index.
pub struct SearchIndex {
    db: Database,
    options: SearchOptions,
    _lock: File,
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("path", &self.options.path)
            .field("read_only", &self.options.read_only)
            .finish()
    }
}

impl SearchIndex {
    /// Opens (creating if absent, unless `options.read_only`) the index
    /// rooted at `options.path`.
    pub fn open(options: SearchOptions) -> IndexResult<Self> {
        if !options.read_only {
            fs::create_dir_all(&options.path)?;
        }

        let lock_path = options.path.join("search.db.lock");
        let lock_file = File::options()
            .create(!options.read_only)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| IndexError::Locked {
                path: options.path.display().to_string(),
            })?;

        let db_path = options.path.join("search.db");
        let db = if options.read_only {
            Database::open(&db_path)?
        } else {
            Database::create(&db_path)?
        };

        let index = SearchIndex {
            db,
            options,
            _lock: lock_file,
        };

        if !index.options.read_only {
            let txn = index.db.begin_write()?;
            {
                txn.open_table(tables::DOCUMENTS)?;
                txn.open_table(tables::TOKEN_POSTINGS)?;
                txn.open_table(tables::CONCEPT_DOCUMENTS)?;
            }
            txn.commit()?;
        }

        tracing::info!(path = %index.options.path.display(), "search index opened");
        Ok(index)
    }

    /// The directory this index is rooted at.
    pub fn path(&self) -> &Path {
        &self.options.path
    }

    fn require_writable(&self) -> IndexResult<()> {
        if self.options.read_only {
            return Err(IndexError::ReadOnly {
                path: self.options.path.display().to_string(),
            });
        }
        Ok(())
    }

    /// Rebuilds the index from scratch over `documents`.
    ///
    /// Like `snomed-store`'s index builder, this is a full rebuild rather
    /// than an incremental update: every prior document and posting is
    /// dropped first, so a crashed build is recoverable by simply
    /// re-running it over the same documents.
    pub fn build(&self, documents: &[SearchDocument]) -> IndexResult<usize> {
        self.require_writable()?;
        let txn = self.db.begin_write()?;
        {
            for def in [tables::DOCUMENTS, tables::TOKEN_POSTINGS, tables::CONCEPT_DOCUMENTS] {
                txn.delete_table(def)?;
                txn.open_table(def)?;
            }

            let mut docs = txn.open_table(tables::DOCUMENTS)?;
            let mut postings = txn.open_table(tables::TOKEN_POSTINGS)?;
            let mut concept_docs = txn.open_table(tables::CONCEPT_DOCUMENTS)?;

            for doc in documents {
                let bytes =
                    serde_json::to_vec(doc).map_err(|e| IndexError::Corrupt(e.to_string()))?;
                docs.insert(doc.description_id, bytes.as_slice())?;

                for token in tokenize::tokenize(&doc.term) {
                    let key = keys::posting_key(&token, doc.description_id);
                    postings.insert(key.as_slice(), ())?;
                }

                let key = keys::concept_document_key(doc.concept_id, doc.description_id);
                concept_docs.insert(key.as_slice(), ())?;
            }
        }
        txn.commit()?;
        tracing::info!(documents = documents.len(), "search index build complete");
        Ok(documents.len())
    }

    /// Runs `params` against the index, returning ranked hits truncated to
    /// `params.max_hits` (§4.5).
    pub fn search(&self, params: &SearchParams) -> IndexResult<Vec<SearchHit>> {
        let query_tokens = tokenize::tokenize(&params.text);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read()?;
        let postings = txn.open_table(tables::TOKEN_POSTINGS)?;
        let docs = txn.open_table(tables::DOCUMENTS)?;
        let concept_docs = txn.open_table(tables::CONCEPT_DOCUMENTS)?;

        let candidates = self.candidate_description_ids(&postings, &query_tokens)?;

        let folded_query = query_tokens.join(" ");
        let mut hits: Vec<(f64, SearchHit)> = Vec::new();

        for description_id in candidates {
            let doc = match read_document(&docs, description_id)? {
                Some(doc) => doc,
                None => continue,
            };

            if !self.passes_filters(&doc, params) {
                continue;
            }

            let score = self.score(&doc, &folded_query, params);
            let preferred_term =
                self.preferred_term_for(&concept_docs, &docs, doc.concept_id, params)?;

            hits.push((
                score,
                SearchHit {
                    concept_id: doc.concept_id,
                    description_id: doc.description_id,
                    term: doc.term,
                    preferred_term,
                },
            ));
        }

        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.concept_id.cmp(&b.1.concept_id))
                .then_with(|| a.1.description_id.cmp(&b.1.description_id))
        });
        hits.truncate(params.max_hits);

        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    /// Description ids matching every query token: exact-token match for
    /// all but the last token, prefix (type-ahead) match for the last one.
    fn candidate_description_ids(
        &self,
        postings: &impl ReadableTable<&'static [u8], ()>,
        query_tokens: &[String],
    ) -> IndexResult<HashSet<SctId>> {
        let mut result: Option<HashSet<SctId>> = None;

        for (i, token) in query_tokens.iter().enumerate() {
            let is_last = i + 1 == query_tokens.len();
            let matched = if is_last {
                self.scan_postings(postings, &keys::token_stem_prefix(token))?
            } else {
                self.scan_postings(postings, &keys::token_prefix(token))?
            };

            result = Some(match result {
                None => matched,
                Some(acc) => acc.intersection(&matched).copied().collect(),
            });

            if result.as_ref().is_some_and(|s| s.is_empty()) {
                break;
            }
        }

        Ok(result.unwrap_or_default())
    }

    fn scan_postings(
        &self,
        postings: &impl ReadableTable<&'static [u8], ()>,
        prefix: &[u8],
    ) -> IndexResult<HashSet<SctId>> {
        let mut out = HashSet::new();
        for entry in postings.range(prefix..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(prefix) {
                break;
            }
            out.insert(keys::decode_posting_key(&bytes));
        }
        Ok(out)
    }

    fn passes_filters(&self, doc: &SearchDocument, params: &SearchParams) -> bool {
        if params.active_only && !doc.concept_active {
            return false;
        }
        if !params.include_fsn && doc.type_id == DescriptionType::FSN_ID {
            return false;
        }
        if let Some(concepts) = &params.concept_id_filter {
            if !concepts.contains(&doc.concept_id) {
                return false;
            }
        }
        if let Some(refsets) = &params.refset_filter {
            if doc.refsets.is_disjoint(refsets) {
                return false;
            }
        }
        if let Some(types) = &params.type_filter {
            if !types.contains(&doc.type_id) {
                return false;
            }
        }
        true
    }

    /// Ranking (§4.5): exact term match > preferred synonym > acceptable
    /// synonym > FSN, each tier further ordered by a small length penalty.
    fn score(&self, doc: &SearchDocument, folded_query: &str, params: &SearchParams) -> f64 {
        let folded_term = tokenize::tokenize(&doc.term).join(" ");
        let base = if folded_term == folded_query {
            SCORE_EXACT
        } else if doc.type_id == DescriptionType::FSN_ID {
            SCORE_FSN
        } else if self.is_preferred(doc, &params.preferred_in) {
            SCORE_PREFERRED_SYNONYM
        } else if self.is_acceptable(doc, &params.acceptable_in) {
            SCORE_ACCEPTABLE_SYNONYM
        } else {
            SCORE_PLAIN_SYNONYM
        };
        base - (doc.term.len() as f64 * LENGTH_PENALTY)
    }

    fn is_preferred(&self, doc: &SearchDocument, preferred_in: &HashSet<SctId>) -> bool {
        if preferred_in.is_empty() {
            return doc
                .acceptability
                .iter()
                .any(|(_, a)| *a == snomed_types::well_known::PREFERRED);
        }
        preferred_in
            .iter()
            .any(|refset| doc.acceptability_in(*refset) == Some(snomed_types::well_known::PREFERRED))
    }

    fn is_acceptable(&self, doc: &SearchDocument, acceptable_in: &HashSet<SctId>) -> bool {
        if acceptable_in.is_empty() {
            return doc
                .acceptability
                .iter()
                .any(|(_, a)| *a == snomed_types::well_known::ACCEPTABLE);
        }
        acceptable_in
            .iter()
            .any(|refset| doc.acceptability_in(*refset) == Some(snomed_types::well_known::ACCEPTABLE))
    }

    /// Resolves `concept_id`'s preferred synonym, favouring a term preferred
    /// in one of `params.preferred_in` (falling back to any preferred
    /// synonym) so a hit result can carry `preferred_term` alongside the
    /// literal matched term.
    fn preferred_term_for(
        &self,
        concept_docs: &impl ReadableTable<&'static [u8], ()>,
        docs: &impl ReadableTable<u64, &'static [u8]>,
        concept_id: SctId,
        params: &SearchParams,
    ) -> IndexResult<Option<String>> {
        let prefix = keys::concept_document_key(concept_id, 0);
        let prefix = &prefix[..8];
        let mut fallback: Option<String> = None;

        for entry in concept_docs.range(prefix..)? {
            let (key, _) = entry?;
            let bytes = key.value().to_vec();
            if !bytes.starts_with(prefix) {
                break;
            }
            let (_, description_id) = keys::decode_concept_document_key(&bytes);
            let doc = match read_document(docs, description_id)? {
                Some(doc) => doc,
                None => continue,
            };
            if doc.type_id == DescriptionType::FSN_ID {
                continue;
            }
            if self.is_preferred(&doc, &params.preferred_in) {
                return Ok(Some(doc.term));
            }
            if fallback.is_none() {
                fallback = Some(doc.term);
            }
        }
        Ok(fallback)
    }

    /// Counts of indexed documents and postings, mirroring `Store::status`.
    pub fn document_count(&self) -> IndexResult<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(tables::DOCUMENTS)?;
        Ok(table.len()?)
    }

    /// Reclaims space by rewriting the on-disk container.
    pub fn compact(&mut self) -> IndexResult<bool> {
        self.require_writable()?;
        let compacted = self.db.compact()?;
        tracing::info!(compacted, "search index compaction complete");
        Ok(compacted)
    }
}

fn read_document(
    table: &impl ReadableTable<u64, &'static [u8]>,
    description_id: SctId,
) -> IndexResult<Option<SearchDocument>> {
    match table.get(description_id)? {
        Some(guard) => {
            let doc: SearchDocument = serde_json::from_slice(guard.value())
                .map_err(|e| IndexError::Corrupt(e.to_string()))?;
            Ok(Some(doc))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snomed_types::well_known;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn doc(
        concept_id: SctId,
        description_id: SctId,
        term: &str,
        type_id: SctId,
        acceptability: Vec<(SctId, SctId)>,
    ) -> SearchDocument {
        SearchDocument {
            concept_id,
            description_id,
            term: term.to_string(),
            type_id,
            acceptability,
            concept_active: true,
            refsets: HashSet::new(),
        }
    }

    #[test]
    fn test_search_ranks_exact_before_preferred_before_fsn() {
        let dir = tempdir().unwrap();
        let index = SearchIndex::open(SearchOptions::new(dir.path())).unwrap();

        index
            .build(&[
                doc(300, 1, "Infection", DescriptionType::FSN_ID, vec![]),
                doc(
                    300,
                    2,
                    "Infectious disease",
                    DescriptionType::SYNONYM_ID,
                    vec![(well_known::US_ENGLISH_LANGUAGE_REFSET, well_known::PREFERRED)],
                ),
                doc(300, 3, "infection", DescriptionType::SYNONYM_ID, vec![]),
            ])
            .unwrap();

        let hits = index.search(&SearchParams::new("infection")).unwrap();
        assert_eq!(hits[0].description_id, 3, "exact term should rank first");
    }

    #[test]
    fn test_search_filters_by_concept_id() {
        let dir = tempdir().unwrap();
        let index = SearchIndex::open(SearchOptions::new(dir.path())).unwrap();

        index
            .build(&[
                doc(200, 1, "infection of skin", DescriptionType::SYNONYM_ID, vec![]),
                doc(300, 2, "infection of lung", DescriptionType::SYNONYM_ID, vec![]),
            ])
            .unwrap();

        let mut params = SearchParams::new("infec");
        params.concept_id_filter = Some(HashSet::from([300]));
        let hits = index.search(&params).unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].concept_id, 300);
    }

    #[test]
    fn test_search_excludes_inactive_concepts_by_default() {
        let dir = tempdir().unwrap();
        let index = SearchIndex::open(SearchOptions::new(dir.path())).unwrap();

        let mut inactive = doc(400, 1, "retired term", DescriptionType::SYNONYM_ID, vec![]);
        inactive.concept_active = false;
        index.build(&[inactive]).unwrap();

        let hits = index.search(&SearchParams::new("retired")).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_type_ahead_prefix_matches_last_token() {
        let dir = tempdir().unwrap();
        let index = SearchIndex::open(SearchOptions::new(dir.path())).unwrap();

        index
            .build(&[doc(300, 1, "infectious disease", DescriptionType::SYNONYM_ID, vec![])])
            .unwrap();

        let hits = index.search(&SearchParams::new("infec")).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_excludes_fsn_when_requested() {
        let dir = tempdir().unwrap();
        let index = SearchIndex::open(SearchOptions::new(dir.path())).unwrap();

        index
            .build(&[doc(300, 1, "Infection (disorder)", DescriptionType::FSN_ID, vec![])])
            .unwrap();

        let mut params = SearchParams::new("infection");
        params.include_fsn = false;
        let hits = index.search(&params).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_empty_query_returns_no_hits() {
        let dir = tempdir().unwrap();
        let index = SearchIndex::open(SearchOptions::new(dir.path())).unwrap();
        let hits = index.search(&SearchParams::new("   ")).unwrap();
        assert!(hits.is_empty());
    }
}
