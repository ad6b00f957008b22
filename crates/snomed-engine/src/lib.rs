//! # snomed-engine
//!
//! The Terminology Service Facade (§4.7): a single entry point composing
//! [`snomed_store::Store`] (the component store and its materialized
//! indices), [`snomed_search::SearchIndex`] (free-text search), and
//! [`snomed_ecl`] (Expression Constraint Language evaluation) behind one
//! API, plus the [`extended`] module's Extended-Concept Builder (§4.8).
//!
//! There is no process-wide global: a [`TerminologyEngine`] is constructed
//! explicitly from an on-disk path and passed around by the caller, the
//! same "explicit instance, not a global handle" shape the rest of this
//! engine's crates follow.

#![warn(missing_docs)]

pub mod extended;
mod error;
mod status;

pub use error::{EngineError, EngineResult};
pub use status::EngineStatus;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use snomed_search::{SearchDocument, SearchHit, SearchIndex, SearchOptions, SearchParams};
use snomed_store::{Store, StoreOptions};
use snomed_types::{DescriptionType, ExtendedConcept, Rf2Description, SctId};

/// The terminology service facade: one [`Store`] plus one [`SearchIndex`]
/// opened at the same root path, queried through a single unified API.
pub struct TerminologyEngine {
    store: Store,
    search: SearchIndex,
}

impl std::fmt::Debug for TerminologyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminologyEngine").field("store", &self.store).finish()
    }
}

impl TerminologyEngine {
    /// Opens the store and search index rooted at `path` (`path/store.db`
    /// and `path/search.db/` per the on-disk layout). A second concurrent
    /// `open` of the same path fails: both the store and the index take
    /// their own exclusive advisory lock.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> EngineResult<Self> {
        let path = path.as_ref();
        let store_options = if read_only {
            StoreOptions::read_only(path)
        } else {
            StoreOptions::new(path)
        };
        let store = Store::open(store_options)?;

        let search_path = search_index_path(path);
        let search_options = if read_only {
            SearchOptions::read_only(&search_path)
        } else {
            SearchOptions::new(&search_path)
        };
        let search = SearchIndex::open(search_options)?;

        tracing::info!(path = %path.display(), read_only, "terminology engine opened");
        Ok(Self { store, search })
    }

    /// Drops the engine, releasing its locks. Provided for symmetry with
    /// `open`; a plain `drop(engine)` has the same effect.
    pub fn close(self) {
        drop(self);
    }

    /// Looks up a concept by id.
    pub fn get_concept(&self, id: SctId) -> EngineResult<Option<snomed_types::Rf2Concept>> {
        Ok(self.store.get_concept(id)?)
    }

    /// Builds the [`ExtendedConcept`] projection for `id` (§4.8).
    pub fn get_extended_concept(&self, id: SctId) -> EngineResult<Option<ExtendedConcept>> {
        Ok(extended::build(&self.store, id)?)
    }

    /// Every active description attached to `concept_id`.
    pub fn get_descriptions(&self, concept_id: SctId) -> EngineResult<Vec<Rf2Description>> {
        Ok(self.store.descriptions_for_concept(concept_id)?)
    }

    /// The Fully Specified Name for `concept_id`, if one is active.
    pub fn get_fully_specified_name(&self, concept_id: SctId) -> EngineResult<Option<Rf2Description>> {
        Ok(self.get_descriptions(concept_id)?.into_iter().find(|d| d.is_fsn()))
    }

    /// The preferred synonym for `concept_id` in one of `language_refset_ids`
    /// (or, if empty, preferred in any language refset at all).
    pub fn get_preferred_synonym(
        &self,
        concept_id: SctId,
        language_refset_ids: &[SctId],
    ) -> EngineResult<Option<Rf2Description>> {
        for description in self.get_descriptions(concept_id)? {
            if description.type_id == DescriptionType::FSN_ID {
                continue;
            }
            let acceptability = self.store.language_acceptability(description.id)?;
            let is_preferred = acceptability.iter().any(|(refset_id, acceptability_id)| {
                *acceptability_id == snomed_types::well_known::PREFERRED
                    && (language_refset_ids.is_empty() || language_refset_ids.contains(refset_id))
            });
            if is_preferred {
                return Ok(Some(description));
            }
        }
        Ok(None)
    }

    /// `true` iff `child_id` is `parent_id` or one of its descendants.
    pub fn subsumes(&self, parent_id: SctId, child_id: SctId) -> EngineResult<bool> {
        Ok(self.store.subsumes(parent_id, child_id)?)
    }

    /// Free-text search over indexed descriptions (§4.5).
    pub fn search(&self, params: &SearchParams) -> EngineResult<Vec<SearchHit>> {
        Ok(self.search.search(params)?)
    }

    /// Evaluates an ECL expression against the store, returning the
    /// matching concept-id set (§4.6).
    pub fn expand_ecl(&self, expression: &str) -> EngineResult<HashSet<SctId>> {
        Ok(snomed_ecl::expand(&self.store, expression)?)
    }

    /// Free-text search restricted to the concepts matched by `expression`.
    ///
    /// Evaluates the (typically cheaper) ECL side first and folds its
    /// result into `params.concept_id_filter`, so the search index never
    /// has to score a hit outside the ECL-derived set.
    pub fn search_with_ecl(
        &self,
        text: &str,
        expression: &str,
        mut params: SearchParams,
    ) -> EngineResult<Vec<SearchHit>> {
        let ecl_concepts = self.expand_ecl(expression)?;
        params.text = text.to_string();
        params.concept_id_filter = Some(match params.concept_id_filter {
            Some(existing) => existing.intersection(&ecl_concepts).copied().collect(),
            None => ecl_concepts,
        });
        self.search(&params)
    }

    /// Rebuilds the store's derived indices (descendant/ancestor closure,
    /// refset membership) and the search index together, the engine-level
    /// counterpart of the external `index` command (§6).
    pub fn reindex(&self) -> EngineResult<usize> {
        self.store.build_indices()?;
        let documents = self.collect_search_documents()?;
        Ok(self.search.build(&documents)?)
    }

    /// Counts of each primary table and derived index.
    pub fn status(&self) -> EngineResult<EngineStatus> {
        Ok(EngineStatus {
            store: self.store.status()?,
            search_document_count: self.search.document_count()?,
        })
    }

    /// Reclaims on-disk space in both the store and the search index.
    pub fn compact(&mut self) -> EngineResult<bool> {
        let store_compacted = self.store.compact()?;
        self.search.compact()?;
        Ok(store_compacted)
    }

    fn collect_search_documents(&self) -> EngineResult<Vec<SearchDocument>> {
        let mut documents = Vec::new();
        for concept_id in self.store.all_concept_ids()? {
            let concept = match self.store.get_concept(concept_id)? {
                Some(concept) => concept,
                None => continue,
            };
            let refsets = self.store.refsets_for(concept_id)?;
            for description in self.store.descriptions_for_concept(concept_id)? {
                let acceptability = self.store.language_acceptability(description.id)?;
                documents.push(SearchDocument {
                    concept_id,
                    description_id: description.id,
                    term: description.term,
                    type_id: description.type_id,
                    acceptability,
                    concept_active: concept.active,
                    refsets: refsets.clone(),
                });
            }
        }
        Ok(documents)
    }
}

fn search_index_path(root: &Path) -> PathBuf {
    root.join("search.db")
}
