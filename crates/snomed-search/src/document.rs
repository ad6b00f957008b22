//! The document shape the search index is built from, and the
//! query/result types it serves (§4.5).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use snomed_types::SctId;

/// One indexable description, as handed to [`crate::SearchIndex::build`] by
/// a caller (typically `snomed-engine`, which assembles these from
/// `snomed-store::Store` at `index` time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    /// The concept this description is attached to.
    pub concept_id: SctId,
    /// The description's own id.
    pub description_id: SctId,
    /// The description's original (untokenized) term text.
    pub term: String,
    /// The description type (FSN, Synonym, ...).
    pub type_id: SctId,
    /// `languageRefsetId -> acceptabilityId` for every language refset this
    /// description has active membership in.
    pub acceptability: Vec<(SctId, SctId)>,
    /// Whether the owning concept is active.
    pub concept_active: bool,
    /// Refset ids the owning concept has active membership in.
    pub refsets: HashSet<SctId>,
}

impl SearchDocument {
    /// The acceptability id this description carries in `refset_id`, if any.
    pub fn acceptability_in(&self, refset_id: SctId) -> Option<SctId> {
        self.acceptability
            .iter()
            .find(|(r, _)| *r == refset_id)
            .map(|(_, a)| *a)
    }
}

/// Search query parameters (§4.5).
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// The free-text query.
    pub text: String,
    /// Maximum number of hits to return.
    pub max_hits: usize,
    /// Fuzziness level; `0` (exact/prefix only) is the only level
    /// implemented today, levels `1`/`2` are accepted but treated as `0`.
    pub fuzziness: u8,
    /// Language refsets in which a synonym must be acceptable to count as
    /// "acceptable-synonym" for ranking purposes. Empty means any refset.
    pub acceptable_in: HashSet<SctId>,
    /// Language refsets in which a synonym must be preferred to count as
    /// "preferred-synonym" for ranking purposes. Empty means any refset.
    pub preferred_in: HashSet<SctId>,
    /// Restrict hits to these concepts, if set.
    pub concept_id_filter: Option<HashSet<SctId>>,
    /// Restrict hits to concepts with membership in one of these refsets,
    /// if set.
    pub refset_filter: Option<HashSet<SctId>>,
    /// Restrict hits to these description type ids, if set.
    pub type_filter: Option<HashSet<SctId>>,
    /// Exclude descriptions whose owning concept is inactive.
    pub active_only: bool,
    /// Whether FSN-typed descriptions are eligible hits.
    pub include_fsn: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            text: String::new(),
            max_hits: 50,
            fuzziness: 0,
            acceptable_in: HashSet::new(),
            preferred_in: HashSet::new(),
            concept_id_filter: None,
            refset_filter: None,
            type_filter: None,
            active_only: true,
            include_fsn: true,
        }
    }
}

impl SearchParams {
    /// A query for `text` with every other parameter defaulted.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// The concept the matched description belongs to.
    pub concept_id: SctId,
    /// The matched description's id.
    pub description_id: SctId,
    /// The matched description's term.
    pub term: String,
    /// The concept's preferred term, if one could be resolved.
    pub preferred_term: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_default_is_active_only_with_fsn() {
        let params = SearchParams::default();
        assert!(params.active_only);
        assert!(params.include_fsn);
        assert_eq!(params.max_hits, 50);
    }

    #[test]
    fn test_acceptability_in_looks_up_by_refset() {
        let doc = SearchDocument {
            concept_id: 100,
            description_id: 1,
            term: "Clinical finding".into(),
            type_id: 900000000000003001,
            acceptability: vec![(900000000000509007, 900000000000548007)],
            concept_active: true,
            refsets: HashSet::new(),
        };
        assert_eq!(
            doc.acceptability_in(900000000000509007),
            Some(900000000000548007)
        );
        assert_eq!(doc.acceptability_in(999), None);
    }
}
