//! Extended concept projection.
//!
//! An `ExtendedConcept` materialises a concept together with its transitive
//! ancestry and reference-set memberships into one read-only snapshot, for
//! clients (UI renderers, downstream services) that need everything about a
//! concept in a single round trip instead of issuing several store queries.

use std::collections::{HashMap, HashSet};

use crate::{Rf2Concept, Rf2Description, SctId};

/// A concept plus its transitive parent relationships and refset membership.
///
/// `parent_relationships` is keyed by relationship `typeId` and holds every
/// destination reachable from the concept or any of its ancestors-or-self
/// via an active relationship of that type. `direct_parent_relationships`
/// restricts the same map to relationships whose source is the concept
/// itself (no ancestor walk).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtendedConcept {
    /// The concept itself.
    pub concept: Rf2Concept,
    /// All active descriptions for the concept.
    pub descriptions: Vec<Rf2Description>,
    /// Relationship type -> destinations, collected over the concept and
    /// every ancestor-or-self.
    pub parent_relationships: HashMap<SctId, HashSet<SctId>>,
    /// Relationship type -> destinations, restricted to the concept's own
    /// direct (non-ancestor) relationships.
    pub direct_parent_relationships: HashMap<SctId, HashSet<SctId>>,
    /// Refset ids the concept is an active member of.
    pub refsets: HashSet<SctId>,
}

impl ExtendedConcept {
    /// Returns the Fully Specified Name, if present among `descriptions`.
    pub fn fsn(&self) -> Option<&Rf2Description> {
        self.descriptions.iter().find(|d| d.is_fsn())
    }

    /// Returns true if the concept is an active member of `refset_id`.
    pub fn has_refset(&self, refset_id: SctId) -> bool {
        self.refsets.contains(&refset_id)
    }

    /// Returns the destination ids for a direct relationship of `type_id`.
    pub fn direct_values_for(&self, type_id: SctId) -> Option<&HashSet<SctId>> {
        self.direct_parent_relationships.get(&type_id)
    }

    /// Returns the destination ids for a relationship of `type_id`, taking
    /// the transitive ancestry into account.
    pub fn values_for(&self, type_id: SctId) -> Option<&HashSet<SctId>> {
        self.parent_relationships.get(&type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefinitionStatus;

    fn make_concept(id: SctId) -> Rf2Concept {
        Rf2Concept {
            id,
            effective_time: 20020131,
            active: true,
            module_id: 900000000000207008,
            definition_status_id: DefinitionStatus::PRIMITIVE_ID,
        }
    }

    #[test]
    fn test_has_refset() {
        let mut refsets = HashSet::new();
        refsets.insert(723264001);

        let extended = ExtendedConcept {
            concept: make_concept(404684003),
            descriptions: vec![],
            parent_relationships: HashMap::new(),
            direct_parent_relationships: HashMap::new(),
            refsets,
        };

        assert!(extended.has_refset(723264001));
        assert!(!extended.has_refset(1));
    }

    #[test]
    fn test_values_for_type() {
        let mut parents = HashMap::new();
        parents.insert(116680003, HashSet::from([138875005]));

        let extended = ExtendedConcept {
            concept: make_concept(404684003),
            descriptions: vec![],
            parent_relationships: parents,
            direct_parent_relationships: HashMap::new(),
            refsets: HashSet::new(),
        };

        assert_eq!(
            extended.values_for(116680003),
            Some(&HashSet::from([138875005]))
        );
        assert!(extended.values_for(363698007).is_none());
    }
}
