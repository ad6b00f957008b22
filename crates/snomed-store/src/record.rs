//! The component record types held by the store, and the effective-time
//! reconciliation rule applied on every write.

use serde::{Deserialize, Serialize};
use snomed_types::{
    Rf2AssociationRefsetMember, Rf2GenericRefsetItem, Rf2LanguageRefsetMember, Rf2OwlExpression,
    Rf2SimpleRefsetMember, RefsetItemKind, SctId,
};

/// A polymorphic refset item, discriminated by the schema its `refsetId`
/// was recognised as at parse time.
///
/// This is the store's tagged-variant model of `RefsetItem` from the data
/// model: a base record (id/effectiveTime/active/moduleId/refsetId/
/// referencedComponentId) shared by every variant, plus a schema-specific
/// payload. Unknown schemas fall back to [`Rf2GenericRefsetItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefsetItem {
    /// Plain membership, no extra columns.
    Simple(Rf2SimpleRefsetMember),
    /// Carries `acceptabilityId`.
    Language(Rf2LanguageRefsetMember),
    /// Carries `targetComponentId`.
    Association(Rf2AssociationRefsetMember),
    /// Carries a single OWL axiom string.
    OwlExpression(Rf2OwlExpression),
    /// Unrecognised schema; trailing columns kept verbatim.
    Generic(Rf2GenericRefsetItem),
}

impl RefsetItem {
    /// The kind discriminator for this item, recorded per-refset in
    /// `refsetFieldNames` so later reads can reconstitute typed payloads.
    pub fn kind(&self) -> RefsetItemKind {
        match self {
            RefsetItem::Simple(_) => RefsetItemKind::Simple,
            RefsetItem::Language(_) => RefsetItemKind::Language,
            RefsetItem::Association(_) => RefsetItemKind::Association,
            RefsetItem::OwlExpression(_) => RefsetItemKind::OwlExpression,
            RefsetItem::Generic(_) => RefsetItemKind::Generic,
        }
    }

    /// The item's own identifier.
    pub fn id(&self) -> SctId {
        match self {
            RefsetItem::Simple(m) => m.id,
            RefsetItem::Language(m) => m.id,
            RefsetItem::Association(m) => m.id,
            RefsetItem::OwlExpression(m) => m.id,
            RefsetItem::Generic(m) => m.id,
        }
    }

    /// Effective time (YYYYMMDD) of the retained row.
    pub fn effective_time(&self) -> u32 {
        match self {
            RefsetItem::Simple(m) => m.effective_time,
            RefsetItem::Language(m) => m.effective_time,
            RefsetItem::Association(m) => m.effective_time,
            RefsetItem::OwlExpression(m) => m.effective_time,
            RefsetItem::Generic(m) => m.effective_time,
        }
    }

    /// Whether the membership is active.
    pub fn active(&self) -> bool {
        match self {
            RefsetItem::Simple(m) => m.active,
            RefsetItem::Language(m) => m.active,
            RefsetItem::Association(m) => m.active,
            RefsetItem::OwlExpression(m) => m.active,
            RefsetItem::Generic(m) => m.active,
        }
    }

    /// The reference set this item belongs to.
    pub fn refset_id(&self) -> SctId {
        match self {
            RefsetItem::Simple(m) => m.refset_id,
            RefsetItem::Language(m) => m.refset_id,
            RefsetItem::Association(m) => m.refset_id,
            RefsetItem::OwlExpression(m) => m.refset_id,
            RefsetItem::Generic(m) => m.refset_id,
        }
    }

    /// The component this item applies to.
    pub fn referenced_component_id(&self) -> SctId {
        match self {
            RefsetItem::Simple(m) => m.referenced_component_id,
            RefsetItem::Language(m) => m.referenced_component_id,
            RefsetItem::Association(m) => m.referenced_component_id,
            RefsetItem::OwlExpression(m) => m.referenced_component_id,
            RefsetItem::Generic(m) => m.referenced_component_id,
        }
    }
}

/// Trait implemented by every primary component record, giving the store's
/// reconciliation logic a uniform way to compare two candidate rows for the
/// same id.
pub trait EffectiveTimeRecord {
    /// The component's own identifier.
    fn record_id(&self) -> SctId;
    /// Effective time (YYYYMMDD) this row became authoritative.
    fn effective_time(&self) -> u32;
    /// Whether this row marks the component active.
    fn is_active(&self) -> bool;
}

impl EffectiveTimeRecord for snomed_types::Rf2Concept {
    fn record_id(&self) -> SctId {
        self.id
    }
    fn effective_time(&self) -> u32 {
        self.effective_time
    }
    fn is_active(&self) -> bool {
        self.active
    }
}

impl EffectiveTimeRecord for snomed_types::Rf2Description {
    fn record_id(&self) -> SctId {
        self.id
    }
    fn effective_time(&self) -> u32 {
        self.effective_time
    }
    fn is_active(&self) -> bool {
        self.active
    }
}

impl EffectiveTimeRecord for snomed_types::Rf2Relationship {
    fn record_id(&self) -> SctId {
        self.id
    }
    fn effective_time(&self) -> u32 {
        self.effective_time
    }
    fn is_active(&self) -> bool {
        self.active
    }
}

impl EffectiveTimeRecord for RefsetItem {
    fn record_id(&self) -> SctId {
        self.id()
    }
    fn effective_time(&self) -> u32 {
        self.effective_time()
    }
    fn is_active(&self) -> bool {
        self.active()
    }
}

/// Returns true if `candidate` should replace `existing` per the store's
/// reconciliation rule: greatest `effectiveTime` wins; on a tie, the row
/// with `active = true` wins; any further tie keeps whichever is already
/// stored (the earlier-submitted row, since batches commit in submission
/// order).
pub fn should_replace<T: EffectiveTimeRecord>(existing: Option<&T>, candidate: &T) -> bool {
    match existing {
        None => true,
        Some(old) => match candidate.effective_time().cmp(&old.effective_time()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => candidate.is_active() && !old.is_active(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snomed_types::Rf2Concept;

    fn concept(effective_time: u32, active: bool) -> Rf2Concept {
        Rf2Concept {
            id: 100,
            effective_time,
            active,
            module_id: 900000000000207008,
            definition_status_id: 900000000000074008,
        }
    }

    #[test]
    fn test_newer_effective_time_wins() {
        let old = concept(20200101, true);
        let new = concept(20210101, false);
        assert!(should_replace(Some(&old), &new));
    }

    #[test]
    fn test_older_effective_time_loses() {
        let old = concept(20210101, true);
        let new = concept(20200101, true);
        assert!(!should_replace(Some(&old), &new));
    }

    #[test]
    fn test_tie_prefers_active() {
        let old = concept(20200101, false);
        let new = concept(20200101, true);
        assert!(should_replace(Some(&old), &new));

        let old2 = concept(20200101, true);
        let new2 = concept(20200101, false);
        assert!(!should_replace(Some(&old2), &new2));
    }

    #[test]
    fn test_further_tie_keeps_first_seen() {
        let old = concept(20200101, true);
        let new = concept(20200101, true);
        assert!(!should_replace(Some(&old), &new));
    }

    #[test]
    fn test_no_existing_record_always_inserts() {
        let new = concept(20200101, false);
        assert!(should_replace(None, &new));
    }
}
