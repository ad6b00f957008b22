//! # snomed-types
//!
//! Type definitions for SNOMED CT clinical terminology.
//!
//! This crate provides Rust type definitions for working with SNOMED CT
//! Release Format 2 (RF2) data structures, including concepts, descriptions,
//! and relationships.
//!
//! ## Features
//!
//! - `serde` (default): Enables serialization/deserialization support via serde.
//!   Disable this feature for zero-dependency usage.
//!
//! ## Usage
//!
//! ```rust
//! use snomed_types::{Rf2Concept, Rf2Description, Rf2Relationship, SctId};
//! use snomed_types::{DefinitionStatus, DescriptionType, CharacteristicType};
//! use snomed_types::well_known;
//!
//! // Create a concept
//! let concept = Rf2Concept {
//!     id: 73211009,
//!     effective_time: 20020131,
//!     active: true,
//!     module_id: well_known::SNOMED_CT_CORE_MODULE,
//!     definition_status_id: DefinitionStatus::PRIMITIVE_ID,
//! };
//!
//! assert!(concept.is_primitive());
//!
//! // Use well-known constants
//! let is_a_type: SctId = well_known::IS_A;
//! let clinical_finding: SctId = well_known::CLINICAL_FINDING;
//! ```
//!
//! ## Without Serde
//!
//! To use this crate without serde (zero dependencies):
//!
//! ```toml
//! [dependencies]
//! snomed-types = { version = "0.1", default-features = false }
//! ```

#![warn(missing_docs)]

mod concept;
mod description;
mod enums;
mod extended;
mod owl_expression;
pub mod refset;
mod relationship;
mod sctid;
pub mod well_known;

// Re-export all public types at crate root
pub use concept::Rf2Concept;
pub use description::Rf2Description;
pub use enums::{
    CaseSignificance, CharacteristicType, DefinitionStatus, DescriptionType, ModifierType,
};
pub use extended::ExtendedConcept;
pub use owl_expression::Rf2OwlExpression;
pub use refset::{
    Rf2AssociationRefsetMember, Rf2GenericRefsetItem, Rf2LanguageRefsetMember,
    Rf2SimpleRefsetMember, RefsetItemKind,
};
pub use relationship::Rf2Relationship;
pub use sctid::SctId;
