//! # snomed-ecl
//!
//! Parser and evaluator for a practical subset of SNOMED CT's Expression
//! Constraint Language (§4.6): a PEG grammar over focus concepts,
//! descendant/ancestor/child/parent operators, reference-set membership,
//! attribute refinements, and set algebra (`AND`/`OR`/`MINUS`).
//!
//! Evaluation is expressed against the [`EclQueryable`] trait rather than
//! `snomed-store::Store` directly, keeping the dependency direction the
//! design calls for: ECL depends on a store *interface*, never the other
//! way around, and never on the facade that composes both (§9).
//!
//! ## Usage
//!
//! ```no_run
//! use snomed_ecl::{evaluate, parse};
//! use snomed_store::{Store, StoreOptions};
//!
//! let store = Store::open(StoreOptions::read_only("snomed.db"))?;
//! let expr = parse("<<404684003 MINUS ^447562003")?;
//! let concept_ids = evaluate(&expr, &store)?;
//! # Ok::<(), snomed_ecl::EclError>(())
//! ```

#![warn(missing_docs)]

mod ast;
mod error;
mod evaluator;
mod parser;

pub use ast::{Attribute, Expr, RefinementClause};
pub use error::{EclError, EclResult};
pub use evaluator::{contains, evaluate, EclQueryable, ParentEdge};
pub use parser::parse;

use snomed_types::SctId;

/// Parses and evaluates `expression` in one step.
pub fn expand<S: EclQueryable + ?Sized>(store: &S, expression: &str) -> EclResult<std::collections::HashSet<SctId>> {
    evaluate(&parse(expression)?, store)
}

/// `true` iff `concept_id` satisfies `expression` against `store`.
pub fn matches<S: EclQueryable + ?Sized>(
    store: &S,
    concept_id: SctId,
    expression: &str,
) -> EclResult<bool> {
    contains(&parse(expression)?, store, concept_id)
}
