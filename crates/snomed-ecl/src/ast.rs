//! The ECL abstract syntax tree (§4.6).

use snomed_types::SctId;

/// A parsed ECL expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `*` — every concept.
    Wildcard,
    /// A bare concept id — just that concept (ECL's "self" reference).
    Focus(SctId),
    /// `^refsetId` — active members of a reference set.
    RefsetMember(SctId),
    /// `<X` — strict descendants of every concept in `X`.
    Descendants(Box<Expr>),
    /// `<<X` — `X` plus its descendants.
    DescendantsOrSelf(Box<Expr>),
    /// `>X` — strict ancestors of every concept in `X`.
    Ancestors(Box<Expr>),
    /// `>>X` — `X` plus its ancestors.
    AncestorsOrSelf(Box<Expr>),
    /// `<!X` — direct children (IS_A sources) of every concept in `X`.
    Children(Box<Expr>),
    /// `>!X` — direct parents (IS_A destinations) of every concept in `X`.
    Parents(Box<Expr>),
    /// `A AND B`.
    And(Box<Expr>, Box<Expr>),
    /// `A OR B`.
    Or(Box<Expr>, Box<Expr>),
    /// `A MINUS B`.
    Minus(Box<Expr>, Box<Expr>),
    /// `X : refinement` — `X` restricted to concepts matching every
    /// refinement clause.
    Refined(Box<Expr>, Vec<RefinementClause>),
}

/// One clause of a refinement (the part after `:`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementClause {
    /// A single, ungrouped `typeId = value` attribute: may be satisfied by
    /// any active relationship of that type, in any group.
    Attribute(Attribute),
    /// A `{ typeId1 = value1, typeId2 = value2, ... }` grouped refinement:
    /// every attribute must match edges sharing one relationship group on
    /// the same source concept.
    Group(Vec<Attribute>),
}

/// A single `typeId = value` refinement attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The relationship type the attribute constrains.
    pub type_id: SctId,
    /// The value constraint the destination must satisfy.
    pub value: Expr,
}
