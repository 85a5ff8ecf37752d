//! Resolution errors.
//!
//! Every variant names the owning unit(s) and the member key so a contract
//! violation is traceable to the offending augmentation author. A resolution
//! error fails the whole chain compile; there are no partial plans.

use std::fmt;

use graft_ir::{MemberKey, TypeDesc, Visibility};

/// A cross-unit contract violation found while planning a chain.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum InvariantViolation {
    /// The same member key is declared twice within one unit.
    DuplicateMember { unit: String, key: MemberKey },
    /// A later declaration narrows the visibility an earlier chain entry
    /// exposed for the same slot.
    VisibilityNarrowed {
        key: MemberKey,
        prior_unit: String,
        prior: Visibility,
        unit: String,
        declared: Visibility,
    },
    /// A field redeclaration changes the field's type.
    FieldTypeMismatch {
        name: String,
        prior_unit: String,
        prior_ty: TypeDesc,
        unit: String,
        declared_ty: TypeDesc,
    },
    /// A declared constructor signature collides with the discriminated
    /// signature synthesized for another constructor of the same shape.
    DiscriminatorCollision { unit: String, key: MemberKey },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::DuplicateMember { unit, key } => {
                write!(f, "unit `{unit}` declares member `{key}` more than once")
            }
            InvariantViolation::VisibilityNarrowed {
                key,
                prior_unit,
                prior,
                unit,
                declared,
            } => write!(
                f,
                "unit `{unit}` narrows `{key}` to {declared}, but `{prior_unit}` exposes it as {prior}"
            ),
            InvariantViolation::FieldTypeMismatch {
                name,
                prior_unit,
                prior_ty,
                unit,
                declared_ty,
            } => write!(
                f,
                "unit `{unit}` redeclares field `{name}` as `{declared_ty}`, but `{prior_unit}` declared it as `{prior_ty}`"
            ),
            InvariantViolation::DiscriminatorCollision { unit, key } => write!(
                f,
                "constructor `{key}` in unit `{unit}` collides with a synthesized discriminator signature"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Failure of the analysis pass.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ResolveError {
    /// The Unit Index has no data for a unit named in the chain.
    UnknownUnit { name: String },
    Invariant(InvariantViolation),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnknownUnit { name } => {
                write!(f, "unit index has no data for `{name}`")
            }
            ResolveError::Invariant(v) => v.fmt(f),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<InvariantViolation> for ResolveError {
    fn from(v: InvariantViolation) -> Self {
        ResolveError::Invariant(v)
    }
}
