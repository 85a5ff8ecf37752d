//! Emission errors.

use std::fmt;

use graft_ir::MemberKey;

/// Failure while streaming chain units into the merged output.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum EmitError {
    /// A declaration showed up in a unit body with no corresponding plan
    /// decision: the byte stream disagrees with the index facts.
    PlanMismatch { unit: String, key: MemberKey },
    /// The same nested-unit relationship was redeclared with inconsistent
    /// data.
    NestedConflict { inner: String },
    /// A super-style call references a chain member, but no predecessor in
    /// the chain declares the key.
    UnresolvedPredecessor { unit: String, key: MemberKey },
    /// The stylized enumerated-constant pattern could not be recognized or
    /// re-synthesized.
    EnumPattern { unit: String, message: String },
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::PlanMismatch { unit, key } => write!(
                f,
                "unit `{unit}` carries `{key}`, which the chain plan never saw; \
                 the unit bytes disagree with the unit index"
            ),
            EmitError::NestedConflict { inner } => write!(
                f,
                "nested unit `{inner}` redeclared with inconsistent relationship data"
            ),
            EmitError::UnresolvedPredecessor { unit, key } => write!(
                f,
                "super-style call to `{key}` in unit `{unit}` has no predecessor in the chain"
            ),
            EmitError::EnumPattern { unit, message } => {
                write!(f, "enum initializer pattern in unit `{unit}`: {message}")
            }
        }
    }
}

impl std::error::Error for EmitError {}
