//! The compile-facing error taxonomy.
//!
//! Three fatal kinds, per the contract with callers: *structural* (malformed
//! input unit), *invariant* (an augmentation author violated the chain
//! contract), and *lookup* (no data for a referenced unit). Registry-state
//! errors (frozen, circular, previously failed) round out the surface. No
//! error is recovered silently, and a failed compile never yields a
//! partially-merged unit.

use thiserror::Error;

use graft_emit::EmitError;
use graft_resolve::{InvariantViolation, ResolveError};

/// Why a chain could not be composed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// Malformed input unit. Fatal; not retried.
    #[error("malformed unit `{unit}`: {message}")]
    Structural { unit: String, message: String },

    /// Chain contract violation (visibility narrowing, field retyping,
    /// same-unit duplicate, discriminator collision). Fatal; the chain is
    /// marked permanently failed.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    /// Emission-time violation (inconsistent nested records, unresolvable
    /// predecessor, malformed stylized pattern).
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// The Unit Index or the byte source has no data for a referenced unit.
    /// Fatal for this chain only.
    #[error("no unit data available for `{name}`")]
    Lookup { name: String },

    /// The chain already compiled (or began compiling); its augmentation
    /// list is frozen.
    #[error("chain for `{base}` is frozen; cannot add augmentation `{augmentation}`")]
    ChainFrozen { base: String, augmentation: String },

    /// The augmentation would make the chain reference itself.
    #[error("augmenting `{base}` with `{augmentation}` would make the chain circular")]
    Circular { base: String, augmentation: String },

    /// A previous compile attempt failed past the point of no return; the
    /// chain is terminally unusable for this process.
    #[error("chain for `{base}` previously failed and will not be retried: {message}")]
    ChainFailed { base: String, message: String },
}

impl From<ResolveError> for ComposeError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnknownUnit { name } => ComposeError::Lookup { name },
            ResolveError::Invariant(v) => ComposeError::Invariant(v),
        }
    }
}

impl ComposeError {
    /// Short taxonomy label, used by `graft explain` and log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ComposeError::Structural { .. } => "structural",
            ComposeError::Invariant(_) | ComposeError::Emit(_) => "invariant",
            ComposeError::Lookup { .. } => "lookup",
            ComposeError::ChainFrozen { .. } | ComposeError::Circular { .. } => "registration",
            ComposeError::ChainFailed { .. } => "failed-chain",
        }
    }
}
