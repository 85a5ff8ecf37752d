//! Unit emission for augmentation chains.
//!
//! The emission half of the chain compiler: streams the base and each
//! augmentation's structure through a rewrite pass that applies the rename
//! plan, redirects super-style calls to the actual chain predecessor,
//! inlines pre-init hooks, merges static initializers, and, for enumerated
//! base types, regenerates the constant table and its accessors from the
//! union of constants across the chain.
//!
//! # Pipeline Position
//!
//! ```text
//! UnitSource bytes → decode → [resolve] → **emit** → merged unit bytes
//! ```
//!
//! The pass consumes the [`graft_resolve::ChainPlan`] produced by the
//! analysis pass and never re-resolves; a single forward pass per unit.

mod calls;
mod clinit;
mod ctor;
mod emitter;
mod enumext;
mod error;

pub use emitter::{merge_chain, rewrite_nested};
pub use enumext::EnumConstantRecord;
pub use error::EmitError;
