//! Member resolution and rename planning for augmentation chains.
//!
//! This crate is the analysis half of the chain compiler. Given the ordered
//! unit list of a chain and the Unit Index oracle, it produces a
//! [`ChainPlan`]: for every member key observed across the chain, which unit
//! finally owns the slot, and for every physical declaration, whether it
//! keeps its name, moves to a mangled shadow identity, is dropped as a
//! redundant overlay, or (for constructors) receives a discriminator.
//!
//! Unlike ordinary inheritance, a later chain entry *replaces* the owner of
//! a key rather than overriding it virtually; the plan records the full
//! declaration timeline per key so the emitter can statically redirect
//! super-style calls to the actual chain predecessor.
//!
//! The pass never reads unit byte streams, only index facts.

mod error;
mod plan;
mod rename;
mod resolver;

pub use error::{InvariantViolation, ResolveError};
pub use plan::{ChainPlan, CtorSite, DeclDecision, DeclSite, MemberRecord};
pub use rename::{mangle, remap_type};
pub use resolver::resolve;
