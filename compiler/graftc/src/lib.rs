//! The graft chain compiler driver.
//!
//! Ties the pipeline together: the [`ChainRegistry`] accumulates
//! augmentation chains, freezes each chain at its first compile request,
//! runs the analysis pass (`graft_resolve`) and the emission pass
//! (`graft_emit`) exactly once per chain, and caches the merged byte
//! streams for the process lifetime.
//!
//! # Pipeline Position
//!
//! ```text
//! UnitSource bytes → decode → resolve → emit → encode → ComposeOutput
//! ```
//!
//! Independent chains compile fully independently; concurrent compile
//! requests for the same chain serialize on a per-chain guard and share the
//! cached result.

mod chain;
mod compile;
mod error;
mod registry;
mod source;

pub use chain::AugmentationChain;
pub use compile::ComposeOutput;
pub use error::ComposeError;
pub use registry::ChainRegistry;
pub use source::{MemoryUnitSource, UnitSource};
