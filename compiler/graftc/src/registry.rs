//! The chain registry.
//!
//! An explicit store keyed by base name; every [`AugmentationChain`] is
//! owned by the registry and referenced by name everywhere else. Each chain
//! carries its own guard: a compile runs to completion (or terminal
//! failure) under the chain's mutex, so concurrent requests for the same
//! chain serialize and share the cached result, while disjoint chains
//! compile fully in parallel.

use std::sync::Arc;

use dashmap::DashMap;

use graft_index::UnitIndex;

use crate::chain::{AugmentationChain, ChainCell, ChainState};
use crate::compile::{compile_chain, ComposeOutput};
use crate::error::ComposeError;
use crate::source::UnitSource;

pub struct ChainRegistry {
    index: Arc<dyn UnitIndex>,
    source: Arc<dyn UnitSource>,
    cells: DashMap<String, Arc<ChainCell>>,
}

impl ChainRegistry {
    /// The index must be fully populated before the first compile; it is
    /// treated as read-only from here on.
    pub fn new(index: Arc<dyn UnitIndex>, source: Arc<dyn UnitSource>) -> Self {
        ChainRegistry {
            index,
            source,
            cells: DashMap::new(),
        }
    }

    fn cell(&self, base: &str) -> Arc<ChainCell> {
        self.cells
            .entry(base.to_string())
            .or_insert_with(|| Arc::new(ChainCell::new()))
            .clone()
    }

    /// Append an augmentation to a base's chain. Idempotent per pair. If the
    /// augmentation was itself established as a base of its own (still open)
    /// chain, that sub-chain is absorbed wholesale: its augmentation list is
    /// appended after it, order preserved.
    pub fn augment(&self, base: &str, augmentation: &str) -> Result<(), ComposeError> {
        if base == augmentation {
            return Err(ComposeError::Circular {
                base: base.to_string(),
                augmentation: augmentation.to_string(),
            });
        }

        // Detach the augmentation's own chain first, never holding two
        // chain guards at once.
        let absorbed = self.detach_open_chain(augmentation);

        let cell = self.cell(base);
        let mut state = cell.state.lock();
        let ChainState::Open { augmentations } = &mut *state else {
            return Err(ComposeError::ChainFrozen {
                base: base.to_string(),
                augmentation: augmentation.to_string(),
            });
        };

        let mut incoming = Vec::with_capacity(1 + absorbed.len());
        incoming.push(augmentation.to_string());
        incoming.extend(absorbed);

        for name in incoming {
            if name == base {
                return Err(ComposeError::Circular {
                    base: base.to_string(),
                    augmentation: name,
                });
            }
            // Idempotent per pair: an established position always wins.
            if !augmentations.contains(&name) {
                tracing::debug!(base, augmentation = %name, "chain extended");
                augmentations.push(name);
            }
        }
        Ok(())
    }

    /// Remove and return the augmentation list of an open chain rooted at
    /// `name`. Compiled or failed chains are left untouched (their caches
    /// stay valid); the unit then joins as a plain augmentation.
    fn detach_open_chain(&self, name: &str) -> Vec<String> {
        let Some(entry) = self.cells.get(name) else {
            return Vec::new();
        };
        let cell = entry.value().clone();
        drop(entry);

        let mut state = cell.state.lock();
        if let ChainState::Open { augmentations } = &mut *state {
            let absorbed = std::mem::take(augmentations);
            drop(state);
            self.cells.remove(name);
            tracing::debug!(sub_chain = name, absorbed = absorbed.len(), "sub-chain flattened");
            absorbed
        } else {
            Vec::new()
        }
    }

    /// Compile a chain, or return its cached result. The first request
    /// freezes the chain; a failure past the point of no return is terminal.
    pub fn compile(&self, base: &str) -> Result<Arc<ComposeOutput>, ComposeError> {
        let cell = self.cell(base);
        let mut state = cell.state.lock();

        let augmentations = match &*state {
            ChainState::Compiled(out) => return Ok(out.clone()),
            ChainState::Failed(err) => return Err(err.clone()),
            ChainState::Compiling => {
                // Only reachable when an earlier attempt aborted mid-compile.
                return Err(ComposeError::ChainFailed {
                    base: base.to_string(),
                    message: "an earlier compile attempt aborted".to_string(),
                });
            }
            ChainState::Open { augmentations } => augmentations.clone(),
        };

        // Point of no return: the chain is frozen from here, success or not.
        *state = ChainState::Compiling;

        let mut order = Vec::with_capacity(1 + augmentations.len());
        order.push(base.to_string());
        order.extend(augmentations);

        match compile_chain(&order, self.index.as_ref(), self.source.as_ref()) {
            Ok(output) => {
                let output = Arc::new(output);
                *state = ChainState::Compiled(output.clone());
                Ok(output)
            }
            Err(err) => {
                tracing::debug!(base, kind = err.kind(), "chain compile failed terminally");
                *state = ChainState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Snapshot of a chain's registration state, if the base is known.
    pub fn chain(&self, base: &str) -> Option<AugmentationChain> {
        let cell = self.cells.get(base)?.value().clone();
        let state = cell.state.lock();
        Some(match &*state {
            ChainState::Open { augmentations } => AugmentationChain {
                base: base.to_string(),
                augmentations: augmentations.clone(),
                compiled: false,
            },
            ChainState::Compiling | ChainState::Failed(_) => AugmentationChain {
                base: base.to_string(),
                augmentations: Vec::new(),
                compiled: true,
            },
            ChainState::Compiled(out) => AugmentationChain {
                base: base.to_string(),
                augmentations: out.order[1..].to_vec(),
                compiled: true,
            },
        })
    }
}
