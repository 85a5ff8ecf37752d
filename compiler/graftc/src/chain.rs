//! Chain state.
//!
//! Every chain moves through an explicit state machine: `Open` while it
//! accumulates augmentations, `Compiling` from the point of no return,
//! then `Compiled` or, terminally, `Failed`. A chain observed in
//! `Compiling` outside the guard means an earlier attempt aborted; it is
//! treated as failed, never retried.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::compile::ComposeOutput;
use crate::error::ComposeError;

/// Read-only snapshot of one chain's registration state.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct AugmentationChain {
    pub base: String,
    /// Augmentation unit names in chain order.
    pub augmentations: Vec<String>,
    /// Frozen: the first compile request has been made.
    pub compiled: bool,
}

pub(crate) enum ChainState {
    Open { augmentations: Vec<String> },
    Compiling,
    Compiled(Arc<ComposeOutput>),
    Failed(ComposeError),
}

pub(crate) struct ChainCell {
    pub(crate) state: Mutex<ChainState>,
}

impl ChainCell {
    pub(crate) fn new() -> Self {
        ChainCell {
            state: Mutex::new(ChainState::Open {
                augmentations: Vec::new(),
            }),
        }
    }
}
