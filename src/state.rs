use crate::error::PregelError;

use serde::{Deserialize, Serialize};

/**
 * Per-worker round state.
 *
 * LOADED ---> COMPUTING ---> COMPUTED
 *                 ^              |
 *                 |              |
 *                  --------------
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Loaded,    // the graph is loaded and no superstep has started.
    Computing, // the conductor started the superstep.
    Computed,  // vertex computations and the flush of the superstep are done.
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct RoundState {
    pub superstep: u64,
    pub phase: Phase,
}

impl RoundState {
    pub fn new() -> Self {
        RoundState {
            superstep: 0,
            phase: Phase::Loaded,
        }
    }

    pub fn begin(&mut self, superstep: u64) -> Result<(), PregelError> {
        let expected = match self.phase {
            Phase::Loaded => superstep == 0,
            Phase::Computed => superstep == self.superstep + 1,
            Phase::Computing => false,
        };

        if !expected {
            return Err(PregelError::SuperstepOrder {
                requested: superstep,
                current: self.superstep,
                phase: self.phase,
            });
        }

        self.superstep = superstep;
        self.phase = Phase::Computing;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Computed;
    }

    /// Index of the incoming buffer that accepts a batch produced in
    /// superstep `tag`, or `None` if the batch belongs to no round this worker
    /// can still deliver.
    pub fn inbox_for(&self, tag: u64) -> Option<usize> {
        if tag == self.superstep || (tag == self.superstep + 1 && self.phase == Phase::Computed) {
            Some(inbox_index(tag + 1))
        } else {
            None
        }
    }
}

/// Buffer read during `superstep`.
pub(crate) fn inbox_index(superstep: u64) -> usize {
    (superstep % 2) as usize
}
