//! The branch execution pipeline.
//!
//! A dedicated chain — issue queue → MAP → ISS → RF → EX → FIN → XMIT —
//! shared by all threads. The dispatch logic issues up to the per-cycle
//! branch cap into the queue; retirement out of XMIT is where function
//! returns are recognized and their tasks marked complete (the engine owns
//! that bookkeeping).

use crate::common::error::SimError;
use crate::core::pipeline::InFlight;
use crate::core::pipeline::stage::Stage;

/// The shared branch pipeline.
#[derive(Debug)]
pub struct BranchPipeline {
    chain: Stage,
}

impl BranchPipeline {
    /// Creates the pipeline.
    ///
    /// `retire_cap` is the per-cycle branch dispatch cap; the chain stages
    /// complete `retire_cap` per cycle and hold twice that, so a full
    /// dispatch burst is never dropped between stages.
    pub fn new(queue_capacity: usize, retire_cap: usize) -> Self {
        let depth = retire_cap * 2;
        let chain = Stage::source("BranchQueue", queue_capacity, retire_cap)
            .then("MAP", depth, retire_cap)
            .then("ISS", depth, retire_cap)
            .then("RF", depth, retire_cap)
            .then("EX", depth, retire_cap)
            .then("FIN", depth, retire_cap)
            .then("XMIT", depth, retire_cap);
        Self { chain }
    }

    /// Inserts newly dispatched branches into the issue queue.
    ///
    /// # Errors
    ///
    /// [`SimError::IssueOverflow`] when `items` exceeds the queue's free
    /// entries; dispatch masks against [`Self::queue_free`] first.
    pub fn issue(&mut self, items: Vec<InFlight>) -> Result<(), SimError> {
        self.chain.root_mut().issue(items)
    }

    /// Free entries in the issue queue.
    pub fn queue_free(&self) -> usize {
        self.chain.root().free()
    }

    /// Advances the pipeline one cycle and returns the retired branches.
    pub fn forward(&mut self) -> Vec<InFlight> {
        self.chain.forward()
    }

    /// Instructions of `task` anywhere in the chain.
    pub fn in_flight(&self, task: crate::task::TaskId) -> usize {
        self.chain.count_task(task)
    }
}
