//! The staged pipeline simulation engine.
//!
//! A chain of bounded-capacity buffers advanced one simulated cycle at a
//! time:
//! 1. **Fetch** pulls batches from the active tasks round-robin and resolves branches.
//! 2. **IFB** stages fetched instructions per thread ahead of decode.
//! 3. **Decode lanes** carry instructions through seven fixed-width sub-stages.
//! 4. **Dispatch** masks ready instructions under per-cycle caps and routes them.
//! 5. **Execution slices** and the **branch pipeline** run them to completion.
//!
//! Within one cycle every stage retires before it refills, so an item is
//! never visible for retirement in the cycle it arrives; each stage boundary
//! therefore models one cycle of propagation latency.

/// The branch execution pipeline.
pub mod branch;
/// Decode lanes.
pub mod decode;
/// The cycle-stepping engine.
pub mod engine;
/// Round-robin instruction fetch.
pub mod fetch;
/// Per-thread instruction fetch buffers.
pub mod ifb;
/// Execution slices (LSU/VSX/FX pipes).
pub mod slice;
/// Bounded buffers and the stage primitive.
pub mod stage;

pub use engine::PipelineEngine;

use crate::isa::Inst;
use crate::task::TaskId;

/// An instruction in flight through the pipeline, tagged with the task it
/// belongs to.
///
/// The copy travelling through the stages is immutable; branch resolution
/// state mutates in the owning task's stream at fetch time, before the copy
/// leaves the fetch stage.
#[derive(Debug, Clone, PartialEq)]
pub struct InFlight {
    /// The instruction, with branch state already resolved for this fetch.
    pub inst: Inst,
    /// The task this instruction belongs to.
    pub task: TaskId,
}

impl InFlight {
    /// Tags `inst` with its owning task.
    pub fn new(inst: Inst, task: TaskId) -> Self {
        Self { inst, task }
    }
}
