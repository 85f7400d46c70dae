//! Contract-violation error definitions.
//!
//! This module defines the error taxonomy for the scheduler and pipeline core:
//! 1. **Scheduler contracts:** Empty run queue, selections of an invalid size.
//! 2. **Issue contracts:** Overflowing an issue queue, routing an instruction to the wrong port.
//! 3. **Dispatch contracts:** Instruction kinds the dispatch logic has no path for.
//!
//! Every variant represents a programming or configuration error, not a
//! recoverable runtime condition. Callers propagate them with `?`; nothing in
//! the core catches and continues past one. Capacity pressure on ordinary
//! buffers is deliberately *not* an error — bounded buffers report refusal
//! through their insertion result instead (see
//! [`Bounded::push`](crate::core::pipeline::stage::Bounded::push)).

use thiserror::Error;

use crate::isa::InstKind;

/// The issue port of an execution slice an instruction was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlicePort {
    /// The single per-cycle calculation slot (VSU/FX/NOP work).
    Calc,
    /// The single per-cycle load/store slot.
    LoadStore,
}

impl std::fmt::Display for SlicePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calc => write!(f, "calc"),
            Self::LoadStore => write!(f, "load/store"),
        }
    }
}

/// Fatal contract violations raised by the scheduler and pipeline core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A scheduling algorithm was invoked against an empty run queue.
    #[error("scheduling algorithm invoked on an empty run queue")]
    EmptyRunQueue,

    /// A per-quantum selection did not contain 1, 2, or 4 tasks.
    #[error("scheduled {0} tasks; the machine runs 1, 2, or 4 hardware threads")]
    InvalidSelectionSize(usize),

    /// More instructions were issued to a queue than it had free entries.
    #[error("issued {offered} instructions to {queue} with only {free} free entries")]
    IssueOverflow {
        /// Name of the overflowed issue queue.
        queue: &'static str,
        /// Free entries at the time of the issue.
        free: usize,
        /// Instructions offered.
        offered: usize,
    },

    /// An instruction was routed to a slice port that cannot execute it.
    #[error("{kind} instruction routed to the {port} port")]
    WrongPort {
        /// The port the instruction was offered to.
        port: SlicePort,
        /// The instruction kind that was offered.
        kind: InstKind,
    },

    /// Dispatch encountered an instruction kind it has no execution path for.
    #[error("no dispatch path for {0} instructions")]
    Undispatchable(InstKind),
}
