//! Decode lanes.
//!
//! Each lane is a fixed chain of named, fixed-width sub-stages:
//! Decode → CRK → XFR → PRED0 → PRED1 → XMIT → DISPATCH. Instructions enter
//! at the intake and surface at DISPATCH seven cycles later. The final stage
//! supports a non-destructive peek and masked retirement, so the engine can
//! hold instructions back under downstream resource pressure.

use crate::core::pipeline::InFlight;
use crate::core::pipeline::stage::Stage;

/// One decode lane.
#[derive(Debug)]
pub struct DecodePipeline {
    chain: Stage,
}

impl DecodePipeline {
    /// Builds the seven-sub-stage chain, each holding and completing `width`
    /// instructions per cycle.
    pub fn new(width: usize) -> Self {
        let chain = Stage::intake("DecodeIntake")
            .then("Decode", width, width)
            .then("CRK", width, width)
            .then("XFR", width, width)
            .then("PRED0", width, width)
            .then("PRED1", width, width)
            .then("XMIT", width, width)
            .then("DISPATCH", width, width);
        Self { chain }
    }

    /// Non-destructive view of the instructions ready at DISPATCH.
    pub fn ready(&self) -> impl ExactSizeIterator<Item = &InFlight> {
        self.chain.peek()
    }

    /// Number of instructions ready at DISPATCH.
    pub fn ready_len(&self) -> usize {
        self.chain.len()
    }

    /// Runs one cycle: feeds `intake` into the chain, retires exactly the
    /// positions flagged in `mask` from DISPATCH, and shifts every sub-stage
    /// forward.
    pub fn forward(&mut self, intake: Vec<InFlight>, mask: &[bool]) -> Vec<InFlight> {
        self.chain.feed(intake);
        self.chain.forward_masked(mask)
    }

    /// Instructions of `task` anywhere in this lane.
    pub fn in_flight(&self, task: crate::task::TaskId) -> usize {
        self.chain.count_task(task)
    }
}
