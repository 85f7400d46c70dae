//! Round-robin instruction fetch.
//!
//! Each cycle the fetch unit takes up to `fetch_width` consecutive
//! instructions from one active task, resolves every branch in the batch in
//! place (so counter state persists in the task's stream), and hands the
//! batch to the fetch buffer of the thread slot it came from. The serviced
//! thread rotates round-robin.
//!
//! A taken branch redirects fetch according to the configured policy: the
//! resolved target delta lands either on the fetch rotation slot (the
//! historical behavior of this machine model) or on the branching task's own
//! instruction cursor.

use rand::rngs::StdRng;
use tracing::trace;

use crate::common::constants::SMT_WIDTH;
use crate::config::RedirectTarget;
use crate::core::pipeline::InFlight;
use crate::isa::{BranchMode, Inst};
use crate::task::Task;

/// Per-thread batches produced by one fetch cycle; only the serviced thread's
/// slot is populated.
pub type FetchBatches = [Vec<InFlight>; SMT_WIDTH];

/// Round-robin fetch over the active task list.
#[derive(Debug)]
pub struct FetchUnit {
    next_slot: usize,
    width: usize,
    redirect: RedirectTarget,
}

impl FetchUnit {
    /// Creates a fetch unit taking `width` instructions per cycle.
    pub fn new(width: usize, redirect: RedirectTarget) -> Self {
        Self {
            next_slot: 0,
            width,
            redirect,
        }
    }

    /// The thread slot the next `forward` call will service.
    pub fn next_slot(&self) -> usize {
        self.next_slot
    }

    /// Fetches one batch from the current thread and rotates.
    ///
    /// Branches resolve before the batch leaves this stage: counters advance
    /// in the task's own stream and the in-flight copies carry the resolved
    /// state. The batch lands in the serviced thread's slot of the result.
    pub fn forward(&mut self, threads: &mut [Task], rng: &mut StdRng) -> FetchBatches {
        let mut batches = FetchBatches::default();
        if threads.is_empty() {
            return batches;
        }

        let thread_count = threads.len();
        let slot = self.next_slot % thread_count;
        let task = &mut threads[slot];

        let start = task.inst_index;
        let end = (start + self.width).min(task.instructions.len());
        let mut cursor_redirect: Option<usize> = None;
        let mut slot_redirect: Option<usize> = None;

        for (offset, index) in (start..end).enumerate() {
            if let Inst::Branch(ref mut branch) = task.instructions[index] {
                let taken = branch.resolve(rng);
                if taken && !matches!(branch.mode, BranchMode::Cmp) {
                    match self.redirect {
                        RedirectTarget::FetchSlot => {
                            let position = (slot + offset) as i64 + branch.delta;
                            slot_redirect =
                                Some(position.rem_euclid(thread_count as i64) as usize);
                        }
                        RedirectTarget::TaskCursor => {
                            // A return leaves the stream entirely; other taken
                            // branches move the cursor to their target.
                            cursor_redirect = Some(match branch.mode {
                                BranchMode::Ret => task.instructions.len(),
                                _ => (index as i64 + branch.delta).max(0) as usize,
                            });
                        }
                    }
                }
            }
        }

        let task = &mut threads[slot];
        let batch: Vec<InFlight> = task.instructions[start..end]
            .iter()
            .map(|inst| InFlight::new(inst.clone(), task.id))
            .collect();

        match cursor_redirect {
            Some(target) => task.inst_index = target.min(task.instructions.len()),
            None => task.advance(self.width),
        }

        trace!(
            slot,
            task = %task.id,
            fetched = batch.len(),
            cursor = task.inst_index,
            "fetch"
        );

        batches[slot] = batch;
        self.next_slot = match slot_redirect {
            Some(target) => target,
            None => (slot + 1) % thread_count,
        };
        batches
    }
}
