//! Per-thread instruction fetch buffers.
//!
//! Four bounded buffers sit between fetch and decode, one per hardware
//! thread slot. Each cycle the stage drains one *pair* of thread buffers —
//! the upper pair (slots 0 and 2) or the lower pair (slots 1 and 3),
//! alternating — into the two decode lanes, then tops up whichever buffer
//! belongs to the thread fetch is about to service, if it has fallen under
//! the low-water mark.

use rand::rngs::StdRng;
use tracing::trace;

use crate::common::constants::{DECODE_LANES, SMT_WIDTH};
use crate::core::pipeline::InFlight;
use crate::core::pipeline::fetch::FetchUnit;
use crate::core::pipeline::stage::Bounded;
use crate::task::Task;

/// Per-thread staging buffers between fetch and decode.
#[derive(Debug)]
pub struct IfbStage {
    buffers: [Bounded<InFlight>; SMT_WIDTH],
    lower: bool,
    lane_width: usize,
    low_water: usize,
}

impl IfbStage {
    /// Creates the buffers with the given capacity and decode lane width.
    ///
    /// The low-water mark is one fetch batch below capacity: a buffer is
    /// topped up only while a full batch still fits.
    pub fn new(capacity: usize, lane_width: usize, fetch_width: usize) -> Self {
        Self {
            buffers: std::array::from_fn(|_| Bounded::new(capacity)),
            lower: false,
            lane_width,
            low_water: capacity.saturating_sub(fetch_width),
        }
    }

    /// Drains the active buffer pair into the decode lanes and tops up the
    /// next-serviced thread's buffer.
    pub fn forward(
        &mut self,
        fetch: &mut FetchUnit,
        threads: &mut [Task],
        rng: &mut StdRng,
    ) -> [Vec<InFlight>; DECODE_LANES] {
        let half = usize::from(self.lower);
        let lanes = [
            self.buffers[half].drain_front(self.lane_width),
            self.buffers[2 + half].drain_front(self.lane_width),
        ];
        self.lower = !self.lower;

        self.top_up(fetch, threads, rng);

        trace!(
            lane0 = lanes[0].len(),
            lane1 = lanes[1].len(),
            t0 = self.buffers[0].len(),
            t1 = self.buffers[1].len(),
            t2 = self.buffers[2].len(),
            t3 = self.buffers[3].len(),
            "ifb"
        );
        lanes
    }

    /// Performs up to `n` extra top-up pulls to restore fetch-ahead depth.
    ///
    /// Called by the engine with the number of decode slots that went unused
    /// this cycle; stops early once the next-serviced buffer is above the
    /// low-water mark.
    pub fn advance(&mut self, n: usize, fetch: &mut FetchUnit, threads: &mut [Task], rng: &mut StdRng) {
        for _ in 0..n {
            if !self.top_up(fetch, threads, rng) {
                break;
            }
        }
    }

    /// Occupancy of the buffer for thread `slot`.
    pub fn occupancy(&self, slot: usize) -> usize {
        self.buffers[slot].len()
    }

    /// Instructions of `task` staged in any buffer.
    pub fn in_flight(&self, task: crate::task::TaskId) -> usize {
        self.buffers
            .iter()
            .map(|b| b.iter().filter(|i| i.task == task).count())
            .sum()
    }

    /// Tops up the buffer of the thread fetch will service next, if it is
    /// under the low-water mark. Returns whether a pull happened.
    fn top_up(&mut self, fetch: &mut FetchUnit, threads: &mut [Task], rng: &mut StdRng) -> bool {
        let slot = fetch.next_slot() % SMT_WIDTH;
        if self.buffers[slot].len() >= self.low_water {
            return false;
        }
        let batches = fetch.forward(threads, rng);
        for (i, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let dropped = self.buffers[i].extend_lossy(batch);
            if dropped > 0 {
                trace!(slot = i, dropped, "ifb overflow");
            }
        }
        true
    }
}
