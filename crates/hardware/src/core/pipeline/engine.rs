//! The cycle-stepping pipeline engine.
//!
//! Owns the tasks scheduled for the current quantum and the whole stage
//! graph: fetch, IFB, two decode lanes, four execution slices, and the
//! branch pipeline. One `tick` advances everything a single cycle:
//!
//! 1. Peek both decode lanes' DISPATCH stages and build a retirement mask
//!    under the per-cycle caps (branches, calc, load/store) and the branch
//!    queue's free space. Instructions beyond a cap stay in decode.
//! 2. Advance IFB (which pulls fetch) and both decode lanes, applying lane
//!    0's slice of the mask, then lane 1's.
//! 3. Route the retired instructions: branches to the branch queue, calc and
//!    load/store work one-each across the execution slices.
//! 4. Advance the slices and the branch pipeline; a retiring function return
//!    marks its task complete.
//! 5. Top up the IFB by the number of dispatch slots that went unused.
//!
//! The returned completions are the execution-slice retirements; branch
//! retirements are included only when configured.

use rand::rngs::StdRng;
use tracing::trace;

use crate::common::constants::{DECODE_LANES, VALID_SELECTION_SIZES};
use crate::common::error::SimError;
use crate::config::PipelineConfig;
use crate::core::pipeline::InFlight;
use crate::core::pipeline::branch::BranchPipeline;
use crate::core::pipeline::decode::DecodePipeline;
use crate::core::pipeline::fetch::FetchUnit;
use crate::core::pipeline::ifb::IfbStage;
use crate::core::pipeline::slice::ExecSlice;
use crate::isa::DispatchClass;
use crate::task::{Quantum, Task};

/// The staged pipeline for one quantum's scheduled tasks.
#[derive(Debug)]
pub struct PipelineEngine {
    threads: Vec<Task>,
    fetch: FetchUnit,
    ifb: IfbStage,
    decode: Vec<DecodePipeline>,
    slices: Vec<ExecSlice>,
    branch: BranchPipeline,
    branch_cap: usize,
    calc_cap: usize,
    loadstore_cap: usize,
    decode_width: usize,
    report_branch_retires: bool,
    cycle: u64,
}

impl PipelineEngine {
    /// Builds the pipeline around the scheduled tasks.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidSelectionSize`] when `threads` does not hold 1, 2,
    /// or 4 tasks — the machine has no other hardware-thread mode.
    pub fn new(threads: Vec<Task>, cfg: &PipelineConfig) -> Result<Self, SimError> {
        if !VALID_SELECTION_SIZES.contains(&threads.len()) {
            return Err(SimError::InvalidSelectionSize(threads.len()));
        }
        Ok(Self {
            threads,
            fetch: FetchUnit::new(cfg.fetch_width, cfg.redirect),
            ifb: IfbStage::new(cfg.ifb_capacity, cfg.decode_width, cfg.fetch_width),
            decode: (0..DECODE_LANES)
                .map(|_| DecodePipeline::new(cfg.decode_width))
                .collect(),
            slices: (0..cfg.slices)
                .map(|_| ExecSlice::new(cfg.issue_queue_capacity))
                .collect(),
            branch: BranchPipeline::new(cfg.issue_queue_capacity, cfg.branch_cap),
            branch_cap: cfg.branch_cap,
            calc_cap: cfg.calc_cap,
            loadstore_cap: cfg.loadstore_cap,
            decode_width: cfg.decode_width,
            report_branch_retires: cfg.report_branch_retires,
            cycle: 0,
        })
    }

    /// Advances the whole pipeline one cycle.
    ///
    /// Returns the instructions that fully completed this cycle.
    ///
    /// # Errors
    ///
    /// Propagates dispatch contract violations ([`SimError::Undispatchable`],
    /// [`SimError::WrongPort`], [`SimError::IssueOverflow`]); none of them is
    /// recoverable mid-quantum.
    pub fn tick(&mut self, quantum: Quantum, rng: &mut StdRng) -> Result<Vec<InFlight>, SimError> {
        self.cycle += 1;

        // Dispatch masking happens over the pre-cycle DISPATCH contents, so
        // instructions arriving this cycle are never dispatch candidates.
        let mask = self.dispatch_mask()?;
        let lane_split = self.decode[0].ready_len();

        let [lane0, lane1] = self.ifb.forward(&mut self.fetch, &mut self.threads, rng);

        let (mask0, mask1) = mask.split_at(lane_split);
        let mut retired = self.decode[0].forward(lane0, mask0);
        retired.extend(self.decode[1].forward(lane1, mask1));
        let consumed = retired.len();

        let mut branches = Vec::new();
        let mut calcs = Vec::new();
        let mut mems = Vec::new();
        for item in retired {
            match item.inst.dispatch_class() {
                Some(DispatchClass::Branch) => branches.push(item),
                Some(DispatchClass::Calc) => calcs.push(item),
                Some(DispatchClass::LoadStore) => mems.push(item),
                None => return Err(SimError::Undispatchable(item.inst.kind())),
            }
        }

        self.branch.issue(branches)?;

        let mut completions = Vec::new();
        let mut calc_iter = calcs.into_iter();
        let mut mem_iter = mems.into_iter();
        for slice in &mut self.slices {
            completions.extend(slice.forward(calc_iter.next(), mem_iter.next())?);
        }

        let retired_branches = self.branch.forward();
        for item in &retired_branches {
            if item.inst.is_ret() {
                if let Some(task) = self.threads.iter_mut().find(|t| t.id == item.task) {
                    task.complete(quantum);
                }
            }
        }
        if self.report_branch_retires {
            completions.extend(retired_branches);
        }

        let dispatch_slots = DECODE_LANES * self.decode_width;
        self.ifb.advance(
            dispatch_slots.saturating_sub(consumed),
            &mut self.fetch,
            &mut self.threads,
            rng,
        );

        trace!(
            cycle = self.cycle,
            dispatched = consumed,
            completed = completions.len(),
            "tick"
        );
        Ok(completions)
    }

    /// Builds the retirement mask over both lanes' DISPATCH contents, lane 0
    /// first, under the per-cycle caps and downstream queue space.
    fn dispatch_mask(&self) -> Result<Vec<bool>, SimError> {
        let mut branch_left = self.branch_cap.min(self.branch.queue_free());
        let mut calc_left = self.calc_cap.min(self.slices.len());
        let mut mem_left = self.loadstore_cap.min(self.slices.len());

        let mut mask = Vec::new();
        for lane in &self.decode {
            for item in lane.ready() {
                let take = match item.inst.dispatch_class() {
                    Some(DispatchClass::Branch) => take_one(&mut branch_left),
                    Some(DispatchClass::Calc) => take_one(&mut calc_left),
                    Some(DispatchClass::LoadStore) => take_one(&mut mem_left),
                    None => return Err(SimError::Undispatchable(item.inst.kind())),
                };
                mask.push(take);
            }
        }
        Ok(mask)
    }

    /// Tasks currently occupying the machine.
    pub fn threads(&self) -> &[Task] {
        &self.threads
    }

    /// Cycles ticked so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Instructions of `task` buffered anywhere in the machine.
    fn in_flight_of(&self, task: crate::task::TaskId) -> usize {
        self.ifb.in_flight(task)
            + self.decode.iter().map(|d| d.in_flight(task)).sum::<usize>()
            + self.slices.iter().map(|s| s.in_flight(task)).sum::<usize>()
            + self.branch.in_flight(task)
    }

    /// Releases the tasks back to the caller at quantum end.
    ///
    /// Tearing the pipeline down discards whatever is still buffered in it,
    /// so each incomplete task's cursor is rewound to its oldest in-flight
    /// instruction; that work is refetched next time the task is scheduled.
    pub fn into_threads(mut self) -> Vec<Task> {
        let rewinds: Vec<usize> = self
            .threads
            .iter()
            .map(|t| {
                if t.is_complete() {
                    0
                } else {
                    self.in_flight_of(t.id)
                }
            })
            .collect();
        for (task, rewind) in self.threads.iter_mut().zip(rewinds) {
            task.inst_index = task.inst_index.saturating_sub(rewind);
        }
        self.threads
    }
}

fn take_one(budget: &mut usize) -> bool {
    if *budget > 0 {
        *budget -= 1;
        true
    } else {
        false
    }
}
