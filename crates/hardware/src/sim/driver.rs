//! The quantum-level simulation driver.
//!
//! Repeatedly asks the scheduling policy for the next quantum's tasks and
//! runs them, until the run queue is exhausted. Two driving modes:
//!
//! - **Quantum mode** consumes one instruction per scheduled task per
//!   quantum and marks a task complete when its stream runs out. Cheap, and
//!   sufficient for comparing scheduling policies.
//! - **Cycle mode** builds a fresh pipeline engine around the scheduled
//!   tasks and ticks it `cycles_per_quantum` times; completion is decided by
//!   the engine (a retiring function return).
//!
//! New tasks arrive at their designated quantum and enter the queue ahead of
//! the re-enqueued survivors of the quantum just run. The recorded schedule
//! — quantum index to scheduled task ids, dense from zero — is the artifact
//! external timeline renderers consume.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::debug;

use crate::common::constants::VALID_SELECTION_SIZES;
use crate::common::error::SimError;
use crate::config::Config;
use crate::core::pipeline::{InFlight, PipelineEngine};
use crate::sched::{Policy, RunQueue};
use crate::stats::SimStats;
use crate::task::{Quantum, Task, TaskId};

/// A task and the quantum at which it becomes runnable.
#[derive(Debug, Clone)]
pub struct Arrival {
    /// Quantum at which the task joins the run queue.
    pub at: Quantum,
    /// The task itself.
    pub task: Task,
}

impl Arrival {
    /// A task arriving at quantum zero.
    pub fn immediate(task: Task) -> Self {
        Self { at: 0, task }
    }

    /// A task arriving at `at`.
    pub fn at(at: Quantum, task: Task) -> Self {
        Self { at, task }
    }
}

/// How each quantum is advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimMode {
    /// One instruction per scheduled task per quantum.
    #[default]
    Quantum,
    /// Tick the full pipeline engine every clock cycle.
    Cycle,
}

impl std::str::FromStr for SimMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quantum" => Ok(Self::Quantum),
            "cycle" => Ok(Self::Cycle),
            other => Err(format!("unknown mode {other:?} (expected quantum or cycle)")),
        }
    }
}

/// The recorded schedule: quantum index to the tasks run in that quantum.
///
/// Keys are dense from zero. This is the sole artifact the external
/// visualizer consumes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schedule {
    quanta: BTreeMap<Quantum, Vec<TaskId>>,
}

impl Schedule {
    /// Records the tasks scheduled for `quantum`.
    fn record(&mut self, quantum: Quantum, tasks: &[Task]) {
        let ids = tasks.iter().map(|t| t.id).collect();
        let _ = self.quanta.insert(quantum, ids);
    }

    /// The tasks scheduled in `quantum`, if it was driven.
    pub fn get(&self, quantum: Quantum) -> Option<&[TaskId]> {
        self.quanta.get(&quantum).map(Vec::as_slice)
    }

    /// Iterates `(quantum, scheduled ids)` in quantum order.
    pub fn iter(&self) -> impl Iterator<Item = (Quantum, &[TaskId])> {
        self.quanta.iter().map(|(&q, ids)| (q, ids.as_slice()))
    }

    /// Number of quanta driven.
    pub fn len(&self) -> usize {
        self.quanta.len()
    }

    /// Whether no quantum was driven.
    pub fn is_empty(&self) -> bool {
        self.quanta.is_empty()
    }
}

/// Everything a finished run produces.
#[derive(Debug)]
pub struct SimOutcome {
    /// The per-quantum schedule.
    pub schedule: Schedule,
    /// All tasks in their final state, ordered by id.
    pub tasks: Vec<Task>,
    /// Run counters.
    pub stats: SimStats,
}

/// Drives the simulation until every runnable task has completed.
///
/// # Errors
///
/// [`SimError::EmptyRunQueue`] when `arrivals` supplies no quantum-zero
/// tasks, [`SimError::InvalidSelectionSize`] when a policy hands back a
/// selection the machine cannot run, and any pipeline contract violation in
/// cycle mode.
pub fn run_to_exhaustion(
    arrivals: Vec<Arrival>,
    policy: Policy,
    mode: SimMode,
    config: &Config,
) -> Result<SimOutcome, SimError> {
    let mut pending: Vec<Arrival> = Vec::new();
    let mut queue = RunQueue::new();
    for arrival in arrivals {
        if arrival.at == 0 {
            queue.push_back(arrival.task);
        } else {
            pending.push(arrival);
        }
    }

    if queue.is_empty() {
        return Err(SimError::EmptyRunQueue);
    }

    let mut schedule = Schedule::default();
    let mut stats = SimStats::new();
    let mut finished: Vec<Task> = Vec::new();
    let mut rng = StdRng::seed_from_u64(config.driver.seed);
    let mut quantum: Quantum = 0;

    while !queue.is_empty() {
        let mut selected = policy.select(&mut queue, &config.sched)?;
        if !VALID_SELECTION_SIZES.contains(&selected.len()) {
            return Err(SimError::InvalidSelectionSize(selected.len()));
        }
        schedule.record(quantum, &selected);
        stats.quanta += 1;

        match mode {
            SimMode::Quantum => {
                for task in &mut selected {
                    task.record_run(quantum);
                    if let Some(inst) = task.instructions.get(task.inst_index) {
                        stats.record_completion(&InFlight::new(inst.clone(), task.id));
                    }
                    task.advance(1);
                    if task.is_exhausted() {
                        task.complete(quantum);
                    }
                }
            }
            SimMode::Cycle => {
                let mut engine = PipelineEngine::new(selected, &config.pipeline)?;
                for _ in 0..config.driver.cycles_per_quantum {
                    for done in engine.tick(quantum, &mut rng)? {
                        stats.record_completion(&done);
                    }
                    stats.cycles += 1;
                }
                selected = engine.into_threads();
                for task in &mut selected {
                    task.record_run(quantum);
                }
            }
        }

        quantum += 1;
        // Arrivals enter ahead of the quantum's survivors, preserving their
        // priority over re-enqueued work.
        let mut i = 0;
        while i < pending.len() {
            if pending[i].at == quantum {
                queue.push_back(pending.remove(i).task);
            } else {
                i += 1;
            }
        }
        for task in selected {
            if task.is_complete() {
                stats.tasks_completed += 1;
                finished.push(task);
            } else {
                queue.push_back(task);
            }
        }

        debug!(quantum, queued = queue.len(), done = finished.len(), "quantum complete");
    }

    finished.sort_by_key(|t| t.id);
    Ok(SimOutcome {
        schedule,
        tasks: finished,
        stats,
    })
}
