//! Quantum selection algorithms.
//!
//! Each algorithm removes the tasks it selects from the run queue and returns
//! them with the mandatory front task first. All of them uphold the driver
//! contract: a selection holds 1, 2, or 4 tasks. Invoking any of them on an
//! empty queue is a fatal precondition violation.
//!
//! Width-aware passes scan the queue by index from the tail and remove
//! matches by position once the scan has settled, so no pass ever iterates a
//! queue it is mutating.

use std::collections::HashMap;

use tracing::debug;

use crate::common::constants::SMT_WIDTH;
use crate::common::error::SimError;
use crate::config::SchedConfig;
use crate::sched::runqueue::RunQueue;
use crate::task::{Task, TaskCategory};

/// Selection algorithm for the next quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    /// Take the front of the queue, ignoring category width.
    #[default]
    RoundRobin,
    /// Width-aware bin-packing around the front task.
    SlotFill,
    /// Category-diversity scoring across the front of the queue.
    EvenSlot,
}

impl Policy {
    /// Selects the tasks that will occupy the machine for the next quantum.
    ///
    /// Removes exactly the returned tasks from `queue`.
    ///
    /// # Errors
    ///
    /// [`SimError::EmptyRunQueue`] when invoked against an empty queue.
    pub fn select(self, queue: &mut RunQueue, cfg: &SchedConfig) -> Result<Vec<Task>, SimError> {
        if queue.is_empty() {
            return Err(SimError::EmptyRunQueue);
        }
        let selected = match self {
            Self::RoundRobin => round_robin(queue),
            Self::SlotFill => slot_fill(queue),
            Self::EvenSlot => even_slot(queue, cfg.duplicate_penalty),
        }?;
        debug!(
            policy = ?self,
            picked = ?selected.iter().map(|t| t.id.0).collect::<Vec<_>>(),
            left = queue.len(),
            "quantum selection"
        );
        Ok(selected)
    }
}

impl std::str::FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" => Ok(Self::RoundRobin),
            "slot-fill" => Ok(Self::SlotFill),
            "even-slot" => Ok(Self::EvenSlot),
            other => Err(format!(
                "unknown policy {other:?} (expected round-robin, slot-fill, or even-slot)"
            )),
        }
    }
}

/// Pops the largest valid selection the queue can supply: four tasks when at
/// least four are ready, otherwise two, otherwise one. Category width is
/// ignored entirely.
fn round_robin(queue: &mut RunQueue) -> Result<Vec<Task>, SimError> {
    let n = match queue.len() {
        0 => return Err(SimError::EmptyRunQueue),
        1 => 1,
        2..=3 => 2,
        _ => SMT_WIDTH,
    };
    Ok(queue.pop_n(n))
}

/// Width-aware bin-packing around the front task.
///
/// The front task is mandatory. Its width decides how many slots remain and
/// which fill pattern applies: none (wide pair already full), one width-2
/// partner scanned from the tail, or up to three width-1 partners scanned
/// from the tail. Selected partners are removed at their queue positions; the
/// front task leads the result.
fn slot_fill(queue: &mut RunQueue) -> Result<Vec<Task>, SimError> {
    if queue.len() < 2 {
        return Ok(queue.pop_n(1));
    }

    let top = queue.pop_front().ok_or(SimError::EmptyRunQueue)?;
    let remaining = SMT_WIDTH - top.width();

    if remaining <= 1 {
        // A width-4 or width-3 residue cannot host even a width-1 partner.
        return Ok(vec![top]);
    }

    if remaining == 2 {
        // Most recently inserted width-2 task, else the front-most remaining.
        let partner = match (0..queue.len()).rev().find(|&i| {
            queue.get(i).map(Task::width) == Some(2)
        }) {
            Some(i) => queue.remove(i),
            None => queue.pop_front(),
        };
        let mut selected = vec![top];
        selected.extend(partner);
        return Ok(selected);
    }

    // remaining == 3: up to three width-1 partners, most recent first.
    let mut picked: Vec<usize> = Vec::with_capacity(3);
    for i in (0..queue.len()).rev() {
        if queue.get(i).map(Task::width) == Some(1) {
            picked.push(i);
            if picked.len() == 3 {
                break;
            }
        }
    }

    if picked.len() == 2 {
        // Two width-1 partners found; try any other task for the last slot,
        // unless its width would oversubscribe the machine.
        let filler = (0..queue.len())
            .rev()
            .find(|i| !picked.contains(i))
            .filter(|&i| {
                let used = top.width() + 2;
                queue.get(i).is_some_and(|t| used + t.width() <= SMT_WIDTH)
            });
        match filler {
            Some(i) => picked.push(i),
            // Three runnable threads but only room schedulable as two:
            // drop the most recent partner and run an SMT2 quantum.
            None => {
                let _ = picked.pop();
            }
        }
    }

    // Indices were gathered tail-first (descending), so positional removal
    // is stable without re-adjustment.
    picked.sort_unstable_by(|a, b| b.cmp(a));
    let mut partners: Vec<Task> = Vec::with_capacity(picked.len());
    for i in picked {
        partners.extend(queue.remove(i));
    }

    let mut selected = vec![top];
    selected.extend(partners);
    Ok(selected)
}

/// Category-diversity scoring across the front of the queue.
///
/// Small queues degrade to round-robin. Otherwise the front task is the
/// mandatory first pick; each further pick peeks up to four upcoming tasks
/// and takes the one whose category has been selected the least this
/// quantum, removing it at its position. Ties go to the earliest position.
fn even_slot(queue: &mut RunQueue, duplicate_penalty: f64) -> Result<Vec<Task>, SimError> {
    if queue.len() <= SMT_WIDTH {
        return round_robin(queue);
    }

    let first = queue.pop_front().ok_or(SimError::EmptyRunQueue)?;
    let mut picks: HashMap<TaskCategory, usize> = HashMap::new();
    let _ = picks.insert(first.category, 1);
    let mut selected = vec![first];

    while selected.len() < SMT_WIDTH {
        let slots_left = SMT_WIDTH - selected.len();
        if queue.len() <= slots_left {
            // Exactly enough (or fewer) tasks left to fill the quantum.
            selected.extend(queue.drain_all());
            break;
        }

        let window = queue.len().min(SMT_WIDTH);
        let mut best: Option<(usize, f64)> = None;
        for i in 0..window {
            let category = queue.get(i).map(|t| t.category);
            let Some(category) = category else { break };
            let score =
                picks.get(&category).copied().unwrap_or(0) as f64 * duplicate_penalty;
            let better = best.is_none_or(|(_, s)| score < s);
            if better {
                best = Some((i, score));
            }
        }

        let Some((index, _)) = best else { break };
        let Some(task) = queue.remove(index) else {
            break;
        };
        *picks.entry(task.category).or_insert(0) += 1;
        selected.push(task);
    }

    Ok(selected)
}
