//! Full simulation runs.
//!
//! Verifies the driver's end-to-end contracts:
//!   1. Schedules are dense from quantum zero and every quantum holds 1/2/4 tasks
//!   2. Completed tasks never reappear in a later quantum
//!   3. Machine width is never oversubscribed under slot-fill
//!   4. Loader output drives to completion in both modes
//!   5. Identical seeds reproduce identical schedules

use pretty_assertions::assert_eq;
use rstest::rstest;

use smtsim_core::Config;
use smtsim_core::common::constants::SMT_WIDTH;
use smtsim_core::sched::Policy;
use smtsim_core::sim::driver::{Arrival, SimMode, run_to_exhaustion};
use smtsim_core::sim::loader::parse_dump;
use smtsim_core::task::{Task, TaskCategory, TaskId};

use crate::common::TaskBuilder;

fn fixture(categories: &[TaskCategory]) -> Vec<Arrival> {
    categories
        .iter()
        .enumerate()
        .map(|(id, &category)| {
            Arrival::immediate(
                TaskBuilder::new(id)
                    .category(category)
                    .lsu(3 + id % 4)
                    .ret()
                    .build(),
            )
        })
        .collect()
}

// ══════════════════════════════════════════════════════════
// 1. Schedule shape
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::round_robin(Policy::RoundRobin)]
#[case::slot_fill(Policy::SlotFill)]
#[case::even_slot(Policy::EvenSlot)]
fn schedules_are_dense_and_validly_sized(#[case] policy: Policy) {
    use TaskCategory::{Fp, Fx, Io, Mem};
    let arrivals = fixture(&[Mem, Fx, Io, Mem, Fp, Io, Mem]);
    let outcome =
        run_to_exhaustion(arrivals, policy, SimMode::Quantum, &Config::default()).unwrap();

    for (expected, (quantum, ids)) in outcome.schedule.iter().enumerate() {
        assert_eq!(quantum, expected as u64);
        assert!(matches!(ids.len(), 1 | 2 | 4));
    }
    assert_eq!(outcome.tasks.len(), 7);
    assert!(outcome.tasks.iter().all(Task::is_complete));
}

#[test]
fn completed_tasks_never_reappear() {
    use TaskCategory::{Fx, Io, Mem};
    let arrivals = fixture(&[Mem, Fx, Io, Mem, Io]);
    let outcome = run_to_exhaustion(
        arrivals,
        Policy::RoundRobin,
        SimMode::Quantum,
        &Config::default(),
    )
    .unwrap();

    for task in &outcome.tasks {
        let done = task.completed_at.unwrap();
        let late_runs: Vec<u64> = task.ran_at.iter().copied().filter(|&q| q > done).collect();
        assert!(late_runs.is_empty(), "{} ran at {late_runs:?} after completing", task.id);
        for (quantum, ids) in outcome.schedule.iter() {
            if quantum > done {
                assert!(!ids.contains(&task.id));
            }
        }
    }
}

#[test]
fn slot_fill_schedules_never_oversubscribe_width() {
    use TaskCategory::{Fp, Fx, Io, Mem};
    let arrivals = fixture(&[Fx, Mem, Fp, Io, Mem, Fx, Io, Mem]);
    let outcome = run_to_exhaustion(
        arrivals,
        Policy::SlotFill,
        SimMode::Quantum,
        &Config::default(),
    )
    .unwrap();

    let width_of = |id: TaskId| {
        outcome
            .tasks
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.width())
            .unwrap()
    };
    for (_, ids) in outcome.schedule.iter() {
        let slots: usize = ids.iter().map(|&id| width_of(id)).sum();
        assert!(slots <= SMT_WIDTH);
    }
}

// ══════════════════════════════════════════════════════════
// 2. Loader-to-driver integration
// ══════════════════════════════════════════════════════════

const DUMP: &str = "\
10000300 <worker>:
10000300:\t38 63 00 01\taddi r3,r3,1
10000304:\t7c 23 18 40\tcmpd r3,r3
10000308:\t48 00 00 11\tb 10000300\tu:3
1000030c:\te8 61 00 10\tld r3,16(r1)
10000310:\tf8 61 00 18\tstd r3,24(r1)
10000314:\t4e 80 00 20\tblr
";

#[rstest]
#[case::quantum(SimMode::Quantum)]
#[case::cycle(SimMode::Cycle)]
fn loaded_tasks_run_to_completion(#[case] mode: SimMode) {
    let tasks = parse_dump(DUMP, &[("worker".to_string(), 2)]).unwrap();
    let arrivals = tasks.into_iter().map(Arrival::immediate).collect();
    let outcome =
        run_to_exhaustion(arrivals, Policy::RoundRobin, mode, &Config::default()).unwrap();

    assert_eq!(outcome.tasks.len(), 2);
    assert!(outcome.tasks.iter().all(Task::is_complete));
    assert!(!outcome.schedule.is_empty());
}

// ══════════════════════════════════════════════════════════
// 3. Determinism
// ══════════════════════════════════════════════════════════

#[test]
fn identical_seeds_reproduce_identical_schedules() {
    let run = || {
        let tasks = parse_dump(DUMP, &[("worker".to_string(), 4)]).unwrap();
        let arrivals = tasks.into_iter().map(Arrival::immediate).collect();
        run_to_exhaustion(arrivals, Policy::RoundRobin, SimMode::Cycle, &Config::default())
            .unwrap()
    };
    let a = run();
    let b = run();
    let flat = |outcome: &smtsim_core::sim::driver::SimOutcome| {
        outcome
            .schedule
            .iter()
            .map(|(q, ids)| (q, ids.to_vec()))
            .collect::<Vec<_>>()
    };
    assert_eq!(flat(&a), flat(&b));
    assert_eq!(
        a.tasks.iter().map(|t| t.completed_at).collect::<Vec<_>>(),
        b.tasks.iter().map(|t| t.completed_at).collect::<Vec<_>>()
    );
}
