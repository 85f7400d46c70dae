//! Selection contract tests.
//!
//! Verifies, across all three policies:
//!   1. Selection sizes — every selection holds 1, 2, or 4 tasks
//!   2. Exact removal — selected tasks leave the queue, others stay
//!   3. No duplicates — a task is never selected twice in one quantum
//!   4. Slot-fill packing — selections never oversubscribe the machine width
//!   5. Diversity scoring — even-slot spreads categories under pressure

use pretty_assertions::assert_eq;
use rstest::rstest;

use smtsim_core::common::constants::SMT_WIDTH;
use smtsim_core::config::SchedConfig;
use smtsim_core::sched::Policy;
use smtsim_core::task::TaskCategory;

use crate::common::queue_of;

use TaskCategory::{Fp, Fx, Io, Mem};

// ══════════════════════════════════════════════════════════
// 1. Cross-policy invariants
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::round_robin(Policy::RoundRobin)]
#[case::slot_fill(Policy::SlotFill)]
#[case::even_slot(Policy::EvenSlot)]
fn selections_always_have_a_valid_size(#[case] policy: Policy) {
    let cfg = SchedConfig::default();
    for n in 1..=9 {
        let mut queue = queue_of(&vec![Mem; n]);
        while !queue.is_empty() {
            let before = queue.len();
            let selected = policy.select(&mut queue, &cfg).unwrap();
            assert!(
                matches!(selected.len(), 1 | 2 | 4),
                "policy {policy:?} over {n} tasks produced a selection of {}",
                selected.len()
            );
            assert_eq!(queue.len(), before - selected.len());
        }
    }
}

#[rstest]
#[case::round_robin(Policy::RoundRobin)]
#[case::slot_fill(Policy::SlotFill)]
#[case::even_slot(Policy::EvenSlot)]
fn no_task_is_selected_twice(#[case] policy: Policy) {
    let cfg = SchedConfig::default();
    let mut queue = queue_of(&[Mem, Fx, Io, Fp, Mem, Io, Fx, Mem]);
    let mut seen = std::collections::HashSet::new();
    while !queue.is_empty() {
        for task in policy.select(&mut queue, &cfg).unwrap() {
            assert!(seen.insert(task.id), "task {} selected twice", task.id);
        }
    }
}

// ══════════════════════════════════════════════════════════
// 2. Round-robin order
// ══════════════════════════════════════════════════════════

#[test]
fn round_robin_preserves_arrival_order() {
    let cfg = SchedConfig::default();
    let mut queue = queue_of(&[Mem, Fx, Io, Fp, Mem]);
    let first = Policy::RoundRobin.select(&mut queue, &cfg).unwrap();
    let ids: Vec<usize> = first.iter().map(|t| t.id.0).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

// ══════════════════════════════════════════════════════════
// 3. Slot-fill width packing
// ══════════════════════════════════════════════════════════

#[test]
fn slot_fill_never_oversubscribes_the_machine() {
    let cfg = SchedConfig::default();
    let mixes: [&[TaskCategory]; 4] = [
        &[Fx, Mem, Io],
        &[Mem, Io, Mem, Fx, Fp, Io],
        &[Fx, Fp, Fx, Fp],
        &[Mem, Mem, Mem, Mem, Fx],
    ];
    for mix in mixes {
        let mut queue = queue_of(mix);
        while !queue.is_empty() {
            let selected = Policy::SlotFill.select(&mut queue, &cfg).unwrap();
            let slots: usize = selected.iter().map(|t| t.width()).sum();
            assert!(
                slots <= SMT_WIDTH,
                "selection {:?} fills {slots} slots",
                selected.iter().map(|t| t.id.0).collect::<Vec<_>>()
            );
        }
    }
}

#[test]
fn slot_fill_pairs_a_wide_top_with_one_narrow_task() {
    // Widths [2, 1, 1]: the pair rule admits exactly one narrow partner.
    let cfg = SchedConfig::default();
    let mut queue = queue_of(&[Fx, Mem, Io]);
    let selected = Policy::SlotFill.select(&mut queue, &cfg).unwrap();
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0].id.0, 0);
    assert_eq!(selected[1].width(), 1);
}

// ══════════════════════════════════════════════════════════
// 4. Even-slot diversity
// ══════════════════════════════════════════════════════════

#[test]
fn even_slot_prefers_unseen_categories() {
    // Six tasks [X, X, X, Y, Y, Z]: the mandatory first X should be joined
    // by Y and Z before any further X.
    let cfg = SchedConfig::default();
    let mut queue = queue_of(&[Mem, Mem, Mem, Io, Io, Fp]);
    let selected = Policy::EvenSlot.select(&mut queue, &cfg).unwrap();
    let categories: Vec<TaskCategory> = selected.iter().map(|t| t.category).collect();

    assert_eq!(selected[0].id.0, 0);
    assert!(categories.contains(&Io));
    assert!(categories.contains(&Fp));
    assert_eq!(categories.iter().filter(|&&c| c == Mem).count(), 2);
}

#[test]
fn even_slot_breaks_ties_by_queue_position() {
    let cfg = SchedConfig::default();
    let mut queue = queue_of(&[Mem, Io, Io, Io, Io, Io]);
    let selected = Policy::EvenSlot.select(&mut queue, &cfg).unwrap();
    let ids: Vec<usize> = selected.iter().map(|t| t.id.0).collect();
    // After the mandatory first pick, every peeked Io scores alike, so
    // selection follows queue order.
    assert_eq!(ids, vec![0, 1, 2, 3]);
}
