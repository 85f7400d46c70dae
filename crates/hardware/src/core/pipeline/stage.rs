//! Bounded buffers and the pipeline stage primitive.
//!
//! Two layers:
//! 1. **[`Bounded`]:** a fixed-capacity ordered container. Insertion reports
//!    refusal through its return value instead of failing silently.
//! 2. **[`Stage`]:** one pipeline node — a bounded buffer with a per-cycle
//!    completion rate and an optional upstream stage it pulls from.
//!
//! The stage contract couples retirement and refill in a single cycle:
//! `forward` first removes up to `rate` items from the front, then refills
//! from the upstream stage's own `forward`, so capacity is always evaluated
//! after this cycle's outflow. A stage with no upstream never auto-refills;
//! it is filled only by explicit [`Stage::issue`] calls (issue queues) or by
//! [`Stage::feed`] into the root of a chain (decode intake).

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::common::error::SimError;
use crate::core::pipeline::InFlight;

/// Fixed-capacity ordered container.
#[derive(Debug, Clone)]
pub struct Bounded<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> Bounded<T> {
    /// Creates an empty buffer holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Appends `item`, reporting whether it was accepted.
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push_back(item);
        true
    }

    /// Appends as many of `items` as fit, returning how many were dropped.
    pub fn extend_lossy(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        let mut dropped = 0;
        for item in items {
            if !self.push(item) {
                dropped += 1;
            }
        }
        dropped
    }

    /// Removes and returns the front item.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Removes and returns up to `n` items from the front.
    pub fn drain_front(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Iterates the buffer front to back.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> {
        self.items.iter()
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of items this buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free entries at this moment.
    pub fn free(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }
}

/// One pipeline node: a bounded buffer with a per-cycle completion rate and
/// an optional upstream stage.
#[derive(Debug)]
pub struct Stage {
    name: &'static str,
    slots: Bounded<InFlight>,
    rate: usize,
    upstream: Option<Box<Stage>>,
}

impl Stage {
    /// Creates a root stage: never auto-refills, filled only externally.
    pub fn source(name: &'static str, capacity: usize, rate: usize) -> Self {
        Self {
            name,
            slots: Bounded::new(capacity),
            rate,
            upstream: None,
        }
    }

    /// An unbounded pass-through root used as the intake of a chain: every
    /// cycle it forwards everything it was fed.
    pub fn intake(name: &'static str) -> Self {
        Self::source(name, usize::MAX, usize::MAX)
    }

    /// Chains a new stage downstream of `self`.
    pub fn then(self, name: &'static str, capacity: usize, rate: usize) -> Self {
        Self {
            name,
            slots: Bounded::new(capacity),
            rate,
            upstream: Some(Box::new(self)),
        }
    }

    /// The root of this chain (the stage with no upstream).
    pub fn root_mut(&mut self) -> &mut Self {
        match self.upstream {
            Some(ref mut up) => up.root_mut(),
            None => self,
        }
    }

    /// Immutable view of the chain root.
    pub fn root(&self) -> &Self {
        match self.upstream {
            Some(ref up) => up.root(),
            None => self,
        }
    }

    /// Retires up to `rate` items from the front, then refills from upstream.
    ///
    /// On an empty chain this returns an empty list; it never fails.
    pub fn forward(&mut self) -> Vec<InFlight> {
        let retired = self.slots.drain_front(self.rate);
        self.refill();
        trace!(stage = self.name, retired = retired.len(), held = self.slots.len(), "forward");
        retired
    }

    /// Retires exactly the flagged positions, then refills from upstream.
    ///
    /// `mask` must cover the buffered items one-to-one, and the number of
    /// flagged positions must not exceed the completion rate; unflagged items
    /// keep their order and stay for a later cycle.
    pub fn forward_masked(&mut self, mask: &[bool]) -> Vec<InFlight> {
        debug_assert_eq!(mask.len(), self.slots.len(), "{}: mask shape", self.name);
        debug_assert!(
            mask.iter().filter(|&&keep| keep).count() <= self.rate,
            "{}: mask exceeds completion rate",
            self.name
        );

        let mut retired = Vec::new();
        let mut kept = VecDeque::new();
        for (i, item) in self.slots.items.drain(..).enumerate() {
            if mask.get(i).copied().unwrap_or(false) {
                retired.push(item);
            } else {
                kept.push_back(item);
            }
        }
        self.slots.items = kept;
        self.refill();
        trace!(stage = self.name, retired = retired.len(), held = self.slots.len(), "forward");
        retired
    }

    /// Explicitly inserts instructions into a root stage (issue queues).
    ///
    /// # Errors
    ///
    /// [`SimError::IssueOverflow`] when `items` exceeds the free capacity;
    /// issue sizing is the caller's contract, unlike implicit refill.
    pub fn issue(&mut self, items: Vec<InFlight>) -> Result<(), SimError> {
        debug_assert!(self.upstream.is_none(), "{}: issue into a chained stage", self.name);
        if items.len() > self.slots.free() {
            return Err(SimError::IssueOverflow {
                queue: self.name,
                free: self.slots.free(),
                offered: items.len(),
            });
        }
        for item in items {
            let _ = self.slots.push(item);
        }
        Ok(())
    }

    /// Feeds items into the root of this chain, dropping overflow.
    pub fn feed(&mut self, items: Vec<InFlight>) {
        let root = self.root_mut();
        let name = root.name;
        let dropped = root.slots.extend_lossy(items);
        if dropped > 0 {
            warn!(stage = name, dropped, "intake overflow");
        }
    }

    fn refill(&mut self) {
        if let Some(ref mut up) = self.upstream {
            let incoming = up.forward();
            let dropped = self.slots.extend_lossy(incoming);
            if dropped > 0 {
                warn!(stage = self.name, dropped, "refill overflow");
            }
        }
    }

    /// Non-destructive view of the buffered items, front first.
    pub fn peek(&self) -> impl ExactSizeIterator<Item = &InFlight> {
        self.slots.iter()
    }

    /// Instructions of `task` buffered anywhere along this chain.
    pub fn count_task(&self, task: crate::task::TaskId) -> usize {
        let here = self.slots.iter().filter(|i| i.task == task).count();
        match self.upstream {
            Some(ref up) => here + up.count_task(task),
            None => here,
        }
    }

    /// Number of buffered items in this stage (not the chain).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether this stage buffers nothing.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Free entries at this moment.
    pub fn free(&self) -> usize {
        self.slots.free()
    }

    /// Stage name, for logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }
}
