//! Shared test fixtures.
//!
//! Builders for tasks and run queues so the behavioral tests read as
//! scenarios rather than setup code.

use smtsim_core::isa::{Branch, Inst};
use smtsim_core::sched::RunQueue;
use smtsim_core::task::{Task, TaskCategory};

/// Fluent builder for a task's instruction stream.
pub struct TaskBuilder {
    id: usize,
    category: TaskCategory,
    stream: Vec<Inst>,
}

impl TaskBuilder {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            category: TaskCategory::Mem,
            stream: Vec::new(),
        }
    }

    pub fn category(mut self, category: TaskCategory) -> Self {
        self.category = category;
        self
    }

    pub fn lsu(mut self, n: usize) -> Self {
        self.stream.extend(std::iter::repeat_n(Inst::Lsu, n));
        self
    }

    pub fn fx(mut self, n: usize) -> Self {
        self.stream.extend(std::iter::repeat_n(Inst::Fx, n));
        self
    }

    pub fn vsu(mut self, n: usize) -> Self {
        self.stream.extend(std::iter::repeat_n(Inst::Vsu, n));
        self
    }

    pub fn branch(mut self, branch: Branch) -> Self {
        self.stream.push(Inst::Branch(branch));
        self
    }

    /// Ends the stream with a function return.
    pub fn ret(mut self) -> Self {
        self.stream.push(Inst::Branch(Branch::ret()));
        self
    }

    pub fn build(self) -> Task {
        Task::new(self.id, self.category, self.stream)
    }
}

/// A queue of freshly built tasks with the given categories, ids 0..n.
pub fn queue_of(categories: &[TaskCategory]) -> RunQueue {
    RunQueue::from_tasks(categories.iter().enumerate().map(|(id, &category)| {
        TaskBuilder::new(id).category(category).lsu(4).build()
    }))
}
