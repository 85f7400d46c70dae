//! SMT processor simulator library.
//!
//! This crate models a simultaneous-multithreading (SMT4) processor at two
//! coupled levels:
//! 1. **Pipeline:** A cycle-stepped chain of bounded buffers — fetch, per-thread
//!    fetch buffers, decode lanes, dispatch, execution slices, and a branch
//!    pipeline — with per-cycle throughput caps and inter-stage backpressure.
//! 2. **Scheduling:** Quantum-level algorithms (round-robin, width-aware
//!    slot-fill, category-diversity scoring) deciding which tasks occupy the
//!    machine's 1/2/4 hardware thread slots.
//! 3. **Simulation:** Drivers that run either level to exhaustion, a
//!    disassembly loader producing tasks, and run statistics.
//!
//! Instructions model resource occupancy, not architectural semantics: no
//! register values or memory contents are computed anywhere.

/// Common types and constants (machine geometry, error taxonomy).
pub mod common;
/// Simulator configuration (defaults, policy switches, hierarchical structures).
pub mod config;
/// The simulated core (pipeline stages and the cycle engine).
pub mod core;
/// Instruction model (kinds, branch resolution).
pub mod isa;
/// Run queue and quantum scheduling algorithms.
pub mod sched;
/// Simulation drivers and the disassembly loader.
pub mod sim;
/// Run statistics collection and reporting.
pub mod stats;
/// Tasks and task categories.
pub mod task;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The cycle-stepping pipeline engine for one quantum's tasks.
pub use crate::core::PipelineEngine;
/// Quantum selection algorithms.
pub use crate::sched::Policy;
/// Drives a task set to exhaustion under a policy.
pub use crate::sim::driver::run_to_exhaustion;
/// A schedulable unit of work.
pub use crate::task::Task;
