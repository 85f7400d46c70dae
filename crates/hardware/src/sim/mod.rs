//! Simulation setup and driving.
//!
//! 1. **`driver`:** Runs quanta to exhaustion — either consuming one
//!    instruction per scheduled task per quantum, or ticking the full
//!    pipeline engine cycle-by-cycle — and records the schedule.
//! 2. **`loader`:** Parses textual disassembly dumps into tasks.

/// Quantum and cycle drivers.
pub mod driver;
/// Disassembly dump loader.
pub mod loader;

pub use driver::{Arrival, Schedule, SimMode, SimOutcome, run_to_exhaustion};
pub use loader::{LoadError, load_dump, parse_dump};
