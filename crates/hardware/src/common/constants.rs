//! Machine geometry fixed by the modeled core.
//!
//! These are structural constants, not tunables: array shapes and loop bounds
//! throughout the pipeline are sized by them. Tunable parameters (buffer
//! capacities, per-cycle caps, cycle counts) live in [`crate::config`].

/// Number of hardware thread slots the machine exposes.
///
/// A quantum's scheduled tasks occupy between one and all four slots; a
/// task's category decides how many slots it fills (see
/// [`crate::task::TaskCategory`]).
pub const SMT_WIDTH: usize = 4;

/// Number of parallel decode lanes fed from the instruction fetch buffers.
pub const DECODE_LANES: usize = 2;

/// Selection sizes a scheduler may hand to the driver.
///
/// The machine runs a quantum in ST (1 thread), SMT2, or SMT4 mode; any other
/// task count is rejected at the driver boundary.
pub const VALID_SELECTION_SIZES: [usize; 3] = [1, 2, SMT_WIDTH];
