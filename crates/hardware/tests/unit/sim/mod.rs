//! Driver and loader end-to-end behavior.

/// Full runs through the driver in both modes.
pub mod end_to_end;
