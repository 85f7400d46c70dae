//! Scheduling algorithm contracts.

/// Cross-policy selection invariants and per-policy behavior.
pub mod selection;
