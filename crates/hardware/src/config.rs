//! Configuration system for the simulator.
//!
//! This module defines all configuration structures used to parameterize a
//! run. It provides:
//! 1. **Defaults:** Baseline machine constants (fetch width, buffer depths, dispatch caps).
//! 2. **Structures:** Hierarchical config for the pipeline, the scheduler, and the driver.
//! 3. **Policy switches:** Branch-redirect target and completion-report scope.
//!
//! Configuration is supplied as JSON (see [`Config::from_json`]) or via
//! `Config::default()`.

use serde::Deserialize;

/// Default configuration constants for the simulator.
///
/// These values define the baseline machine when not explicitly overridden.
pub mod defaults {
    /// Consecutive instructions fetched from one thread per cycle.
    pub const FETCH_WIDTH: usize = 8;

    /// Capacity of each per-thread instruction fetch buffer.
    pub const IFB_CAPACITY: usize = 26;

    /// Instructions each decode sub-stage holds and completes per cycle.
    pub const DECODE_WIDTH: usize = 3;

    /// Entries in each execution issue queue.
    pub const ISSUE_QUEUE_CAPACITY: usize = 13;

    /// Branch instructions dispatched per cycle.
    pub const BRANCH_CAP: usize = 2;

    /// Calc (VSU/FX/NOP) instructions dispatched per cycle.
    pub const CALC_CAP: usize = 4;

    /// Load/store instructions dispatched per cycle.
    pub const LOADSTORE_CAP: usize = 4;

    /// Execution slices available for calc and load/store work.
    pub const SLICES: usize = 4;

    /// Clock cycles simulated per scheduling quantum.
    pub const CYCLES_PER_QUANTUM: u64 = 100;

    /// Score penalty per already-selected task of the same category.
    pub const DUPLICATE_PENALTY: f64 = 2.0;

    /// Seed for the injected branch-resolution generator.
    pub const SEED: u64 = 0x5EED_CAFE;
}

/// Where a taken branch's resolved target lands during fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectTarget {
    /// Apply the target delta to the round-robin fetch rotation (historical
    /// behavior of this machine model).
    #[default]
    FetchSlot,
    /// Apply the target delta to the branching task's own instruction
    /// cursor, giving real intra-task control flow.
    TaskCursor,
}

/// Pipeline-engine parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Consecutive instructions fetched from one thread per cycle.
    pub fetch_width: usize,
    /// Capacity of each per-thread instruction fetch buffer.
    pub ifb_capacity: usize,
    /// Instructions each decode sub-stage holds and completes per cycle.
    pub decode_width: usize,
    /// Entries in each execution issue queue.
    pub issue_queue_capacity: usize,
    /// Branch instructions dispatched per cycle.
    pub branch_cap: usize,
    /// Calc instructions dispatched per cycle.
    pub calc_cap: usize,
    /// Load/store instructions dispatched per cycle.
    pub loadstore_cap: usize,
    /// Execution slices available for calc and load/store work.
    pub slices: usize,
    /// Where a taken branch's resolved target lands.
    pub redirect: RedirectTarget,
    /// Include branch-pipeline retirements in the per-cycle completion list.
    pub report_branch_retires: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_width: defaults::FETCH_WIDTH,
            ifb_capacity: defaults::IFB_CAPACITY,
            decode_width: defaults::DECODE_WIDTH,
            issue_queue_capacity: defaults::ISSUE_QUEUE_CAPACITY,
            branch_cap: defaults::BRANCH_CAP,
            calc_cap: defaults::CALC_CAP,
            loadstore_cap: defaults::LOADSTORE_CAP,
            slices: defaults::SLICES,
            redirect: RedirectTarget::default(),
            report_branch_retires: false,
        }
    }
}

/// Scheduler parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedConfig {
    /// Score penalty per already-selected task of the same category.
    pub duplicate_penalty: f64,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            duplicate_penalty: defaults::DUPLICATE_PENALTY,
        }
    }
}

/// Driver parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Clock cycles simulated per scheduling quantum (cycle mode).
    pub cycles_per_quantum: u64,
    /// Seed for the injected branch-resolution generator.
    pub seed: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            cycles_per_quantum: defaults::CYCLES_PER_QUANTUM,
            seed: defaults::SEED,
        }
    }
}

/// Root configuration type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline-engine parameters.
    pub pipeline: PipelineConfig,
    /// Scheduler parameters.
    pub sched: SchedConfig,
    /// Driver parameters.
    pub driver: DriverConfig,
}

impl Config {
    /// Parses a configuration from a JSON document.
    ///
    /// Missing fields fall back to their defaults, so a partial override like
    /// `{"driver": {"seed": 1}}` is valid.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error for malformed input.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
