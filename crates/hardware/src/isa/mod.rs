//! Instruction model for the simulated core.
//!
//! This module defines the closed set of instruction kinds the machine
//! executes and the branch resolution state machine:
//! 1. **`Inst`:** A tagged instruction record; only the `Branch` variant carries state.
//! 2. **`Branch` / `BranchMode`:** Control-flow resolution — probabilistic, counted-loop, compare, and return semantics.
//! 3. **`DispatchClass`:** How the dispatch logic routes each kind to an execution resource.
//!
//! Instructions model occupancy of pipeline resources, not architectural
//! semantics: there are no registers, immediates, or memory addresses here.
//! Branch targets are relative instruction-index deltas resolved by the
//! loader.

use rand::Rng;

/// A single instruction in a task's stream.
///
/// Every non-branch kind is a stateless opcode: it flows through the pipeline
/// and occupies the execution resource its [`DispatchClass`] names. `Branch`
/// is the one stateful variant — its payload carries the control-flow
/// resolution state mutated during fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    /// Vector/scalar (floating-point and vector) operation.
    Vsu,
    /// Load or store.
    Lsu,
    /// Fixed-point (integer) operation.
    Fx,
    /// Cryptographic operation.
    Crypto,
    /// Decimal floating-point operation.
    Dfu,
    /// Control/system operation.
    Ctrl,
    /// No-op; occupies a calc slot on the FX pipe.
    Nop,
    /// Control-flow instruction with resolution state.
    Branch(Branch),
}

impl Inst {
    /// The lightweight discriminant for this instruction.
    pub fn kind(&self) -> InstKind {
        match self {
            Self::Vsu => InstKind::Vsu,
            Self::Lsu => InstKind::Lsu,
            Self::Fx => InstKind::Fx,
            Self::Crypto => InstKind::Crypto,
            Self::Dfu => InstKind::Dfu,
            Self::Ctrl => InstKind::Ctrl,
            Self::Nop => InstKind::Nop,
            Self::Branch(_) => InstKind::Branch,
        }
    }

    /// The execution resource dispatch routes this instruction to.
    ///
    /// Returns `None` for kinds the modeled dispatch logic has no path for;
    /// encountering one at dispatch is fatal
    /// ([`SimError::Undispatchable`](crate::common::SimError::Undispatchable)).
    pub fn dispatch_class(&self) -> Option<DispatchClass> {
        match self {
            Self::Branch(_) => Some(DispatchClass::Branch),
            Self::Vsu | Self::Fx | Self::Nop => Some(DispatchClass::Calc),
            Self::Lsu => Some(DispatchClass::LoadStore),
            Self::Crypto | Self::Dfu | Self::Ctrl => None,
        }
    }

    /// Whether this instruction is a function return.
    pub fn is_ret(&self) -> bool {
        matches!(
            self,
            Self::Branch(Branch {
                mode: BranchMode::Ret,
                ..
            })
        )
    }
}

/// Instruction discriminant without payload, for stats and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstKind {
    /// Vector/scalar operation.
    Vsu,
    /// Load or store.
    Lsu,
    /// Fixed-point operation.
    Fx,
    /// Cryptographic operation.
    Crypto,
    /// Decimal floating-point operation.
    Dfu,
    /// Control/system operation.
    Ctrl,
    /// No-op.
    Nop,
    /// Control-flow instruction.
    Branch,
}

impl std::fmt::Display for InstKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Vsu => "VSU",
            Self::Lsu => "LSU",
            Self::Fx => "FX",
            Self::Crypto => "CRYPTO",
            Self::Dfu => "DFU",
            Self::Ctrl => "CTRL",
            Self::Nop => "NOP",
            Self::Branch => "BRANCH",
        };
        write!(f, "{name}")
    }
}

/// The execution resource class an instruction dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchClass {
    /// Branch pipeline.
    Branch,
    /// Calc slot of an execution slice (VSU/FX pipes).
    Calc,
    /// Load/store slot of an execution slice (LSU pipe).
    LoadStore,
}

/// How a branch decides whether it is taken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BranchMode {
    /// Taken when the stored probability meets a fresh uniform draw.
    Prob(f64),
    /// Taken while the encounter counter stays at or below the limit.
    ///
    /// A limit of zero disables the branch: it is never taken.
    Until(u32),
    /// Taken once the encounter counter reaches the threshold.
    ///
    /// A threshold of zero disables the branch: it is never taken.
    From(u32),
    /// A compare; never a control-flow transfer by itself.
    Cmp,
    /// Function return: always taken, and marks its task complete when it
    /// retires from the branch pipeline.
    Ret,
}

/// Control-flow resolution state carried by a branch instruction.
///
/// The counter lives in the task's own instruction stream, so loop progress
/// persists across fetches of the same branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Resolution mode.
    pub mode: BranchMode,
    /// Relative target as a signed instruction-index offset.
    pub delta: i64,
    /// Encounters so far (UNTIL/FROM modes).
    pub counter: u32,
    /// Reset the counter each time the branch resolves taken.
    pub reset_on_taken: bool,
}

impl Branch {
    /// A branch taken with the given probability.
    pub fn prob(probability: f64, delta: i64) -> Self {
        Self {
            mode: BranchMode::Prob(probability),
            delta,
            counter: 0,
            reset_on_taken: false,
        }
    }

    /// A loop-style branch taken on the first `limit` encounters.
    pub fn until(limit: u32, delta: i64) -> Self {
        debug_assert!(limit > 0, "an UNTIL branch with limit 0 is never taken");
        Self {
            mode: BranchMode::Until(limit),
            delta,
            counter: 0,
            reset_on_taken: false,
        }
    }

    /// A branch not taken until the `threshold`-th encounter.
    pub fn after(threshold: u32, delta: i64) -> Self {
        Self {
            mode: BranchMode::From(threshold),
            delta,
            counter: 0,
            reset_on_taken: false,
        }
    }

    /// A compare marker.
    pub fn cmp() -> Self {
        Self {
            mode: BranchMode::Cmp,
            delta: 0,
            counter: 0,
            reset_on_taken: false,
        }
    }

    /// A function return.
    pub fn ret() -> Self {
        Self {
            mode: BranchMode::Ret,
            delta: 0,
            counter: 0,
            reset_on_taken: false,
        }
    }

    /// Reset the counter each time this branch resolves taken.
    pub fn with_reset(mut self) -> Self {
        self.reset_on_taken = true;
        self
    }

    /// Resolves the branch for one encounter, returning whether it is taken.
    ///
    /// UNTIL/FROM increment their counter on every encounter, taken or not;
    /// PROB consumes one draw from the injected generator. A compare never
    /// transfers.
    pub fn resolve<R: Rng>(&mut self, rng: &mut R) -> bool {
        match self.mode {
            BranchMode::Ret => true,
            BranchMode::Cmp => false,
            BranchMode::Prob(probability) => probability >= rng.r#gen::<f64>(),
            BranchMode::Until(limit) => {
                if limit == 0 {
                    return false;
                }
                self.counter += 1;
                let taken = self.counter <= limit;
                if taken && self.reset_on_taken {
                    self.counter = 0;
                }
                taken
            }
            BranchMode::From(threshold) => {
                if threshold == 0 {
                    return false;
                }
                self.counter += 1;
                let taken = self.counter >= threshold;
                if taken && self.reset_on_taken {
                    self.counter = 0;
                }
                taken
            }
        }
    }
}
