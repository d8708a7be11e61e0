//! Error types for IR construction, mutation and analysis.
//!
//! [`IrError`] reports precondition violations by the code building or
//! mutating the IR (a bug in the caller, not bad input). [`AnalysisError`]
//! reports CFG shapes an analysis cannot handle.

use alloc::string::String;

use crate::entity::{Use, Value};

/// Structural or precondition violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// Handle refers to an erased or never-allocated value
    #[error("stale or invalid value handle {0}")]
    StaleValue(Value),
    /// Handle refers to an erased use
    #[error("stale or invalid use handle {0}")]
    StaleUse(Use),
    /// Operand or result types do not agree
    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: &'static str,
        expected: String,
        found: String,
    },
    /// `replace_all_uses_with` called with the same value on both sides
    #[error("cannot replace all uses of {0} with itself")]
    SelfReplacement(Value),
    /// Index past the end of an operand, argument or instruction list
    #[error("{what} index {index} out of range (length {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// Operand slot was nulled by `drop_all_references`
    #[error("operand {index} of {user} is null")]
    NullOperand { user: Value, index: usize },
    /// Value does not have the kind the operation requires
    #[error("{value} is not {expected}")]
    WrongKind {
        value: Value,
        expected: &'static str,
    },
    /// Successor query on an instruction that does not end a block
    #[error("{0} is not a terminator")]
    NotATerminator(Value),
    /// Erase attempted while users still reference the value
    #[error("{value} still has {uses} use(s)")]
    ValueStillInUse { value: Value, uses: usize },
    /// Operation needs the value to be placed in a container
    #[error("{0} has no parent")]
    NoParent(Value),
    /// Value is already placed in a container
    #[error("{0} already has a parent")]
    AlreadyInserted(Value),
    /// A type cannot be used the way it was requested
    #[error("invalid type: {reason}")]
    InvalidType { reason: &'static str },
}

/// Failure of a CFG analysis.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// The function has no basic blocks
    #[error("function {0} has no entry block")]
    NoEntryBlock(Value),
    /// Query about a block the analysis never reached from the entry
    #[error("block {0} is not reachable from the entry block")]
    UnreachableBlock(Value),
    /// `intersect` walked up past the root of the dominator tree
    #[error("dominator walk from {0} passed the root")]
    WalkedPastRoot(Value),
    /// The fixed point did not stabilize within the iteration cap
    #[error("dominator computation did not converge after {iterations} passes")]
    NotConverged { iterations: usize },
    /// Structural error while reading the CFG
    #[error(transparent)]
    Ir(#[from] IrError),
}
