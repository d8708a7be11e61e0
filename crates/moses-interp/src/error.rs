//! Error types for the interpreter.

use moses_ir::{IrError, Opcode, Value};

/// Kind of memory access that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccessKind {
    Read,
    Write,
}

impl core::fmt::Display for MemoryAccessKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            MemoryAccessKind::Read => "read",
            MemoryAccessKind::Write => "write",
        })
    }
}

/// Runtime failure of the interpreted program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    #[error("division by zero")]
    DivisionByZero,
    #[error("null pointer {kind}")]
    NullPointer { kind: MemoryAccessKind },
    #[error("invalid memory {kind} at address 0x{address:x} (size: {size} bytes)")]
    InvalidMemoryAccess {
        address: u64,
        size: u64,
        kind: MemoryAccessKind,
    },
    #[error("callee {0} is not a function")]
    NotAFunction(Value),
    #[error("function {0} has no body")]
    UndefinedFunction(Value),
    #[error("fell off the end of block {0} without a terminator")]
    FellOffBlock(Value),
    #[error("value {0} has not been computed")]
    UnboundValue(Value),
    #[error("unsupported instruction: {0}")]
    UnsupportedInstruction(Opcode),
    #[error("out of memory: {requested} bytes requested")]
    OutOfMemory { requested: u64 },
    #[error("aggregate loaded or stored by value")]
    AggregateByValue,
    #[error("argument mismatch: {reason}")]
    ArgumentMismatch { reason: &'static str },
    #[error("step limit exceeded: executed {limit} instructions")]
    StepLimitExceeded { limit: u64 },
    #[error("call depth exceeded (limit: {limit})")]
    CallDepthExceeded { limit: usize },
}

/// Errors that end an interpreter run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecError {
    /// The program trapped, at `location` when an instruction was executing
    #[error("trap: {trap}")]
    Trap { trap: Trap, location: Option<Value> },
    /// The IR itself is malformed
    #[error("malformed IR: {0}")]
    Structural(#[from] IrError),
}

impl ExecError {
    /// The trap, if the program trapped
    pub fn trap(&self) -> Option<&Trap> {
        match self {
            ExecError::Trap { trap, .. } => Some(trap),
            ExecError::Structural(_) => None,
        }
    }

    /// Instruction executing when the error occurred
    pub fn location(&self) -> Option<Value> {
        match self {
            ExecError::Trap { location, .. } => *location,
            ExecError::Structural(_) => None,
        }
    }

    /// Attach the executing instruction to a trap that has no location yet
    pub(crate) fn at(self, inst: Value) -> Self {
        match self {
            ExecError::Trap {
                trap,
                location: None,
            } => ExecError::Trap {
                trap,
                location: Some(inst),
            },
            other => other,
        }
    }
}

impl From<Trap> for ExecError {
    fn from(trap: Trap) -> Self {
        ExecError::Trap {
            trap,
            location: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn test_trap_display() {
        let trap = Trap::InvalidMemoryAccess {
            address: 0x1008,
            size: 8,
            kind: MemoryAccessKind::Write,
        };
        assert_eq!(
            format!("{}", trap),
            "invalid memory write at address 0x1008 (size: 8 bytes)"
        );
        assert_eq!(format!("{}", Trap::NullPointer { kind: MemoryAccessKind::Read }), "null pointer read");
    }

    #[test]
    fn test_exec_error_exposes_trap() {
        let err = ExecError::from(Trap::DivisionByZero);
        assert_eq!(err.trap(), Some(&Trap::DivisionByZero));
        assert_eq!(err.location(), None);
        assert_eq!(format!("{}", err), "trap: division by zero");
    }
}
