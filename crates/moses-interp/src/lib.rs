//! Reference interpreter for moses IR.
//!
//! This crate executes IR directly, one instruction at a time, on an
//! explicit stack of frames. It is meant for testing front ends and
//! transformations, not for speed.

#![no_std]

extern crate alloc;

mod config;
mod error;
mod executor;
mod frame;
mod helpers;
mod interpreter;
mod logging;
mod memory;
mod value;

pub use config::InterpreterConfig;
pub use error::{ExecError, MemoryAccessKind, Trap};
pub use frame::ExecutionContext;
pub use helpers::{expect_bool, expect_int, expect_ok, expect_trap, run_source, RunOutcome};
pub use interpreter::Interpreter;
pub use logging::{ExecLog, LogEntry, LogLevel};
pub use memory::{Memory, DEFAULT_MEMORY_LIMIT, HEAP_START};
pub use value::GenericValue;
