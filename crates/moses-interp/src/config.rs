//! Interpreter settings.

use crate::{logging::LogLevel, memory::DEFAULT_MEMORY_LIMIT};

/// Limits and logging options for an [`crate::Interpreter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Instructions executed before `Trap::StepLimitExceeded`
    pub max_steps: u64,
    /// Frames on the stack before `Trap::CallDepthExceeded`
    pub max_call_depth: usize,
    /// Live allocated bytes before `Trap::OutOfMemory`
    pub max_memory: u64,
    pub log_level: LogLevel,
    /// Entries kept by the execution log
    pub log_capacity: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_steps: 10_000_000,
            max_call_depth: 1024,
            max_memory: DEFAULT_MEMORY_LIMIT,
            log_level: LogLevel::None,
            log_capacity: 100,
        }
    }
}

impl InterpreterConfig {
    /// Set the maximum number of instructions to execute.
    pub fn with_max_steps(mut self, limit: u64) -> Self {
        self.max_steps = limit;
        self
    }

    /// Set the maximum call depth.
    pub fn with_max_call_depth(mut self, limit: usize) -> Self {
        self.max_call_depth = limit;
        self
    }

    /// Set how many bytes may be allocated at once.
    pub fn with_max_memory(mut self, limit: u64) -> Self {
        self.max_memory = limit;
        self
    }

    /// Set the logging level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Set how many log entries are kept.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = InterpreterConfig::default()
            .with_max_steps(10)
            .with_log_level(LogLevel::Verbose)
            .with_max_memory(4096);
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.max_memory, 4096);
        assert_eq!(config.max_call_depth, 1024);
        assert_eq!(config.log_level, LogLevel::Verbose);
        assert_eq!(config.log_capacity, 100);
    }
}
