//! In-memory execution log.
//!
//! Independent of `tracing`: the log is kept by the interpreter itself so a
//! failing test can print the last instructions that ran.

use alloc::{collections::VecDeque, string::String};
use core::fmt;

use crate::value::GenericValue;

/// Logging verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// No logging.
    None,
    /// Only record traps.
    Errors,
    /// Record each executed instruction.
    Instructions,
    /// Also record calls and returns.
    Verbose,
}

/// One log entry.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    /// An instruction ran; `text` is its printed form
    Executed {
        step: u64,
        text: String,
        result: Option<GenericValue>,
    },
    /// A frame was pushed for `callee`
    Call { step: u64, callee: String, depth: usize },
    /// A frame popped
    Return {
        step: u64,
        value: Option<GenericValue>,
        depth: usize,
    },
    /// Execution stopped
    Trap { step: u64, message: String },
}

impl LogEntry {
    pub fn step(&self) -> u64 {
        match self {
            LogEntry::Executed { step, .. }
            | LogEntry::Call { step, .. }
            | LogEntry::Return { step, .. }
            | LogEntry::Trap { step, .. } => *step,
        }
    }

    /// Lowest level at which the entry is recorded
    fn level(&self) -> LogLevel {
        match self {
            LogEntry::Trap { .. } => LogLevel::Errors,
            LogEntry::Executed { .. } => LogLevel::Instructions,
            LogEntry::Call { .. } | LogEntry::Return { .. } => LogLevel::Verbose,
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:4}] ", self.step())?;
        match self {
            LogEntry::Executed { text, result, .. } => {
                f.write_str(text.trim())?;
                if let Some(result) = result {
                    write!(f, "\n    -> {}", result)?;
                }
                Ok(())
            }
            LogEntry::Call { callee, depth, .. } => write!(f, "call @{} (depth {})", callee, depth),
            LogEntry::Return { value, depth, .. } => match value {
                Some(value) => write!(f, "return {} (depth {})", value, depth),
                None => write!(f, "return (depth {})", depth),
            },
            LogEntry::Trap { message, .. } => write!(f, "trap: {}", message),
        }
    }
}

/// Rolling buffer of the most recent entries.
#[derive(Debug, Clone)]
pub struct ExecLog {
    level: LogLevel,
    capacity: usize,
    entries: VecDeque<LogEntry>,
}

impl ExecLog {
    pub fn new(level: LogLevel, capacity: usize) -> Self {
        Self {
            level,
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether entries of `level` are kept; lets callers skip building them
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.level
    }

    /// Record an entry if the level allows it, dropping the oldest when full
    pub fn record(&mut self, entry: LogEntry) {
        if !self.enabled(entry.level()) || self.capacity == 0 {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use alloc::{format, string::ToString};

    use super::*;

    fn executed(step: u64) -> LogEntry {
        LogEntry::Executed {
            step,
            text: "  %x = add int 1, 2".to_string(),
            result: Some(GenericValue::Int(3)),
        }
    }

    #[test]
    fn test_rolling_buffer() {
        let mut log = ExecLog::new(LogLevel::Instructions, 2);
        for step in 1..=3 {
            log.record(executed(step));
        }
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries().next().map(LogEntry::step), Some(2));
    }

    #[test]
    fn test_level_filter() {
        let mut log = ExecLog::new(LogLevel::Errors, 10);
        log.record(executed(1));
        log.record(LogEntry::Trap {
            step: 2,
            message: "division by zero".to_string(),
        });
        assert_eq!(log.len(), 1);

        let mut off = ExecLog::new(LogLevel::None, 10);
        off.record(LogEntry::Trap {
            step: 1,
            message: "x".to_string(),
        });
        assert!(off.is_empty());
    }

    #[test]
    fn test_entry_display() {
        assert_eq!(format!("{}", executed(7)), "[   7] %x = add int 1, 2\n    -> 3");
        let ret = LogEntry::Return {
            step: 12,
            value: None,
            depth: 1,
        };
        assert_eq!(format!("{}", ret), "[  12] return (depth 1)");
    }
}
