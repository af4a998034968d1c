//! Append-only game log
//!
//! The logger is interior-mutable (`RefCell`) so read-only state views can
//! still record decisions. Tests run it in `Memory` mode and assert on the
//! captured entries; the demo binary runs `Stdout`.

use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::ops::Deref;

/// How much the engine narrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum VerbosityLevel {
    /// Nothing at all
    Silent,
    /// Turn headlines and the game result
    Minimal,
    /// Casts, resolutions, combat, state-based actions
    #[default]
    Normal,
    /// Every priority pass and recompute detail
    Verbose,
}

/// Where log messages go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Stdout,
    /// Capture to the in-memory buffer only (tests)
    Memory,
    Both,
}

/// What part of the engine produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogCategory {
    Turn,
    Priority,
    Stack,
    Combat,
    Sba,
    Effect,
    Choice,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: VerbosityLevel,
    pub category: LogCategory,
    pub message: String,
}

/// Read-only view of the captured entries.
pub struct LogGuard<'a> {
    guard: Ref<'a, Vec<LogEntry>>,
}

impl<'a> Deref for LogGuard<'a> {
    type Target = [LogEntry];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Centralized, append-only logger owned by `GameState`.
#[derive(Debug)]
pub struct GameLogger {
    verbosity: VerbosityLevel,
    output_mode: OutputMode,
    buffer: RefCell<Vec<LogEntry>>,
}

impl GameLogger {
    pub fn new() -> Self {
        GameLogger {
            verbosity: VerbosityLevel::default(),
            output_mode: OutputMode::default(),
            buffer: RefCell::new(Vec::new()),
        }
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            ..GameLogger::new()
        }
    }

    /// Capture to memory instead of stdout (tests).
    pub fn captured(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            output_mode: OutputMode::Memory,
            buffer: RefCell::new(Vec::new()),
        }
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: VerbosityLevel) {
        self.verbosity = verbosity;
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    fn emit(&self, level: VerbosityLevel, category: LogCategory, message: String) {
        if level > self.verbosity {
            return;
        }
        if matches!(self.output_mode, OutputMode::Stdout | OutputMode::Both) {
            println!("{message}");
        }
        if matches!(self.output_mode, OutputMode::Memory | OutputMode::Both) {
            self.buffer.borrow_mut().push(LogEntry {
                level,
                category,
                message,
            });
        }
    }

    /// Turn headlines and the final result.
    pub fn headline(&self, category: LogCategory, message: impl Into<String>) {
        self.emit(VerbosityLevel::Minimal, category, message.into());
    }

    /// Normal narration: casts, resolutions, combat, state-based actions.
    pub fn event(&self, category: LogCategory, message: impl Into<String>) {
        self.emit(VerbosityLevel::Normal, category, message.into());
    }

    /// High-volume detail. The closure keeps format! allocations off the
    /// common path; with the `verbose-logging` feature off this is a no-op.
    pub fn detail(&self, category: LogCategory, message: impl FnOnce() -> String) {
        #[cfg(feature = "verbose-logging")]
        {
            if VerbosityLevel::Verbose <= self.verbosity {
                self.emit(VerbosityLevel::Verbose, category, message());
            }
        }
        #[cfg(not(feature = "verbose-logging"))]
        {
            let _ = (category, message);
        }
    }

    /// A decision provider's answer, for replay inspection.
    pub fn choice(&self, who: &str, message: impl Into<String>) {
        self.emit(
            VerbosityLevel::Normal,
            LogCategory::Choice,
            format!("[{who}] {}", message.into()),
        );
    }

    pub fn entries(&self) -> LogGuard<'_> {
        LogGuard {
            guard: self.buffer.borrow(),
        }
    }

    /// Whether any captured entry contains the substring. Test helper.
    pub fn contains(&self, needle: &str) -> bool {
        self.buffer
            .borrow()
            .iter()
            .any(|entry| entry.message.contains(needle))
    }

    pub fn clear(&self) {
        self.buffer.borrow_mut().clear();
    }
}

impl Default for GameLogger {
    fn default() -> Self {
        GameLogger::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_filters() {
        let logger = GameLogger::captured(VerbosityLevel::Minimal);
        logger.headline(LogCategory::Turn, "turn 1");
        logger.event(LogCategory::Stack, "cast something");

        let entries = logger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "turn 1");
    }

    #[test]
    fn test_contains_and_clear() {
        let logger = GameLogger::captured(VerbosityLevel::Normal);
        logger.event(LogCategory::Combat, "Bears attacks P1");
        assert!(logger.contains("Bears"));
        assert!(!logger.contains("Elves"));

        logger.clear();
        assert!(!logger.contains("Bears"));
    }

    #[test]
    fn test_silent_captures_nothing() {
        let logger = GameLogger::captured(VerbosityLevel::Silent);
        logger.headline(LogCategory::Turn, "turn 1");
        assert!(logger.entries().is_empty());
    }
}
