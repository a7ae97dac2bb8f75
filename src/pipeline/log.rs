//! Append-only, human-readable log of one analysis run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Progress
    Info,
    /// Something was skipped
    Warn,
    /// A phase failed
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        })
    }
}

/// One message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// When the message was recorded
    pub timestamp: DateTime<Utc>,
    /// Severity
    pub level: LogLevel,
    /// Text shown to the user
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Entries in the order they were recorded; every entry is also traced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisLog {
    entries: Vec<LogEntry>,
}

impl AnalysisLog {
    /// Empty log
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn push(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => tracing::info!("{message}"),
            LogLevel::Warn => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
        }
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    /// Record progress
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    /// Record a skipped step
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    /// Record a failed phase
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    /// All entries
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Message texts, without timestamps
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }

    /// Whether any entry has the given level
    #[must_use]
    pub fn has_level(&self, level: LogLevel) -> bool {
        self.entries.iter().any(|e| e.level == level)
    }
}
