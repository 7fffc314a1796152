//! Human-readable progress and error reporting for a seeding run.
//!
//! The controller emits one message per abort path and one summary on success.
//! [`LogSink`] forwards those messages to the `log` facade; a run without a sink
//! drops them.

use std::{cell::RefCell, fmt};

use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

pub trait DiagnosticSink {
    fn report(&self, message: &str, severity: Severity);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("CsvSeeder: {message}"),
            Severity::Warning => warn!("CsvSeeder: {message}"),
            Severity::Error => error!("CsvSeeder: {message}"),
        }
    }
}

/// Keeps every reported message in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: RefCell<Vec<(Severity, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.borrow().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.messages
            .borrow()
            .iter()
            .filter(|(level, _)| *level == severity)
            .count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, message: &str, severity: Severity) {
        self.messages
            .borrow_mut()
            .push((severity, message.to_string()));
    }
}

pub(crate) fn emit(sink: Option<&dyn DiagnosticSink>, message: &str, severity: Severity) {
    if let Some(sink) = sink {
        sink.report(message, severity);
    }
}
