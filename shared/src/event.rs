//! Canonical log event shared by the ingestion pipeline and every sink.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub type Attributes = Map<String, Value>;

/// Ordinal severity scale, compatible with the Scalyr `sev` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Finest = 0,
    Trace = 1,
    Debug = 2,
    #[default]
    Info = 3,
    Warning = 4,
    Error = 5,
    Critical = 6,
}

impl Severity {
    /// Looks up a free-text level name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        let severity = match name.to_ascii_lowercase().as_str() {
            "finest" => Severity::Finest,
            "finer" | "trace" => Severity::Trace,
            "fine" | "debug" => Severity::Debug,
            "info" | "notice" => Severity::Info,
            "warn" | "warning" => Severity::Warning,
            "error" => Severity::Error,
            "fatal" | "emerg" | "emergency" | "crit" | "critical" | "panic" | "alert" => {
                Severity::Critical
            }
            _ => return None,
        };
        Some(severity)
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Finest => "finest",
            Severity::Trace => "trace",
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

/// A normalized log record.
///
/// Built once per input line. Sinks derive their own wire representation from
/// it and never modify it.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub attributes: Attributes,
}

impl LogEvent {
    pub fn new(timestamp: DateTime<Utc>, severity: Severity, attributes: Attributes) -> Self {
        LogEvent {
            timestamp,
            severity,
            attributes,
        }
    }

    /// Nanoseconds since the Unix epoch, saturating to `i64::MIN` or
    /// `i64::MAX` outside of the representable range (1677 to 2262).
    pub fn timestamp_nanos(&self) -> i64 {
        self.timestamp.timestamp_nanos_opt().unwrap_or_else(|| {
            if self.timestamp.timestamp() < 0 {
                i64::MIN
            } else {
                i64::MAX
            }
        })
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
