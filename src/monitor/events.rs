//! Alert event types.
//!
//! Events are plain data. Rendering them into messages is the notifiers' job.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Availability of the monitored target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// No probe has completed yet.
    Unknown,
    Up,
    Down,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Unknown => "UNKNOWN",
            Availability::Up => "UP",
            Availability::Down => "DOWN",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitoring has begun.
#[derive(Debug, Clone, PartialEq)]
pub struct StartedEvent {
    pub target: String,
    pub check_interval: Duration,
    pub report_interval: Duration,
    pub timestamp: DateTime<Utc>,
}

/// The target went from up to down.
#[derive(Debug, Clone, PartialEq)]
pub struct DownEvent {
    /// 0 when no response was received.
    pub status_code: u16,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
    /// First failure of the streak that caused the transition.
    pub failing_since: DateTime<Utc>,
    pub consecutive_failures: u32,
}

/// The target came back up.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEvent {
    pub status_code: u16,
    pub latency: Option<Duration>,
    pub downtime: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Periodic summary.
///
/// A cycle emits at most one report. If the loop was held up past several
/// report slots, this single report covers all of them and
/// `intervals_elapsed` says how many; no slot is skipped or reported twice.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyReport {
    pub state: Availability,
    /// Lifetime uptime; `None` before the first check.
    pub uptime_percent: Option<f64>,
    /// Mean latency over the rolling window; `None` without successful checks.
    pub average_latency: Option<Duration>,
    pub total_checks: u64,
    pub failed_checks: u64,
    pub period_checks: u64,
    pub period_failed: u64,
    /// Report intervals covered by this report. Greater than 1 only when the
    /// monitor loop was held up past one or more report slots; those slots are
    /// folded into this report rather than dropped.
    pub intervals_elapsed: u32,
    pub timestamp: DateTime<Utc>,
}

/// Everything the monitor may ask the notifiers to deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Started(StartedEvent),
    Down(DownEvent),
    Recovery(RecoveryEvent),
    HourlyReport(HourlyReport),
}

impl AlertEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AlertEvent::Started(_) => "started",
            AlertEvent::Down(_) => "down",
            AlertEvent::Recovery(_) => "recovery",
            AlertEvent::HourlyReport(_) => "report",
        }
    }
}
