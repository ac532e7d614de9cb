//! Probe module for website monitoring.
//!
//! A probe never fails outright: every transport error is folded into a
//! [`ProbeOutcome`] with `success == false` so the state machine sees it.

mod http;

pub use http::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Connection timeout")]
    Timeout(Duration),
    #[error("Connection failed")]
    Connect(String),
    #[error("{0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
}

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub timestamp: DateTime<Utc>,
    /// True iff a response arrived with a status in `[200, 400)`.
    pub success: bool,
    /// 0 when no response was received.
    pub status_code: u16,
    /// Set whenever a response was received, including non-2xx codes.
    pub latency: Option<Duration>,
    /// Present iff `success` is false.
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// Build an outcome from a received HTTP response.
    pub fn response(timestamp: DateTime<Utc>, status_code: u16, latency: Duration) -> Self {
        let success = is_up_status(status_code);
        Self {
            timestamp,
            success,
            status_code,
            latency: Some(latency),
            error_message: (!success).then(|| ProbeError::Status(status_code).to_string()),
        }
    }

    /// Build an outcome for a probe that got no response at all.
    pub fn failure(timestamp: DateTime<Utc>, error: &ProbeError) -> Self {
        Self {
            timestamp,
            success: false,
            status_code: 0,
            latency: None,
            error_message: Some(error.to_string()),
        }
    }

    /// Latency in milliseconds, if a response was received.
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.map(|d| d.as_secs_f64() * 1000.0)
    }
}

/// 2xx and 3xx count as up.
pub fn is_up_status(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

/// Performs one probe attempt against the monitored target.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self) -> ProbeOutcome;
}
