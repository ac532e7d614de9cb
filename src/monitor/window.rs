//! Rolling statistics over recent probe outcomes.

use crate::probe::ProbeOutcome;

use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
struct WindowEntry {
    success: bool,
    latency: Option<Duration>,
}

/// Fixed-capacity ring buffer of outcomes plus lifetime and per-period counters.
///
/// The ring buffer only bounds the memory used for latency averaging. Uptime is
/// computed from the lifetime counters so it reflects the whole run.
#[derive(Debug, Clone)]
pub struct StatsWindow {
    capacity: usize,
    entries: VecDeque<WindowEntry>,
    total_checks: u64,
    successful_checks: u64,
    period_checks: u64,
    period_failed: u64,
}

impl StatsWindow {
    /// Create an empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            total_checks: 0,
            successful_checks: 0,
            period_checks: 0,
            period_failed: 0,
        }
    }

    /// Record one outcome. Must be called exactly once per outcome.
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(WindowEntry {
            success: outcome.success,
            latency: outcome.latency,
        });

        self.total_checks += 1;
        self.period_checks += 1;
        if outcome.success {
            self.successful_checks += 1;
        } else {
            self.period_failed += 1;
        }
    }

    /// Lifetime uptime in percent, `None` before the first check.
    pub fn uptime_percent(&self) -> Option<f64> {
        if self.total_checks == 0 {
            return None;
        }
        Some(100.0 * self.successful_checks as f64 / self.total_checks as f64)
    }

    /// Mean latency of the successful checks still in the window.
    pub fn average_latency(&self) -> Option<Duration> {
        let (sum, count) = self
            .entries
            .iter()
            .filter(|e| e.success)
            .filter_map(|e| e.latency)
            .fold((0u128, 0u128), |(sum, n), l| (sum + l.as_nanos(), n + 1));

        if count == 0 {
            return None;
        }
        Some(Duration::from_nanos((sum / count) as u64))
    }

    /// Zero the per-period counters after a report went out.
    pub fn reset_period_counts(&mut self) {
        self.period_checks = 0;
        self.period_failed = 0;
    }

    pub fn total_checks(&self) -> u64 {
        self.total_checks
    }

    pub fn failed_checks(&self) -> u64 {
        self.total_checks - self.successful_checks
    }

    pub fn period_checks(&self) -> u64 {
        self.period_checks
    }

    pub fn period_failed(&self) -> u64 {
        self.period_failed
    }
}

#[cfg(test)]
impl StatsWindow {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn successful_checks(&self) -> u64 {
        self.successful_checks
    }
}
