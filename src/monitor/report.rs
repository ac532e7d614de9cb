//! Wall-clock driven periodic reports.

use super::events::{Availability, HourlyReport};
use super::window::StatsWindow;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Decides when the periodic report is due.
///
/// The anchor only ever advances by whole intervals, so probe jitter does not
/// shift the cadence. A cycle that arrives late still gets its report; missed
/// slots are folded into that one report.
#[derive(Debug, Clone)]
pub struct ReportScheduler {
    interval_ms: i64,
    last_report_at: DateTime<Utc>,
}

impl ReportScheduler {
    pub fn new(interval: Duration, started_at: DateTime<Utc>) -> Self {
        let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX).max(1);
        Self {
            interval_ms,
            last_report_at: started_at,
        }
    }

    /// Whole report intervals elapsed since the last report.
    fn intervals_elapsed(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_report_at).num_milliseconds() / self.interval_ms
    }

    /// The anchor moved forward by `intervals` whole intervals, clamped to the
    /// largest representable time.
    fn advanced_by(&self, intervals: i64) -> DateTime<Utc> {
        ChronoDuration::try_milliseconds(intervals.saturating_mul(self.interval_ms))
            .and_then(|d| self.last_report_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Emit a report if one is due, then reset the period counters.
    pub fn poll(
        &mut self,
        now: DateTime<Utc>,
        state: Availability,
        stats: &mut StatsWindow,
    ) -> Option<HourlyReport> {
        if now < self.last_report_at {
            // Wall clock stepped backwards; re-anchor instead of waiting it out.
            tracing::warn!(
                "ReportScheduler: clock moved back from {} to {}, re-anchoring",
                self.last_report_at,
                now
            );
            self.last_report_at = now;
            return None;
        }

        let intervals = self.intervals_elapsed(now);
        if intervals < 1 {
            return None;
        }

        let report = HourlyReport {
            state,
            uptime_percent: stats.uptime_percent(),
            average_latency: stats.average_latency(),
            total_checks: stats.total_checks(),
            failed_checks: stats.failed_checks(),
            period_checks: stats.period_checks(),
            period_failed: stats.period_failed(),
            intervals_elapsed: u32::try_from(intervals).unwrap_or(u32::MAX),
            timestamp: now,
        };

        self.last_report_at = self.advanced_by(intervals);
        stats.reset_period_counts();

        if intervals > 1 {
            tracing::warn!("ReportScheduler: {} report slots elapsed since the last report", intervals);
        }

        Some(report)
    }

    #[cfg(test)]
    pub fn last_report_at(&self) -> DateTime<Utc> {
        self.last_report_at
    }

    pub fn next_report_at(&self) -> DateTime<Utc> {
        self.advanced_by(1)
    }
}
