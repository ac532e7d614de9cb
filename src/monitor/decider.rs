//! Per-cycle orchestration of the statistics, state machine and report clock.

use super::events::AlertEvent;
use super::report::ReportScheduler;
use super::state::AvailabilityStateMachine;
use super::window::StatsWindow;
use crate::config::{ConfigError, MAX_DURATION};
use crate::probe::ProbeOutcome;

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Parameters of the decision engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DeciderConfig {
    pub window_capacity: usize,
    pub report_interval: Duration,
    pub alert_on_initial_down: bool,
    pub failure_threshold: u32,
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self {
            window_capacity: 60,
            report_interval: Duration::from_secs(3600),
            alert_on_initial_down: false,
            failure_threshold: 1,
        }
    }
}

/// Largest accepted rolling window.
pub const MAX_WINDOW_CAPACITY: usize = 100_000;

impl DeciderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::invalid("WINDOW_CAPACITY", "must be greater than zero"));
        }
        if self.window_capacity > MAX_WINDOW_CAPACITY {
            return Err(ConfigError::invalid(
                "WINDOW_CAPACITY",
                format!("must be at most {}", MAX_WINDOW_CAPACITY),
            ));
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::invalid("REPORT_INTERVAL", "must be greater than zero"));
        }
        if self.report_interval > MAX_DURATION {
            return Err(ConfigError::invalid("REPORT_INTERVAL", "must be at most one year"));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("FAILURE_THRESHOLD", "must be at least 1"));
        }
        Ok(())
    }
}

/// Turns probe outcomes into alert events. Performs no I/O.
///
/// One call to [`AlertDecider::process`] applies all state changes for one
/// outcome; there is no point inside it where a cycle can be abandoned.
#[derive(Debug, Clone)]
pub struct AlertDecider {
    stats: StatsWindow,
    availability: AvailabilityStateMachine,
    reports: ReportScheduler,
}

impl AlertDecider {
    pub fn new(config: &DeciderConfig, started_at: DateTime<Utc>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            stats: StatsWindow::new(config.window_capacity),
            availability: AvailabilityStateMachine::new(
                config.alert_on_initial_down,
                config.failure_threshold,
            ),
            reports: ReportScheduler::new(config.report_interval, started_at),
        })
    }

    /// Process one outcome. Transition events come before the report.
    pub fn process(&mut self, outcome: &ProbeOutcome, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut events = Vec::with_capacity(2);

        self.stats.record(outcome);

        if let Some(transition) = self.availability.record(outcome, now) {
            events.push(transition);
        }

        if let Some(report) = self
            .reports
            .poll(now, self.availability.current(), &mut self.stats)
        {
            events.push(AlertEvent::HourlyReport(report));
        }

        events
    }

    pub fn stats(&self) -> &StatsWindow {
        &self.stats
    }

    pub fn availability(&self) -> &AvailabilityStateMachine {
        &self.availability
    }

    pub fn reports(&self) -> &ReportScheduler {
        &self.reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::Availability;
    use crate::probe::ProbeError;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + ChronoDuration::seconds(secs)
    }

    fn ok(at: DateTime<Utc>, ms: u64) -> ProbeOutcome {
        ProbeOutcome::response(at, 200, Duration::from_millis(ms))
    }

    fn fail(at: DateTime<Utc>) -> ProbeOutcome {
        ProbeOutcome::failure(at, &ProbeError::Connect("refused".into()))
    }

    fn decider() -> AlertDecider {
        AlertDecider::new(&DeciderConfig::default(), t(0)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad = [
            DeciderConfig { window_capacity: 0, ..Default::default() },
            DeciderConfig { report_interval: Duration::ZERO, ..Default::default() },
            DeciderConfig { failure_threshold: 0, ..Default::default() },
            DeciderConfig { window_capacity: MAX_WINDOW_CAPACITY + 1, ..Default::default() },
            DeciderConfig { report_interval: Duration::from_secs(10_000_000_000_000), ..Default::default() },
        ];
        for cfg in bad {
            assert!(AlertDecider::new(&cfg, t(0)).is_err(), "{:?} was accepted", cfg);
        }
    }

    #[test]
    fn test_outage_sequence() {
        let mut d = decider();
        assert!(d.process(&ok(t(0), 100), t(0)).is_empty());

        let mut kinds = Vec::new();
        for (i, out) in [fail(t(60)), fail(t(120)), fail(t(180)), ok(t(240), 90)]
            .iter()
            .enumerate()
        {
            for ev in d.process(out, out.timestamp) {
                kinds.push((i, ev));
            }
        }

        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0].0, 0);
        assert_eq!(kinds[0].1.kind(), "down");
        assert_eq!(kinds[1].0, 3);
        match &kinds[1].1 {
            AlertEvent::Recovery(r) => assert_eq!(r.downtime, Duration::from_secs(180)),
            other => panic!("expected recovery, got {:?}", other),
        }
    }

    #[test]
    fn test_each_outcome_recorded_exactly_once() {
        let mut d = decider();
        for i in 0..25 {
            let at = t(i * 10);
            let out = if i % 4 == 0 { fail(at) } else { ok(at, 20) };
            d.process(&out, at);
        }

        assert_eq!(d.stats().total_checks(), 25);
        assert_eq!(d.stats().period_checks(), 25);
        assert_eq!(d.stats().failed_checks(), 7);
    }

    #[test]
    fn test_transition_precedes_report_in_same_cycle() {
        let mut d = decider();
        d.process(&ok(t(0), 100), t(0));

        let events = d.process(&fail(t(3600)), t(3600));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "down");
        match &events[1] {
            AlertEvent::HourlyReport(r) => {
                assert_eq!(r.state, Availability::Down);
                assert_eq!(r.period_checks, 2);
                assert_eq!(r.period_failed, 1);
                assert_eq!(r.uptime_percent, Some(50.0));
            }
            other => panic!("expected report, got {:?}", other),
        }
        assert_eq!(d.stats().period_checks(), 0);
    }

    #[test]
    fn test_report_frequency_independent_of_check_interval() {
        for step in [10, 60, 300] {
            let mut d = decider();
            let mut reports = 0;
            let mut now = 0;
            while now <= 4 * 3600 {
                let events = d.process(&ok(t(now), 30), t(now));
                reports += events.iter().filter(|e| e.kind() == "report").count();
                now += step;
            }
            assert_eq!(reports, 4, "step {}s", step);
        }
    }

    #[test]
    fn test_delayed_loop_does_not_skip_report() {
        let mut d = decider();
        d.process(&ok(t(0), 100), t(0));

        // The loop stalls for two and a half hours.
        let events = d.process(&ok(t(9000), 100), t(9000));
        assert_eq!(events.len(), 1);
        match &events[0] {
            AlertEvent::HourlyReport(r) => {
                assert_eq!(r.intervals_elapsed, 2);
                assert_eq!(r.period_checks, 2);
            }
            other => panic!("expected report, got {:?}", other),
        }
        assert_eq!(d.reports().next_report_at(), t(3 * 3600));
    }
}
