//! Up/Down state machine.

use super::events::{AlertEvent, Availability, DownEvent, RecoveryEvent};
use crate::probe::ProbeOutcome;

use chrono::{DateTime, Utc};

/// Tracks the target's availability and reports each change exactly once.
///
/// `Unknown` is left on the first outcome and never re-entered. With a
/// `failure_threshold` above one, an `Up` target is only declared `Down` after
/// that many consecutive failures; recovery always takes a single success.
#[derive(Debug, Clone)]
pub struct AvailabilityStateMachine {
    current: Availability,
    since: Option<DateTime<Utc>>,
    alert_on_initial_down: bool,
    failure_threshold: u32,
    failure_streak: u32,
    streak_started: Option<DateTime<Utc>>,
}

impl AvailabilityStateMachine {
    pub fn new(alert_on_initial_down: bool, failure_threshold: u32) -> Self {
        Self {
            current: Availability::Unknown,
            since: None,
            alert_on_initial_down,
            failure_threshold: failure_threshold.max(1),
            failure_streak: 0,
            streak_started: None,
        }
    }

    /// Feed one outcome; returns the transition event, if any.
    pub fn record(&mut self, outcome: &ProbeOutcome, now: DateTime<Utc>) -> Option<AlertEvent> {
        if outcome.success {
            self.failure_streak = 0;
            self.streak_started = None;

            match self.current {
                Availability::Unknown => {
                    self.enter(Availability::Up, now);
                    None
                }
                Availability::Down => {
                    let since = self.since.unwrap_or(now);
                    let downtime = (now - since).to_std().unwrap_or_default();
                    self.enter(Availability::Up, now);
                    Some(AlertEvent::Recovery(RecoveryEvent {
                        status_code: outcome.status_code,
                        latency: outcome.latency,
                        downtime,
                        timestamp: now,
                    }))
                }
                Availability::Up => None,
            }
        } else {
            self.failure_streak = self.failure_streak.saturating_add(1);
            let first_failure = *self.streak_started.get_or_insert(now);

            match self.current {
                Availability::Unknown => {
                    self.enter(Availability::Down, now);
                    self.alert_on_initial_down
                        .then(|| self.down_event(outcome, now, now))
                }
                Availability::Up if self.failure_streak >= self.failure_threshold => {
                    self.enter(Availability::Down, first_failure);
                    Some(self.down_event(outcome, now, first_failure))
                }
                _ => None,
            }
        }
    }

    fn enter(&mut self, state: Availability, since: DateTime<Utc>) {
        tracing::debug!("Availability: {} -> {}", self.current, state);
        self.current = state;
        self.since = Some(since);
    }

    fn down_event(
        &self,
        outcome: &ProbeOutcome,
        now: DateTime<Utc>,
        failing_since: DateTime<Utc>,
    ) -> AlertEvent {
        AlertEvent::Down(DownEvent {
            status_code: outcome.status_code,
            error_message: outcome
                .error_message
                .clone()
                .unwrap_or_else(|| format!("HTTP {}", outcome.status_code)),
            timestamp: now,
            failing_since,
            consecutive_failures: self.failure_streak,
        })
    }

    pub fn current(&self) -> Availability {
        self.current
    }

    /// When the current state began; `None` while `Unknown`.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::time::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + ChronoDuration::seconds(secs)
    }

    fn ok(at: DateTime<Utc>) -> ProbeOutcome {
        ProbeOutcome::response(at, 200, Duration::from_millis(80))
    }

    fn fail(at: DateTime<Utc>) -> ProbeOutcome {
        ProbeOutcome::failure(at, &ProbeError::Timeout(Duration::from_secs(10)))
    }

    /// Feed `pattern` (true = success) one second apart and collect the events.
    fn run(sm: &mut AvailabilityStateMachine, pattern: &[bool]) -> Vec<(usize, AlertEvent)> {
        pattern
            .iter()
            .enumerate()
            .filter_map(|(i, &up)| {
                let at = t(i as i64);
                let out = if up { ok(at) } else { fail(at) };
                sm.record(&out, at).map(|e| (i, e))
            })
            .collect()
    }

    #[test]
    fn test_initial_outcome_is_not_alertable_by_default() {
        let mut up = AvailabilityStateMachine::new(false, 1);
        assert!(up.record(&ok(t(0)), t(0)).is_none());
        assert_eq!(up.current(), Availability::Up);
        assert_eq!(up.since(), Some(t(0)));

        let mut down = AvailabilityStateMachine::new(false, 1);
        assert!(down.record(&fail(t(0)), t(0)).is_none());
        assert_eq!(down.current(), Availability::Down);
    }

    #[test]
    fn test_initial_down_alert_flag() {
        let mut sm = AvailabilityStateMachine::new(true, 1);
        match sm.record(&fail(t(0)), t(0)) {
            Some(AlertEvent::Down(e)) => {
                assert_eq!(e.status_code, 0);
                assert_eq!(e.error_message, "Connection timeout");
            }
            other => panic!("expected down event, got {:?}", other),
        }
    }

    #[test]
    fn test_down_then_recovery_with_downtime() {
        let mut sm = AvailabilityStateMachine::new(false, 1);
        sm.record(&ok(t(0)), t(0));

        let events = run(&mut sm, &[true, false, false, false, true]);
        assert_eq!(events.len(), 2);

        let (i, down) = &events[0];
        assert_eq!(*i, 1);
        assert!(matches!(down, AlertEvent::Down(_)));

        let (i, rec) = &events[1];
        assert_eq!(*i, 4);
        match rec {
            AlertEvent::Recovery(r) => {
                assert_eq!(r.downtime, Duration::from_secs(3));
                assert_eq!(r.status_code, 200);
                assert_eq!(r.latency, Some(Duration::from_millis(80)));
            }
            other => panic!("expected recovery, got {:?}", other),
        }
        assert_eq!(sm.current(), Availability::Up);
    }

    #[test]
    fn test_repeated_outcomes_produce_no_events() {
        let mut sm = AvailabilityStateMachine::new(false, 1);
        assert!(run(&mut sm, &[true; 10]).is_empty());

        let mut sm = AvailabilityStateMachine::new(false, 1);
        let events = run(&mut sm, &[true, false, false, false, false]);
        assert_eq!(events.len(), 1);
        assert_eq!(sm.since(), Some(t(1)));
    }

    #[test]
    fn test_flapping_emits_one_event_per_change() {
        let pattern = [true, false, true, false, true, false, true];
        let mut sm = AvailabilityStateMachine::new(false, 1);
        let events = run(&mut sm, &pattern);

        let changes = pattern.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(events.len(), changes);
        for pair in events.windows(2) {
            assert_ne!(pair[0].1.kind(), pair[1].1.kind());
        }
    }

    #[test]
    fn test_failure_threshold_debounces_down() {
        let mut sm = AvailabilityStateMachine::new(false, 3);
        let events = run(&mut sm, &[true, false, false, true, false, false, false]);

        assert_eq!(events.len(), 1);
        let (i, ev) = &events[0];
        assert_eq!(*i, 6);
        match ev {
            AlertEvent::Down(d) => {
                assert_eq!(d.consecutive_failures, 3);
                assert_eq!(d.failing_since, t(4));
                assert_eq!(d.timestamp, t(6));
            }
            other => panic!("expected down, got {:?}", other),
        }
        // Downtime is measured from the first failure of the streak.
        assert_eq!(sm.since(), Some(t(4)));
    }

    #[test]
    fn test_error_response_counts_as_failure() {
        let mut sm = AvailabilityStateMachine::new(false, 1);
        sm.record(&ok(t(0)), t(0));
        let out = ProbeOutcome::response(t(1), 502, Duration::from_millis(5));
        match sm.record(&out, t(1)) {
            Some(AlertEvent::Down(d)) => {
                assert_eq!(d.status_code, 502);
                assert_eq!(d.error_message, "HTTP 502");
            }
            other => panic!("expected down, got {:?}", other),
        }
    }
}
