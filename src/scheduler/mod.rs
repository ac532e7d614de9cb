//! Scheduler module: the periodic probe-and-decide loop.

mod dispatch;

pub use dispatch::*;

use crate::config::{ConfigError, MonitorConfig};
use crate::monitor::{AlertDecider, AlertEvent, Availability, StartedEvent};
use crate::notify::render::fmt_latency;
use crate::probe::{ProbeOutcome, Prober};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};

/// The most recent probe, as shown on the status page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastCheck {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub status_code: u16,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

impl From<&ProbeOutcome> for LastCheck {
    fn from(outcome: &ProbeOutcome) -> Self {
        Self {
            timestamp: outcome.timestamp,
            success: outcome.success,
            status_code: outcome.status_code,
            latency_ms: outcome.latency_ms(),
            error: outcome.error_message.clone(),
        }
    }
}

/// Immutable copy of the monitor's state, published after every cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub target: String,
    pub state: Availability,
    pub since: Option<DateTime<Utc>>,
    /// Failures in a row, including ones not yet enough to declare Down.
    pub consecutive_failures: u32,
    pub uptime_percent: Option<f64>,
    pub average_latency_ms: Option<f64>,
    pub total_checks: u64,
    pub failed_checks: u64,
    pub period_checks: u64,
    pub period_failed: u64,
    pub next_report_at: DateTime<Utc>,
    pub last_check: Option<LastCheck>,
}

impl MonitorSnapshot {
    pub fn capture(target: &str, decider: &AlertDecider, last: Option<&ProbeOutcome>) -> Self {
        let stats = decider.stats();
        Self {
            target: target.to_string(),
            state: decider.availability().current(),
            since: decider.availability().since(),
            consecutive_failures: decider.availability().failure_streak(),
            uptime_percent: stats.uptime_percent(),
            average_latency_ms: stats.average_latency().map(|d| d.as_secs_f64() * 1000.0),
            total_checks: stats.total_checks(),
            failed_checks: stats.failed_checks(),
            period_checks: stats.period_checks(),
            period_failed: stats.period_failed(),
            next_report_at: decider.reports().next_report_at(),
            last_check: last.map(LastCheck::from),
        }
    }
}

/// Owns all mutable monitoring state and drives it from a single loop.
pub struct Monitor<P> {
    target: String,
    prober: P,
    decider: AlertDecider,
    check_interval: Duration,
    report_interval: Duration,
    events_tx: mpsc::Sender<AlertEvent>,
    snapshot_tx: watch::Sender<MonitorSnapshot>,
}

impl<P: Prober> Monitor<P> {
    /// Create the monitor and the receiver its snapshots are published on.
    pub fn new(
        config: &MonitorConfig,
        prober: P,
        events_tx: mpsc::Sender<AlertEvent>,
    ) -> Result<(Self, watch::Receiver<MonitorSnapshot>), ConfigError> {
        config.validate()?;
        let decider = AlertDecider::new(&config.decider, Utc::now())?;
        let (snapshot_tx, snapshot_rx) =
            watch::channel(MonitorSnapshot::capture(&config.target_url, &decider, None));

        let monitor = Self {
            target: config.target_url.clone(),
            prober,
            decider,
            check_interval: config.check_interval,
            report_interval: config.decider.report_interval,
            events_tx,
            snapshot_tx,
        };
        Ok((monitor, snapshot_rx))
    }

    /// Run until a stop signal arrives.
    ///
    /// The signal is only observed between cycles, so an in-flight probe is
    /// allowed to finish (or time out) and its outcome is fully applied.
    pub async fn run(mut self, mut stop_rx: broadcast::Receiver<()>) {
        tracing::info!(
            "Monitor: watching {} every {:?}, reports every {:?}",
            self.target,
            self.check_interval,
            self.report_interval
        );

        self.emit(AlertEvent::Started(StartedEvent {
            target: self.target.clone(),
            check_interval: self.check_interval,
            report_interval: self.report_interval,
            timestamp: Utc::now(),
        }));

        let mut interval = tokio::time::interval(self.check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.recv() => {
                    tracing::info!("Monitor: stop requested, leaving loop");
                    break;
                }
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    async fn run_cycle(&mut self) {
        let outcome = self.prober.probe().await;
        let now = Utc::now();

        if outcome.success {
            tracing::info!(
                "Monitor: UP | {} | {} | {}",
                outcome.status_code,
                fmt_latency(outcome.latency),
                self.target
            );
        } else {
            tracing::warn!(
                "Monitor: DOWN | {} | {} | {}",
                outcome.status_code,
                outcome.error_message.as_deref().unwrap_or("unknown error"),
                self.target
            );
        }

        for event in self.decider.process(&outcome, now) {
            self.emit(event);
        }

        self.snapshot_tx
            .send_replace(MonitorSnapshot::capture(&self.target, &self.decider, Some(&outcome)));
    }

    /// Hand an event to the dispatcher without ever waiting on it.
    fn emit(&self, event: AlertEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Monitor: alert queue full, dropping {} event", event.kind());
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!("Monitor: dispatcher stopped, dropping {} event", event.kind());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;

    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replays a fixed up/down pattern, then repeats the last entry.
    struct ScriptedProber {
        script: Mutex<VecDeque<bool>>,
        last: Mutex<bool>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedProber {
        fn new(pattern: &[bool]) -> Self {
            Self {
                script: Mutex::new(pattern.iter().copied().collect()),
                last: Mutex::new(true),
                delay: None,
                calls: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let up = {
                let mut last = self.last.lock().unwrap();
                if let Some(next) = self.script.lock().unwrap().pop_front() {
                    *last = next;
                }
                *last
            };

            if up {
                ProbeOutcome::response(Utc::now(), 200, Duration::from_millis(25))
            } else {
                ProbeOutcome::failure(Utc::now(), &ProbeError::Connect("refused".into()))
            }
        }
    }

    fn config() -> MonitorConfig {
        MonitorConfig::from_lookup(|key| match key {
            "WEBSITE_URL" => Some("http://example.com".to_string()),
            "CHECK_INTERVAL" => Some("1".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_emits_started_then_transitions() {
        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let prober = ScriptedProber::new(&[true, false, false, true]);
        let (monitor, snapshots) = Monitor::new(&config(), prober, tx).unwrap();

        let handle = tokio::spawn(monitor.run(stop_rx));

        let mut kinds = Vec::new();
        for _ in 0..3 {
            kinds.push(rx.recv().await.unwrap().kind());
        }
        assert_eq!(kinds, vec!["started", "down", "recovery"]);

        stop_tx.send(()).unwrap();
        handle.await.unwrap();

        let snap = snapshots.borrow().clone();
        assert_eq!(snap.state, Availability::Up);
        assert!(snap.total_checks >= 4);
        assert_eq!(snap.failed_checks, 2);
        assert_eq!(snap.consecutive_failures, 0);
        assert!(snap.last_check.unwrap().success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_never_blocks_probing() {
        // Nobody reads the queue.
        let (tx, _rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let pattern: Vec<bool> = (0..40).map(|i| i % 2 == 0).collect();
        let (monitor, snapshots) = Monitor::new(&config(), ScriptedProber::new(&pattern), tx).unwrap();

        let handle = tokio::spawn(monitor.run(stop_rx));
        tokio::time::sleep(Duration::from_secs(20)).await;
        stop_tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(snapshots.borrow().total_checks >= 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_probe() {
        let (tx, _rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let mut prober = ScriptedProber::new(&[false]);
        prober.delay = Some(Duration::from_secs(5));
        let calls = prober.calls.clone();
        let (monitor, snapshots) = Monitor::new(&config(), prober, tx).unwrap();

        let handle = tokio::spawn(monitor.run(stop_rx));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        stop_tx.send(()).unwrap();
        handle.await.unwrap();

        // The probe that was running when the signal arrived was applied in full.
        let snap = snapshots.borrow().clone();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(snap.total_checks, 1);
        assert_eq!(snap.period_checks, 1);
        assert_eq!(snap.state, Availability::Down);
        assert_eq!(snap.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_empty() {
        let (tx, _rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        let (_monitor, snapshots) = Monitor::new(&config(), ScriptedProber::new(&[]), tx).unwrap();

        let snap = snapshots.borrow().clone();
        assert_eq!(snap.state, Availability::Unknown);
        assert_eq!(snap.total_checks, 0);
        assert!(snap.uptime_percent.is_none());
        assert!(snap.last_check.is_none());
    }
}
