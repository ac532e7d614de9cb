//! One-shot setup checks (`--check`) and sample alerts (`--sample-alerts`).
//!
//! Both run once against the live configuration and exit; neither starts the
//! monitor loop.

use crate::monitor::{AlertEvent, Availability, DownEvent, HourlyReport, RecoveryEvent, StartedEvent};
use crate::notify::render::fmt_latency;
use crate::notify::{EmailNotifier, NotifierSet, NotifyError, TelegramNotifier};
use crate::probe::Prober;

use chrono::{DateTime, Utc};
use std::time::Duration;

const TEST_MESSAGE: &str = "🧪 Test message from sitewatch setup";
const TEST_EMAIL_SUBJECT: &str = "🧪 Test Email";
const TEST_EMAIL_BODY: &str = "Test email from sitewatch setup";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Passed(String),
    /// Optional part not configured.
    Skipped,
    Failed {
        reason: String,
        hint: Option<&'static str>,
    },
}

/// Result of one setup check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStep {
    pub name: &'static str,
    pub status: CheckStatus,
}

impl CheckStep {
    fn new(name: &'static str, status: CheckStatus) -> Self {
        Self { name, status }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, CheckStatus::Failed { .. })
    }
}

/// Probe the target once. Any HTTP response counts as reachable, even one
/// the monitor would treat as down.
pub async fn check_target<P: Prober>(prober: &P) -> CheckStep {
    let outcome = prober.probe().await;

    let status = if outcome.status_code == 0 {
        CheckStatus::Failed {
            reason: outcome
                .error_message
                .unwrap_or_else(|| "no response".to_string()),
            hint: Some("check WEBSITE_URL and that the site is reachable from this host"),
        }
    } else if outcome.success {
        CheckStatus::Passed(format!(
            "HTTP {} in {}, website is UP",
            outcome.status_code,
            fmt_latency(outcome.latency)
        ))
    } else {
        CheckStatus::Passed(format!(
            "HTTP {} in {}, website currently counts as DOWN",
            outcome.status_code,
            fmt_latency(outcome.latency)
        ))
    };

    CheckStep::new("website", status)
}

/// Check the bot token and send a test message to the chat.
pub async fn check_telegram(notifier: Option<&TelegramNotifier>) -> CheckStep {
    let Some(notifier) = notifier else {
        return CheckStep::new("telegram", CheckStatus::Skipped);
    };

    let username = match notifier.verify().await {
        Ok(username) => username,
        Err(e) => {
            return CheckStep::new(
                "telegram",
                CheckStatus::Failed {
                    reason: format!("bot token rejected: {}", e),
                    hint: Some("check TELEGRAM_BOT_TOKEN"),
                },
            )
        }
    };

    let status = match notifier.send_text(TEST_MESSAGE).await {
        Ok(()) => CheckStatus::Passed(format!("bot @{} sent a test message", username)),
        Err(e) => CheckStatus::Failed {
            hint: chat_not_found(&e).then_some("send /start to the bot first"),
            reason: e.to_string(),
        },
    };
    CheckStep::new("telegram", status)
}

/// Send a test email through the configured relay.
pub async fn check_email(notifier: Option<&EmailNotifier>) -> CheckStep {
    let Some(notifier) = notifier else {
        return CheckStep::new("email", CheckStatus::Skipped);
    };

    let status = match notifier.send_plain(TEST_EMAIL_SUBJECT, TEST_EMAIL_BODY).await {
        Ok(()) => CheckStatus::Passed("test email sent".to_string()),
        Err(e) => CheckStatus::Failed {
            hint: smtp_auth_rejected(&e)
                .then_some("use an app password (e.g. Gmail App Passwords), not the account password"),
            reason: e.to_string(),
        },
    };
    CheckStep::new("email", status)
}

fn chat_not_found(e: &NotifyError) -> bool {
    matches!(e, NotifyError::Telegram(msg) if msg.to_lowercase().contains("chat not found"))
}

fn smtp_auth_rejected(e: &NotifyError) -> bool {
    match e {
        NotifyError::Smtp(e) => e.status().is_some_and(|code| code.to_string() == "535"),
        _ => false,
    }
}

/// Run every check in order. Later checks run even if earlier ones fail.
pub async fn run_checks<P: Prober>(
    prober: &P,
    telegram: Option<&TelegramNotifier>,
    email: Option<&EmailNotifier>,
) -> Vec<CheckStep> {
    vec![
        check_target(prober).await,
        check_telegram(telegram).await,
        check_email(email).await,
    ]
}

/// Log every step; returns whether all of them passed or were skipped.
pub fn log_results(steps: &[CheckStep]) -> bool {
    for step in steps {
        match &step.status {
            CheckStatus::Passed(detail) => tracing::info!("Check: {} ok, {}", step.name, detail),
            CheckStatus::Skipped => tracing::info!("Check: {} not configured, skipped", step.name),
            CheckStatus::Failed { reason, hint } => {
                tracing::error!("Check: {} failed, {}", step.name, reason);
                if let Some(hint) = hint {
                    tracing::error!("Check: tip for {}: {}", step.name, hint);
                }
            }
        }
    }

    let failed = steps.iter().filter(|s| s.is_failure()).count();
    if failed == 0 {
        tracing::info!("Check: all {} checks passed", steps.len());
    } else {
        tracing::error!("Check: {} of {} checks failed", failed, steps.len());
    }
    failed == 0
}

/// One representative event of every kind, in the order they are sent.
pub fn sample_events(
    target: &str,
    check_interval: Duration,
    report_interval: Duration,
    now: DateTime<Utc>,
) -> Vec<AlertEvent> {
    vec![
        AlertEvent::Down(DownEvent {
            status_code: 0,
            error_message: "Connection timeout".to_string(),
            timestamp: now,
            failing_since: now,
            consecutive_failures: 1,
        }),
        AlertEvent::Recovery(RecoveryEvent {
            status_code: 200,
            latency: Some(Duration::from_millis(234)),
            downtime: Duration::from_secs(125),
            timestamp: now,
        }),
        AlertEvent::HourlyReport(HourlyReport {
            state: Availability::Up,
            uptime_percent: Some(98.33),
            average_latency: Some(Duration::from_millis(245)),
            total_checks: 60,
            failed_checks: 1,
            period_checks: 60,
            period_failed: 1,
            intervals_elapsed: 1,
            timestamp: now,
        }),
        AlertEvent::Started(StartedEvent {
            target: target.to_string(),
            check_interval,
            report_interval,
            timestamp: now,
        }),
    ]
}

/// Push each event through every notifier, waiting `pause` between events
/// to stay clear of chat rate limits. Returns whether every delivery succeeded.
pub async fn send_samples(notifiers: &NotifierSet, events: &[AlertEvent], pause: Duration) -> bool {
    let mut failures = 0;

    for (i, event) in events.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        for (name, result) in notifiers.deliver_all(event).await {
            match result {
                Ok(()) => tracing::info!("Samples: {} alert sent via {}", event.kind(), name),
                Err(e) => {
                    failures += 1;
                    tracing::error!("Samples: {} alert via {} failed: {}", event.kind(), name, e);
                }
            }
        }
    }

    if failures > 0 {
        tracing::error!("Samples: {} deliveries failed", failures);
    }
    failures == 0
}
