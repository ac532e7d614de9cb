//! sitewatch - single-target HTTP uptime monitor
//!
//! Probes one URL on a fixed interval, alerts on up/down transitions and
//! sends a periodic availability report.
//!
//! Usage: sitewatch [OPTIONS]
//!
//! Options:
//!   --check          Check the target and notifiers once, then exit
//!   --sample-alerts  Send one alert of every kind, then exit

mod config;
mod monitor;
mod notify;
mod preflight;
mod probe;
mod scheduler;
mod web;

#[cfg(test)]
mod test_support;

use config::MonitorConfig;
use notify::{EmailNotifier, LogNotifier, NotifierSet, TelegramNotifier};
use probe::HttpProber;
use scheduler::{run_dispatcher, Monitor, EVENT_QUEUE_SIZE};
use web::Server;

use clap::Parser;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Delay between sample alerts, to stay under chat rate limits.
const SAMPLE_PAUSE: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "sitewatch")]
#[command(about = "Single-target HTTP uptime monitor with Telegram and email alerts")]
#[command(version)]
struct Cli {
    /// Probe the target, test Telegram and email once, then exit
    #[arg(long, conflicts_with = "sample_alerts")]
    check: bool,

    /// Send one sample of every alert kind through the notifiers, then exit
    #[arg(long)]
    sample_alerts: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitewatch=info".parse()?))
        .init();

    let cfg = MonitorConfig::load()?;
    let (telegram, email) = remote_notifiers(&cfg)?;

    if cli.check {
        return run_check(&cfg, telegram.as_ref(), email.as_ref()).await;
    }

    if let Some(telegram) = &telegram {
        match telegram.verify().await {
            Ok(username) => tracing::info!("Telegram bot @{} ready", username),
            Err(e) => tracing::warn!("Telegram bot check failed, alerts may not arrive: {}", e),
        }
    }
    let notifiers = notifier_set(&cfg, telegram, email);

    if cli.sample_alerts {
        return run_samples(&cfg, &notifiers).await;
    }

    tracing::info!("Starting sitewatch for {}", cfg.target_url);
    // Allow the dispatcher to finish what is queued on shutdown.
    let drain_timeout = cfg.delivery_timeout.saturating_mul(notifiers.len() as u32 + 1);

    let prober = HttpProber::new(&cfg.target_url, cfg.probe_timeout)?;

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    let (stop_tx, _) = broadcast::channel::<()>(1);

    let (monitor, snapshots) = Monitor::new(&cfg, prober, events_tx)?;

    let dispatcher = tokio::spawn(run_dispatcher(events_rx, notifiers));

    if let Some(port) = cfg.http_port {
        let server = Server::new(port, snapshots);
        let stop_rx = stop_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.start(stop_rx).await {
                tracing::error!("Status server failed: {}", e);
            }
        });
    }

    let monitor_handle = tokio::spawn(monitor.run(stop_tx.subscribe()));

    shutdown_signal().await;
    tracing::info!("Shutdown requested");
    let _ = stop_tx.send(());

    if let Err(e) = monitor_handle.await {
        tracing::error!("Monitor task failed: {}", e);
    }

    // The monitor owned the only sender, so the dispatcher now drains and exits.
    match tokio::time::timeout(drain_timeout, dispatcher).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Dispatcher task failed: {}", e),
        Err(_) => tracing::warn!("Dispatcher did not drain within {:?}", drain_timeout),
    }

    tracing::info!("Stopped");
    Ok(())
}

fn remote_notifiers(
    cfg: &MonitorConfig,
) -> Result<(Option<TelegramNotifier>, Option<EmailNotifier>), BoxError> {
    let telegram = cfg
        .telegram
        .as_ref()
        .map(|t| TelegramNotifier::new(t, &cfg.target_url, cfg.delivery_timeout))
        .transpose()?;

    let email = cfg
        .email
        .as_ref()
        .map(|e| EmailNotifier::new(e, &cfg.target_url, cfg.delivery_timeout))
        .transpose()?;

    Ok((telegram, email))
}

fn notifier_set(
    cfg: &MonitorConfig,
    telegram: Option<TelegramNotifier>,
    email: Option<EmailNotifier>,
) -> NotifierSet {
    let mut notifiers = NotifierSet::new(cfg.delivery_timeout).with(LogNotifier);

    if let Some(telegram) = telegram {
        notifiers.push(telegram);
    }

    if let (Some(notifier), Some(email)) = (email, &cfg.email) {
        tracing::info!("Email alerts to {} via {}:{}", email.to, email.smtp_server, email.smtp_port);
        notifiers.push(notifier);
    }

    if !cfg.has_remote_notifiers() {
        tracing::warn!("No Telegram or email notifier configured, alerts go to the log only");
    }

    notifiers
}

async fn run_check(
    cfg: &MonitorConfig,
    telegram: Option<&TelegramNotifier>,
    email: Option<&EmailNotifier>,
) -> Result<(), BoxError> {
    tracing::info!("Checking setup for {}", cfg.target_url);

    let prober = HttpProber::new(&cfg.target_url, cfg.probe_timeout)?;
    let steps = preflight::run_checks(&prober, telegram, email).await;

    if preflight::log_results(&steps) {
        Ok(())
    } else {
        Err("setup check failed".into())
    }
}

async fn run_samples(cfg: &MonitorConfig, notifiers: &NotifierSet) -> Result<(), BoxError> {
    tracing::info!("Sending sample alerts through {:?}", notifiers.names());

    let events = preflight::sample_events(
        &cfg.target_url,
        cfg.check_interval,
        cfg.decider.report_interval,
        chrono::Utc::now(),
    );

    if preflight::send_samples(notifiers, &events, SAMPLE_PAUSE).await {
        Ok(())
    } else {
        Err("some sample alerts failed".into())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
