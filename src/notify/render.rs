//! Message rendering for each notification channel.

use crate::monitor::{AlertEvent, Availability};

use chrono::{DateTime, Utc};
use std::time::Duration;

fn fmt_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Latency in whole milliseconds, or "n/a".
pub fn fmt_latency(latency: Option<Duration>) -> String {
    match latency {
        Some(d) => format!("{:.0}ms", d.as_secs_f64() * 1000.0),
        None => "n/a".to_string(),
    }
}

pub fn fmt_uptime(uptime: Option<f64>) -> String {
    match uptime {
        Some(u) => format!("{:.2}%", u),
        None => "n/a".to_string(),
    }
}

/// Compact human duration, e.g. "1h 2m 5s".
pub fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// One-line summary used for log output.
pub fn summary(event: &AlertEvent) -> String {
    match event {
        AlertEvent::Started(e) => format!(
            "STARTED | {} | every {}s",
            e.target,
            e.check_interval.as_secs()
        ),
        AlertEvent::Down(e) => format!(
            "DOWN | {} | code {} | {}",
            e.error_message,
            e.status_code,
            fmt_time(e.timestamp)
        ),
        AlertEvent::Recovery(e) => format!(
            "RECOVERED | {} | downtime {} | {}",
            fmt_latency(e.latency),
            fmt_duration(e.downtime),
            fmt_time(e.timestamp)
        ),
        AlertEvent::HourlyReport(e) => format!(
            "REPORT | {} | uptime {} | avg {} | {} checks, {} failed this period",
            e.state,
            fmt_uptime(e.uptime_percent),
            fmt_latency(e.average_latency),
            e.period_checks,
            e.period_failed
        ),
    }
}

/// Telegram message body (HTML parse mode).
pub fn telegram_text(target: &str, event: &AlertEvent) -> String {
    let target = escape_html(target);
    match event {
        AlertEvent::Started(e) => format!(
            "🚀 <b>Monitor Started</b>\n\n\
             🌐 Monitoring: {}\n\
             ⏱ Check interval: {}s\n\
             📊 Reports every: {}\n\
             ⏰ Started at: {}",
            target,
            e.check_interval.as_secs(),
            fmt_duration(e.report_interval),
            fmt_time(e.timestamp)
        ),
        AlertEvent::Down(e) => format!(
            "🚨 <b>WEBSITE DOWN!</b>\n\n\
             🌐 {}\n\
             ❌ Status: DOWN\n\
             📊 Code: {}\n\
             ⚠️ Error: {}\n\
             ⏰ {}",
            target,
            e.status_code,
            escape_html(&e.error_message),
            fmt_time(e.timestamp)
        ),
        AlertEvent::Recovery(e) => format!(
            "✅ <b>WEBSITE RECOVERED</b>\n\n\
             🌐 {}\n\
             ✅ Status: UP\n\
             📊 Code: {}\n\
             ⚡️ Response: {}\n\
             ⏱ Downtime: {}\n\
             ⏰ {}",
            target,
            e.status_code,
            fmt_latency(e.latency),
            fmt_duration(e.downtime),
            fmt_time(e.timestamp)
        ),
        AlertEvent::HourlyReport(e) => {
            let icon = if e.state == Availability::Up { "✅" } else { "❌" };
            format!(
                "📊 <b>Status Report</b>\n\n\
                 🌐 Website: {}\n\
                 {} Status: {}\n\
                 📈 Uptime: {}\n\
                 ⏱ Avg Response Time: {}\n\
                 🔍 Checks this period: {} ({} failed)\n\
                 🧮 Total checks: {} ({} failed)\n\n\
                 ⏰ {}",
                target,
                icon,
                e.state,
                fmt_uptime(e.uptime_percent),
                fmt_latency(e.average_latency),
                e.period_checks,
                e.period_failed,
                e.total_checks,
                e.failed_checks,
                fmt_time(e.timestamp)
            )
        }
    }
}

pub fn email_subject(target: &str, event: &AlertEvent) -> String {
    match event {
        AlertEvent::Started(_) => format!("[STARTED] Monitoring {}", target),
        AlertEvent::Down(_) => format!("[DOWN] {}", target),
        AlertEvent::Recovery(_) => format!("[RECOVERED] {}", target),
        AlertEvent::HourlyReport(e) => format!("[REPORT] {} is {}", target, e.state),
    }
}

/// Plain-text email body.
pub fn email_body(target: &str, event: &AlertEvent) -> String {
    match event {
        AlertEvent::Started(e) => format!(
            "MONITORING STARTED\n\n\
             Website: {}\n\
             Check Interval: {} seconds\n\
             Report Interval: {}\n\
             Started at: {}\n",
            target,
            e.check_interval.as_secs(),
            fmt_duration(e.report_interval),
            fmt_time(e.timestamp)
        ),
        AlertEvent::Down(e) => format!(
            "WEBSITE DOWN ALERT\n\n\
             URL: {}\n\
             Status: DOWN\n\
             Status Code: {}\n\
             Error: {}\n\
             Failing since: {}\n\
             Consecutive failures: {}\n\
             Time: {}\n",
            target,
            e.status_code,
            e.error_message,
            fmt_time(e.failing_since),
            e.consecutive_failures,
            fmt_time(e.timestamp)
        ),
        AlertEvent::Recovery(e) => format!(
            "WEBSITE RECOVERY ALERT\n\n\
             URL: {}\n\
             Status: UP\n\
             Status Code: {}\n\
             Response Time: {}\n\
             Downtime Duration: {} ({} seconds)\n\
             Time: {}\n",
            target,
            e.status_code,
            fmt_latency(e.latency),
            fmt_duration(e.downtime),
            e.downtime.as_secs(),
            fmt_time(e.timestamp)
        ),
        AlertEvent::HourlyReport(e) => format!(
            "STATUS REPORT\n\n\
             Website: {}\n\
             Current Status: {}\n\
             Uptime: {}\n\
             Average Response Time: {}\n\
             Checks This Period: {}\n\
             Failed This Period: {}\n\
             Total Checks: {}\n\
             Failed Checks: {}\n\n\
             Time: {}\n",
            target,
            e.state,
            fmt_uptime(e.uptime_percent),
            fmt_latency(e.average_latency),
            e.period_checks,
            e.period_failed,
            e.total_checks,
            e.failed_checks,
            fmt_time(e.timestamp)
        ),
    }
}
