//! HTTP request handlers.

use super::AppState;
use crate::monitor::Availability;
use crate::notify::render::{escape_html, fmt_latency, fmt_uptime};
use crate::scheduler::MonitorSnapshot;

use axum::{
    extract::State,
    response::{Html, IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use std::time::Duration;

const STATUS_TEMPLATE: &str = include_str!("templates/status.html");

pub async fn handle_health() -> &'static str {
    "ok"
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot.borrow().clone();
    Json(snapshot)
}

pub async fn handle_index(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot.borrow().clone();
    Html(render_status_page(&snapshot))
}

fn fmt_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

fn render_status_page(snapshot: &MonitorSnapshot) -> String {
    let state_class = match snapshot.state {
        Availability::Up => "up",
        Availability::Down => "down",
        Availability::Unknown => "unknown",
    };

    let last_check = match &snapshot.last_check {
        None => "n/a".to_string(),
        Some(c) if c.success => format!(
            "UP at {}, HTTP {}, {}",
            fmt_time(Some(c.timestamp)),
            c.status_code,
            fmt_latency(c.latency_ms.map(|ms| Duration::from_secs_f64(ms / 1000.0)))
        ),
        Some(c) => format!(
            "DOWN at {}, {}",
            fmt_time(Some(c.timestamp)),
            escape_html(c.error.as_deref().unwrap_or("unknown error"))
        ),
    };

    let target = escape_html(&snapshot.target);
    let latency = fmt_latency(
        snapshot
            .average_latency_ms
            .map(|ms| Duration::from_secs_f64(ms / 1000.0)),
    );

    fill_template(
        STATUS_TEMPLATE,
        &[
            ("title", format!("{} - {}", snapshot.state, target)),
            ("target", target.clone()),
            ("state_class", state_class.to_string()),
            ("state", snapshot.state.as_str().to_string()),
            ("since", fmt_time(snapshot.since)),
            ("uptime", fmt_uptime(snapshot.uptime_percent)),
            ("latency", latency),
            ("total_checks", snapshot.total_checks.to_string()),
            ("failed_checks", snapshot.failed_checks.to_string()),
            ("period_checks", snapshot.period_checks.to_string()),
            ("period_failed", snapshot.period_failed.to_string()),
            ("last_check", last_check),
            ("next_report", fmt_time(Some(snapshot.next_report_at))),
        ],
    )
}

/// Substitute `{{name}}` placeholders in one pass. Inserted values are never
/// scanned again, so they may contain braces. Unknown names are left as is.
fn fill_template(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let after = &rest[open + 2..];
        let Some(close) = after.find("}}") else {
            break;
        };
        out.push_str(&rest[..open]);

        let name = &after[..close];
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 4]),
        }
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}
