//! Configuration module for sitewatch.
//!
//! Loads configuration from environment variables (optionally seeded from a
//! `.env` file) with sensible defaults.

use crate::monitor::DeciderConfig;

use reqwest::Url;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for every configured interval and timeout.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 3600);

/// Configuration error types. All of them are fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Base URL of the Bot API (default: "https://api.telegram.org")
    pub api_url: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// SMTP email settings.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub from: String,
    pub to: String,
    pub password: String,
    /// SMTP relay host (default: "smtp.gmail.com")
    pub smtp_server: String,
    /// SMTP submission port (default: 587)
    pub smtp_port: u16,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("password", &"***")
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(10).collect();
    format!("{}...", visible)
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// URL of the monitored website
    pub target_url: String,
    /// Time between probes (default: 60s)
    pub check_interval: Duration,
    /// Per-probe timeout (default: 10s)
    pub probe_timeout: Duration,
    /// Statistics and alerting parameters
    pub decider: DeciderConfig,
    /// Upper bound for a single notification delivery (default: 10s)
    pub delivery_timeout: Duration,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
    /// Port of the status page; disabled when unset
    pub http_port: Option<u16>,
}

impl MonitorConfig {
    /// Load configuration from a `.env` file, if any, and the environment.
    ///
    /// Environment variables:
    /// - `WEBSITE_URL`: target URL (required)
    /// - `CHECK_INTERVAL`: seconds between probes (default: 60)
    /// - `PROBE_TIMEOUT`: probe timeout in seconds (default: 10)
    /// - `WINDOW_CAPACITY`: rolling window size (default: 60)
    /// - `REPORT_INTERVAL`: seconds between reports (default: 3600)
    /// - `ALERT_ON_INITIAL_DOWN`: alert when the first probe fails (default: false)
    /// - `FAILURE_THRESHOLD`: consecutive failures before declaring down (default: 1)
    /// - `DELIVERY_TIMEOUT`: seconds per notification (default: 10)
    /// - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `TELEGRAM_API_URL`
    /// - `EMAIL_FROM`, `EMAIL_TO`, `EMAIL_PASSWORD`, `SMTP_SERVER`, `SMTP_PORT`
    /// - `MONITOR_HTTP_PORT`: enables the status page on this port
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let target_url = get("WEBSITE_URL").ok_or(ConfigError::Missing("WEBSITE_URL"))?;

        let decider = DeciderConfig {
            window_capacity: parse_or(&get, "WINDOW_CAPACITY", 60)?,
            report_interval: Duration::from_secs(parse_or(&get, "REPORT_INTERVAL", 3600)?),
            alert_on_initial_down: parse_bool_or(&get, "ALERT_ON_INITIAL_DOWN", false)?,
            failure_threshold: parse_or(&get, "FAILURE_THRESHOLD", 1)?,
        };

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_url: get("TELEGRAM_API_URL")
                    .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("TELEGRAM_CHAT_ID")),
            (None, Some(_)) => return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN")),
        };

        let email = match (get("EMAIL_FROM"), get("EMAIL_TO"), get("EMAIL_PASSWORD")) {
            (Some(from), Some(to), Some(password)) => Some(EmailConfig {
                from,
                to,
                password,
                smtp_server: get("SMTP_SERVER").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                smtp_port: parse_or(&get, "SMTP_PORT", 587)?,
            }),
            (None, None, None) => None,
            (from, to, _) => {
                let missing = if from.is_none() {
                    "EMAIL_FROM"
                } else if to.is_none() {
                    "EMAIL_TO"
                } else {
                    "EMAIL_PASSWORD"
                };
                return Err(ConfigError::Missing(missing));
            }
        };

        let http_port = get("MONITOR_HTTP_PORT")
            .map(|v| {
                v.parse::<u16>()
                    .map_err(|e| ConfigError::invalid("MONITOR_HTTP_PORT", e.to_string()))
            })
            .transpose()?;

        let cfg = Self {
            target_url,
            check_interval: Duration::from_secs(parse_or(&get, "CHECK_INTERVAL", 60)?),
            probe_timeout: Duration::from_secs(parse_or(&get, "PROBE_TIMEOUT", 10)?),
            decider,
            delivery_timeout: Duration::from_secs(parse_or(&get, "DELIVERY_TIMEOUT", 10)?),
            telegram,
            email,
            http_port,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the settings the monitor cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.target_url)
            .map_err(|e| ConfigError::invalid("WEBSITE_URL", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid("WEBSITE_URL", "scheme must be http or https"));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ConfigError::invalid("WEBSITE_URL", "missing host"));
        }

        for (key, value) in [
            ("CHECK_INTERVAL", self.check_interval),
            ("PROBE_TIMEOUT", self.probe_timeout),
            ("DELIVERY_TIMEOUT", self.delivery_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
            if value > MAX_DURATION {
                return Err(ConfigError::invalid(key, "must be at most one year"));
            }
        }

        self.decider.validate()
    }

    /// Whether any remote notification channel is configured.
    pub fn has_remote_notifiers(&self) -> bool {
        self.telegram.is_some() || self.email.is_some()
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => v
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, format!("{:?}: {}", v, e))),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, format!("{:?} is not a boolean", v))),
        },
    }
}
