//! HTTP probe implementation.

use super::{ProbeError, ProbeOutcome, Prober};

use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};

/// Probes a single URL with an HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProber {
    /// Build a prober for `url`; every request is bounded by `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
        })
    }

    fn classify(&self, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else if e.is_connect() {
            ProbeError::Connect(e.to_string())
        } else {
            ProbeError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self) -> ProbeOutcome {
        let timestamp = Utc::now();
        let start = Instant::now();

        let response = match self.client.get(&self.url).send().await {
            Ok(r) => r,
            Err(e) => {
                let err = self.classify(e);
                tracing::debug!("Probe: request to {} failed: {:?}", self.url, err);
                return ProbeOutcome::failure(timestamp, &err);
            }
        };

        let status_code = response.status().as_u16();

        // Read the full body to measure complete transfer time
        if let Err(e) = response.bytes().await {
            let err = self.classify(e);
            tracing::debug!("Probe: body read from {} failed: {:?}", self.url, err);
            return ProbeOutcome {
                timestamp,
                success: false,
                status_code,
                latency: Some(start.elapsed()),
                error_message: Some(err.to_string()),
            };
        }

        ProbeOutcome::response(timestamp, status_code, start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_server;

    use axum::{http::StatusCode, routing::get, Router};

    fn site() -> Router {
        Router::new()
            .route("/ok", get(|| async { "hello" }))
            .route("/moved", get(|| async { (StatusCode::FOUND, [("location", "/ok")]) }))
            .route("/broken", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "late"
                }),
            )
    }

    #[tokio::test]
    async fn test_http_probe_success() {
        let base = spawn_server(site()).await;
        let prober = HttpProber::new(&format!("{}/ok", base), Duration::from_secs(5)).unwrap();

        let out = prober.probe().await;
        assert!(out.success);
        assert_eq!(out.status_code, 200);
        assert!(out.latency.is_some());
        assert!(out.error_message.is_none());
    }

    #[tokio::test]
    async fn test_http_probe_follows_redirect() {
        let base = spawn_server(site()).await;
        let prober = HttpProber::new(&format!("{}/moved", base), Duration::from_secs(5)).unwrap();

        let out = prober.probe().await;
        assert!(out.success);
        assert_eq!(out.status_code, 200);
    }

    #[tokio::test]
    async fn test_http_probe_server_error() {
        let base = spawn_server(site()).await;
        let prober = HttpProber::new(&format!("{}/broken", base), Duration::from_secs(5)).unwrap();

        let out = prober.probe().await;
        assert!(!out.success);
        assert_eq!(out.status_code, 503);
        assert!(out.latency.is_some());
        assert_eq!(out.error_message.as_deref(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::new(&format!("http://{}/", addr), Duration::from_secs(5)).unwrap();
        let out = prober.probe().await;
        assert!(!out.success);
        assert_eq!(out.status_code, 0);
        assert!(out.latency.is_none());
        assert_eq!(out.error_message.as_deref(), Some("Connection failed"));
    }

    #[tokio::test]
    async fn test_http_probe_timeout() {
        let base = spawn_server(site()).await;
        let prober = HttpProber::new(&format!("{}/slow", base), Duration::from_millis(200)).unwrap();

        let out = prober.probe().await;
        assert!(!out.success);
        assert_eq!(out.status_code, 0);
        assert_eq!(out.error_message.as_deref(), Some("Connection timeout"));
    }
}
