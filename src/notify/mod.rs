//! Notification delivery.
//!
//! Delivery failures are reported to the caller and never stop monitoring.

mod console;
mod email;
pub mod render;
mod telegram;

pub use console::*;
pub use email::*;
pub use telegram::*;

use crate::monitor::AlertEvent;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Notification error types.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Telegram(String),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("invalid email: {0}")]
    Email(String),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

pub type DeliveryResult = Result<(), NotifyError>;

/// A channel alert events can be delivered through.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &AlertEvent) -> DeliveryResult;
}

/// All configured notifiers, each delivery bounded by a timeout.
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
    timeout: Duration,
}

impl NotifierSet {
    pub fn new(timeout: Duration) -> Self {
        Self {
            notifiers: Vec::new(),
            timeout,
        }
    }

    pub fn push<N: Notifier + 'static>(&mut self, notifier: N) {
        self.notifiers.push(Box::new(notifier));
    }

    pub fn with<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Deliver `event` through every notifier, in order.
    pub async fn deliver_all(&self, event: &AlertEvent) -> Vec<(&'static str, DeliveryResult)> {
        let mut results = Vec::with_capacity(self.notifiers.len());
        for notifier in &self.notifiers {
            let result = tokio::time::timeout(self.timeout, notifier.deliver(event))
                .await
                .unwrap_or(Err(NotifyError::Timeout(self.timeout)));
            results.push((notifier.name(), result));
        }
        results
    }
}
