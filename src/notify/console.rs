//! Log-only notifier.

use super::{render, DeliveryResult, Notifier};
use crate::monitor::AlertEvent;

use async_trait::async_trait;

/// Writes every event to the log. Always enabled.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, event: &AlertEvent) -> DeliveryResult {
        match event {
            AlertEvent::Down(_) => tracing::warn!(kind = event.kind(), "{}", render::summary(event)),
            _ => tracing::info!(kind = event.kind(), "{}", render::summary(event)),
        }
        Ok(())
    }
}
