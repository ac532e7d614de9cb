//! Background delivery of alert events.

use crate::monitor::AlertEvent;
use crate::notify::NotifierSet;

use tokio::sync::mpsc;

/// Capacity of the monitor → dispatcher channel.
pub const EVENT_QUEUE_SIZE: usize = 64;

/// Deliver events until the channel closes, then drain what is left.
///
/// Every failure is logged and absorbed here; nothing flows back to the
/// monitor loop.
pub async fn run_dispatcher(mut rx: mpsc::Receiver<AlertEvent>, notifiers: NotifierSet) {
    tracing::info!("Dispatcher: delivering through {:?}", notifiers.names());

    while let Some(event) = rx.recv().await {
        dispatch(&notifiers, &event).await;
    }

    tracing::info!("Dispatcher: event channel closed, stopping");
}

async fn dispatch(notifiers: &NotifierSet, event: &AlertEvent) {
    for (name, result) in notifiers.deliver_all(event).await {
        match result {
            Ok(()) => tracing::debug!("Dispatcher: {} event delivered via {}", event.kind(), name),
            Err(e) => tracing::error!(
                "Dispatcher: failed to deliver {} event via {}: {}",
                event.kind(),
                name,
                e
            ),
        }
    }
}
