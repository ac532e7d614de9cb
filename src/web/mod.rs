//! Read-only status server.

mod handlers;

use crate::scheduler::MonitorSnapshot;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::sync::{broadcast, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
///
/// Holds only the snapshot receiver; the live monitor state is never shared.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: watch::Receiver<MonitorSnapshot>,
}

/// Status page server.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    pub fn new(port: u16, snapshot: watch::Receiver<MonitorSnapshot>) -> Self {
        Self {
            port,
            state: AppState { snapshot },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/", get(handlers::handle_index))
            .route("/health", get(handlers::handle_health))
            .route("/api/status", get(handlers::handle_status))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until the stop signal fires.
    pub async fn start(
        &self,
        mut stop_rx: broadcast::Receiver<()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Status server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}
