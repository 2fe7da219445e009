//! Server lifecycle management
//!
//! Wires the HTTP router to the shared services and runs it until a
//! shutdown signal arrives.

use std::sync::Arc;
use tracing::info;

use paircall_api::AppState;
use paircall_core::{service::JoinCredentialService, store::DocumentStore, Config};

/// PairCall server - owns the HTTP surface
pub struct PairCallServer {
    config: Config,
    store: Arc<dyn DocumentStore>,
    credential_service: Option<Arc<JoinCredentialService>>,
}

impl PairCallServer {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        credential_service: Option<Arc<JoinCredentialService>>,
    ) -> Self {
        Self {
            config,
            store,
            credential_service,
        }
    }

    /// Serve until ctrl-c.
    pub async fn start(self) -> anyhow::Result<()> {
        let state = AppState::new(self.store, self.credential_service);
        let router = paircall_api::create_router(state);

        let addr = self.config.http_address();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("HTTP server listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {e}"),
    }
}
