//! Server Implementation
//!
//! HTTP server startup and shutdown

use anyhow::Context;
use tokio::net::TcpListener;

use crate::core::{Config, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let state = self.state.clone();

        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        tracing::info!("🖨️  Print bridge listening on {}", addr);

        let app = crate::routes::build_app(state.clone());

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        // Pending temp files would otherwise outlive the process
        if let Some(cleanup) = &state.cleanup {
            let removed = cleanup.shutdown().await;
            tracing::info!(removed, "Temp files flushed");
        }

        Ok(())
    }
}
