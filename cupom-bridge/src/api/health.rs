//! Health check route
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /health | GET | liveness + host platform |
//!
//! ```json
//! { "status": "online", "plataforma": "windows", "timestamp": "2026-10-18T12:00:00.000Z" }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub plataforma: &'static str,
    pub timestamp: String,
    pub versao: &'static str,
    pub uptime_segundos: u64,
}

/// GET /health
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        plataforma: std::env::consts::OS,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        versao: env!("CARGO_PKG_VERSION"),
        uptime_segundos: state.uptime_seconds(),
    })
}
