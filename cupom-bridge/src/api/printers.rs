//! Installed printers route
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /impressoras | GET | printers registered with the OS |

use axum::{Json, Router, extract::State, routing::get};
use cupom_printer::InstalledPrinter;
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().route("/impressoras", get(list))
}

#[derive(Debug, Serialize)]
pub struct PrinterView {
    pub nome: String,
    pub porta: Option<String>,
}

impl From<InstalledPrinter> for PrinterView {
    fn from(p: InstalledPrinter) -> Self {
        Self {
            nome: p.name,
            porta: p.port,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PrintersResponse {
    pub sucesso: bool,
    pub impressoras: Vec<PrinterView>,
}

/// GET /impressoras
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<PrintersResponse>> {
    let printers = state
        .resolver
        .installed()
        .await
        .map_err(|e| AppError::Unexpected(format!("Falha ao listar impressoras: {e}")))?;

    Ok(Json(PrintersResponse {
        sucesso: true,
        impressoras: printers.into_iter().map(PrinterView::from).collect(),
    }))
}
