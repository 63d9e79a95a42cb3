//! Receipt print route
//!
//! | Path | Method | Meaning |
//! |------|--------|---------|
//! | /imprimir/cupom-fiscal | POST | print a pre-rendered ESC/POS receipt |
//!
//! # Request
//!
//! ```json
//! {
//!   "pedidoId": "p1",
//!   "tipoImpressora": "EPSON_TM_T20",
//!   "devicePath": "192.168.1.50:9100",
//!   "dadosCupom": "SGVsbG8="
//! }
//! ```
//!
//! # Responses
//!
//! - 200 `{ "sucesso": true, "mensagem", "pedidoId", "dataImpressao" }`
//! - 400 validation error or unknown printer
//! - 500 dispatch failure or unexpected error

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    routing::post,
};
use chrono::{SecondsFormat, Utc};
use cupom_printer::{PrintError, PrinterType, decode_payload};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::ServerState;
use crate::utils::validation::{MAX_ID_LEN, check_len, require_device_path, require_text};
use crate::utils::{AppError, AppResult};

/// Receipts with embedded logos can be large
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/imprimir/cupom-fiscal", post(print_receipt))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// Incoming body; every field optional so missing ones get a 400 naming them
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintRequest {
    #[serde(alias = "orderId")]
    pub pedido_id: Option<String>,
    #[serde(alias = "printerType")]
    pub tipo_impressora: Option<String>,
    pub device_path: Option<String>,
    #[serde(alias = "receiptData")]
    pub dados_cupom: Option<String>,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub order_id: String,
    pub printer_type: PrinterType,
    pub device_path: String,
    pub receipt_data: String,
}

impl PrintRequest {
    pub fn validate(&self) -> AppResult<PrintJob> {
        let order_id = require_text(self.pedido_id.as_deref(), "pedidoId")?;
        check_len(order_id, "pedidoId", MAX_ID_LEN)?;
        let printer_type = require_text(self.tipo_impressora.as_deref(), "tipoImpressora")?;
        check_len(printer_type, "tipoImpressora", MAX_ID_LEN)?;
        let device_path = require_device_path(self.device_path.as_deref())?;
        let receipt_data = require_text(self.dados_cupom.as_deref(), "dadosCupom")?;

        Ok(PrintJob {
            order_id: order_id.to_string(),
            printer_type: PrinterType::from(printer_type),
            device_path: device_path.to_string(),
            receipt_data: receipt_data.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintResponse {
    pub sucesso: bool,
    pub mensagem: String,
    pub pedido_id: String,
    /// ISO-8601
    pub data_impressao: String,
}

/// POST /imprimir/cupom-fiscal
#[instrument(skip_all)]
pub async fn print_receipt(
    State(state): State<ServerState>,
    payload: Result<Json<PrintRequest>, JsonRejection>,
) -> AppResult<Json<PrintResponse>> {
    let Json(req) = payload?;
    info!(
        order_id = ?req.pedido_id,
        device_path = ?req.device_path,
        "Print request received"
    );

    let job = req.validate()?;
    info!(
        order_id = %job.order_id,
        device_path = %job.device_path,
        printer_type = %job.printer_type,
        "Print request validated"
    );

    let printer = state
        .resolver
        .resolve(&job.device_path)
        .await
        .map_err(|e| AppError::Unexpected(e.to_string()))?
        .ok_or_else(|| AppError::DeviceNotFound(job.device_path.clone()))?;
    info!(
        order_id = %job.order_id,
        device_path = %printer.device_path,
        display_name = ?printer.display_name,
        "Device resolved"
    );

    let bytes = decode_payload(&job.receipt_data, &job.printer_type)
        .map_err(|e| AppError::validation(format!("dadosCupom inválido: {e}")))?;
    info!(order_id = %job.order_id, bytes = bytes.len(), "Payload converted");

    // Detached so a client disconnect does not kill an in-flight spooler job
    let dispatcher = state.dispatcher.clone();
    let outcome = tokio::spawn(async move { dispatcher.dispatch(&bytes, &printer).await })
        .await
        .unwrap_or_else(|e| Err(PrintError::Join(e.to_string())))
        .map_err(|e| AppError::Unexpected(e.to_string()))?;

    if !outcome.success {
        let reason = outcome
            .error_message
            .unwrap_or_else(|| "Falha ao imprimir cupom".to_string());
        return Err(AppError::Dispatch(reason));
    }

    info!(order_id = %job.order_id, "Receipt dispatched");

    Ok(Json(PrintResponse {
        sucesso: true,
        mensagem: "Cupom enviado para impressão".to_string(),
        pedido_id: job.order_id,
        data_impressao: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
