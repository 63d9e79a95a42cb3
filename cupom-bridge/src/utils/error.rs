//! Unified error handling
//!
//! Every failure leaves the bridge as
//!
//! ```json
//! { "sucesso": false, "mensagem": "..." }
//! ```
//!
//! | Variant | Status |
//! |---------|--------|
//! | Validation | 400 |
//! | DeviceNotFound | 400 |
//! | Forbidden | 403 |
//! | Dispatch | 500 |
//! | Unexpected | 500 |

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub sucesso: bool,
    pub mensagem: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or incomplete request (400)
    #[error("{0}")]
    Validation(String),

    /// No printer matched the devicePath (400)
    #[error("Impressora não encontrada: {0}")]
    DeviceNotFound(String),

    /// Origin not allowed (403)
    #[error("Forbidden")]
    Forbidden,

    /// Dispatcher reported a failure (500)
    #[error("{0}")]
    Dispatch(String),

    /// Unexpected failure during dispatch, message passed through (500)
    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DeviceNotFound(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Dispatch(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Dispatch(msg) => warn!(error = %msg, "Print dispatch failed"),
            AppError::Unexpected(msg) => error!(error = %msg, "Unexpected print error"),
            _ => {}
        }

        let body = Json(ErrorBody {
            sucesso: false,
            mensagem: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(format!("Corpo da requisição inválido: {}", e.body_text()))
    }
}

/// Handler result type
pub type AppResult<T> = Result<T, AppError>;
