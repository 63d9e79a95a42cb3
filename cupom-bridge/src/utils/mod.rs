//! Utilities - error type, logging, validation
//!
//! - [`AppError`] - handler error with JSON response mapping
//! - [`logger`] - tracing subscriber setup
//! - [`validation`] - request field checks

pub mod error;
pub mod logger;
pub mod validation;

pub use error::{AppError, AppResult, ErrorBody};
