//! HTTP middleware

pub mod cors;
pub mod logging;

pub use cors::{OriginPolicy, cors_guard};
pub use logging::logging_middleware;
