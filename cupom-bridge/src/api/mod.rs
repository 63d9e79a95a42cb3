//! API routes
//!
//! - [`print`] - receipt printing
//! - [`health`] - liveness
//! - [`printers`] - installed printer listing

pub mod health;
pub mod print;
pub mod printers;
