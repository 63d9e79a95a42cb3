//! # cupom-printer
//!
//! Receipt printing for the local print bridge - HOW bytes reach a printer.
//!
//! ## Scope
//!
//! - Device path sanitization and printer resolution
//! - Base64 receipt payload decoding
//! - Network printing (raw TCP, port 9100)
//! - Windows spooler printing through a scripting host helper
//! - Delayed, guaranteed temp file cleanup
//!
//! Receipt rendering (WHAT to print) happens upstream: the frontend sends
//! ready ESC/POS bytes.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cupom_printer::{
//!     CleanupQueue, OsPrintDispatcher, PowerShellHost, PrintDispatcher, PrinterType,
//!     ResolvedPrinter, SpoolerConfig, SpoolerPrinter, decode_payload,
//! };
//!
//! let host = Arc::new(PowerShellHost::default());
//! let spooler = SpoolerPrinter::new(host, CleanupQueue::start(), SpoolerConfig::default());
//! let dispatcher = OsPrintDispatcher::new(spooler);
//!
//! let bytes = decode_payload("SGVsbG8=", &PrinterType::EpsonTmT20)?;
//! let printer = ResolvedPrinter::new("192.168.1.50:9100", None);
//! let outcome = dispatcher.dispatch(&bytes, &printer).await?;
//! ```

mod cleanup;
mod device;
mod dispatcher;
mod error;
mod network;
mod payload;
mod spooler;

// Re-exports
pub use cleanup::{CleanupQueue, TempFileGuard};
pub use device::{
    DEVICE_NAMESPACES, DevicePathError, DeviceResolver, InstalledPrinter,
    InstalledPrinterResolver, ResolvedPrinter, match_installed, validate_device_path,
};
pub use dispatcher::{OsPrintDispatcher, PrintDispatcher, PrintOutcome, Route, classify_route};
pub use error::{DecodeError, PrintError, PrintResult};
pub use network::NetworkPrinter;
pub use payload::{PrinterType, decode_payload, encode_payload};
pub use spooler::{
    HelperOutput, HelperSource, PowerShellHost, RAW_PRINT_HELPER, SUCCESS_MARKER, SpoolHost,
    SpoolerConfig, SpoolerPrinter, parse_helper_output, parse_printer_list, temp_file_name,
};
