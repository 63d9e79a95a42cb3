//! Print dispatch: pick a strategy from the device path and run it
//!
//! `IPv4:port` device paths go to the network strategy, everything else to
//! the OS spooler. No retry and no fallback between strategies.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::device::ResolvedPrinter;
use crate::error::{PrintError, PrintResult};
use crate::network::NetworkPrinter;
use crate::spooler::SpoolerPrinter;

/// Strategy selected for a device path
///
/// Host and port are kept as written, range checks happen in the network
/// strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Network { host: String, port: String },
    Spooler,
}

/// Classify a device path
///
/// Network iff the path has the shape `\d+.\d+.\d+.\d+:\d+`. Pure and
/// deterministic.
pub fn classify_route(device_path: &str) -> Route {
    let Some((host, port)) = device_path.rsplit_once(':') else {
        return Route::Spooler;
    };

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let octets: Vec<&str> = host.split('.').collect();
    if octets.len() != 4 || !octets.iter().all(|o| all_digits(o)) || !all_digits(port) {
        return Route::Spooler;
    }

    Route::Network {
        host: host.to_string(),
        port: port.to_string(),
    }
}

/// Terminal result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintOutcome {
    pub success: bool,
    pub error_message: Option<String>,
}

impl PrintOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Sends decoded bytes to a resolved printer
#[async_trait]
pub trait PrintDispatcher: Send + Sync {
    /// Known failures come back as `Ok(PrintOutcome { success: false, .. })`;
    /// `Err` is reserved for [`PrintError::is_exceptional`] conditions.
    async fn dispatch(&self, data: &[u8], printer: &ResolvedPrinter) -> PrintResult<PrintOutcome>;
}

/// Dispatcher over the network and spooler strategies
#[derive(Clone)]
pub struct OsPrintDispatcher {
    network_timeout: Duration,
    spooler: SpoolerPrinter,
}

impl OsPrintDispatcher {
    pub fn new(spooler: SpoolerPrinter) -> Self {
        Self {
            network_timeout: Duration::from_secs(5),
            spooler,
        }
    }

    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    async fn send(&self, data: &[u8], printer: &ResolvedPrinter) -> PrintResult<()> {
        match classify_route(&printer.device_path) {
            Route::Network { host, port } => {
                info!(host = %host, port = %port, "Dispatching to network printer");
                let port: u16 = port
                    .parse()
                    .map_err(|_| PrintError::InvalidConfig(format!("Invalid port: {port}")))?;
                NetworkPrinter::new(&host, port)?
                    .with_timeout(self.network_timeout)
                    .print(data)
                    .await
            }
            Route::Spooler => {
                info!(device_path = %printer.device_path, "Dispatching to OS spooler");
                self.spooler
                    .print(data, &printer.device_path, printer.display_name.as_deref())
                    .await
            }
        }
    }
}

#[async_trait]
impl PrintDispatcher for OsPrintDispatcher {
    #[instrument(skip(self, data), fields(device_path = %printer.device_path, data_len = data.len()))]
    async fn dispatch(&self, data: &[u8], printer: &ResolvedPrinter) -> PrintResult<PrintOutcome> {
        match self.send(data, printer).await {
            Ok(()) => Ok(PrintOutcome::ok()),
            Err(e) if e.is_exceptional() => {
                error!(error = %e, "Dispatch aborted");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Dispatch failed");
                Ok(PrintOutcome::failed(e.to_string()))
            }
        }
    }
}
