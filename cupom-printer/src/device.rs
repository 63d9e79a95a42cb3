//! Device path sanitization and printer resolution
//!
//! A `devicePath` coming from the frontend is either:
//! - a network address (`192.168.1.50:9100`)
//! - an OS printer name or port (`EPSON TM-T20`, `USB001`)
//! - a device node inside an allowed namespace (`/dev/usb/lp0`, `\\.\COM3`)
//!
//! Anything else that looks like a filesystem path is rejected before the
//! path reaches the spooler.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatcher::{Route, classify_route};
use crate::error::PrintResult;
use crate::spooler::SpoolHost;

/// Namespaces under which absolute device paths are accepted
pub const DEVICE_NAMESPACES: &[&str] = &["/dev/", r"\\.\"];

/// Rejection reasons for a caller supplied device path
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DevicePathError {
    #[error("devicePath is empty")]
    Empty,

    #[error("devicePath must not contain '..'")]
    Traversal,

    #[error("devicePath contains control characters")]
    ControlCharacters,

    #[error("devicePath is an absolute path outside the allowed device namespaces")]
    OutsideNamespace,
}

/// Validate and normalize a device path
///
/// Returns the trimmed path on success.
pub fn validate_device_path(path: &str) -> Result<&str, DevicePathError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(DevicePathError::Empty);
    }
    if path.contains("..") {
        return Err(DevicePathError::Traversal);
    }
    if path.chars().any(char::is_control) {
        return Err(DevicePathError::ControlCharacters);
    }
    if is_absolute_path(path)
        && !DEVICE_NAMESPACES.iter().any(|ns| path.starts_with(ns))
        && !is_shared_printer(path)
    {
        return Err(DevicePathError::OutsideNamespace);
    }
    Ok(path)
}

/// Unix absolute paths, drive-letter paths and UNC/extended paths
fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive_letter = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');

    path.starts_with('/') || path.starts_with('\\') || drive_letter
}

/// Windows shared printer connection: `\\SERVER\Printer` (exactly two segments)
fn is_shared_printer(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(r"\\") else {
        return false;
    };
    let mut parts = rest.split('\\');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(host), Some(name), None)
            if !host.is_empty() && host != "." && host != "?" && !name.is_empty()
    )
}

/// A printer registered with the OS spooler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPrinter {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "PortName", default)]
    pub port: Option<String>,
}

impl InstalledPrinter {
    pub fn new(name: impl Into<String>, port: Option<&str>) -> Self {
        Self {
            name: name.into(),
            port: port.map(str::to_string),
        }
    }
}

/// Device descriptor handed to the dispatcher for one print call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrinter {
    pub device_path: String,
    pub display_name: Option<String>,
}

impl ResolvedPrinter {
    pub fn new(device_path: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            device_path: device_path.into(),
            display_name,
        }
    }
}

/// Find the installed printer best matching `needle`
///
/// Matching order, first hit in list order wins:
/// 1. exact name or port
/// 2. case-insensitive name or port
/// 3. case-insensitive substring containment of the name, either direction
pub fn match_installed<'a>(
    printers: &'a [InstalledPrinter],
    needle: &str,
) -> Option<&'a InstalledPrinter> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }

    if let Some(p) = printers
        .iter()
        .find(|p| p.name == needle || p.port.as_deref() == Some(needle))
    {
        return Some(p);
    }

    if let Some(p) = printers.iter().find(|p| {
        p.name.eq_ignore_ascii_case(needle)
            || p.port
                .as_deref()
                .is_some_and(|port| port.eq_ignore_ascii_case(needle))
    }) {
        return Some(p);
    }

    let lower = needle.to_lowercase();
    printers.iter().find(|p| {
        let name = p.name.to_lowercase();
        !name.is_empty() && (name.contains(&lower) || lower.contains(&name))
    })
}

/// Maps a sanitized device path to a concrete printer
#[async_trait]
pub trait DeviceResolver: Send + Sync {
    /// `Ok(None)` means no printer could be matched
    async fn resolve(&self, device_path: &str) -> PrintResult<Option<ResolvedPrinter>>;

    /// Printers currently known to the OS
    async fn installed(&self) -> PrintResult<Vec<InstalledPrinter>>;
}

/// Resolver backed by the OS printer list
pub struct InstalledPrinterResolver {
    host: Arc<dyn SpoolHost>,
    literal_fallback: bool,
}

impl InstalledPrinterResolver {
    pub fn new(host: Arc<dyn SpoolHost>) -> Self {
        Self {
            host,
            literal_fallback: true,
        }
    }

    /// Whether an unmatched path is used verbatim as a printer name
    pub fn with_literal_fallback(mut self, enabled: bool) -> Self {
        self.literal_fallback = enabled;
        self
    }
}

#[async_trait]
impl DeviceResolver for InstalledPrinterResolver {
    async fn resolve(&self, device_path: &str) -> PrintResult<Option<ResolvedPrinter>> {
        if let Route::Network { .. } = classify_route(device_path) {
            debug!(device_path, "Network address, skipping printer lookup");
            return Ok(Some(ResolvedPrinter::new(device_path, None)));
        }

        let printers = match self.host.installed_printers().await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Failed to list installed printers");
                Vec::new()
            }
        };

        if let Some(found) = match_installed(&printers, device_path) {
            info!(device_path, printer = %found.name, "Device resolved");
            return Ok(Some(ResolvedPrinter::new(
                device_path,
                Some(found.name.clone()),
            )));
        }

        if self.literal_fallback {
            info!(device_path, "No installed printer matched, using path as printer name");
            return Ok(Some(ResolvedPrinter::new(device_path, None)));
        }

        warn!(device_path, "No installed printer matched");
        Ok(None)
    }

    async fn installed(&self) -> PrintResult<Vec<InstalledPrinter>> {
        self.host.installed_printers().await
    }
}
