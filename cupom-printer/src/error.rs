//! Error types for the printer library

use thiserror::Error;

/// Payload decoding error
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is empty after trimming
    #[error("Receipt payload is empty")]
    Empty,

    /// Payload is not valid base64
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing or temp file handling
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Printer is not registered with the OS spooler
    #[error("Printer not found: {0}")]
    PrinterNotFound(String),

    /// Spooler helper did not finish in time
    #[error("Print helper timed out after {0} ms")]
    HelperTimeout(u64),

    /// Spooler helper reported a failure (exit code or marker line)
    #[error("Print helper failed: {0}")]
    HelperFailed(String),

    /// The scripting host could not be started at all
    #[error("Failed to start print helper: {0}")]
    Spawn(String),

    /// Background task could not be joined
    #[error("Task join failed: {0}")]
    Join(String),

    /// Payload could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl PrintError {
    /// Errors that escape the dispatcher as `Err` instead of a failed outcome.
    pub fn is_exceptional(&self) -> bool {
        matches!(self, PrintError::Spawn(_) | PrintError::Join(_))
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exceptional_classification() {
        assert!(PrintError::Spawn("powershell: not found".into()).is_exceptional());
        assert!(PrintError::Join("panicked".into()).is_exceptional());
        assert!(!PrintError::HelperTimeout(30_000).is_exceptional());
        assert!(!PrintError::PrinterNotFound("EPSON".into()).is_exceptional());
        assert!(!PrintError::Connection("refused".into()).is_exceptional());
    }

    #[test]
    fn test_helper_failed_message_keeps_reason() {
        let err = PrintError::HelperFailed("ERRO:OpenPrinter falhou (1801)".into());
        assert!(err.to_string().contains("1801"));
    }
}
