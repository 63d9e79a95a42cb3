use std::path::PathBuf;
use std::time::Duration;

use cupom_printer::{HelperSource, SpoolerConfig};

/// Production origins allowed when `CORS_ALLOWED_ORIGINS` is not set
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://cardapio.lanchonete.app",
    "https://admin.lanchonete.app",
];

/// Bridge configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | HTTP_HOST | 127.0.0.1 | bind address |
/// | HTTP_PORT | 3001 | bind port |
/// | CORS_ALLOWED_ORIGINS | built-in list | comma-separated production origins |
/// | LOG_LEVEL | info | log level |
/// | LOG_DIR | - | daily rolling log files |
/// | NETWORK_TIMEOUT_MS | 5000 | TCP connect/write timeout |
/// | SPOOLER_HELPER_TIMEOUT_MS | 30000 | helper subprocess hard timeout |
/// | SPOOLER_PROBE_TIMEOUT_MS | 5000 | printer list / existence probe timeout |
/// | SPOOLER_PAYLOAD_CLEANUP_MS | 30000 | payload temp file removal delay |
/// | SPOOLER_SCRIPT_CLEANUP_MS | 5000 | staged helper removal delay |
/// | SPOOLER_SCRIPT_HOST | powershell | scripting host executable |
/// | SPOOLER_HELPER_PATH | - | shipped helper, staged per job when unset |
/// | SPOOL_DIR | OS temp dir | temp file directory |
/// | RESOLVER_LITERAL_FALLBACK | true | unmatched devicePath used as printer name |
///
/// # Example
///
/// ```ignore
/// HTTP_PORT=3100 CORS_ALLOWED_ORIGINS=https://pdv.example.com cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub http_host: String,
    pub http_port: u16,
    /// Origins allowed in addition to localhost / 127.0.0.1
    pub allowed_origins: Vec<String>,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub network_timeout_ms: u64,
    pub helper_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub payload_cleanup_ms: u64,
    pub script_cleanup_ms: u64,
    pub script_host: String,
    pub helper_path: Option<PathBuf>,
    pub spool_dir: PathBuf,
    pub literal_fallback: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an on/off flag: `1/0`, `true/false`, `yes/no`, `on/off`, any case
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    let Some(raw) = env_opt(key) else {
        return default;
    };
    parse_flag(&raw).unwrap_or_else(|| {
        // Runs before the logger is up
        eprintln!("{key}={raw} is not a recognized flag, using {default}");
        default
    })
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            http_host: env_opt("HTTP_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            http_port: env_or("HTTP_PORT", 3001),
            allowed_origins: env_opt("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_else(|| {
                    DEFAULT_ALLOWED_ORIGINS
                        .iter()
                        .map(|o| o.to_string())
                        .collect()
                }),
            log_level: env_opt("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_dir: env_opt("LOG_DIR"),
            network_timeout_ms: env_or("NETWORK_TIMEOUT_MS", 5_000),
            helper_timeout_ms: env_or("SPOOLER_HELPER_TIMEOUT_MS", 30_000),
            probe_timeout_ms: env_or("SPOOLER_PROBE_TIMEOUT_MS", 5_000),
            payload_cleanup_ms: env_or("SPOOLER_PAYLOAD_CLEANUP_MS", 30_000),
            script_cleanup_ms: env_or("SPOOLER_SCRIPT_CLEANUP_MS", 5_000),
            script_host: env_opt("SPOOLER_SCRIPT_HOST").unwrap_or_else(|| "powershell".into()),
            helper_path: env_opt("SPOOLER_HELPER_PATH").map(PathBuf::from),
            spool_dir: env_opt("SPOOL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            literal_fallback: env_flag("RESOLVER_LITERAL_FALLBACK", true),
        }
    }

    /// Bind address, e.g. `127.0.0.1:3001`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Spooler strategy settings derived from this config
    pub fn spooler(&self) -> SpoolerConfig {
        SpoolerConfig {
            spool_dir: self.spool_dir.clone(),
            helper: match &self.helper_path {
                Some(path) => HelperSource::Shipped(path.clone()),
                None => HelperSource::Staged,
            },
            helper_timeout: Duration::from_millis(self.helper_timeout_ms),
            payload_cleanup_delay: Duration::from_millis(self.payload_cleanup_ms),
            script_cleanup_delay: Duration::from_millis(self.script_cleanup_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://a.example.com/, ,https://b.example.com "),
            vec!["https://a.example.com", "https://b.example.com"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_parse_flag_spellings() {
        for raw in ["1", "true", "TRUE", " Yes ", "on"] {
            assert_eq!(parse_flag(raw), Some(true), "{raw}");
        }
        for raw in ["0", "false", "FALSE", "no", "Off"] {
            assert_eq!(parse_flag(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn test_spooler_config_helper_source() {
        let mut config = Config::from_env();
        config.helper_path = None;
        config.payload_cleanup_ms = 30_000;
        config.script_cleanup_ms = 5_000;
        let spooler = config.spooler();
        assert_eq!(spooler.helper, HelperSource::Staged);
        assert!(spooler.payload_cleanup_delay > spooler.script_cleanup_delay);

        config.helper_path = Some(PathBuf::from(r"C:\cupom\RawPrint.ps1"));
        assert_eq!(
            config.spooler().helper,
            HelperSource::Shipped(PathBuf::from(r"C:\cupom\RawPrint.ps1"))
        );
    }
}
