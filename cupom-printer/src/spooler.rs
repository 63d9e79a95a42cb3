//! OS spooler printing
//!
//! Raw bytes are handed to the Windows print spooler through a small helper
//! program (`helper/RawPrint.ps1`) run by a scripting host. The helper does
//! OpenPrinter → StartDoc → StartPage → WritePrinter (all bytes, one call)
//! → EndPage → EndDoc → ClosePrinter and reports a single marker line:
//!
//! ```text
//! SUCCESS: 128 bytes enviados
//! ERRO:OpenPrinter falhou (1801)
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::cleanup::{CleanupQueue, TempFileGuard};
use crate::device::{InstalledPrinter, match_installed};
use crate::error::{PrintError, PrintResult};

/// Versioned helper program, staged to disk when no shipped copy is configured
pub const RAW_PRINT_HELPER: &str = include_str!("../helper/RawPrint.ps1");

/// Marker the helper prints on success
pub const SUCCESS_MARKER: &str = "SUCCESS";

/// Captured output of one helper run
#[derive(Debug, Clone, Default)]
pub struct HelperOutput {
    pub exit_ok: bool,
    pub stdout: String,
    pub stderr: String,
}

impl HelperOutput {
    pub fn new(exit_ok: bool, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_ok,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

impl From<std::process::Output> for HelperOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_ok: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Interpret the helper's output
///
/// Success iff stdout contains [`SUCCESS_MARKER`]. Otherwise the combined
/// stdout/stderr (or a generic message) is the failure reason.
pub fn parse_helper_output(output: &HelperOutput) -> Result<(), String> {
    if output.stdout.contains(SUCCESS_MARKER) {
        return Ok(());
    }

    let reason = [output.stdout.trim(), output.stderr.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    if reason.is_empty() {
        Err("Print helper produced no output".to_string())
    } else {
        Err(reason)
    }
}

/// OS side of spooler printing
#[async_trait]
pub trait SpoolHost: Send + Sync {
    /// Printers registered with the OS
    async fn installed_printers(&self) -> PrintResult<Vec<InstalledPrinter>>;

    /// Whether a printer with this exact name is registered
    async fn printer_exists(&self, name: &str) -> PrintResult<bool>;

    /// Run the helper against `printer` with the payload in `data_file`
    async fn run_helper(
        &self,
        helper: &Path,
        data_file: &Path,
        printer: &str,
    ) -> PrintResult<HelperOutput>;
}

/// Windows PowerShell scripting host
#[derive(Debug, Clone)]
pub struct PowerShellHost {
    program: String,
    probe_timeout: Duration,
}

impl PowerShellHost {
    const BASE_ARGS: [&'static str; 4] = [
        "-NoProfile",
        "-NonInteractive",
        "-ExecutionPolicy",
        "Bypass",
    ];

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// Timeout for printer listing and existence probes
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(Self::BASE_ARGS)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, timeout: Duration) -> PrintResult<HelperOutput> {
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| PrintError::Timeout(format!("{} did not answer", self.program)))?
            .map_err(|e| PrintError::Spawn(format!("{}: {}", self.program, e)))?;

        Ok(output.into())
    }
}

impl Default for PowerShellHost {
    fn default() -> Self {
        Self::new("powershell")
    }
}

/// `ConvertTo-Json` emits a bare object for a single printer
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<InstalledPrinter>),
    One(InstalledPrinter),
}

/// Parse `Get-Printer | Select-Object Name,PortName | ConvertTo-Json` output
pub fn parse_printer_list(json: &str) -> PrintResult<Vec<InstalledPrinter>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }
    let parsed: OneOrMany = serde_json::from_str(json)
        .map_err(|e| PrintError::InvalidConfig(format!("Unexpected printer list: {}", e)))?;
    Ok(match parsed {
        OneOrMany::Many(list) => list,
        OneOrMany::One(p) => vec![p],
    })
}

#[async_trait]
impl SpoolHost for PowerShellHost {
    async fn installed_printers(&self) -> PrintResult<Vec<InstalledPrinter>> {
        let mut cmd = self.command();
        cmd.args([
            "-Command",
            "Get-Printer | Select-Object Name,PortName | ConvertTo-Json -Compress",
        ]);
        let output = self.run(cmd, self.probe_timeout).await?;
        if !output.exit_ok {
            return Err(PrintError::HelperFailed(output.stderr.trim().to_string()));
        }
        parse_printer_list(&output.stdout)
    }

    async fn printer_exists(&self, name: &str) -> PrintResult<bool> {
        // Name goes through the environment so it is never parsed as script
        let mut cmd = self.command();
        cmd.env("CUPOM_PRINTER_NAME", name).args([
            "-Command",
            "if (Get-Printer | Where-Object { $_.Name -eq $env:CUPOM_PRINTER_NAME }) { 'FOUND' } else { 'MISSING' }",
        ]);
        let output = self.run(cmd, self.probe_timeout).await?;
        Ok(output.stdout.contains("FOUND"))
    }

    async fn run_helper(
        &self,
        helper: &Path,
        data_file: &Path,
        printer: &str,
    ) -> PrintResult<HelperOutput> {
        let mut cmd = self.command();
        cmd.arg("-File")
            .arg(helper)
            .arg("-PrinterName")
            .arg(printer)
            .arg("-DataFile")
            .arg(data_file);

        // The caller owns the hard timeout; dropping the future kills the child
        let output = cmd
            .output()
            .await
            .map_err(|e| PrintError::Spawn(format!("{}: {}", self.program, e)))?;

        Ok(output.into())
    }
}

/// Where the helper program comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperSource {
    /// Versioned copy installed next to the service, never deleted
    Shipped(PathBuf),
    /// Embedded copy written to a private temp file for each job
    Staged,
}

/// Helper file used for one job
enum HelperFile<'a> {
    Staged(TempFileGuard),
    Shipped(&'a Path),
}

impl HelperFile<'_> {
    fn path(&self) -> &Path {
        match self {
            HelperFile::Staged(guard) => guard.path(),
            HelperFile::Shipped(path) => path,
        }
    }
}

/// Spooler strategy settings
#[derive(Debug, Clone)]
pub struct SpoolerConfig {
    pub spool_dir: PathBuf,
    pub helper: HelperSource,
    pub helper_timeout: Duration,
    pub payload_cleanup_delay: Duration,
    pub script_cleanup_delay: Duration,
}

impl Default for SpoolerConfig {
    fn default() -> Self {
        Self {
            spool_dir: std::env::temp_dir(),
            helper: HelperSource::Staged,
            helper_timeout: Duration::from_secs(30),
            payload_cleanup_delay: Duration::from_secs(30),
            script_cleanup_delay: Duration::from_secs(5),
        }
    }
}

/// Collision resistant temp file name: `{prefix}_{millis}_{random}.{ext}`
pub fn temp_file_name(prefix: &str, ext: &str) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        &random[..12],
        ext
    )
}

/// Spooler print strategy
#[derive(Clone)]
pub struct SpoolerPrinter {
    host: Arc<dyn SpoolHost>,
    cleanup: CleanupQueue,
    config: SpoolerConfig,
}

impl SpoolerPrinter {
    pub fn new(host: Arc<dyn SpoolHost>, cleanup: CleanupQueue, config: SpoolerConfig) -> Self {
        Self {
            host,
            cleanup,
            config,
        }
    }

    pub fn config(&self) -> &SpoolerConfig {
        &self.config
    }

    /// Print `data` on the OS printer designated by `device_path`
    ///
    /// Temp files are released through the cleanup queue on every exit path.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub async fn print(
        &self,
        data: &[u8],
        device_path: &str,
        display_name: Option<&str>,
    ) -> PrintResult<()> {
        let printer = self.printer_name(device_path, display_name).await;
        info!(printer = %printer, "Spooler printer selected");

        let payload = self
            .write_temp("cupom", "bin", data, self.config.payload_cleanup_delay)
            .await?;
        let helper = match &self.config.helper {
            HelperSource::Staged => HelperFile::Staged(
                self.write_temp(
                    "cupom_helper",
                    "ps1",
                    RAW_PRINT_HELPER.as_bytes(),
                    self.config.script_cleanup_delay,
                )
                .await?,
            ),
            HelperSource::Shipped(path) => HelperFile::Shipped(path),
        };

        let exists = match self.host.printer_exists(&printer).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "Printer probe failed");
                false
            }
        };
        if !exists {
            return Err(PrintError::PrinterNotFound(printer));
        }

        let timeout = self.config.helper_timeout;
        let output = tokio::time::timeout(
            timeout,
            self.host.run_helper(helper.path(), payload.path(), &printer),
        )
        .await
        .map_err(|_| PrintError::HelperTimeout(timeout.as_millis() as u64))??;

        debug!(stdout = %output.stdout.trim(), stderr = %output.stderr.trim(), "Helper finished");

        parse_helper_output(&output).map_err(PrintError::HelperFailed)?;
        info!("Print job accepted by spooler");
        Ok(())
    }

    /// Real OS printer name for a device path
    ///
    /// Prefers the display name from the resolver; otherwise matches against
    /// the installed printers and falls back to the raw path.
    async fn printer_name(&self, device_path: &str, display_name: Option<&str>) -> String {
        if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        match self.host.installed_printers().await {
            Ok(list) => match match_installed(&list, device_path) {
                Some(p) => p.name.clone(),
                None => device_path.to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Failed to list printers, using device path as name");
                device_path.to_string()
            }
        }
    }

    async fn write_temp(
        &self,
        prefix: &str,
        ext: &str,
        contents: &[u8],
        delay: Duration,
    ) -> PrintResult<TempFileGuard> {
        let path = self.config.spool_dir.join(temp_file_name(prefix, ext));

        // Owner-only, the helper is executable code
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&path).await?;
        // Guard exists from here on, a failed write still gets cleaned up
        let guard = self.cleanup.guard(path, delay);
        file.write_all(contents).await?;
        file.flush().await?;
        debug!(path = %guard.path().display(), bytes = contents.len(), "Temp file written");
        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockHost {
        printers: Vec<InstalledPrinter>,
        stdout: String,
        stderr: String,
        delay: Option<Duration>,
        calls: Mutex<Vec<(PathBuf, PathBuf, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl SpoolHost for MockHost {
        async fn installed_printers(&self) -> PrintResult<Vec<InstalledPrinter>> {
            Ok(self.printers.clone())
        }

        async fn printer_exists(&self, name: &str) -> PrintResult<bool> {
            Ok(self.printers.iter().any(|p| p.name == name))
        }

        async fn run_helper(
            &self,
            helper: &Path,
            data_file: &Path,
            printer: &str,
        ) -> PrintResult<HelperOutput> {
            let data = tokio::fs::read(data_file).await?;
            self.calls.lock().unwrap().push((
                helper.to_path_buf(),
                data_file.to_path_buf(),
                printer.to_string(),
                data,
            ));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(HelperOutput::new(true, self.stdout.clone(), self.stderr.clone()))
        }
    }

    fn epson_host(stdout: &str) -> MockHost {
        MockHost {
            printers: vec![InstalledPrinter::new("EPSON TM-T20", Some("USB001"))],
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    fn config(dir: &Path) -> SpoolerConfig {
        SpoolerConfig {
            spool_dir: dir.to_path_buf(),
            helper: HelperSource::Staged,
            helper_timeout: Duration::from_secs(5),
            payload_cleanup_delay: Duration::from_millis(300),
            script_cleanup_delay: Duration::from_millis(100),
        }
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[test]
    fn test_parse_success_marker() {
        let out = HelperOutput::new(true, "SUCCESS: 128 bytes enviados\r\n", "");
        assert!(parse_helper_output(&out).is_ok());
    }

    #[test]
    fn test_parse_failure_marker_keeps_code() {
        let out = HelperOutput::new(false, "ERRO:OpenPrinter falhou (1801)", "");
        let reason = parse_helper_output(&out).unwrap_err();
        assert!(reason.contains("1801"));
    }

    #[test]
    fn test_parse_combines_stderr_and_generic() {
        let out = HelperOutput::new(false, "", "Add-Type : cannot compile\n");
        assert_eq!(parse_helper_output(&out).unwrap_err(), "Add-Type : cannot compile");

        let empty = HelperOutput::default();
        assert_eq!(
            parse_helper_output(&empty).unwrap_err(),
            "Print helper produced no output"
        );
    }

    #[test]
    fn test_parse_printer_list_shapes() {
        let many = r#"[{"Name":"EPSON TM-T20","PortName":"USB001"},{"Name":"PDF","PortName":null}]"#;
        let list = parse_printer_list(many).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].port, None);

        let one = r#"{"Name":"Daruma DR800","PortName":"COM3"}"#;
        assert_eq!(parse_printer_list(one).unwrap()[0].name, "Daruma DR800");

        assert!(parse_printer_list("  ").unwrap().is_empty());
        assert!(parse_printer_list("not json").is_err());
    }

    #[test]
    fn test_temp_file_names_unique() {
        let a = temp_file_name("cupom", "bin");
        let b = temp_file_name("cupom", "bin");
        assert_ne!(a, b);
        assert!(a.starts_with("cupom_") && a.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_print_success_and_delayed_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(epson_host("SUCCESS: 5 bytes enviados"));
        let printer = SpoolerPrinter::new(host.clone(), CleanupQueue::start(), config(dir.path()));

        printer.print(b"Hello", "usb001", None).await.unwrap();

        let calls = host.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2, "EPSON TM-T20");
        assert_eq!(calls[0].3, b"Hello");
        let helper = std::fs::read_to_string(&calls[0].0).unwrap();
        assert_eq!(helper, RAW_PRINT_HELPER);

        // Cleanup is delayed, both files still present right after the call
        assert_eq!(files_in(dir.path()).len(), 2);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!calls[0].0.exists(), "helper removed after the short delay");
        assert!(calls[0].1.exists(), "payload kept for the longer delay");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_print_failure_marker() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(epson_host("ERRO:OpenPrinter falhou (1801)"));
        let printer = SpoolerPrinter::new(host, CleanupQueue::start(), config(dir.path()));

        let err = printer
            .print(b"x", "EPSON TM-T20", Some("EPSON TM-T20"))
            .await
            .unwrap_err();
        assert!(matches!(&err, PrintError::HelperFailed(msg) if msg.contains("1801")));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_printer_not_found_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(epson_host("SUCCESS"));
        let printer = SpoolerPrinter::new(host.clone(), CleanupQueue::start(), config(dir.path()));

        let err = printer.print(b"x", "Bematech", None).await.unwrap_err();
        assert!(matches!(&err, PrintError::PrinterNotFound(name) if name == "Bematech"));
        assert!(host.calls.lock().unwrap().is_empty());
        assert_eq!(files_in(dir.path()).len(), 2);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_helper_timeout_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(MockHost {
            delay: Some(Duration::from_secs(10)),
            ..epson_host("SUCCESS")
        });
        let mut cfg = config(dir.path());
        cfg.helper_timeout = Duration::from_millis(50);
        let printer = SpoolerPrinter::new(host, CleanupQueue::start(), cfg);

        let err = printer.print(b"x", "EPSON TM-T20", None).await.unwrap_err();
        assert!(matches!(err, PrintError::HelperTimeout(50)));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_shipped_helper_is_not_written_or_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let shipped = dir.path().join("RawPrint.ps1");
        std::fs::write(&shipped, RAW_PRINT_HELPER).unwrap();

        let host = Arc::new(epson_host("SUCCESS: 1 bytes enviados"));
        let mut cfg = config(dir.path());
        cfg.helper = HelperSource::Shipped(shipped.clone());
        let printer = SpoolerPrinter::new(host.clone(), CleanupQueue::start(), cfg);

        printer.print(b"x", "EPSON TM-T20", None).await.unwrap();
        assert_eq!(host.calls.lock().unwrap()[0].0, shipped);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(files_in(dir.path()), vec![shipped]);
    }
}
