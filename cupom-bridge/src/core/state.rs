use std::sync::Arc;
use std::time::Instant;

use cupom_printer::{
    CleanupQueue, DeviceResolver, InstalledPrinterResolver, OsPrintDispatcher, PowerShellHost,
    PrintDispatcher, SpoolHost, SpoolerPrinter,
};

use crate::core::Config;

/// Server state - shared handles for all handlers
///
/// Cloning is cheap, every field is behind an `Arc` or is itself a handle.
///
/// | Field | Meaning |
/// |-------|---------|
/// | config | immutable configuration |
/// | resolver | devicePath → printer |
/// | dispatcher | network / spooler strategies |
/// | cleanup | temp file cleanup queue (flushed on shutdown) |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub resolver: Arc<dyn DeviceResolver>,
    pub dispatcher: Arc<dyn PrintDispatcher>,
    pub cleanup: Option<CleanupQueue>,
    pub started_at: Instant,
}

impl ServerState {
    /// Wire the OS backed resolver and dispatcher
    ///
    /// Must be called inside a tokio runtime (the cleanup queue spawns a task).
    pub fn initialize(config: &Config) -> Self {
        let host: Arc<dyn SpoolHost> = Arc::new(
            PowerShellHost::new(config.script_host.clone())
                .with_probe_timeout(config.probe_timeout()),
        );
        let cleanup = CleanupQueue::start();

        let resolver = InstalledPrinterResolver::new(host.clone())
            .with_literal_fallback(config.literal_fallback);
        let spooler = SpoolerPrinter::new(host, cleanup.clone(), config.spooler());
        let dispatcher =
            OsPrintDispatcher::new(spooler).with_network_timeout(config.network_timeout());

        tracing::info!(
            spool_dir = %config.spool_dir.display(),
            script_host = %config.script_host,
            helper = ?config.helper_path,
            "Print strategies initialized"
        );

        Self {
            config: Arc::new(config.clone()),
            resolver: Arc::new(resolver),
            dispatcher: Arc::new(dispatcher),
            cleanup: Some(cleanup),
            started_at: Instant::now(),
        }
    }

    /// State with injected collaborators (tests, embedding)
    pub fn with_parts(
        config: Config,
        resolver: Arc<dyn DeviceResolver>,
        dispatcher: Arc<dyn PrintDispatcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
            dispatcher,
            cleanup: None,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
