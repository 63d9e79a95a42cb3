//! Delayed temp file cleanup
//!
//! The spooler may still be reading a payload file after the helper
//! returns, so temp files are never removed synchronously. Each file is
//! wrapped in a [`TempFileGuard`]; dropping the guard schedules its removal
//! on a background [`DelayQueue`]. Every guard schedules exactly once, on
//! every exit path including unwinding.

use std::collections::HashMap;
use std::future::poll_fn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::Key;
use tracing::{debug, info, warn};

/// Remove a file, treating "already gone" as success
async fn remove_file(path: &Path) -> bool {
    report_removal(path, tokio::fs::remove_file(path).await)
}

/// Blocking variant for `Drop`, used only once the queue has stopped
fn remove_file_now(path: &Path) -> bool {
    report_removal(path, std::fs::remove_file(path))
}

fn report_removal(path: &Path, result: std::io::Result<()>) -> bool {
    match result {
        Ok(()) => {
            debug!(path = %path.display(), "Temp file removed");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove temp file");
            false
        }
    }
}

/// Background timer queue removing temp files after a delay
#[derive(Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<(PathBuf, Duration)>,
    cancel: CancellationToken,
    task: Arc<Mutex<Option<JoinHandle<usize>>>>,
}

impl CleanupQueue {
    /// Spawn the queue on the current tokio runtime
    pub fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_queue(rx, cancel.clone()));

        Self {
            tx,
            cancel,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Schedule `path` for removal after `delay`
    ///
    /// Scheduling a path that is already pending resets its timer. If the
    /// queue is no longer running the file is removed immediately.
    pub fn schedule(&self, path: PathBuf, delay: Duration) {
        if let Err(mpsc::error::SendError((path, _))) = self.tx.send((path, delay)) {
            remove_file_now(&path);
        }
    }

    /// Wrap `path` in a guard that schedules removal when dropped
    pub fn guard(&self, path: PathBuf, delay: Duration) -> TempFileGuard {
        TempFileGuard {
            path: Some(path),
            delay,
            queue: self.clone(),
        }
    }

    /// Stop the timers and remove every pending file now
    ///
    /// Returns the number of files removed. Later guards remove their file
    /// synchronously.
    pub async fn shutdown(&self) -> usize {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        match handle {
            Some(handle) => match handle.await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(error = %e, "Cleanup task failed");
                    0
                }
            },
            None => 0,
        }
    }
}

/// Timer loop
///
/// Once every sender is gone the loop keeps waiting out the pending delays.
/// Only an explicit cancel removes pending files early.
async fn run_queue(
    mut rx: mpsc::UnboundedReceiver<(PathBuf, Duration)>,
    cancel: CancellationToken,
) -> usize {
    let mut queue: DelayQueue<PathBuf> = DelayQueue::new();
    let mut pending: HashMap<PathBuf, Key> = HashMap::new();
    let mut accepting = true;

    loop {
        if !accepting && queue.is_empty() {
            debug!("Cleanup queue drained");
            return 0;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = rx.recv(), if accepting => match msg {
                Some((path, delay)) => match pending.get(&path) {
                    Some(key) => queue.reset(key, delay),
                    None => {
                        let key = queue.insert(path.clone(), delay);
                        pending.insert(path, key);
                    }
                },
                None => accepting = false,
            },
            Some(expired) = poll_fn(|cx| queue.poll_expired(cx)), if !queue.is_empty() => {
                let path = expired.into_inner();
                pending.remove(&path);
                remove_file(&path).await;
            }
        }
    }

    // Close the channel so late guards fall back to synchronous removal,
    // then flush whatever was already queued
    rx.close();
    let mut paths: Vec<PathBuf> = pending.into_keys().collect();
    while let Ok((path, _)) = rx.try_recv() {
        if !paths.contains(&path) {
            paths.push(path);
        }
    }

    let mut removed = 0;
    for path in &paths {
        if remove_file(path).await {
            removed += 1;
        }
    }
    info!(removed, "Cleanup queue flushed");
    removed
}

/// Scoped temp file: removal is scheduled when the guard drops
pub struct TempFileGuard {
    path: Option<PathBuf>,
    delay: Duration,
    queue: CleanupQueue,
}

impl TempFileGuard {
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            self.queue.schedule(path, self.delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[tokio::test]
    async fn test_guard_removes_after_delay() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CleanupQueue::start();
        let path = touch(dir.path(), "a.bin");

        drop(queue.guard(path.clone(), Duration::from_millis(100)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(path.exists());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_guard_runs_on_error_path() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CleanupQueue::start();
        let path = touch(dir.path(), "b.bin");

        let failing = || -> Result<(), String> {
            let _guard = queue.guard(path.clone(), Duration::from_millis(50));
            Err("spooler exploded".into())
        };
        assert!(failing().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CleanupQueue::start();
        queue.schedule(dir.path().join("never-created.bin"), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.shutdown().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CleanupQueue::start();
        let a = touch(dir.path(), "a.bin");
        let b = touch(dir.path(), "b.ps1");

        queue.schedule(a.clone(), Duration::from_secs(60));
        queue.schedule(b.clone(), Duration::from_secs(60));
        // Same path twice only resets the timer
        queue.schedule(b.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(queue.shutdown().await, 2);
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[tokio::test]
    async fn test_dropping_last_handle_keeps_delays() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CleanupQueue::start();
        let payload = touch(dir.path(), "cupom.bin");
        let helper = touch(dir.path(), "cupom_helper.ps1");

        drop(queue.guard(payload.clone(), Duration::from_millis(300)));
        drop(queue.guard(helper.clone(), Duration::from_millis(100)));
        drop(queue);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(payload.exists());
        assert!(helper.exists());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!helper.exists());
        assert!(payload.exists());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!payload.exists());
    }

    #[tokio::test]
    async fn test_guard_after_shutdown_removes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let queue = CleanupQueue::start();
        queue.shutdown().await;

        let path = touch(dir.path(), "late.bin");
        drop(queue.guard(path.clone(), Duration::from_secs(60)));
        assert!(!path.exists());
    }
}
