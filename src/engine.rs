//! Scan coordinator: non-blocking scan control over the blocking pipeline.
//!
//! # Overview
//!
//! [`start_scan`] spawns a worker thread that runs the
//! [`DuplicateFinder`](crate::duplicates::DuplicateFinder) pipeline and
//! returns a [`ScanHandle`] immediately. The handle decouples the engine's
//! threading from any caller's event model:
//!
//! - [`ScanHandle::cancel`] — idempotent cooperative cancellation
//! - [`ScanHandle::poll_progress`] — lock-free snapshot, never blocks the scan
//! - [`ScanHandle::await_result`] — blocks the *caller* until the scan
//!   reaches a terminal state
//!
//! A cancelled scan still yields a [`ScanResult`]; only a root-invalidating
//! condition produces an error.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::engine::{start_scan, EngineConfig};
//! use dupescan::scanner::FilterConfig;
//! use std::path::Path;
//!
//! let handle = start_scan(
//!     Path::new("/data"),
//!     FilterConfig::default(),
//!     EngineConfig::default(),
//! );
//!
//! let snapshot = handle.poll_progress();
//! println!("stage: {:?}", snapshot.stage);
//!
//! let result = handle.await_result().unwrap();
//! println!("{} bytes reclaimable", result.total_wasted_bytes);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::duplicates::{finalize, DuplicateFinder, FinderError, ScanResult};
use crate::progress::{ProgressSnapshot, ProgressTracker, ScanStage};
use crate::scanner::FilterConfig;

/// Engine tuning knobs, independent of per-scan filters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of hashing worker threads.
    pub io_threads: usize,
    /// Byte-compare hash-confirmed groups, eliminating collision risk.
    pub verify_bytes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_threads: crate::duplicates::DEFAULT_IO_THREADS,
            verify_bytes: false,
        }
    }
}

impl EngineConfig {
    /// Set the number of hashing worker threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Enable byte-for-byte verification after full-hash matching.
    #[must_use]
    pub fn with_verify_bytes(mut self, enabled: bool) -> Self {
        self.verify_bytes = enabled;
        self
    }
}

/// Handle to a running (or finished) scan.
///
/// Dropping the handle without awaiting detaches the worker; it keeps
/// running until its next cancellation check observes the flag, which the
/// drop sets.
pub struct ScanHandle {
    cancel_flag: Arc<AtomicBool>,
    tracker: Arc<ProgressTracker>,
    receiver: mpsc::Receiver<Result<ScanResult, FinderError>>,
    worker: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Request cooperative cancellation. Idempotent; never blocks.
    pub fn cancel(&self) {
        if !self.cancel_flag.swap(true, Ordering::SeqCst) {
            log::info!("Cancellation requested");
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// The shared cancellation flag, e.g. for wiring to a signal handler.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    /// Snapshot the current progress. Never blocks the pipeline.
    #[must_use]
    pub fn poll_progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// Whether the scan has reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tracker.stage().is_terminal()
    }

    /// Block the caller until the scan terminates and return its outcome.
    ///
    /// Completed and cancelled scans both return `Ok` — a cancelled result
    /// carries only the groups verified before the cancellation point and
    /// has `stats.interrupted` set.
    ///
    /// # Errors
    ///
    /// Returns the [`FinderError`] that drove the scan to `Failed`.
    pub fn await_result(mut self) -> Result<ScanResult, FinderError> {
        let outcome = self
            .receiver
            .recv()
            .map_err(|_| FinderError::WorkerLost)?;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        outcome
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        // An abandoned handle must not leave a scan running forever
        self.cancel_flag.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Start a scan and return a handle immediately.
///
/// All validation, walking, and hashing happen on a dedicated worker thread;
/// this call never blocks. Root problems surface through
/// [`ScanHandle::await_result`] as the `Failed` terminal state.
#[must_use]
pub fn start_scan(root: &Path, filters: FilterConfig, config: EngineConfig) -> ScanHandle {
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let tracker = Arc::new(ProgressTracker::new());
    let (sender, receiver) = mpsc::channel();

    let worker_root = root.to_path_buf();
    let worker_flag = Arc::clone(&cancel_flag);
    let worker_tracker = Arc::clone(&tracker);

    let worker = std::thread::Builder::new()
        .name("dupescan-worker".into())
        .spawn(move || {
            let outcome = run_scan(&worker_root, filters, &config, &worker_flag, &worker_tracker);
            // The receiver may be gone if the handle was dropped; nothing to do
            let _ = sender.send(outcome);
        })
        .expect("failed to spawn scan worker thread");

    ScanHandle {
        cancel_flag,
        tracker,
        receiver,
        worker: Some(worker),
    }
}

/// Drive one scan to a terminal state on the worker thread.
fn run_scan(
    root: &PathBuf,
    filters: FilterConfig,
    config: &EngineConfig,
    cancel_flag: &Arc<AtomicBool>,
    tracker: &Arc<ProgressTracker>,
) -> Result<ScanResult, FinderError> {
    let finder = DuplicateFinder::new(filters)
        .with_io_threads(config.io_threads)
        .with_verify_bytes(config.verify_bytes)
        .with_shutdown_flag(Arc::clone(cancel_flag))
        .with_progress(Arc::clone(tracker) as Arc<dyn crate::progress::ProgressCallback>);

    match finder.find_duplicates(root) {
        Ok(run) => {
            tracker.set_stage(ScanStage::Finalizing);
            let interrupted = run.stats.interrupted;
            let result = finalize(run);
            tracker.set_stage(if interrupted {
                ScanStage::Cancelled
            } else {
                ScanStage::Completed
            });
            Ok(result)
        }
        Err(e) => {
            log::error!("Scan failed: {}", e);
            tracker.set_stage(ScanStage::Failed);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn populate(dir: &TempDir) {
        fs::write(dir.path().join("a.txt"), b"identical payload").unwrap();
        fs::write(dir.path().join("b.txt"), b"identical payload").unwrap();
        fs::write(dir.path().join("c.txt"), b"one of a kind....").unwrap();
    }

    #[test]
    fn test_start_scan_completes() {
        let dir = TempDir::new().unwrap();
        populate(&dir);

        let handle = start_scan(dir.path(), FilterConfig::default(), EngineConfig::default());
        let result = handle.await_result().unwrap();

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.total_wasted_bytes, 17);
        assert!(!result.stats.interrupted);
    }

    #[test]
    fn test_poll_after_completion_reports_terminal_stage() {
        let dir = TempDir::new().unwrap();
        populate(&dir);

        let handle = start_scan(dir.path(), FilterConfig::default(), EngineConfig::default());
        while !handle.is_finished() {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        assert_eq!(handle.poll_progress().stage, ScanStage::Completed);
        let result = handle.await_result().unwrap();
        assert!(result.has_duplicates());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let dir = TempDir::new().unwrap();
        populate(&dir);

        let handle = start_scan(dir.path(), FilterConfig::default(), EngineConfig::default());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancel_requested());

        // Either terminal state is acceptable depending on timing
        let result = handle.await_result().unwrap();
        assert!(result.groups.len() <= 1);
    }

    #[test]
    fn test_missing_root_fails() {
        let handle = start_scan(
            Path::new("/nonexistent/dir/12345"),
            FilterConfig::default(),
            EngineConfig::default(),
        );

        let err = handle.await_result();
        assert!(matches!(err, Err(FinderError::RootNotFound(_))));
    }

    #[test]
    fn test_failed_stage_observable() {
        let handle = start_scan(
            Path::new("/nonexistent/dir/12345"),
            FilterConfig::default(),
            EngineConfig::default(),
        );

        while !handle.is_finished() {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(handle.poll_progress().stage, ScanStage::Failed);
    }

    #[test]
    fn test_engine_config_builders() {
        let config = EngineConfig::default()
            .with_io_threads(8)
            .with_verify_bytes(true);

        assert_eq!(config.io_threads, 8);
        assert!(config.verify_bytes);

        let config = EngineConfig::default().with_io_threads(0);
        assert_eq!(config.io_threads, 1);
    }
}
