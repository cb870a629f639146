//! Progress reporting: pipeline callbacks, shared counters, and terminal bars.
//!
//! The pipeline reports through the [`ProgressCallback`] trait. The engine
//! installs a [`ProgressTracker`] — a set of atomics any thread can snapshot
//! without blocking the pipeline — and callers poll it through their scan
//! handle. [`ConsoleProgress`] renders polled snapshots with indicatif for
//! the CLI front-end.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// The lifecycle stage of a scan.
///
/// Progresses `Idle → Walking → Classifying → Hashing → Finalizing` and
/// terminates in exactly one of `Completed`, `Cancelled`, or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ScanStage {
    /// Scan created but not started
    Idle = 0,
    /// Enumerating files under the root
    Walking = 1,
    /// Grouping candidates by size
    Classifying = 2,
    /// Partial and full content hashing
    Hashing = 3,
    /// Ordering groups and computing totals
    Finalizing = 4,
    /// Scan finished normally
    Completed = 5,
    /// Scan stopped by a cancellation request
    Cancelled = 6,
    /// Scan aborted by a root-invalidating error
    Failed = 7,
}

impl ScanStage {
    /// Whether the scan has reached a terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Walking,
            2 => Self::Classifying,
            3 => Self::Hashing,
            4 => Self::Finalizing,
            5 => Self::Completed,
            6 => Self::Cancelled,
            7 => Self::Failed,
            _ => Self::Idle,
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walking => "discovering files",
            Self::Classifying => "classifying by size",
            Self::Hashing => "hashing candidates",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// A point-in-time view of scan progress.
///
/// Produced by [`ProgressTracker::snapshot`]; reading one never blocks the
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Current pipeline stage
    pub stage: ScanStage,
    /// Files yielded by the walker so far (non-decreasing)
    pub files_examined: u64,
    /// Bytes read and hashed so far
    pub bytes_hashed: u64,
    /// Candidate groups queued or running in the current hashing stage
    pub groups_pending: u64,
    /// Upper bound on duplicate groups still to come
    pub estimated_groups_remaining: u64,
}

/// Callback interface the pipeline reports through.
///
/// Implementations must be cheap and non-blocking; they are invoked from
/// hashing workers.
pub trait ProgressCallback: Send + Sync {
    /// Called when a pipeline phase starts.
    ///
    /// `phase` is one of `"walking"`, `"classifying"`, `"partial"`, `"full"`;
    /// `total_groups` is the number of groups entering a hashing phase
    /// (zero for the others).
    fn on_phase_start(&self, phase: &str, total_groups: usize);

    /// Called per file processed within the current phase.
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a file has been hashed, with the number of bytes read.
    fn on_item_completed(&self, _bytes: u64) {}

    /// Called when a group finishes refinement, with the number still pending.
    fn on_group_completed(&self, _remaining: usize) {}

    /// Called when a pipeline phase ends.
    fn on_phase_end(&self, phase: &str);
}

/// Shared, lock-free progress state for one scan.
///
/// The pipeline is the single writer; any number of readers may snapshot
/// concurrently. Counters use relaxed ordering — the aggregate values are
/// monotonic, which is the only guarantee the snapshot contract makes.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    stage: AtomicU8,
    files_examined: AtomicUsize,
    bytes_hashed: AtomicU64,
    groups_pending: AtomicU64,
    estimated_groups_remaining: AtomicU64,
}

impl ProgressTracker {
    /// Create a tracker in the `Idle` stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> ScanStage {
        ScanStage::from_u8(self.stage.load(Ordering::SeqCst))
    }

    /// Move to a new stage.
    pub fn set_stage(&self, stage: ScanStage) {
        self.stage.store(stage as u8, Ordering::SeqCst);
    }

    /// Take a point-in-time snapshot. Never blocks.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            stage: self.stage(),
            files_examined: self.files_examined.load(Ordering::Relaxed) as u64,
            bytes_hashed: self.bytes_hashed.load(Ordering::Relaxed),
            groups_pending: self.groups_pending.load(Ordering::Relaxed),
            estimated_groups_remaining: self
                .estimated_groups_remaining
                .load(Ordering::Relaxed),
        }
    }
}

impl ProgressCallback for ProgressTracker {
    fn on_phase_start(&self, phase: &str, total_groups: usize) {
        let stage = match phase {
            "walking" => ScanStage::Walking,
            "classifying" => ScanStage::Classifying,
            _ => ScanStage::Hashing,
        };
        self.set_stage(stage);
        self.groups_pending
            .store(total_groups as u64, Ordering::Relaxed);
        self.estimated_groups_remaining
            .store(total_groups as u64, Ordering::Relaxed);
    }

    fn on_progress(&self, current: usize, _path: &str) {
        if self.stage() == ScanStage::Walking {
            self.files_examined.fetch_max(current, Ordering::Relaxed);
        }
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes_hashed.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_group_completed(&self, remaining: usize) {
        self.groups_pending.store(remaining as u64, Ordering::Relaxed);
        self.estimated_groups_remaining
            .store(remaining as u64, Ordering::Relaxed);
    }

    fn on_phase_end(&self, _phase: &str) {}
}

/// Terminal progress renderer for polled snapshots.
///
/// One spinner line, updated from whatever snapshot the caller last polled.
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    /// Create and start the spinner.
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Render the latest snapshot.
    pub fn update(&self, snapshot: &ProgressSnapshot) {
        let msg = match snapshot.stage {
            ScanStage::Walking => {
                format!("Discovering files — {} found", snapshot.files_examined)
            }
            ScanStage::Hashing => format!(
                "Hashing — {} groups pending, {} hashed",
                snapshot.groups_pending,
                bytesize::ByteSize::b(snapshot.bytes_hashed)
            ),
            stage => stage.label().to_string(),
        };
        self.bar.set_message(msg);
    }

    /// Stop the spinner and clear the line.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}
