//! Multi-stage duplicate detection pipeline.
//!
//! # Overview
//!
//! This module drives the detection stages over classified candidates:
//! 1. **Size classification** (see [`crate::duplicates::groups`]) — metadata only
//! 2. **Partial hash** — hash a bounded prefix window of each same-size file
//! 3. **Full hash** — stream-hash the entire content of prefix matches
//!
//! Each stage only does work on groups that survived the cheaper stage, and
//! whole groups are fanned out to a bounded worker pool: a group is owned
//! exclusively by the worker refining it, so no shared mutable state exists
//! on the hot path.
//!
//! Cancellation is cooperative. The shutdown flag is checked between groups,
//! between files, and inside the streaming hasher between chunks. A group
//! interrupted mid-refinement is discarded whole; groups already refined
//! stay confirmed.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use growable_bloom_filter::GrowableBloom;
use rayon::prelude::*;
use serde::Serialize;

use super::groups::{group_by_size_ordered, DuplicateGroup, PartialHashGroup, SizeGroup};
use crate::progress::ProgressCallback;
use crate::scanner::{
    FileError, FileRecord, FilterConfig, Hash, HashError, Hasher, Walker, FULL_HASH_CHUNK,
};

/// Default number of hashing threads. Kept low to prevent disk thrashing.
pub const DEFAULT_IO_THREADS: usize = 4;

/// False positive rate for the walk-time size Bloom filters.
const BLOOM_FP_RATE: f64 = 0.01;

/// Threshold above which individual files are logged while hashing.
const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Configuration shared by the hashing stages.
#[derive(Clone, Default)]
pub struct StageConfig {
    /// Number of worker threads for parallel group refinement.
    pub io_threads: usize,
    /// Optional shutdown flag for cooperative cancellation.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for StageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageConfig")
            .field("io_threads", &self.io_threads)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl StageConfig {
    /// Create a configuration with the given worker count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn threads(&self) -> usize {
        if self.io_threads == 0 {
            DEFAULT_IO_THREADS
        } else {
            self.io_threads
        }
    }
}

/// Statistics from one hashing stage.
#[derive(Debug, Default)]
pub struct StageStats {
    /// Groups that entered the stage
    pub input_groups: usize,
    /// Files that entered the stage
    pub input_files: usize,
    /// Files successfully hashed (or confirmed without a re-read)
    pub hashed_files: usize,
    /// Files dropped due to read errors
    pub failed_files: usize,
    /// Files eliminated because their hash was unique within the group
    pub eliminated_unique: usize,
    /// Groups surviving the stage with 2+ members
    pub surviving_groups: usize,
    /// Files surviving the stage
    pub surviving_files: usize,
    /// Bytes read and hashed during the stage
    pub bytes_hashed: u64,
    /// Whether the stage observed a cancellation request
    pub interrupted: bool,
    /// Per-file errors encountered during the stage
    pub errors: Vec<HashError>,
}

impl StageStats {
    /// Percentage of input files eliminated by this stage.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.input_files == 0 {
            0.0
        } else {
            let eliminated = self.input_files - self.surviving_files;
            (eliminated as f64 / self.input_files as f64) * 100.0
        }
    }
}

/// Outcome of refining a single group, produced by one worker.
#[derive(Debug)]
struct GroupOutcome<T> {
    groups: Vec<T>,
    errors: Vec<HashError>,
    hashed: usize,
    failed: usize,
    bytes: u64,
    interrupted: bool,
}

impl<T> Default for GroupOutcome<T> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            errors: Vec::new(),
            hashed: 0,
            failed: 0,
            bytes: 0,
            interrupted: false,
        }
    }
}

fn build_pool(threads: usize) -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .unwrap_or_else(|_| {
            log::warn!(
                "Failed to create custom thread pool, using global pool with {} threads",
                rayon::current_num_threads()
            );
            rayon::ThreadPoolBuilder::new().build().unwrap()
        })
}

/// Refine size groups by prefix-window hash (the partial stage).
///
/// Each [`SizeGroup`] is refined independently by one worker: members whose
/// prefix hashes differ are provably non-duplicate and split apart; singleton
/// refinements are dropped. Files smaller than the window are hashed whole,
/// so their partial hash already equals their full-content hash.
#[must_use]
pub fn stage_partial(
    size_groups: Vec<SizeGroup>,
    hasher: &Arc<Hasher>,
    config: &StageConfig,
) -> (Vec<PartialHashGroup>, StageStats) {
    let input_groups = size_groups.len();
    let input_files: usize = size_groups.iter().map(SizeGroup::len).sum();
    let mut stats = StageStats {
        input_groups,
        input_files,
        ..Default::default()
    };

    if size_groups.is_empty() {
        log::debug!("Partial stage: no groups to process");
        return (Vec::new(), stats);
    }

    if let Some(cb) = &config.progress {
        cb.on_phase_start("partial", input_groups);
    }
    log::info!(
        "Partial stage: hashing prefix of {} files in {} groups",
        input_files,
        input_groups
    );

    let pool = build_pool(config.threads());
    let processed = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);

    let outcomes: Vec<GroupOutcome<PartialHashGroup>> = pool.install(|| {
        size_groups
            .into_par_iter()
            .map(|group| {
                let outcome = refine_size_group(group, hasher, config, &processed);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(cb) = &config.progress {
                    cb.on_group_completed(input_groups.saturating_sub(done));
                }
                outcome
            })
            .collect()
    });

    let mut surviving = Vec::new();
    for outcome in outcomes {
        stats.hashed_files += outcome.hashed;
        stats.failed_files += outcome.failed;
        stats.bytes_hashed += outcome.bytes;
        stats.interrupted |= outcome.interrupted;
        stats.errors.extend(outcome.errors);
        surviving.extend(outcome.groups);
    }

    stats.surviving_groups = surviving.len();
    stats.surviving_files = surviving.iter().map(PartialHashGroup::len).sum();
    stats.eliminated_unique = stats.hashed_files.saturating_sub(stats.surviving_files);

    if let Some(cb) = &config.progress {
        cb.on_phase_end("partial");
    }
    log::info!(
        "Partial stage complete: {} files → {} candidates ({:.1}% eliminated)",
        stats.input_files,
        stats.surviving_files,
        stats.elimination_rate()
    );

    (surviving, stats)
}

/// Refine one size group by partial hash. Runs on a single worker.
fn refine_size_group(
    group: SizeGroup,
    hasher: &Arc<Hasher>,
    config: &StageConfig,
    processed: &AtomicUsize,
) -> GroupOutcome<PartialHashGroup> {
    let mut out = GroupOutcome::default();
    let size = group.size;
    let mut by_hash: HashMap<Hash, Vec<FileRecord>> = HashMap::new();

    for file in group.files {
        if config.is_shutdown_requested() {
            out.interrupted = true;
            return out;
        }

        let idx = processed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(cb) = &config.progress {
            cb.on_progress(idx, file.path.to_string_lossy().as_ref());
        }

        match hasher.partial_hash(&file.path) {
            Ok(hash) => {
                out.hashed += 1;
                let read = file.size.min(hasher.window() as u64);
                out.bytes += read;
                if let Some(cb) = &config.progress {
                    cb.on_item_completed(read);
                }
                by_hash.entry(hash).or_default().push(file);
            }
            Err(HashError::Interrupted(_)) => {
                out.interrupted = true;
                return out;
            }
            Err(e) => {
                log::warn!("Failed to prefix-hash {}: {}", file.path.display(), e);
                out.failed += 1;
                out.errors.push(e);
            }
        }
    }

    out.groups = by_hash
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(partial_hash, files)| PartialHashGroup {
            partial_hash,
            size,
            files,
        })
        .collect();

    out
}

/// Refine partial-hash groups by full-content hash (the full stage).
///
/// Each [`PartialHashGroup`] is refined independently by one worker. Groups
/// whose file size fits inside the partial window are confirmed from the
/// partial hash without re-reading (the prefix was the whole file). With
/// `verify_bytes`, members of each hash-confirmed group are additionally
/// byte-compared, eliminating hash-collision risk entirely.
#[must_use]
pub fn stage_full(
    partial_groups: Vec<PartialHashGroup>,
    hasher: &Arc<Hasher>,
    config: &StageConfig,
    verify_bytes: bool,
) -> (Vec<DuplicateGroup>, StageStats) {
    let input_groups = partial_groups.len();
    let input_files: usize = partial_groups.iter().map(PartialHashGroup::len).sum();
    let mut stats = StageStats {
        input_groups,
        input_files,
        ..Default::default()
    };

    if partial_groups.is_empty() {
        log::debug!("Full stage: no groups to process");
        return (Vec::new(), stats);
    }

    if let Some(cb) = &config.progress {
        cb.on_phase_start("full", input_groups);
    }
    log::info!(
        "Full stage: hashing {} files in {} groups",
        input_files,
        input_groups
    );

    let pool = build_pool(config.threads());
    let processed = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);

    let outcomes: Vec<GroupOutcome<DuplicateGroup>> = pool.install(|| {
        partial_groups
            .into_par_iter()
            .map(|group| {
                let outcome = refine_partial_group(group, hasher, config, verify_bytes, &processed);
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(cb) = &config.progress {
                    cb.on_group_completed(input_groups.saturating_sub(done));
                }
                outcome
            })
            .collect()
    });

    let mut confirmed = Vec::new();
    for outcome in outcomes {
        stats.hashed_files += outcome.hashed;
        stats.failed_files += outcome.failed;
        stats.bytes_hashed += outcome.bytes;
        stats.interrupted |= outcome.interrupted;
        stats.errors.extend(outcome.errors);
        confirmed.extend(outcome.groups);
    }

    stats.surviving_groups = confirmed.len();
    stats.surviving_files = confirmed.iter().map(DuplicateGroup::len).sum();
    stats.eliminated_unique = stats.hashed_files.saturating_sub(stats.surviving_files);

    if let Some(cb) = &config.progress {
        cb.on_phase_end("full");
    }
    log::info!(
        "Full stage complete: {} confirmed groups, {} duplicate files",
        stats.surviving_groups,
        stats.surviving_files.saturating_sub(stats.surviving_groups)
    );

    (confirmed, stats)
}

/// Refine one partial-hash group by full hash. Runs on a single worker.
///
/// Any interruption discards this group's entire output so a cancelled scan
/// never reports a partially verified group.
fn refine_partial_group(
    group: PartialHashGroup,
    hasher: &Arc<Hasher>,
    config: &StageConfig,
    verify_bytes: bool,
    processed: &AtomicUsize,
) -> GroupOutcome<DuplicateGroup> {
    let mut out = GroupOutcome::default();
    let size = group.size;

    if config.is_shutdown_requested() {
        out.interrupted = true;
        return out;
    }

    let mut by_hash: HashMap<Hash, Vec<FileRecord>> = HashMap::new();

    if size <= hasher.window() as u64 {
        // The prefix window covered the whole file, so the partial hash is
        // already the full-content hash and the group is confirmed as-is.
        out.hashed += group.files.len();
        processed.fetch_add(group.files.len(), Ordering::SeqCst);
        by_hash.insert(group.partial_hash, group.files);
    } else {
        for file in group.files {
            if config.is_shutdown_requested() {
                out.interrupted = true;
                out.groups.clear();
                return out;
            }

            if file.size > LARGE_FILE_THRESHOLD {
                log::debug!(
                    "Hashing large file ({} MB): {}",
                    file.size / (1024 * 1024),
                    file.path.display()
                );
            }

            let idx = processed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(cb) = &config.progress {
                cb.on_progress(idx, file.path.to_string_lossy().as_ref());
            }

            match hasher.full_hash(&file.path) {
                Ok(hash) => {
                    out.hashed += 1;
                    out.bytes += file.size;
                    if let Some(cb) = &config.progress {
                        cb.on_item_completed(file.size);
                    }
                    by_hash.entry(hash).or_default().push(file);
                }
                Err(HashError::Interrupted(_)) => {
                    out.interrupted = true;
                    out.groups.clear();
                    return out;
                }
                Err(e) => {
                    log::warn!("Failed to hash {}: {}", file.path.display(), e);
                    out.failed += 1;
                    out.errors.push(e);
                }
            }
        }
    }

    for (hash, files) in by_hash {
        if files.len() < 2 {
            continue;
        }
        if verify_bytes {
            match split_by_content(files, config.shutdown_flag.as_deref()) {
                Ok((classes, errors)) => {
                    out.failed += errors.len();
                    out.errors.extend(errors);
                    for class in classes {
                        log::debug!(
                            "Byte-verified group {}: {} files",
                            crate::scanner::hash_to_hex(&hash),
                            class.len()
                        );
                        out.groups.push(DuplicateGroup::new(hash, size, class));
                    }
                }
                Err(_) => {
                    out.interrupted = true;
                    out.groups.clear();
                    return out;
                }
            }
        } else {
            log::debug!(
                "Duplicate group {}: {} files, {} bytes each",
                crate::scanner::hash_to_hex(&hash),
                files.len(),
                size
            );
            out.groups.push(DuplicateGroup::new(hash, size, files));
        }
    }

    out
}

/// Partition hash-equal files into classes of byte-identical content.
///
/// Returns classes with 2+ members plus per-file read errors. The only
/// `Err` is interruption, which the caller treats as a discarded group.
fn split_by_content(
    files: Vec<FileRecord>,
    shutdown: Option<&AtomicBool>,
) -> Result<(Vec<Vec<FileRecord>>, Vec<HashError>), HashError> {
    let mut classes: Vec<Vec<FileRecord>> = Vec::new();
    let mut errors = Vec::new();

    'next_file: for file in files {
        for class in &mut classes {
            match files_identical(&class[0].path, &file.path, shutdown) {
                Ok(true) => {
                    class.push(file);
                    continue 'next_file;
                }
                Ok(false) => {}
                Err(e @ HashError::Interrupted(_)) => return Err(e),
                Err(e) => {
                    log::warn!("Failed to byte-compare {}: {}", file.path.display(), e);
                    errors.push(e);
                    continue 'next_file;
                }
            }
        }
        classes.push(vec![file]);
    }

    Ok((
        classes.into_iter().filter(|c| c.len() > 1).collect(),
        errors,
    ))
}

/// Compare two files byte-for-byte in bounded chunks.
fn files_identical(
    a: &Path,
    b: &Path,
    shutdown: Option<&AtomicBool>,
) -> Result<bool, HashError> {
    let mut file_a = File::open(a).map_err(|e| HashError::from_io(a, e))?;
    let mut file_b = File::open(b).map_err(|e| HashError::from_io(b, e))?;

    let mut buf_a = vec![0u8; FULL_HASH_CHUNK];
    let mut buf_b = vec![0u8; FULL_HASH_CHUNK];

    loop {
        if shutdown.is_some_and(|f| f.load(Ordering::SeqCst)) {
            return Err(HashError::Interrupted(a.to_path_buf()));
        }

        let n_a = fill_chunk(&mut file_a, &mut buf_a).map_err(|e| HashError::from_io(a, e))?;
        let n_b = fill_chunk(&mut file_b, &mut buf_b).map_err(|e| HashError::from_io(b, e))?;

        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Read until the buffer is full or EOF; returns the number of bytes filled.
fn fill_chunk(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// ============================================================================
// DuplicateFinder - Pipeline Orchestrator
// ============================================================================

/// Errors that invalidate an entire scan.
///
/// Per-file problems never surface here; they degrade into the result's
/// error list instead.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan root does not exist.
    #[error("Root path not found: {0}")]
    RootNotFound(PathBuf),

    /// The scan root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The scan root cannot be enumerated at all.
    #[error("Cannot read root directory {path}: {source}")]
    RootUnreadable {
        /// The root that failed to open
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The scan worker thread died without delivering a result.
    #[error("Scan worker terminated unexpectedly")]
    WorkerLost,
}

/// Summary statistics for a whole scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Files the walker yielded into the pipeline
    pub files_examined: usize,
    /// Total size of examined files in bytes
    pub total_bytes_seen: u64,
    /// Files eliminated by size classification (unique sizes)
    pub eliminated_by_size: usize,
    /// Files eliminated by the partial-hash stage
    pub eliminated_by_partial: usize,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Confirmed duplicate files (excluding one original per group)
    pub duplicate_files: usize,
    /// Space reclaimable by removing duplicates
    pub wasted_bytes: u64,
    /// Bytes read and hashed across both hashing stages
    pub bytes_hashed: u64,
    /// Wall-clock duration of the scan
    pub scan_duration: Duration,
    /// Whether the scan was cancelled before finishing
    pub interrupted: bool,
}

impl ScanStats {
    /// Percentage of seen bytes that duplicates waste.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_bytes_seen == 0 {
            0.0
        } else {
            (self.wasted_bytes as f64 / self.total_bytes_seen as f64) * 100.0
        }
    }
}

/// Everything one pipeline run produces.
#[derive(Debug, Default)]
pub struct PipelineRun {
    /// Confirmed duplicate groups (unsorted; see the report module)
    pub groups: Vec<DuplicateGroup>,
    /// Summary statistics
    pub stats: ScanStats,
    /// Per-file errors accumulated across all stages
    pub errors: Vec<FileError>,
}

/// Duplicate finder that drives the full pipeline synchronously.
///
/// Walks the root, classifies by size, then refines candidates through the
/// partial and full hashing stages. This is the blocking core; the `engine`
/// module wraps it with a non-blocking handle.
///
/// # Example
///
/// ```no_run
/// use dupescan::duplicates::DuplicateFinder;
/// use dupescan::scanner::FilterConfig;
/// use std::path::Path;
///
/// let finder = DuplicateFinder::new(FilterConfig::default());
/// let run = finder.find_duplicates(Path::new("/some/path")).unwrap();
///
/// println!("Found {} duplicate groups", run.groups.len());
/// println!("Reclaimable: {} bytes", run.stats.wasted_bytes);
/// ```
pub struct DuplicateFinder {
    filters: FilterConfig,
    io_threads: usize,
    verify_bytes: bool,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
    hasher: Arc<Hasher>,
}

impl DuplicateFinder {
    /// Create a finder for the given filter configuration.
    #[must_use]
    pub fn new(filters: FilterConfig) -> Self {
        let hasher = Hasher::with_window(filters.partial_window());
        Self {
            filters,
            io_threads: DEFAULT_IO_THREADS,
            verify_bytes: false,
            shutdown_flag: None,
            progress: None,
            hasher: Arc::new(hasher),
        }
    }

    /// Set the number of hashing worker threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Enable byte-for-byte verification of hash-confirmed groups.
    #[must_use]
    pub fn with_verify_bytes(mut self, enabled: bool) -> Self {
        self.verify_bytes = enabled;
        self
    }

    /// Set the shutdown flag for cooperative cancellation.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.hasher = Arc::new(
            Hasher::with_window(self.filters.partial_window()).with_shutdown_flag(flag.clone()),
        );
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn stage_config(&self) -> StageConfig {
        let mut config = StageConfig::default().with_io_threads(self.io_threads);
        if let Some(flag) = &self.shutdown_flag {
            config = config.with_shutdown_flag(flag.clone());
        }
        if let Some(cb) = &self.progress {
            config = config.with_progress(cb.clone());
        }
        config
    }

    /// Run the complete pipeline under the given root.
    ///
    /// Returns the confirmed groups together with statistics and per-file
    /// errors. A cancelled run returns `Ok` with `stats.interrupted` set and
    /// only the groups that were fully verified before the cancellation
    /// point.
    ///
    /// # Errors
    ///
    /// Returns a [`FinderError`] only for conditions that invalidate the
    /// whole scan: the root is missing, not a directory, or unreadable.
    pub fn find_duplicates(&self, root: &Path) -> Result<PipelineRun, FinderError> {
        let start = Instant::now();

        if !root.exists() {
            return Err(FinderError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(FinderError::NotADirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|e| FinderError::RootUnreadable {
            path: root.to_path_buf(),
            source: e,
        })?;

        log::info!("Starting duplicate scan of {}", root.display());

        let mut run = PipelineRun::default();

        if self.is_shutdown_requested() {
            run.stats.interrupted = true;
            run.stats.scan_duration = start.elapsed();
            return Ok(run);
        }

        // Walk the tree, buffering only records whose size has been seen
        // before. Bloom filters keep memory bounded on trees where most
        // sizes are unique.
        if let Some(cb) = &self.progress {
            cb.on_phase_start("walking", 0);
        }

        let mut walker = Walker::new(root, self.filters.clone());
        if let Some(flag) = &self.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }

        let mut candidates: Vec<FileRecord> = Vec::new();
        let mut seen_sizes = GrowableBloom::new(BLOOM_FP_RATE, 1000);
        let mut duplicate_sizes = GrowableBloom::new(BLOOM_FP_RATE, 1000);
        let mut first_occurrences: HashMap<u64, FileRecord> = HashMap::new();
        let mut examined = 0usize;

        for result in walker.walk() {
            match result {
                Ok(file) => {
                    examined += 1;
                    run.stats.total_bytes_seen += file.size;
                    if let Some(cb) = &self.progress {
                        cb.on_progress(examined, file.path.to_string_lossy().as_ref());
                    }

                    if duplicate_sizes.contains(file.size) {
                        candidates.push(file);
                    } else if seen_sizes.contains(file.size) {
                        duplicate_sizes.insert(file.size);
                        if let Some(first) = first_occurrences.remove(&file.size) {
                            candidates.push(first);
                        }
                        candidates.push(file);
                    } else {
                        seen_sizes.insert(file.size);
                        first_occurrences.insert(file.size, file);
                    }
                }
                Err(e) => {
                    run.errors.push(FileError::from(e));
                }
            }
        }

        if let Some(cb) = &self.progress {
            cb.on_phase_end("walking");
        }

        run.stats.files_examined = examined;
        log::info!(
            "Walk complete: {} files, {} bytes",
            examined,
            run.stats.total_bytes_seen
        );

        if self.is_shutdown_requested() {
            run.stats.interrupted = true;
            run.stats.scan_duration = start.elapsed();
            return Ok(run);
        }

        // Size classification
        if let Some(cb) = &self.progress {
            cb.on_phase_start("classifying", 0);
        }
        let (size_groups, group_stats) = group_by_size_ordered(candidates);
        run.stats.eliminated_by_size = group_stats.eliminated_unique + first_occurrences.len();
        if let Some(cb) = &self.progress {
            cb.on_phase_end("classifying");
        }

        if size_groups.is_empty() {
            log::info!("No size-group candidates, scan complete");
            run.stats.scan_duration = start.elapsed();
            return Ok(run);
        }

        // Partial-hash stage
        let stage_config = self.stage_config();
        let (partial_groups, mut partial_stats) =
            stage_partial(size_groups, &self.hasher, &stage_config);

        run.stats.eliminated_by_partial = partial_stats.eliminated_unique;
        run.stats.bytes_hashed += partial_stats.bytes_hashed;
        run.errors
            .extend(partial_stats.errors.drain(..).map(FileError::from));

        if partial_stats.interrupted || self.is_shutdown_requested() {
            // Nothing is verified until the full stage confirms it
            run.groups.clear();
            run.stats.interrupted = true;
            run.stats.scan_duration = start.elapsed();
            return Ok(run);
        }

        if partial_groups.is_empty() {
            run.stats.scan_duration = start.elapsed();
            return Ok(run);
        }

        // Full-hash stage
        let (groups, mut full_stats) = stage_full(
            partial_groups,
            &self.hasher,
            &stage_config,
            self.verify_bytes,
        );

        run.stats.bytes_hashed += full_stats.bytes_hashed;
        run.errors
            .extend(full_stats.errors.drain(..).map(FileError::from));
        run.stats.interrupted = full_stats.interrupted || self.is_shutdown_requested();

        run.stats.duplicate_groups = groups.len();
        run.stats.duplicate_files = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        run.stats.wasted_bytes = groups.iter().map(DuplicateGroup::wasted_bytes).sum();
        run.groups = groups;
        run.stats.scan_duration = start.elapsed();

        log::info!(
            "Scan complete: {} groups, {} duplicate files, {} bytes reclaimable",
            run.stats.duplicate_groups,
            run.stats.duplicate_files,
            run.stats.wasted_bytes
        );

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn record(path: &Path) -> FileRecord {
        let meta = fs::metadata(path).unwrap();
        FileRecord::new(path.to_path_buf(), meta.len(), SystemTime::now())
    }

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_stage_partial_splits_by_prefix() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", b"prefix-one rest");
        let b = write_file(&dir, "b.bin", b"prefix-one rest");
        let c = write_file(&dir, "c.bin", b"prefix-two rest");

        let group = SizeGroup::with_files(15, vec![record(&a), record(&b), record(&c)]);
        let hasher = Arc::new(Hasher::new());
        let config = StageConfig::default().with_io_threads(2);

        let (groups, stats) = stage_partial(vec![group], &hasher, &config);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(stats.input_files, 3);
        assert_eq!(stats.hashed_files, 3);
        assert_eq!(stats.eliminated_unique, 1);
        assert!(!stats.interrupted);
    }

    #[test]
    fn test_stage_partial_missing_file_recorded() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", b"same content");
        let b = write_file(&dir, "b.bin", b"same content");
        let ghost = FileRecord::new(dir.path().join("ghost.bin"), 12, SystemTime::now());

        let group = SizeGroup::with_files(12, vec![record(&a), record(&b), ghost]);
        let hasher = Arc::new(Hasher::new());
        let config = StageConfig::default();

        let (groups, stats) = stage_partial(vec![group], &hasher, &config);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(stats.failed_files, 1);
        assert_eq!(stats.errors.len(), 1);
    }

    #[test]
    fn test_stage_full_confirms_duplicates() {
        let dir = TempDir::new().unwrap();
        // Larger than the window so the full stage actually re-reads
        let payload = vec![b'z'; 8192];
        let mut other = payload.clone();
        other[8000] = b'q';

        let a = write_file(&dir, "a.bin", &payload);
        let b = write_file(&dir, "b.bin", &payload);
        let c = write_file(&dir, "c.bin", &other);

        let hasher = Arc::new(Hasher::with_window(4096));
        let prefix = hasher.partial_hash(&a).unwrap();
        let group = PartialHashGroup {
            partial_hash: prefix,
            size: 8192,
            files: vec![record(&a), record(&b), record(&c)],
        };
        let config = StageConfig::default();

        let (groups, stats) = stage_full(vec![group], &hasher, &config, false);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].size, 8192);
        assert_eq!(stats.bytes_hashed, 3 * 8192);
    }

    #[test]
    fn test_stage_full_small_files_skip_reread() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", b"tiny");
        let b = write_file(&dir, "b.bin", b"tiny");

        let hasher = Arc::new(Hasher::new());
        let prefix = hasher.partial_hash(&a).unwrap();
        let group = PartialHashGroup {
            partial_hash: prefix,
            size: 4,
            files: vec![record(&a), record(&b)],
        };
        let config = StageConfig::default();

        let (groups, stats) = stage_full(vec![group], &hasher, &config, false);

        assert_eq!(groups.len(), 1);
        // No bytes re-read: the prefix hash covered the whole content
        assert_eq!(stats.bytes_hashed, 0);
        assert_eq!(groups[0].hash, prefix);
    }

    #[test]
    fn test_stage_full_verify_bytes() {
        let dir = TempDir::new().unwrap();
        let payload = vec![b'v'; 8192];
        let a = write_file(&dir, "a.bin", &payload);
        let b = write_file(&dir, "b.bin", &payload);

        let hasher = Arc::new(Hasher::with_window(4096));
        let prefix = hasher.partial_hash(&a).unwrap();
        let group = PartialHashGroup {
            partial_hash: prefix,
            size: 8192,
            files: vec![record(&a), record(&b)],
        };
        let config = StageConfig::default();

        let (groups, _) = stage_full(vec![group], &hasher, &config, true);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_stage_interrupted_discards_groups() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", b"same bytes here");
        let b = write_file(&dir, "b.bin", b"same bytes here");

        let flag = Arc::new(AtomicBool::new(true));
        let group = SizeGroup::with_files(15, vec![record(&a), record(&b)]);
        let hasher = Arc::new(Hasher::new());
        let config = StageConfig::default().with_shutdown_flag(flag);

        let (groups, stats) = stage_partial(vec![group], &hasher, &config);

        assert!(groups.is_empty());
        assert!(stats.interrupted);
    }

    #[test]
    fn test_files_identical() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", b"identical bytes");
        let b = write_file(&dir, "b.bin", b"identical bytes");
        let c = write_file(&dir, "c.bin", b"different bytes");

        assert!(files_identical(&a, &b, None).unwrap());
        assert!(!files_identical(&a, &c, None).unwrap());
    }

    #[test]
    fn test_split_by_content_keeps_pairs() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", b"payload x");
        let b = write_file(&dir, "b.bin", b"payload x");

        let (classes, errors) =
            split_by_content(vec![record(&a), record(&b)], None).unwrap();

        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].len(), 2);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_finder_basic_duplicates() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.txt", b"duplicate content");
        write_file(&dir, "b.txt", b"duplicate content");
        write_file(&dir, "c.txt", b"something unique!");

        let finder = DuplicateFinder::new(FilterConfig::default());
        let run = finder.find_duplicates(dir.path()).unwrap();

        assert_eq!(run.groups.len(), 1);
        assert_eq!(run.groups[0].len(), 2);
        assert_eq!(run.stats.files_examined, 3);
        assert!(!run.stats.interrupted);
    }

    #[test]
    fn test_finder_root_not_found() {
        let finder = DuplicateFinder::new(FilterConfig::default());
        let err = finder.find_duplicates(Path::new("/nonexistent/dir/12345"));
        assert!(matches!(err, Err(FinderError::RootNotFound(_))));
    }

    #[test]
    fn test_finder_root_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = write_file(&dir, "plain.txt", b"not a dir");

        let finder = DuplicateFinder::new(FilterConfig::default());
        let err = finder.find_duplicates(&file);
        assert!(matches!(err, Err(FinderError::NotADirectory(_))));
    }

    #[test]
    fn test_finder_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "a.txt", b"content");

        let flag = Arc::new(AtomicBool::new(true));
        let finder =
            DuplicateFinder::new(FilterConfig::default()).with_shutdown_flag(flag);
        let run = finder.find_duplicates(dir.path()).unwrap();

        assert!(run.groups.is_empty());
        assert!(run.stats.interrupted);
    }

    #[test]
    fn test_stage_stats_elimination_rate() {
        let stats = StageStats {
            input_files: 10,
            surviving_files: 4,
            ..Default::default()
        };
        assert!((stats.elimination_rate() - 60.0).abs() < 0.1);
        assert_eq!(StageStats::default().elimination_rate(), 0.0);
    }
}
