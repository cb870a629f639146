//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and producing [`FileRecord`] values for duplicate detection, with
//! filtering applied during the walk. It uses [`jwalk`] for parallel
//! directory reading with sorted, deterministic child order.
//!
//! # Behavior
//!
//! - Symbolic links are never followed (prevents traversal cycles); symlinked
//!   files are skipped entirely.
//! - Unreadable entries are yielded as [`WalkError`] values rather than
//!   stopping iteration.
//! - Excluded path prefixes prune whole subtrees.
//! - With `skip_system_entries`, hidden dot-entries and well-known system
//!   files (`Thumbs.db`, `desktop.ini`, ...) are skipped.
//! - With `skip_empty_files`, zero-byte files never enter the pipeline.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use jwalk::WalkDir;

use super::{FileRecord, FilterConfig, WalkError};

/// Well-known system files that carry no user data.
const SYSTEM_FILE_NAMES: &[&str] = &[
    "Thumbs.db",
    "desktop.ini",
    ".DS_Store",
    "pagefile.sys",
    "hiberfil.sys",
    "swapfile.sys",
];

/// Well-known system directories pruned from traversal.
const SYSTEM_DIR_NAMES: &[&str] = &[
    "$RECYCLE.BIN",
    "System Volume Information",
    ".Trash",
    "lost+found",
];

/// Directory walker for parallel file discovery.
///
/// One walker drives one walk; start a new scan with a new walker.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Filter configuration for this scan
    filters: FilterConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(root: &Path, filters: FilterConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            filters,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walker stops iteration as soon
    /// as possible.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree, yielding file records.
    ///
    /// Returns a lazy iterator over [`FileRecord`] results. Per-entry errors
    /// are yielded as [`WalkError`] values rather than stopping iteration.
    /// The walk is finite and not restartable.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, WalkError>> + '_ {
        let excluded = self.filters.excluded_paths.clone();
        let skip_system = self.filters.skip_system_entries;

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(self.filters.skip_system_entries)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Prune excluded and system directories before descending
                children.retain(|entry| match entry {
                    Ok(entry) => {
                        if !entry.file_type().is_dir() {
                            return true;
                        }
                        let path = entry.path();
                        if excluded.iter().any(|p| path.starts_with(p)) {
                            return false;
                        }
                        if skip_system {
                            let name = entry.file_name().to_string_lossy();
                            if SYSTEM_DIR_NAMES.iter().any(|s| name == *s) {
                                return false;
                            }
                        }
                        true
                    }
                    Err(_) => true,
                });

                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    // Skip the root directory itself
                    if path == self.root {
                        return None;
                    }

                    let file_type = entry.file_type();

                    // Directories are handled by traversal, not yielded
                    if file_type.is_dir() {
                        return None;
                    }

                    // Symlinked files are skipped; their content is
                    // counted at the real path
                    if file_type.is_symlink() {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    let metadata = match std::fs::symlink_metadata(&path) {
                        Ok(m) => m,
                        Err(e) => return Some(self.handle_io_error(&path, e)),
                    };

                    if !metadata.is_file() {
                        return None;
                    }

                    self.process_file(path, &metadata)
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(self.handle_jwalk_error(path, &e))
                }
            }
        })
    }

    /// Apply the per-file filters and build a record if they pass.
    fn process_file(
        &self,
        path: PathBuf,
        metadata: &Metadata,
    ) -> Option<Result<FileRecord, WalkError>> {
        if self.filters.is_excluded(&path) {
            log::trace!("Skipping excluded path: {}", path.display());
            return None;
        }

        if self.filters.skip_system_entries {
            let name = path.file_name().map(|n| n.to_string_lossy())?;
            if SYSTEM_FILE_NAMES.iter().any(|s| name == *s) {
                log::trace!("Skipping system file: {}", path.display());
                return None;
            }
        }

        let size = metadata.len();
        if size == 0 && self.filters.skip_empty_files {
            log::debug!("Skipping empty file: {}", path.display());
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let record = FileRecord::new(path, size, modified);

        if !self.filters.matches_extension(record.extension.as_deref()) {
            log::trace!(
                "Skipping file due to extension filter: {}",
                record.path.display()
            );
            return None;
        }

        Some(Ok(record))
    }

    /// Map I/O errors to per-entry walk errors.
    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> Result<FileRecord, WalkError> {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                Err(WalkError::PermissionDenied(path.to_path_buf()))
            }
            ErrorKind::NotFound => {
                log::debug!("File vanished during walk: {}", path.display());
                Err(WalkError::NotFound(path.to_path_buf()))
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                Err(WalkError::Io {
                    path: path.to_path_buf(),
                    source: error,
                })
            }
        }
    }

    /// Funnel jwalk errors into the per-entry error type.
    fn handle_jwalk_error(&self, path: PathBuf, error: &jwalk::Error) -> Result<FileRecord, WalkError> {
        log::warn!("Walker error for {}: {}", path.display(), error);
        Err(WalkError::Io {
            path,
            source: std::io::Error::other(error.to_string()),
        })
    }
}
