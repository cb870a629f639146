//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk
//! - Progressive content hashing with BLAKE3 (prefix window, then full stream)
//! - Filter configuration applied during the walk
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (partial and streamed full)
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{Walker, FilterConfig};
//! use std::path::Path;
//!
//! let filters = FilterConfig::default()
//!     .with_allowed_extensions(["jpg", "png"]);
//!
//! let walker = Walker::new(Path::new("."), filters);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

// Re-export main types
pub use hasher::{hash_to_hex, Hash, Hasher, DEFAULT_PARTIAL_WINDOW, FULL_HASH_CHUNK};
pub use walker::Walker;

/// Smallest accepted partial-hash window.
pub const MIN_PARTIAL_WINDOW: usize = 512;

/// Largest accepted partial-hash window.
pub const MAX_PARTIAL_WINDOW: usize = 1024 * 1024;

/// Metadata for a discovered file.
///
/// Contains everything the pipeline needs for duplicate detection:
/// path, size, modification time, and the declared type (extension).
/// Records are created by the [`Walker`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Lowercase file extension, if any
    pub extension: Option<String>,
}

impl FileRecord {
    /// Create a new record, deriving the extension from the path.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        Self {
            path,
            size,
            modified,
            extension,
        }
    }
}

/// A broad file-type category resolvable to a set of extensions.
///
/// Mirrors the category checkboxes a front-end typically offers. The engine
/// itself is type-agnostic: callers resolve categories into the
/// `allowed_extensions` set of a [`FilterConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileCategory {
    /// Raster image formats
    Images,
    /// Video container formats
    Videos,
    /// Audio formats
    Audio,
    /// Office and text documents
    Documents,
    /// Compressed archives
    Archives,
}

impl FileCategory {
    /// Extensions (lowercase, no leading dot) belonging to this category.
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Images => &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"],
            Self::Videos => &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"],
            Self::Audio => &["mp3", "wav", "flac", "aac", "ogg", "wma"],
            Self::Documents => &["pdf", "doc", "docx", "txt", "rtf", "odt"],
            Self::Archives => &["zip", "rar", "7z", "tar", "gz", "bz2"],
        }
    }

    /// Resolve a set of categories into one extension set.
    #[must_use]
    pub fn resolve(categories: &[Self]) -> HashSet<String> {
        categories
            .iter()
            .flat_map(|c| c.extensions().iter().map(|e| (*e).to_string()))
            .collect()
    }
}

/// Filter configuration for a scan request.
///
/// Passed explicitly at scan start; the engine holds no process-wide
/// mutable configuration.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Extensions to include, lowercase without leading dot.
    /// An empty set means all files are eligible.
    pub allowed_extensions: HashSet<String>,

    /// Paths excluded from the walk. Matching is by path prefix, so an
    /// excluded directory prunes its entire subtree.
    pub excluded_paths: Vec<PathBuf>,

    /// Skip zero-byte files. They are trivially identical but reclaim
    /// no space.
    pub skip_empty_files: bool,

    /// Skip hidden entries and well-known system files.
    pub skip_system_entries: bool,

    /// Size of the prefix window hashed in the partial stage, in bytes.
    /// Clamped to `[MIN_PARTIAL_WINDOW, MAX_PARTIAL_WINDOW]`.
    pub partial_hash_window_bytes: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: HashSet::new(),
            excluded_paths: Vec::new(),
            skip_empty_files: true,
            skip_system_entries: true,
            partial_hash_window_bytes: DEFAULT_PARTIAL_WINDOW,
        }
    }
}

impl FilterConfig {
    /// Set the allowed extensions. Leading dots are stripped and entries
    /// lowercased, so `".JPG"` and `"jpg"` are equivalent.
    #[must_use]
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Set the excluded path prefixes.
    #[must_use]
    pub fn with_excluded_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.excluded_paths = paths;
        self
    }

    /// Control whether zero-byte files are skipped.
    #[must_use]
    pub fn with_skip_empty_files(mut self, skip: bool) -> Self {
        self.skip_empty_files = skip;
        self
    }

    /// Control whether hidden/system entries are skipped.
    #[must_use]
    pub fn with_skip_system_entries(mut self, skip: bool) -> Self {
        self.skip_system_entries = skip;
        self
    }

    /// Set the partial-hash window size.
    #[must_use]
    pub fn with_partial_hash_window(mut self, bytes: usize) -> Self {
        self.partial_hash_window_bytes = bytes;
        self
    }

    /// The partial window clamped to its supported range.
    #[must_use]
    pub fn partial_window(&self) -> usize {
        self.partial_hash_window_bytes
            .clamp(MIN_PARTIAL_WINDOW, MAX_PARTIAL_WINDOW)
    }

    /// Check whether a file extension passes the extension filter.
    #[must_use]
    pub fn matches_extension(&self, extension: Option<&str>) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        extension.is_some_and(|e| self.allowed_extensions.contains(e))
    }

    /// Check whether a path falls under any excluded prefix.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_paths.iter().any(|p| path.starts_with(p))
    }
}

/// Errors that can occur while walking the directory tree.
///
/// These are per-entry and non-fatal: the walk continues past them.
#[derive(thiserror::Error, Debug)]
pub enum WalkError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry vanished between enumeration and stat.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
///
/// Per-file and non-fatal, except [`HashError::Interrupted`], which marks
/// cooperative cancellation and causes the surrounding group to be discarded
/// rather than recorded as an error.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file vanished before it could be read.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Hashing was interrupted by a cancellation request.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),
}

impl HashError {
    /// Map an I/O error to the matching variant.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// A serializable per-file error record for the final result.
///
/// Internal error enums carry `io::Error` sources and cannot be cloned or
/// serialized; they are flattened into this form when the scan finalizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    /// Path of the file that was dropped from consideration
    pub path: PathBuf,
    /// Human-readable description of what went wrong
    pub message: String,
}

impl From<WalkError> for FileError {
    fn from(err: WalkError) -> Self {
        let path = match &err {
            WalkError::PermissionDenied(p) | WalkError::NotFound(p) => p.clone(),
            WalkError::Io { path, .. } => path.clone(),
        };
        Self {
            path,
            message: err.to_string(),
        }
    }
}

impl From<HashError> for FileError {
    fn from(err: HashError) -> Self {
        let path = match &err {
            HashError::NotFound(p)
            | HashError::PermissionDenied(p)
            | HashError::Interrupted(p) => p.clone(),
            HashError::Io { path, .. } => path.clone(),
        };
        Self {
            path,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_new() {
        let record = FileRecord::new(PathBuf::from("/test/Photo.JPG"), 1024, SystemTime::now());

        assert_eq!(record.path, PathBuf::from("/test/Photo.JPG"));
        assert_eq!(record.size, 1024);
        assert_eq!(record.extension.as_deref(), Some("jpg"));
    }

    #[test]
    fn test_file_record_no_extension() {
        let record = FileRecord::new(PathBuf::from("/test/Makefile"), 10, SystemTime::now());
        assert_eq!(record.extension, None);
    }

    #[test]
    fn test_filter_config_default() {
        let filters = FilterConfig::default();

        assert!(filters.allowed_extensions.is_empty());
        assert!(filters.excluded_paths.is_empty());
        assert!(filters.skip_empty_files);
        assert!(filters.skip_system_entries);
        assert_eq!(filters.partial_hash_window_bytes, DEFAULT_PARTIAL_WINDOW);
    }

    #[test]
    fn test_filter_config_extension_normalization() {
        let filters = FilterConfig::default().with_allowed_extensions([".JPG", "png", ".Gif"]);

        assert!(filters.matches_extension(Some("jpg")));
        assert!(filters.matches_extension(Some("png")));
        assert!(filters.matches_extension(Some("gif")));
        assert!(!filters.matches_extension(Some("txt")));
        assert!(!filters.matches_extension(None));
    }

    #[test]
    fn test_filter_config_empty_extensions_match_all() {
        let filters = FilterConfig::default();
        assert!(filters.matches_extension(Some("anything")));
        assert!(filters.matches_extension(None));
    }

    #[test]
    fn test_filter_config_excluded_paths() {
        let filters = FilterConfig::default()
            .with_excluded_paths(vec![PathBuf::from("/data/cache"), PathBuf::from("/tmp")]);

        assert!(filters.is_excluded(Path::new("/data/cache/a.bin")));
        assert!(filters.is_excluded(Path::new("/tmp")));
        assert!(!filters.is_excluded(Path::new("/data/cachet/a.bin")));
        assert!(!filters.is_excluded(Path::new("/data/other")));
    }

    #[test]
    fn test_filter_config_window_clamped() {
        let filters = FilterConfig::default().with_partial_hash_window(1);
        assert_eq!(filters.partial_window(), MIN_PARTIAL_WINDOW);

        let filters = FilterConfig::default().with_partial_hash_window(usize::MAX);
        assert_eq!(filters.partial_window(), MAX_PARTIAL_WINDOW);

        let filters = FilterConfig::default().with_partial_hash_window(8192);
        assert_eq!(filters.partial_window(), 8192);
    }

    #[test]
    fn test_file_category_resolve() {
        let set = FileCategory::resolve(&[FileCategory::Images, FileCategory::Audio]);

        assert!(set.contains("jpg"));
        assert!(set.contains("webp"));
        assert!(set.contains("mp3"));
        assert!(!set.contains("pdf"));
    }

    #[test]
    fn test_walk_error_display() {
        let err = WalkError::PermissionDenied(PathBuf::from("/test"));
        assert_eq!(err.to_string(), "Permission denied: /test");

        let err = WalkError::NotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "Path not found: /missing");
    }

    #[test]
    fn test_hash_error_from_io() {
        let err = HashError::from_io(
            Path::new("/secret"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, HashError::PermissionDenied(_)));

        let err = HashError::from_io(
            Path::new("/gone"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, HashError::NotFound(_)));
    }

    #[test]
    fn test_file_error_from_hash_error() {
        let err = HashError::NotFound(PathBuf::from("/gone.txt"));
        let record = FileError::from(err);

        assert_eq!(record.path, PathBuf::from("/gone.txt"));
        assert!(record.message.contains("not found"));
    }
}
