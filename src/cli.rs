//! Command-line interface definitions.
//!
//! The CLI is a thin consumer of the scan engine: it translates arguments
//! into a [`FilterConfig`] and [`EngineConfig`], starts a scan, polls its
//! progress, and renders the final result.
//!
//! # Example
//!
//! ```bash
//! # Scan a directory for duplicates
//! dupescan ~/Downloads
//!
//! # Only images and videos, skipping a cache directory
//! dupescan ~/Pictures --category images --category videos --exclude ~/Pictures/.cache
//!
//! # JSON output for scripting
//! dupescan ~/Downloads --output json
//!
//! # Verbose mode for debugging
//! dupescan -v ~/Downloads
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::engine::EngineConfig;
use crate::scanner::{FileCategory, FilterConfig, DEFAULT_PARTIAL_WINDOW};

/// Find duplicate files by content.
///
/// dupescan locates byte-identical files under a directory tree using a
/// multi-stage pipeline (size, prefix hash, full BLAKE3 hash) and reports
/// them as groups ordered by reclaimable space.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to scan for duplicates
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Only include files with these extensions (repeatable, e.g. --ext jpg)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Only include files in these categories (repeatable)
    #[arg(long, value_enum, value_name = "CATEGORY")]
    pub category: Vec<CategoryArg>,

    /// Exclude this path and everything under it (repeatable)
    #[arg(long, value_name = "PATH")]
    pub exclude: Vec<PathBuf>,

    /// Include zero-byte files
    #[arg(long)]
    pub include_empty: bool,

    /// Include hidden and system entries
    #[arg(long)]
    pub include_system: bool,

    /// Prefix window for the quick hash stage, in bytes
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_PARTIAL_WINDOW)]
    pub partial_window: usize,

    /// Number of hashing threads
    #[arg(long, value_name = "N", default_value_t = crate::duplicates::DEFAULT_IO_THREADS)]
    pub threads: usize,

    /// Byte-compare matched files, eliminating hash-collision risk
    #[arg(long)]
    pub verify_bytes: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors and the final report
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Output format for the final report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable group listing and summary
    Text,
    /// The serialized scan result
    Json,
}

/// File-type categories selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
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

impl From<CategoryArg> for FileCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Images => Self::Images,
            CategoryArg::Videos => Self::Videos,
            CategoryArg::Audio => Self::Audio,
            CategoryArg::Documents => Self::Documents,
            CategoryArg::Archives => Self::Archives,
        }
    }
}

impl Cli {
    /// Build the scan filter configuration from the parsed arguments.
    ///
    /// Explicit `--ext` values and resolved `--category` tables are merged
    /// into one extension set.
    #[must_use]
    pub fn filter_config(&self) -> FilterConfig {
        let categories: Vec<FileCategory> =
            self.category.iter().map(|c| FileCategory::from(*c)).collect();
        let mut extensions = FileCategory::resolve(&categories);
        extensions.extend(
            self.extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase()),
        );

        FilterConfig::default()
            .with_allowed_extensions(extensions)
            .with_excluded_paths(self.exclude.clone())
            .with_skip_empty_files(!self.include_empty)
            .with_skip_system_entries(!self.include_system)
            .with_partial_hash_window(self.partial_window)
    }

    /// Build the engine configuration from the parsed arguments.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_io_threads(self.threads)
            .with_verify_bytes(self.verify_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_minimal() {
        let cli = Cli::parse_from(["dupescan", "/data"]);

        assert_eq!(cli.path, PathBuf::from("/data"));
        assert!(cli.extensions.is_empty());
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.verify_bytes);
    }

    #[test]
    fn test_cli_filter_config() {
        let cli = Cli::parse_from([
            "dupescan",
            "/data",
            "--ext",
            ".JPG",
            "--category",
            "audio",
            "--exclude",
            "/data/cache",
            "--include-empty",
        ]);
        let filters = cli.filter_config();

        assert!(filters.allowed_extensions.contains("jpg"));
        assert!(filters.allowed_extensions.contains("mp3"));
        assert!(!filters.allowed_extensions.contains("pdf"));
        assert_eq!(filters.excluded_paths, vec![PathBuf::from("/data/cache")]);
        assert!(!filters.skip_empty_files);
        assert!(filters.skip_system_entries);
    }

    #[test]
    fn test_cli_engine_config() {
        let cli = Cli::parse_from(["dupescan", "/data", "--threads", "8", "--verify-bytes"]);
        let config = cli.engine_config();

        assert_eq!(config.io_threads, 8);
        assert!(config.verify_bytes);
    }

    #[test]
    fn test_cli_partial_window_default() {
        let cli = Cli::parse_from(["dupescan", "/data"]);
        assert_eq!(cli.partial_window, DEFAULT_PARTIAL_WINDOW);

        let cli = Cli::parse_from(["dupescan", "/data", "--partial-window", "8192"]);
        assert_eq!(cli.filter_config().partial_hash_window_bytes, 8192);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["dupescan", "/data", "-q", "-v"]);
        assert!(result.is_err());
    }
}
