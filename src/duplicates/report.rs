//! Result assembly: deterministic ordering and wasted-space accounting.
//!
//! The pipeline produces groups in whatever order the workers finished;
//! this module imposes the ordering contract exposed to callers:
//!
//! - Groups sort by descending per-group wasted space, ties broken by the
//!   ascending path of the first member.
//! - Within a group, members sort by ascending modification time, then by
//!   ascending path. The earliest-modified member is conventionally shown
//!   as the "original" — a display rule, not a claim about provenance.

use std::time::Duration;

use serde::Serialize;

use super::finder::{PipelineRun, ScanStats};
use super::groups::DuplicateGroup;
use crate::scanner::FileError;

/// The final, immutable outcome of a scan.
///
/// The field names form the stable contract any exporter serializes.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Duplicate groups, deterministically ordered
    pub groups: Vec<DuplicateGroup>,
    /// Total reclaimable space: sum over groups of `(members - 1) * size`
    pub total_wasted_bytes: u64,
    /// Wall-clock duration of the scan
    pub scan_duration: Duration,
    /// Number of files the walker yielded into the pipeline
    pub files_examined: usize,
    /// Per-file errors encountered and skipped during the scan
    pub errors: Vec<FileError>,
    /// Extended summary statistics
    pub stats: ScanStats,
}

impl ScanResult {
    /// Whether any duplicates were found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of redundant files across all groups.
    #[must_use]
    pub fn duplicate_file_count(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::duplicate_count).sum()
    }
}

/// Assemble a finished pipeline run into an ordered [`ScanResult`].
#[must_use]
pub fn finalize(run: PipelineRun) -> ScanResult {
    let PipelineRun {
        mut groups,
        stats,
        errors,
    } = run;

    for group in &mut groups {
        group
            .files
            .sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    }

    groups.sort_by(|a, b| {
        b.wasted_bytes()
            .cmp(&a.wasted_bytes())
            .then_with(|| first_path(a).cmp(first_path(b)))
    });

    let total_wasted_bytes = groups.iter().map(DuplicateGroup::wasted_bytes).sum();

    ScanResult {
        total_wasted_bytes,
        scan_duration: stats.scan_duration,
        files_examined: stats.files_examined,
        errors,
        stats,
        groups,
    }
}

fn first_path(group: &DuplicateGroup) -> &std::path::Path {
    group
        .files
        .first()
        .map_or_else(|| std::path::Path::new(""), |f| f.path.as_path())
}
