//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based file classification
//! - Partial-hash and full-hash refinement stages
//! - Result assembly with deterministic ordering

pub mod finder;
pub mod groups;
pub mod report;

pub use finder::{
    stage_full, stage_partial, DuplicateFinder, FinderError, PipelineRun, ScanStats, StageConfig,
    StageStats, DEFAULT_IO_THREADS,
};
pub use groups::{
    group_by_size, group_by_size_ordered, DuplicateGroup, GroupingStats, PartialHashGroup,
    SizeGroup,
};
pub use report::{finalize, ScanResult};
