//! Size-based file classification and duplicate group structures.
//!
//! # Overview
//!
//! Size grouping is the first and cheapest stage of duplicate detection:
//! files with different sizes cannot be duplicates, so grouping by exact
//! size eliminates the vast majority of unique files before any content
//! read occurs.
//!
//! # Example
//!
//! ```
//! use dupescan::scanner::FileRecord;
//! use dupescan::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/file1.txt"), 1024, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/file2.txt"), 1024, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/file3.txt"), 2048, SystemTime::now()),
//! ];
//!
//! let (groups, stats) = group_by_size(files);
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(groups.len(), 1);  // only the 1024-byte pair survives
//! ```

use std::collections::HashMap;

use serde::Serialize;

use crate::scanner::{hash_to_hex, FileRecord, Hash};

/// A group of files sharing the same size.
///
/// Candidate set for the partial-hash stage; all members have identical
/// `size` and the group holds at least two of them once filtered.
#[derive(Debug, Clone)]
pub struct SizeGroup {
    /// File size in bytes (shared by all files in this group)
    pub size: u64,
    /// Files with this exact size
    pub files: Vec<FileRecord>,
}

impl SizeGroup {
    /// Create a size group with initial files.
    #[must_use]
    pub fn with_files(size: u64, files: Vec<FileRecord>) -> Self {
        Self { size, files }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check if this group has potential duplicates (2+ files).
    #[must_use]
    pub fn has_candidates(&self) -> bool {
        self.files.len() > 1
    }

    /// Space reclaimable if every member but one turned out duplicate.
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        if self.files.len() > 1 {
            self.size * (self.files.len() as u64 - 1)
        } else {
            0
        }
    }
}

/// A refinement of one [`SizeGroup`] whose members share a prefix-window hash.
///
/// Candidate set for the full-hash stage. Membership is always a subset of
/// exactly one size group.
#[derive(Debug, Clone)]
pub struct PartialHashGroup {
    /// Hash of the shared prefix window
    pub partial_hash: Hash,
    /// File size in bytes (inherited from the parent size group)
    pub size: u64,
    /// Files sharing the prefix hash
    pub files: Vec<FileRecord>,
}

impl PartialHashGroup {
    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A confirmed group of byte-identical files.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// BLAKE3 hash of the full file content
    pub hash: Hash,
    /// File size in bytes, shared by all members
    pub size: u64,
    /// The identical files, ordered by ascending modification time then path
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(hash: Hash, size: u64, files: Vec<FileRecord>) -> Self {
        Self { hash, size, files }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies (total minus the kept original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Bytes reclaimable by removing all copies but one.
    #[must_use]
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Hash as a hexadecimal string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hash_to_hex(&self.hash)
    }

    /// Just the paths of the member files.
    #[must_use]
    pub fn paths(&self) -> Vec<std::path::PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Statistics from the size-classification stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Total number of files classified
    pub total_files: usize,
    /// Total size of all classified files in bytes
    pub total_bytes: u64,
    /// Number of distinct file sizes seen
    pub unique_sizes: usize,
    /// Number of files that could still be duplicates (in groups of 2+)
    pub candidate_files: usize,
    /// Number of files eliminated as unique (singleton sizes)
    pub eliminated_unique: usize,
    /// Number of size groups with 2+ files
    pub candidate_groups: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size classification alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Group files by exact size, keeping only groups with 2+ members.
///
/// This is the cheapest discriminator in the pipeline: metadata only, no
/// file I/O. Returns the surviving groups keyed by size along with
/// statistics about the classification.
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileRecord>,
) -> (HashMap<u64, Vec<FileRecord>>, GroupingStats) {
    let mut all_groups: HashMap<u64, Vec<FileRecord>> = HashMap::new();
    let mut stats = GroupingStats::default();

    for file in files {
        stats.total_files += 1;
        stats.total_bytes += file.size;
        all_groups.entry(file.size).or_default().push(file);
    }

    stats.unique_sizes = all_groups.len();

    let surviving: HashMap<u64, Vec<FileRecord>> = all_groups
        .into_iter()
        .filter(|(size, files)| {
            if files.len() == 1 {
                stats.eliminated_unique += 1;
                log::trace!(
                    "Eliminated unique size {}: {}",
                    size,
                    files[0].path.display()
                );
                false
            } else {
                stats.candidate_files += files.len();
                stats.candidate_groups += 1;
                log::debug!("Size group {} bytes: {} candidates", size, files.len());
                true
            }
        })
        .collect();

    log::info!(
        "Size classification: {} files → {} candidates ({:.1}% eliminated)",
        stats.total_files,
        stats.candidate_files,
        stats.elimination_rate()
    );

    (surviving, stats)
}

/// Group files by size, returning [`SizeGroup`]s ordered by descending size.
///
/// The descending order prioritizes the files that, if duplicated, waste
/// the most space, so early progress and early results carry the most value.
#[must_use]
pub fn group_by_size_ordered(
    files: impl IntoIterator<Item = FileRecord>,
) -> (Vec<SizeGroup>, GroupingStats) {
    let (groups_map, stats) = group_by_size(files);

    let mut groups: Vec<SizeGroup> = groups_map
        .into_iter()
        .map(|(size, files)| SizeGroup::with_files(size, files))
        .collect();

    groups.sort_by(|a, b| b.size.cmp(&a.size));

    (groups, stats)
}
