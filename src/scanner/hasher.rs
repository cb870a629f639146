//! BLAKE3 file hasher with partial-window and streaming full-content modes.
//!
//! # Overview
//!
//! Duplicate detection hashes files progressively: first a cheap hash over a
//! bounded prefix window ([`Hasher::partial_hash`]), then a full-content hash
//! streamed in fixed-size chunks ([`Hasher::full_hash`]) for files whose
//! prefix matched. Streaming keeps memory bounded regardless of file size and
//! lets cancellation take effect between chunks.
//!
//! For a file no larger than the partial window, the partial hash covers the
//! entire content and equals the full hash; callers can use
//! [`Hasher::window`] to exploit this and skip the second read.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// A 32-byte BLAKE3 content hash.
pub type Hash = [u8; 32];

/// Default partial-hash window: first 4 KiB of content.
pub const DEFAULT_PARTIAL_WINDOW: usize = 4096;

/// Chunk size for streamed full-content hashing.
pub const FULL_HASH_CHUNK: usize = 64 * 1024;

/// Progressive file hasher.
///
/// Cheap to construct; hold one per pipeline and share it behind an `Arc`.
/// An optional shutdown flag makes long full-content hashes cancellable at
/// chunk granularity.
#[derive(Debug)]
pub struct Hasher {
    window: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default partial window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: DEFAULT_PARTIAL_WINDOW,
            shutdown_flag: None,
        }
    }

    /// Create a hasher with a custom partial window size.
    #[must_use]
    pub fn with_window(window: usize) -> Self {
        Self {
            window: window.max(1),
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for cooperative cancellation.
    ///
    /// When the flag becomes `true`, an in-flight [`Hasher::full_hash`]
    /// returns [`HashError::Interrupted`] after at most one more chunk read.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The partial-hash window size in bytes.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash the first `window` bytes of a file.
    ///
    /// For files shorter than the window, the whole content is hashed, so
    /// the result equals the full-content hash.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read.
    pub fn partial_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader = file.take(self.window as u64);

        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| HashError::from_io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(*hasher.finalize().as_bytes())
    }

    /// Hash the entire content of a file, streaming in bounded chunks.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read, or
    /// [`HashError::Interrupted`] if cancellation was requested mid-read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;

        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; FULL_HASH_CHUNK];
        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let n = file
                .read(&mut buf)
                .map_err(|e| HashError::from_io(path, e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

/// Render a hash as a lowercase hexadecimal string.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    let mut out = String::with_capacity(64);
    for byte in hash {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}
