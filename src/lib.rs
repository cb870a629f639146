//! dupescan - duplicate file detection engine
//!
//! A multi-stage pipeline that locates byte-identical files across a
//! directory tree without reading every byte of every file: size
//! classification first, then a prefix-window hash, then a streamed full
//! BLAKE3 hash over the survivors. The [`engine`] module exposes the
//! non-blocking scan API; [`duplicates`] holds the blocking pipeline core.

pub mod cli;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;
