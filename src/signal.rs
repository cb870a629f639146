//! Signal handling for graceful shutdown.
//!
//! Centralized Ctrl+C handling: an `AtomicBool` flag shared across threads
//! signals when shutdown has been requested. The CLI wires this flag to the
//! running scan's cancellation, so an interrupted scan still reports the
//! groups it finished verifying and the process exits with code 130.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit code for SIGINT (Ctrl+C) interruption, Unix convention 128 + 2.
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Centralized shutdown flag for graceful termination.
///
/// `Send + Sync`; clone it freely, all clones share one flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with shutdown not requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request a shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The underlying shared flag, for handing to worker threads.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Install a Ctrl+C handler that sets the returned handler's flag.
///
/// # Errors
///
/// Returns an error if a signal handler is already installed for this
/// process.
pub fn install_handler() -> Result<ShutdownHandler, ctrlc::Error> {
    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    ctrlc::set_handler(move || {
        if !flag.swap(true, Ordering::SeqCst) {
            eprintln!("\nInterrupted. Cleaning up...");
        }
    })?;

    Ok(handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_starts_clear() {
        let handler = ShutdownHandler::new();
        assert!(!handler.is_shutdown_requested());
    }

    #[test]
    fn test_request_shutdown() {
        let handler = ShutdownHandler::new();
        handler.request_shutdown();
        assert!(handler.is_shutdown_requested());
    }

    #[test]
    fn test_clones_share_flag() {
        let handler = ShutdownHandler::new();
        let clone = handler.clone();

        handler.request_shutdown();
        assert!(clone.is_shutdown_requested());
    }

    #[test]
    fn test_flag_visible_to_workers() {
        let handler = ShutdownHandler::new();
        let flag = handler.get_flag();

        handler.request_shutdown();
        assert!(flag.load(Ordering::SeqCst));
    }
}
