//! Migration context port
//!
//! Long-running migrations report progress to a caller-supplied sink and
//! honor cooperative cancellation checked between batches, never mid-batch.
//! The rendered progress line follows the literal contract
//! `"<Message>: <num>/<total>"`, opening with `"Initializing: 0/-1"` and
//! closing with `"Done: <N>/<N>"`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Context handed to a running migration.
pub trait MigrationContext: Send + Sync {
    /// True once a graceful shutdown was requested; the migration must end
    /// the current phase after the in-flight batch and return cleanly
    fn is_shutdown_requested(&self) -> bool;

    /// Reports progress; `total` is `-1` while unknown
    fn report_progress(&self, message: &str, num: i64, total: i64);
}

/// Renders the canonical progress line.
pub fn format_progress(message: &str, num: i64, total: i64) -> String {
    format!("{message}: {num}/{total}")
}

/// Cooperative cancellation flag usable as a `MigrationContext` building
/// block; progress goes to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Creates a flag in the not-requested state
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a graceful shutdown
    pub fn request_shutdown(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether shutdown was requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
