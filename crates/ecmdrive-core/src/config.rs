//! Configuration module for ecmdrive.
//!
//! Provides a typed configuration struct that maps to the YAML configuration
//! file, with loading, defaults, and a live handle for the change limit.
//! The change limit is read at query time, not cached, so operators and
//! tests can change it between calls.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the drive server subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Maximum number of audit rows a single change query may return before
    /// the too-many-changes circuit breaker trips.
    pub change_limit: u32,
    /// When the audit log is write-buffered across cluster nodes, events
    /// younger than this delay are not yet visible to change queries.
    pub clustering_delay_ms: Option<u64>,
    /// Capacity of the per-principal synchronization root cache.
    pub root_cache_capacity: usize,
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub log_level: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            change_limit: 1000,
            clustering_delay_ms: None,
            root_cache_capacity: 512,
            log_level: "info".to_string(),
        }
    }
}

impl DriveConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DriveConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`DriveConfig::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Returns a live handle seeded with the configured change limit.
    pub fn change_limit_handle(&self) -> ChangeLimit {
        ChangeLimit::new(self.change_limit)
    }
}

/// Shared, mutable view of the change limit.
///
/// Cloning shares the underlying value; `set` takes effect for the next
/// query (the limit is never snapshotted at construction of a service).
#[derive(Debug, Clone)]
pub struct ChangeLimit(Arc<AtomicU32>);

impl ChangeLimit {
    /// Creates a handle with the given initial limit
    pub fn new(limit: u32) -> Self {
        Self(Arc::new(AtomicU32::new(limit)))
    }

    /// Current limit
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Replaces the limit for subsequent queries
    pub fn set(&self, limit: u32) {
        self.0.store(limit, Ordering::Relaxed);
    }
}

impl Default for ChangeLimit {
    fn default() -> Self {
        Self::new(DriveConfig::default().change_limit)
    }
}
