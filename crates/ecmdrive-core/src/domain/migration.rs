//! Tag storage migration vocabulary
//!
//! The migration moves tag data from the legacy relation-graph
//! representation to the document-facet representation. `Relations` →
//! (transient `Running`) → `Facets`; there is no reverse transition.

use serde::{Deserialize, Serialize};

/// Persistent migration state, also derivable by probing live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Legacy relation-graph tag storage is (still) in use
    Relations,
    /// All tags live as document facets; terminal state
    Facets,
}

impl MigrationState {
    /// Stable string form used in logs and persisted status
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationState::Relations => "relations",
            MigrationState::Facets => "facets",
        }
    }
}

/// Runtime status: either settled in a state, or mid-migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// No migration in progress
    Settled(MigrationState),
    /// The relations-to-facets migration is running
    Running,
}

impl MigrationStatus {
    /// Returns true while the migration step executes
    pub fn is_running(&self) -> bool {
        matches!(self, MigrationStatus::Running)
    }
}
