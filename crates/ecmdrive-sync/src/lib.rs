//! Change detection and synchronization root management
//!
//! The [`ChangeFinder`] is a stateless query engine over the audit log: given
//! a lower/upper bound and the active synchronization roots of a principal,
//! it returns the relevant change events, capped by the too-many-changes
//! circuit breaker. The [`DriveManager`] orchestrates root registration and
//! resolution (including transitive group fan-out) and produces
//! [`FileSystemChangeSummary`](ecmdrive_core::domain::FileSystemChangeSummary)
//! batches with cursor handoff.

mod finder;
mod manager;

pub use finder::{ChangeFinder, ChangeFinderError};
pub use manager::DriveManager;
