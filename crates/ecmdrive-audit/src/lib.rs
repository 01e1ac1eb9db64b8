//! Append-only audit event log
//!
//! Provides [`MemoryAuditLog`], the embedded implementation of the
//! [`IAuditLog`] port: monotonic ids, predicate queries, and a
//! clustering-delay-aware upper bound for write-buffered deployments.

mod log;

pub use log::MemoryAuditLog;
