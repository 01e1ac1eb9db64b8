//! ecmdrive Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `AuditEvent`, `FileSystemItemChange`,
//!   `FileSystemChangeSummary`, `SyncRootDefinition`, `TagAssociation`
//! - **Port definitions** - Traits for adapters: `IAuditLog`,
//!   `IDocumentRepository`, `IGroupDirectory`
//! - **Migration contract** - `MigrationState`, `MigrationContext`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external services.
//! Ports define trait interfaces that adapter crates implement. The
//! change-detection and tag crates orchestrate domain entities through the
//! port interfaces.

pub mod cache;
pub mod config;
pub mod domain;
pub mod ports;
