//! Port definitions (hexagonal architecture)
//!
//! Traits implemented by adapter crates: the audit log, the document
//! repository collaborator, the group directory, and the migration
//! context consumed by long-running migrations.

pub mod audit_log;
pub mod directory;
pub mod migration;
pub mod repository;

pub use audit_log::{AuditQuery, IAuditLog};
pub use directory::{
    affected_users_of_group, transitive_groups_of_user, GroupMembers, IGroupDirectory,
};
pub use migration::{format_progress, MigrationContext, ShutdownFlag};
pub use repository::{DocQuery, Document, IDocumentRepository, Permission, SaveFlags};
