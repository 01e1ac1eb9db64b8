//! Domain entities and value objects
//!
//! Pure business types with no dependency on adapters: audit events, change
//! summaries, synchronization root definitions, tag associations, and the
//! migration state machine vocabulary.

pub mod audit_event;
pub mod change;
pub mod errors;
pub mod migration;
pub mod newtypes;
pub mod roots;
pub mod tags;

pub use audit_event::{event_names, extended_info_keys, AuditEvent};
pub use change::{FileSystemChangeSummary, FileSystemItem, FileSystemItemChange};
pub use errors::DomainError;
pub use migration::{MigrationState, MigrationStatus};
pub use newtypes::{DocId, FileSystemItemId, PrincipalName, RepositoryId};
pub use roots::{format_root_definitions, parse_root_definitions, SyncRootDefinition};
pub use tags::{sanitize_label, TagAssociation};
