//! Domain error types
//!
//! Typed failures surfaced to callers: malformed identifiers, malformed
//! synchronization root definitions, and tag authorization denials. The
//! rendered messages are part of the client-facing contract, in particular
//! the untag authorization message which names the user, the tag and the
//! document.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Generic identifier validation failure
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// A file system item id that does not follow the three-part syntax.
    /// Distinguished from "valid id, not found", which resolves to `None`.
    #[error("Invalid file system item id '{0}': expected <factoryName>#<repositoryName>#<docId>")]
    InvalidFileSystemItemId(String),

    /// A synchronization root definition segment that is not `repo:docId`
    #[error("Invalid synchronization root definition: {0}")]
    InvalidRootDefinition(String),

    /// The acting user may not remove this tag instance. The check is
    /// per tag instance (author or WRITE), not per document.
    #[error("User '{username}' is not allowed to remove tag '{label}' on document '{doc_id}'")]
    TagPermissionDenied {
        /// The acting user
        username: String,
        /// The sanitized tag label
        label: String,
        /// The tagged document id
        doc_id: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
