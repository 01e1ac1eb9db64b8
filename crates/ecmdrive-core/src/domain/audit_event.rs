//! Audit event domain entity
//!
//! The audit log is an append-only store of domain events with monotonically
//! increasing ids; ordering is total via `id`. Events are immutable once
//! written. The change finder only ever reads them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::newtypes::{DocId, PrincipalName, RepositoryId};

/// Event names recorded in the audit log.
///
/// These are wire-level strings: sync clients match on them literally.
pub mod event_names {
    /// A document was created
    pub const DOCUMENT_CREATED: &str = "documentCreated";
    /// A document's content or properties were modified
    pub const DOCUMENT_MODIFIED: &str = "documentModified";
    /// A document was moved to another container
    pub const DOCUMENT_MOVED: &str = "documentMoved";
    /// A document was created as a copy of another
    pub const DOCUMENT_CREATED_BY_COPY: &str = "documentCreatedByCopy";
    /// A document was deleted, or a synchronization root disappeared from
    /// the principal's view (virtual event)
    pub const DELETED: &str = "deleted";
    /// An ACL or group membership change affected the document
    pub const SECURITY_UPDATED: &str = "securityUpdated";
    /// A document became a synchronization root for a principal
    pub const ROOT_REGISTERED: &str = "rootRegistered";
    /// A life cycle transition was followed (e.g. trash)
    pub const LIFECYCLE_TRANSITION: &str = "lifecycle_transition_event";
    /// A group definition changed (members added/removed, group deleted)
    pub const GROUP_UPDATED: &str = "groupUpdated";
}

/// Well-known keys of the `extended_info` map.
pub mod extended_info_keys {
    /// Principal a virtual event is scoped to (root unregistration)
    pub const IMPACTED_USER: &str = "impactedUserName";
    /// Group targeted by a `groupUpdated` event
    pub const GROUP_NAME: &str = "groupName";
    /// Life cycle transition name carried by a lifecycle event
    pub const TRANSITION: &str = "transition";
}

/// An immutable audit log entry.
///
/// `id` is `0` until the event is appended to the log, which assigns the
/// next monotonic id; never rely on the id before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Monotonic id, assigned by the audit log on append
    pub id: u64,
    /// Wire-level event name (see [`event_names`])
    pub event_name: String,
    /// Target document id
    pub doc_id: DocId,
    /// Target document path at the time of the event, used for
    /// descendant-of-root scoping
    pub doc_path: String,
    /// Repository the event belongs to
    pub repository_id: RepositoryId,
    /// Principal that caused the event
    pub principal_name: PrincipalName,
    /// When the event occurred
    pub event_date: DateTime<Utc>,
    /// Additional structured details
    pub extended_info: HashMap<String, Value>,
}

impl AuditEvent {
    /// Creates a new event dated now, with an unassigned id
    pub fn new(
        event_name: impl Into<String>,
        doc_id: DocId,
        doc_path: impl Into<String>,
        repository_id: RepositoryId,
        principal_name: PrincipalName,
    ) -> Self {
        Self {
            id: 0,
            event_name: event_name.into(),
            doc_id,
            doc_path: doc_path.into(),
            repository_id,
            principal_name,
            event_date: Utc::now(),
            extended_info: HashMap::new(),
        }
    }

    /// Adds an extended info entry
    pub fn with_extended(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extended_info.insert(key.into(), value.into());
        self
    }

    /// Returns an extended info entry as a string, if present
    pub fn extended_str(&self, key: &str) -> Option<&str> {
        self.extended_info.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> AuditEvent {
        AuditEvent::new(
            name,
            DocId::try_from("doc-1".to_string()).unwrap(),
            "/root/doc-1",
            RepositoryId::try_from("test".to_string()).unwrap(),
            PrincipalName::try_from("Administrator".to_string()).unwrap(),
        )
    }

    #[test]
    fn test_new_event_has_unassigned_id() {
        let e = event(event_names::DOCUMENT_CREATED);
        assert_eq!(e.id, 0);
        assert_eq!(e.event_name, "documentCreated");
    }

    #[test]
    fn test_extended_info_round_trip() {
        let e = event(event_names::DELETED)
            .with_extended(extended_info_keys::IMPACTED_USER, "joe");
        assert_eq!(e.extended_str(extended_info_keys::IMPACTED_USER), Some("joe"));
        assert_eq!(e.extended_str("missing"), None);
    }

    #[test]
    fn test_serialization_round_trip() {
        let e = event(event_names::SECURITY_UPDATED)
            .with_extended(extended_info_keys::GROUP_NAME, "members");
        let json = serde_json::to_string(&e).unwrap();
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
