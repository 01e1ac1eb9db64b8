//! Audit log port (driven/secondary port)
//!
//! The audit log is an external collaborator: an append-only,
//! monotonically-increasing-id store of domain events, queryable by id
//! range and scope predicates. Uses `anyhow::Result` because storage errors
//! are adapter-specific and don't need domain-level classification.

use serde_json::Value;

use crate::domain::{AuditEvent, DocId, PrincipalName, RepositoryId};

/// Conjunctive predicate filter for audit queries.
///
/// All fields are optional; when unset, no filtering is applied for that
/// field. Multiple predicates combine with AND logic; callers needing OR
/// semantics (e.g. "doc in roots OR path under a root") issue several
/// queries and merge by id.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Exclusive lower id bound
    pub id_gt: Option<u64>,
    /// Inclusive upper id bound
    pub id_lte: Option<u64>,
    /// Restrict to one repository
    pub repository_id: Option<RepositoryId>,
    /// Restrict to these event names
    pub event_names: Option<Vec<String>>,
    /// Restrict to events targeting one of these documents
    pub doc_ids: Option<Vec<DocId>>,
    /// Restrict to events whose document path equals one of these paths or
    /// lies underneath it
    pub under_paths: Option<Vec<String>>,
    /// Restrict to events carrying this `impactedUserName` extended info
    pub impacted_principal: Option<PrincipalName>,
}

impl AuditQuery {
    /// Creates an empty filter (matches all events)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exclusive lower and inclusive upper id bounds
    pub fn in_range(mut self, lower_exclusive: u64, upper_inclusive: u64) -> Self {
        self.id_gt = Some(lower_exclusive);
        self.id_lte = Some(upper_inclusive);
        self
    }

    /// Restricts to one repository
    pub fn in_repository(mut self, repository_id: RepositoryId) -> Self {
        self.repository_id = Some(repository_id);
        self
    }

    /// Restricts to the given event names
    pub fn with_event_names<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        names: I,
    ) -> Self {
        self.event_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts to events targeting the given documents
    pub fn with_doc_ids(mut self, doc_ids: Vec<DocId>) -> Self {
        self.doc_ids = Some(doc_ids);
        self
    }

    /// Restricts to events at or under the given paths
    pub fn under_paths(mut self, paths: Vec<String>) -> Self {
        self.under_paths = Some(paths);
        self
    }

    /// Restricts to events impacting the given principal
    pub fn impacting(mut self, principal: PrincipalName) -> Self {
        self.impacted_principal = Some(principal);
        self
    }

    /// Evaluates this filter against one event.
    ///
    /// Lives on the query so every adapter applies identical predicate
    /// semantics (path scoping in particular: equal or strictly under).
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(lower) = self.id_gt {
            if event.id <= lower {
                return false;
            }
        }
        if let Some(upper) = self.id_lte {
            if event.id > upper {
                return false;
            }
        }
        if let Some(ref repo) = self.repository_id {
            if event.repository_id != *repo {
                return false;
            }
        }
        if let Some(ref names) = self.event_names {
            if !names.iter().any(|n| *n == event.event_name) {
                return false;
            }
        }
        if let Some(ref doc_ids) = self.doc_ids {
            if !doc_ids.contains(&event.doc_id) {
                return false;
            }
        }
        if let Some(ref paths) = self.under_paths {
            let under = paths.iter().any(|p| {
                event.doc_path == *p || event.doc_path.starts_with(&format!("{p}/"))
            });
            if !under {
                return false;
            }
        }
        if let Some(ref principal) = self.impacted_principal {
            let impacted = event
                .extended_info
                .get(crate::domain::extended_info_keys::IMPACTED_USER)
                .and_then(Value::as_str);
            if impacted != Some(principal.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Port trait for the append-only audit event log.
#[async_trait::async_trait]
pub trait IAuditLog: Send + Sync {
    /// Appends an event and returns its assigned monotonic id.
    async fn append(&self, event: AuditEvent) -> anyhow::Result<u64>;

    /// Returns matching events ordered by ascending id.
    async fn events(&self, query: &AuditQuery) -> anyhow::Result<Vec<AuditEvent>>;

    /// Latest committed-and-visible event id.
    ///
    /// `repository_ids = None` means all known repositories; passing the
    /// full set of known repositories must return the same bound as `None`.
    /// When a clustering delay is configured, events younger than the delay
    /// are not yet visible and do not move the bound.
    async fn upper_bound(&self, repository_ids: Option<&[RepositoryId]>) -> anyhow::Result<u64>;
}
