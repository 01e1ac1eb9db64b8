//! Change summary entities
//!
//! A change summary is a bounded batch of changes plus a new cursor (upper
//! bound) and an active-root snapshot. It is created fresh per query and
//! never mutated after construction; the `upper_bound` becomes the next
//! query's lower bound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{DocId, FileSystemItemId, RepositoryId};

/// Adapter view of a document exposing filesystem-like semantics to sync
/// clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemItem {
    /// Composite item id (`factory#repository#docId`)
    #[serde(with = "fs_item_id_string")]
    pub id: FileSystemItemId,
    /// Display name
    pub name: String,
    /// Whether the item can have children
    pub folderish: bool,
    /// Parent item id, `None` for top-level roots
    #[serde(with = "fs_item_id_opt_string")]
    pub parent_id: Option<FileSystemItemId>,
}

mod fs_item_id_string {
    use super::FileSystemItemId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &FileSystemItemId, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<FileSystemItemId, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

mod fs_item_id_opt_string {
    use super::FileSystemItemId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        id: &Option<FileSystemItemId>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => s.serialize_some(&id.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<FileSystemItemId>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        raw.map(|r| r.parse().map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// A single relevant change for a synchronizing principal.
///
/// Identity for deduplication purposes (when callers choose to deduplicate)
/// is `(doc_id, event_name)`. The `fs_item*` fields are best-effort: `None`
/// when the change target is no longer resolvable or visible to the
/// requesting principal, e.g. after a security downgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystemItemChange {
    /// Target document id
    pub doc_id: DocId,
    /// Audit event name (e.g. `documentCreated`, `deleted`)
    pub event_name: String,
    /// Repository the change belongs to
    pub repository_id: RepositoryId,
    /// When the underlying event occurred
    pub event_date: DateTime<Utc>,
    /// Life cycle state of the target at query time, when resolvable
    pub life_cycle_state: Option<String>,
    /// Serialized file system item id, when resolvable
    pub fs_item_id: Option<String>,
    /// File system item name, when resolvable
    pub fs_item_name: Option<String>,
    /// Full item adapter, when resolvable and visible
    pub fs_item: Option<FileSystemItem>,
}

impl FileSystemItemChange {
    /// Builds a change with no resolved file system item
    pub fn new(
        doc_id: DocId,
        event_name: impl Into<String>,
        repository_id: RepositoryId,
        event_date: DateTime<Utc>,
    ) -> Self {
        Self {
            doc_id,
            event_name: event_name.into(),
            repository_id,
            event_date,
            life_cycle_state: None,
            fs_item_id: None,
            fs_item_name: None,
            fs_item: None,
        }
    }

    /// Attaches a resolved file system item
    pub fn with_fs_item(mut self, item: FileSystemItem) -> Self {
        self.fs_item_id = Some(item.id.to_string());
        self.fs_item_name = Some(item.name.clone());
        self.fs_item = Some(item);
        self
    }

    /// Sets the life cycle state
    pub fn with_life_cycle_state(mut self, state: impl Into<String>) -> Self {
        self.life_cycle_state = Some(state.into());
        self
    }
}

/// A bounded batch of changes plus the next cursor.
///
/// When `has_too_many_changes` is true, `changes` is empty by construction:
/// a partial, truncated list would be worse than none because the client
/// could not safely advance its cursor. The client must do a full resync
/// and restart from `upper_bound`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSystemChangeSummary {
    /// Relevant changes, ordered by audit id
    pub changes: Vec<FileSystemItemChange>,
    /// The next query's lower bound
    pub upper_bound: u64,
    /// Serialized active synchronization roots for the caller to persist
    pub active_root_definitions: String,
    /// Circuit breaker flag: discard this batch and do a full resync
    pub has_too_many_changes: bool,
}

impl FileSystemChangeSummary {
    /// A summary carrying changes
    pub fn new(
        changes: Vec<FileSystemItemChange>,
        upper_bound: u64,
        active_root_definitions: String,
    ) -> Self {
        Self {
            changes,
            upper_bound,
            active_root_definitions,
            has_too_many_changes: false,
        }
    }

    /// An empty summary (no roots, or nothing happened)
    pub fn empty(upper_bound: u64, active_root_definitions: String) -> Self {
        Self::new(Vec::new(), upper_bound, active_root_definitions)
    }

    /// The circuit-breaker summary: empty change list, flag raised
    pub fn too_many_changes(upper_bound: u64, active_root_definitions: String) -> Self {
        Self {
            changes: Vec::new(),
            upper_bound,
            active_root_definitions,
            has_too_many_changes: true,
        }
    }
}
