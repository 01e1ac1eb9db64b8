//! Audit-log change finder
//!
//! Stateless query engine: given a `(lower, upper]` audit id window and the
//! active synchronization roots per principal, returns the relevant change
//! events. No deduplication by `(doc_id, event_name)` happens here: two
//! `documentModified` events for the same document in one window yield two
//! entries, and the client-facing layer decides whether to collapse them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use ecmdrive_core::domain::{
    event_names, extended_info_keys, AuditEvent, FileSystemItem, FileSystemItemChange,
    FileSystemItemId, PrincipalName, RepositoryId, SyncRootDefinition,
};
use ecmdrive_core::ports::{
    affected_users_of_group, transitive_groups_of_user, AuditQuery, DocQuery, IAuditLog,
    IDocumentRepository, IGroupDirectory, Permission,
};

/// Factory name used in serialized file system item ids
pub const FS_ITEM_FACTORY: &str = "defaultFileSystemItemFactory";

/// Failures of a change query.
#[derive(Debug, Error)]
pub enum ChangeFinderError {
    /// The window matched more rows than the configured limit. A partial,
    /// truncated list would be worse than none: the caller returns an empty
    /// batch with the too-many-changes flag instead.
    #[error("Too many changes found in the audit log (more than {limit})")]
    TooManyChanges {
        /// The limit in force for this query
        limit: u32,
    },

    /// Repository or audit layer failure; propagated uncaught, retries are
    /// the client's responsibility (queries are idempotent)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stateless audit-log query engine.
pub struct ChangeFinder {
    audit: Arc<dyn IAuditLog>,
    repository: Arc<dyn IDocumentRepository>,
    directory: Arc<dyn IGroupDirectory>,
}

impl ChangeFinder {
    /// Creates a finder over the given collaborators
    pub fn new(
        audit: Arc<dyn IAuditLog>,
        repository: Arc<dyn IDocumentRepository>,
        directory: Arc<dyn IGroupDirectory>,
    ) -> Self {
        Self {
            audit,
            repository,
            directory,
        }
    }

    /// Latest committed-and-visible audit id across all repositories
    pub async fn get_upper_bound(&self) -> anyhow::Result<u64> {
        self.audit.upper_bound(None).await
    }

    /// Latest committed-and-visible audit id across the given repositories.
    ///
    /// Must agree with [`Self::get_upper_bound`] when called with the full
    /// set of known repositories.
    pub async fn get_upper_bound_for(
        &self,
        repository_ids: &[RepositoryId],
    ) -> anyhow::Result<u64> {
        self.audit.upper_bound(Some(repository_ids)).await
    }

    /// Returns the changes relevant to `principal` in `(lower, upper]`.
    ///
    /// A change is included when the event's document is one of the
    /// principal's active roots, a descendant of one, a root registration
    /// event for the principal, or a virtual deletion impacting the
    /// principal. Security updates additionally fan out: an ACL change on an
    /// ancestor surfaces for every root underneath it, and group-membership
    /// changes surface (via transitive, cycle-safe group resolution) for
    /// every root of every affected principal.
    pub async fn get_changes(
        &self,
        principal: &PrincipalName,
        active_roots: &BTreeMap<PrincipalName, BTreeSet<SyncRootDefinition>>,
        lower_bound: u64,
        upper_bound: u64,
        limit: u32,
    ) -> Result<Vec<FileSystemItemChange>, ChangeFinderError> {
        let roots = active_roots.get(principal).cloned().unwrap_or_default();
        let groups = transitive_groups_of_user(&self.directory, principal).await?;
        let group_list: Vec<String> = groups.iter().cloned().collect();

        // resolve root paths; a root whose document vanished scopes nothing
        let mut root_paths: Vec<(SyncRootDefinition, String)> = Vec::new();
        for root in &roots {
            if let Some(doc) = self.repository.get(&root.doc_id).await? {
                root_paths.push((root.clone(), doc.path));
            }
        }

        let range = || AuditQuery::new().in_range(lower_bound, upper_bound);

        // events at or under an active root
        let mut events: BTreeMap<u64, AuditEvent> = BTreeMap::new();
        if !root_paths.is_empty() {
            let scoped = range().under_paths(root_paths.iter().map(|(_, p)| p.clone()).collect());
            for event in self.audit.events(&scoped).await? {
                events.insert(event.id, event);
            }
        }

        // root registrations and virtual deletions addressed to the principal
        let impacting = range().impacting(principal.clone());
        for event in self.audit.events(&impacting).await? {
            events.insert(event.id, event);
        }

        // security updates on ancestors of a root are not caught by the
        // descendant scoping above; fan them out to the roots they cover
        let mut synthesized: Vec<(u64, FileSystemItemChange)> = Vec::new();
        let security = range().with_event_names([event_names::SECURITY_UPDATED]);
        for event in self.audit.events(&security).await? {
            if events.contains_key(&event.id) {
                continue;
            }
            for (root, path) in &root_paths {
                let covers =
                    *path == event.doc_path || path.starts_with(&format!("{}/", event.doc_path));
                if covers {
                    let change = self
                        .build_change(
                            principal,
                            &group_list,
                            root.doc_id.clone(),
                            event_names::SECURITY_UPDATED,
                            root.repository_id.clone(),
                            event.event_date,
                        )
                        .await?;
                    synthesized.push((event.id, change));
                }
            }
        }

        // group membership changes: resolve the transitive closure of
        // affected users; if the principal is among them, every one of
        // their roots needs a security re-check on the client
        let group_updates = range().with_event_names([event_names::GROUP_UPDATED]);
        for event in self.audit.events(&group_updates).await? {
            let Some(group) = event.extended_str(extended_info_keys::GROUP_NAME) else {
                continue;
            };
            let affected = affected_users_of_group(&self.directory, group).await?;
            if !affected.contains(principal) {
                continue;
            }
            for (root, _) in &root_paths {
                let change = self
                    .build_change(
                        principal,
                        &group_list,
                        root.doc_id.clone(),
                        event_names::SECURITY_UPDATED,
                        root.repository_id.clone(),
                        event.event_date,
                    )
                    .await?;
                synthesized.push((event.id, change));
            }
        }

        let total = events.len() + synthesized.len();
        if total as u64 > limit as u64 {
            debug!(total, limit, "Too many changes in window");
            return Err(ChangeFinderError::TooManyChanges { limit });
        }

        let mut changes: Vec<(u64, FileSystemItemChange)> = Vec::with_capacity(total);
        for (id, event) in events {
            let change = self
                .build_change(
                    principal,
                    &group_list,
                    event.doc_id.clone(),
                    effective_event_name(&event),
                    event.repository_id.clone(),
                    event.event_date,
                )
                .await?;
            changes.push((id, change));
        }
        changes.extend(synthesized);
        changes.sort_by_key(|(id, _)| *id);
        Ok(changes.into_iter().map(|(_, change)| change).collect())
    }

    /// Builds one change, resolving the file system item best-effort: a
    /// target that is gone, trashed or no longer readable still surfaces,
    /// with `fs_item == None`, rather than being silently dropped.
    async fn build_change(
        &self,
        principal: &PrincipalName,
        groups: &[String],
        doc_id: ecmdrive_core::domain::DocId,
        event_name: &str,
        repository_id: RepositoryId,
        event_date: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<FileSystemItemChange> {
        let fs_item_id =
            FileSystemItemId::new(FS_ITEM_FACTORY, repository_id.clone(), doc_id.clone());
        let mut change =
            FileSystemItemChange::new(doc_id.clone(), event_name, repository_id, event_date);
        change.fs_item_id = Some(fs_item_id.to_string());

        // a deletion never resolves to a live item, whatever the document
        // looks like now (restores surface as separate events)
        if event_name == event_names::DELETED {
            return Ok(change);
        }

        let Some(doc) = self.repository.get(&doc_id).await? else {
            return Ok(change);
        };
        if doc.trashed {
            change.life_cycle_state = Some(doc.life_cycle_state);
            return Ok(change);
        }
        let readable = self
            .repository
            .has_permission(principal, groups, &doc_id, Permission::Read)
            .await?;
        if !readable {
            return Ok(change);
        }

        let parent_id = self.parent_item_id(&doc).await?;
        change = change.with_life_cycle_state(doc.life_cycle_state.clone());
        Ok(change.with_fs_item(FileSystemItem {
            id: fs_item_id,
            name: doc.name,
            folderish: doc.folderish,
            parent_id,
        }))
    }

    async fn parent_item_id(
        &self,
        doc: &ecmdrive_core::ports::Document,
    ) -> anyhow::Result<Option<FileSystemItemId>> {
        let Some(pos) = doc.path.rfind('/') else {
            return Ok(None);
        };
        let parent_path = &doc.path[..pos];
        if parent_path.is_empty() {
            return Ok(None);
        }
        let candidates = self
            .repository
            .query(&DocQuery::new().under_path(parent_path))
            .await?;
        Ok(candidates
            .into_iter()
            .find(|d| d.path == parent_path)
            .map(|d| FileSystemItemId::new(FS_ITEM_FACTORY, d.repository_id, d.id)))
    }
}

/// Maps raw audit event names to client-facing change event names: a trash
/// lifecycle transition reads as a deletion, everything else passes through.
fn effective_event_name(event: &AuditEvent) -> &str {
    if event.event_name == event_names::LIFECYCLE_TRANSITION
        && event.extended_str(extended_info_keys::TRANSITION) == Some("delete")
    {
        return event_names::DELETED;
    }
    &event.event_name
}
