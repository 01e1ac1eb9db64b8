//! Synchronization root registry and change summary builder
//!
//! The [`DriveManager`] resolves each principal's active synchronization
//! roots (including roots subscribed through transitively nested groups),
//! maintains the subscription property on root documents, and builds
//! [`FileSystemChangeSummary`] batches whose `upper_bound` hands the cursor
//! to the next call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info};

use ecmdrive_core::cache::BoundedCache;
use ecmdrive_core::config::{ChangeLimit, DriveConfig};
use ecmdrive_core::domain::{
    event_names, extended_info_keys, format_root_definitions, AuditEvent,
    FileSystemChangeSummary, FileSystemItemChange, DocId, PrincipalName, SyncRootDefinition,
};
use ecmdrive_core::ports::{
    transitive_groups_of_user, AuditQuery, DocQuery, IAuditLog, IDocumentRepository,
    IGroupDirectory, Permission, SaveFlags,
};

use crate::finder::{ChangeFinder, ChangeFinderError};

/// Multi-valued property on a root document listing subscribed principals
pub const SUBSCRIPTIONS_PROPERTY: &str = "drv:subscriptions";

/// Facet marking a document as somebody's synchronization root
pub const SYNC_ROOT_FACET: &str = "DriveSynchronized";

/// Orchestrates root registration/resolution and change summaries.
pub struct DriveManager {
    repository: Arc<dyn IDocumentRepository>,
    directory: Arc<dyn IGroupDirectory>,
    audit: Arc<dyn IAuditLog>,
    finder: ChangeFinder,
    change_limit: ChangeLimit,
    root_cache: BoundedCache<PrincipalName, BTreeSet<SyncRootDefinition>>,
}

impl DriveManager {
    /// Wires a manager over the given collaborators
    pub fn new(
        repository: Arc<dyn IDocumentRepository>,
        directory: Arc<dyn IGroupDirectory>,
        audit: Arc<dyn IAuditLog>,
        config: &DriveConfig,
    ) -> Self {
        let finder = ChangeFinder::new(audit.clone(), repository.clone(), directory.clone());
        Self {
            repository,
            directory,
            audit,
            finder,
            change_limit: config.change_limit_handle(),
            root_cache: BoundedCache::new(config.root_cache_capacity),
        }
    }

    /// The change finder backing this manager
    pub fn finder(&self) -> &ChangeFinder {
        &self.finder
    }

    /// Live handle on the change limit, read at each query
    pub fn change_limit(&self) -> &ChangeLimit {
        &self.change_limit
    }

    /// Marks `doc_id` as a synchronization root for `principal`.
    ///
    /// The subscription save is a side channel (no version bump, no audit
    /// noise); the client-visible trace is the explicit `rootRegistered`
    /// event appended here.
    pub async fn register_synchronization_root(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
    ) -> anyhow::Result<()> {
        let mut doc = self
            .repository
            .get(doc_id)
            .await?
            .with_context(|| format!("Cannot register missing document {doc_id} as root"))?;
        doc.facets.insert(SYNC_ROOT_FACET.to_string());
        doc.add_to_string_list(SUBSCRIPTIONS_PROPERTY, principal.as_str());
        self.repository
            .save(principal, &doc, SaveFlags::side_channel())
            .await?;

        let event = AuditEvent::new(
            event_names::ROOT_REGISTERED,
            doc.id.clone(),
            doc.path.clone(),
            doc.repository_id.clone(),
            principal.clone(),
        )
        .with_extended(extended_info_keys::IMPACTED_USER, principal.as_str());
        self.audit.append(event).await?;

        self.root_cache.invalidate(principal);
        info!(principal = %principal, doc_id = %doc_id, "Registered synchronization root");
        Ok(())
    }

    /// Removes `doc_id` from `principal`'s synchronization roots.
    ///
    /// Appends a virtual `deleted` event scoped to the principal so the
    /// root disappears from the client consistently with ordinary document
    /// lifecycle, even though the document itself is untouched.
    pub async fn unregister_synchronization_root(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
    ) -> anyhow::Result<()> {
        let mut doc = self
            .repository
            .get(doc_id)
            .await?
            .with_context(|| format!("Cannot unregister missing document {doc_id}"))?;
        doc.remove_from_string_list(SUBSCRIPTIONS_PROPERTY, principal.as_str());
        if doc.string_list(SUBSCRIPTIONS_PROPERTY).is_empty() {
            doc.facets.remove(SYNC_ROOT_FACET);
        }
        self.repository
            .save(principal, &doc, SaveFlags::side_channel())
            .await?;

        let event = AuditEvent::new(
            event_names::DELETED,
            doc.id.clone(),
            doc.path.clone(),
            doc.repository_id.clone(),
            principal.clone(),
        )
        .with_extended(extended_info_keys::IMPACTED_USER, principal.as_str());
        self.audit.append(event).await?;

        self.root_cache.invalidate(principal);
        info!(principal = %principal, doc_id = %doc_id, "Unregistered synchronization root");
        Ok(())
    }

    /// Resolves the principal's currently active synchronization roots.
    ///
    /// A root is active when its document exists, is not trashed, carries a
    /// subscription for the principal or one of their (transitively
    /// resolved) groups, and the principal still holds read permission.
    /// Permission-blocked roots drop out silently.
    pub async fn get_synchronization_roots(
        &self,
        principal: &PrincipalName,
    ) -> anyhow::Result<BTreeSet<SyncRootDefinition>> {
        if let Some(cached) = self.root_cache.get(principal) {
            if self.all_roots_live(&cached).await? {
                return Ok(cached);
            }
            self.root_cache.invalidate(principal);
        }

        let groups = transitive_groups_of_user(&self.directory, principal).await?;
        let group_list: Vec<String> = groups.iter().cloned().collect();
        let mut subjects: Vec<String> = vec![principal.as_str().to_string()];
        subjects.extend(group_list.iter().cloned());

        let mut roots = BTreeSet::new();
        for subject in &subjects {
            let query = DocQuery::new().property_contains(SUBSCRIPTIONS_PROPERTY, subject.clone());
            for doc in self.repository.query(&query).await? {
                let readable = self
                    .repository
                    .has_permission(principal, &group_list, &doc.id, Permission::Read)
                    .await?;
                if readable {
                    roots.insert(SyncRootDefinition::new(doc.repository_id, doc.id));
                }
            }
        }

        debug!(principal = %principal, count = roots.len(), "Resolved synchronization roots");
        self.root_cache.insert(principal.clone(), roots.clone());
        Ok(roots)
    }

    /// A trashed or hard-deleted root emits no event addressed to its
    /// subscribers, so a cached resolution is reused only while every root
    /// it lists is still a live document.
    async fn all_roots_live(&self, roots: &BTreeSet<SyncRootDefinition>) -> anyhow::Result<bool> {
        for root in roots {
            match self.repository.get(&root.doc_id).await? {
                Some(doc) if !doc.trashed => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Builds the change summary for one polling cycle.
    ///
    /// `last_active_roots` and `last_event_log_id` are the cursor persisted
    /// by the client from the previous summary. Roots that disappeared
    /// since then are synthesized as deletion changes even when no audit
    /// event exists for them (out-of-band unregistration, permission
    /// revocation, hard deletion). Repository or audit failures propagate
    /// uncaught; queries are idempotent so retrying is the client's call.
    pub async fn get_change_summary(
        &self,
        principal: &PrincipalName,
        last_active_roots: &BTreeSet<SyncRootDefinition>,
        last_event_log_id: u64,
    ) -> anyhow::Result<FileSystemChangeSummary> {
        // a security or group event since the cursor may have changed which
        // roots the principal can read; the cached resolution cannot be
        // trusted across it
        let security_window = AuditQuery::new()
            .in_range(last_event_log_id, u64::MAX)
            .with_event_names([event_names::SECURITY_UPDATED, event_names::GROUP_UPDATED]);
        if !self.audit.events(&security_window).await?.is_empty() {
            self.root_cache.invalidate(principal);
        }

        let active = self.get_synchronization_roots(principal).await?;
        let upper_bound = self.finder.get_upper_bound().await?;
        let active_definitions = format_root_definitions(&active);

        if active.is_empty() && last_active_roots.is_empty() {
            return Ok(FileSystemChangeSummary::empty(upper_bound, active_definitions));
        }

        let mut roots_by_principal = BTreeMap::new();
        roots_by_principal.insert(principal.clone(), active.clone());

        let limit = self.change_limit.get();
        let mut changes = match self
            .finder
            .get_changes(
                principal,
                &roots_by_principal,
                last_event_log_id,
                upper_bound,
                limit,
            )
            .await
        {
            Ok(changes) => changes,
            Err(ChangeFinderError::TooManyChanges { limit }) => {
                // the bound still advances: the client discards this batch,
                // resyncs fully, and resumes from upper_bound
                info!(principal = %principal, limit, "Change window over limit, requesting resync");
                return Ok(FileSystemChangeSummary::too_many_changes(
                    upper_bound,
                    active_definitions,
                ));
            }
            Err(ChangeFinderError::Other(err)) => return Err(err),
        };

        // roots gone from the active set surface as deletions, unless the
        // audit window already produced one for that document
        for missing in last_active_roots.difference(&active) {
            let already_deleted = changes.iter().any(|c| {
                c.doc_id == missing.doc_id && c.event_name == event_names::DELETED
            });
            if !already_deleted {
                changes.push(FileSystemItemChange::new(
                    missing.doc_id.clone(),
                    event_names::DELETED,
                    missing.repository_id.clone(),
                    Utc::now(),
                ));
            }
        }

        Ok(FileSystemChangeSummary::new(
            changes,
            upper_bound,
            active_definitions,
        ))
    }
}
