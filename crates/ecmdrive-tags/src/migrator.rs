//! Relations-to-facets tag migration
//!
//! Three ordered phases, each batched and independently reported: create
//! the facet entry for every distinct `(document, label, author)` relation
//! tuple, delete the `Tagging` documents, delete the `Tag` label documents.
//! Shutdown is checked between batches, never mid-batch, and per-tuple
//! creation is idempotent, so an interrupted run leaves data the next run
//! probes and resumes from safely.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use ecmdrive_core::domain::{DocId, MigrationState, MigrationStatus, PrincipalName};
use ecmdrive_core::ports::{
    DocQuery, Document, IDocumentRepository, IGroupDirectory, MigrationContext,
};

use crate::facet::FacetedTagStore;
use crate::relation::{association_of, TAGGING_DOC_TYPE, TAG_DOC_TYPE};
use crate::service::MigrationStatusHandle;

/// Documents processed between two progress reports and shutdown checks
pub const MIGRATION_BATCH_SIZE: usize = 50;

const SYSTEM_PRINCIPAL: &str = "Administrator";

const MSG_INITIALIZING: &str = "Initializing";
const MSG_CREATING: &str = "Creating new tags";
const MSG_DELETING_TAGGINGS: &str = "Deleting Tagging documents";
const MSG_DELETING_TAGS: &str = "Deleting Tag documents";
const MSG_DONE: &str = "Done";

/// Converts all relation-based tags to facet-based tags.
pub struct TagsMigrator {
    repository: Arc<dyn IDocumentRepository>,
    facet: Arc<FacetedTagStore>,
    status: MigrationStatusHandle,
}

impl TagsMigrator {
    /// Creates a migrator over the given repository, flipping the shared
    /// status while it runs
    pub fn new(
        repository: Arc<dyn IDocumentRepository>,
        directory: Arc<dyn IGroupDirectory>,
        status: MigrationStatusHandle,
    ) -> Self {
        let facet = Arc::new(FacetedTagStore::new(repository.clone(), directory));
        Self {
            repository,
            facet,
            status,
        }
    }

    /// Derives the migration state from live data, without side effects.
    ///
    /// Any remaining `Tagging` document means `Relations`, even when facet
    /// tags also exist: mixed data is a partial migration, and treating it
    /// as unmigrated is what makes interrupted runs resumable.
    pub async fn probe_state(&self) -> anyhow::Result<MigrationState> {
        let query = DocQuery::new().of_type(TAGGING_DOC_TYPE).include_trashed();
        let taggings = self.repository.query(&query).await?;
        Ok(if taggings.is_empty() {
            MigrationState::Facets
        } else {
            MigrationState::Relations
        })
    }

    /// Runs the migration to completion, or until shutdown is requested.
    ///
    /// Progress lines follow the `"<Message>: <num>/<total>"` contract,
    /// opening with `"Initializing: 0/-1"` and, on completion only, closing
    /// with `"Done: <N>/<N>"` where `N` counts the migrated tuples. The
    /// settled status afterwards comes from re-probing the data, so an
    /// interrupted run settles back on `Relations`.
    pub async fn run(&self, ctx: &dyn MigrationContext) -> anyhow::Result<()> {
        ctx.report_progress(MSG_INITIALIZING, 0, -1);
        self.status.set(MigrationStatus::Running);

        let outcome = self.migrate(ctx).await;

        match self.probe_state().await {
            Ok(state) => self.status.set(MigrationStatus::Settled(state)),
            Err(err) => {
                if outcome.is_ok() {
                    return Err(err);
                }
                warn!(error = %err, "Could not re-probe tag migration state");
            }
        }
        outcome
    }

    async fn migrate(&self, ctx: &dyn MigrationContext) -> anyhow::Result<()> {
        let admin = PrincipalName::try_from(SYSTEM_PRINCIPAL.to_string())?;
        let taggings = self.all_taggings().await?;

        // phase 1: facet entries for every distinct (doc, label, author)
        // tuple, keeping the earliest application date
        let mut tuples: BTreeMap<(DocId, String, String), DateTime<Utc>> = BTreeMap::new();
        for tagging in &taggings {
            let Some(association) = association_of(tagging) else {
                continue;
            };
            let key = (association.doc_id, association.label, association.username);
            let date = tuples.entry(key).or_insert(association.creation_date);
            if association.creation_date < *date {
                *date = association.creation_date;
            }
        }
        let tuples: Vec<_> = tuples.into_iter().collect();
        let created_total = tuples.len() as i64;
        let mut created = 0i64;
        for batch in tuples.chunks(MIGRATION_BATCH_SIZE) {
            if ctx.is_shutdown_requested() {
                info!("Tag migration interrupted while creating facet entries");
                return Ok(());
            }
            for ((doc_id, label, username), date) in batch {
                self.facet
                    .ensure_entry(&admin, doc_id, label, username, *date)
                    .await?;
            }
            created += batch.len() as i64;
            ctx.report_progress(MSG_CREATING, created, created_total);
        }
        if tuples.is_empty() {
            if ctx.is_shutdown_requested() {
                return Ok(());
            }
            ctx.report_progress(MSG_CREATING, 0, 0);
        }

        // phase 2: drop the Tagging relation documents
        self.delete_batched(ctx, &admin, taggings, MSG_DELETING_TAGGINGS)
            .await?;
        if ctx.is_shutdown_requested() {
            return Ok(());
        }

        // phase 3: drop the now-orphaned Tag label documents
        let query = DocQuery::new().of_type(TAG_DOC_TYPE).include_trashed();
        let tag_docs = self.repository.query(&query).await?;
        self.delete_batched(ctx, &admin, tag_docs, MSG_DELETING_TAGS)
            .await?;
        if ctx.is_shutdown_requested() {
            return Ok(());
        }

        ctx.report_progress(MSG_DONE, created_total, created_total);
        info!(tuples = created_total, "Tag migration complete");
        Ok(())
    }

    async fn all_taggings(&self) -> anyhow::Result<Vec<Document>> {
        let query = DocQuery::new().of_type(TAGGING_DOC_TYPE).include_trashed();
        self.repository.query(&query).await
    }

    /// Deletes the documents in batches, reporting after each batch and
    /// returning early (without error) once shutdown is requested
    async fn delete_batched(
        &self,
        ctx: &dyn MigrationContext,
        admin: &PrincipalName,
        docs: Vec<Document>,
        message: &str,
    ) -> anyhow::Result<()> {
        let total = docs.len() as i64;
        let mut deleted = 0i64;
        for batch in docs.chunks(MIGRATION_BATCH_SIZE) {
            if ctx.is_shutdown_requested() {
                info!(phase = message, "Tag migration interrupted");
                return Ok(());
            }
            for doc in batch {
                self.repository.delete(admin, &doc.id).await?;
            }
            deleted += batch.len() as i64;
            ctx.report_progress(message, deleted, total);
        }
        if docs.is_empty() && !ctx.is_shutdown_requested() {
            ctx.report_progress(message, 0, 0);
        }
        Ok(())
    }
}
