//! Facet-based tag storage
//!
//! Tags live inline on the tagged document: the `NXTag` facet plus a
//! `nxtag:tags` list of `{label, username, date}` entries. Every save is a
//! side channel (no version bump, no `dc:lastContributor` change, no
//! `documentModified` audit event), keeping tag mutation out of the
//! document's visible history.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use ecmdrive_core::domain::{sanitize_label, DocId, DomainError, PrincipalName, TagAssociation};
use ecmdrive_core::ports::{
    transitive_groups_of_user, DocQuery, Document, IDocumentRepository, IGroupDirectory,
    SaveFlags,
};

use crate::store::{check_untag_allowed, TagStore};

/// Facet marking a document as carrying inline tags
pub const NXTAG_FACET: &str = "NXTag";

/// List-of-structs property holding the tag entries
pub const TAGS_PROPERTY: &str = "nxtag:tags";

/// Tag store writing tags inline on the tagged documents.
pub struct FacetedTagStore {
    repository: Arc<dyn IDocumentRepository>,
    directory: Arc<dyn IGroupDirectory>,
}

impl FacetedTagStore {
    /// Creates a store over the given repository; the directory resolves
    /// group-held WRITE grants during untag permission checks
    pub fn new(
        repository: Arc<dyn IDocumentRepository>,
        directory: Arc<dyn IGroupDirectory>,
    ) -> Self {
        Self {
            repository,
            directory,
        }
    }

    /// Adds one tag entry unless an identical `(label, username)` entry is
    /// already present; a missing document is skipped. Returns whether
    /// anything was written. Used by `tag` and by the migrator, whose
    /// resumability relies on this being idempotent.
    pub async fn ensure_entry(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: &str,
        username: &str,
        date: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let label = sanitize_label(label);
        let Some(doc) = self.repository.get(doc_id).await? else {
            return Ok(false);
        };
        let mut entries = entries_of(&doc);
        if entries
            .iter()
            .any(|e| e.label == label && e.username == username)
        {
            return Ok(false);
        }
        entries.push(TagAssociation {
            doc_id: doc.id.clone(),
            label,
            username: username.to_string(),
            creation_date: date,
        });
        self.save_entries(principal, doc, entries).await?;
        Ok(true)
    }

    async fn save_entries(
        &self,
        principal: &PrincipalName,
        mut doc: Document,
        entries: Vec<TagAssociation>,
    ) -> anyhow::Result<()> {
        if entries.is_empty() {
            doc.properties.remove(TAGS_PROPERTY);
            doc.facets.remove(NXTAG_FACET);
        } else {
            doc.facets.insert(NXTAG_FACET.to_string());
            doc.set_property(TAGS_PROPERTY, entries_value(&entries));
        }
        self.repository
            .save(principal, &doc, SaveFlags::side_channel())
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TagStore for FacetedTagStore {
    async fn tag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: &str,
    ) -> anyhow::Result<()> {
        let label = sanitize_label(label);
        if label.is_empty() {
            return Err(
                DomainError::ValidationFailed("tag label is empty once sanitized".into()).into(),
            );
        }
        self.repository
            .get(doc_id)
            .await?
            .with_context(|| format!("Cannot tag missing document {doc_id}"))?;
        self.ensure_entry(principal, doc_id, &label, principal.as_str(), Utc::now())
            .await?;
        Ok(())
    }

    async fn untag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: Option<&str>,
    ) -> anyhow::Result<()> {
        let Some(doc) = self.repository.get(doc_id).await? else {
            return Ok(());
        };
        let filter = label.map(sanitize_label);
        let groups: Vec<String> = transitive_groups_of_user(&self.directory, principal)
            .await?
            .into_iter()
            .collect();
        let entries = entries_of(&doc);
        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            let matches = filter.as_ref().map_or(true, |wanted| entry.label == *wanted);
            if matches {
                check_untag_allowed(&self.repository, principal, &groups, &entry).await?;
            } else {
                kept.push(entry);
            }
        }
        self.save_entries(principal, doc, kept).await
    }

    async fn get_tags(&self, doc_id: &DocId) -> anyhow::Result<BTreeSet<String>> {
        let Some(doc) = self.repository.get(doc_id).await? else {
            return Ok(BTreeSet::new());
        };
        Ok(entries_of(&doc).into_iter().map(|e| e.label).collect())
    }

    async fn get_tag_document_ids(&self, label: &str) -> anyhow::Result<Vec<DocId>> {
        let label = sanitize_label(label);
        let query = DocQuery::new().with_facet(NXTAG_FACET);
        let mut ids = BTreeSet::new();
        for doc in self.repository.query(&query).await? {
            if entries_of(&doc).iter().any(|e| e.label == label) {
                ids.insert(doc.id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    async fn get_suggestions(&self, prefix: &str) -> anyhow::Result<BTreeSet<String>> {
        let prefix = sanitize_label(prefix);
        let query = DocQuery::new().with_facet(NXTAG_FACET);
        let mut labels = BTreeSet::new();
        for doc in self.repository.query(&query).await? {
            for entry in entries_of(&doc) {
                if entry.label.starts_with(&prefix) {
                    labels.insert(entry.label);
                }
            }
        }
        Ok(labels)
    }

    async fn copy_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()> {
        let Some(source) = self.repository.get(src).await? else {
            return Ok(());
        };
        for entry in entries_of(&source) {
            self.ensure_entry(principal, dst, &entry.label, &entry.username, entry.creation_date)
                .await?;
        }
        Ok(())
    }

    async fn replace_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()> {
        self.copy_tags(principal, src, dst).await?;
        self.remove_tags(principal, src).await
    }

    async fn remove_tags(&self, principal: &PrincipalName, doc_id: &DocId) -> anyhow::Result<()> {
        let Some(doc) = self.repository.get(doc_id).await? else {
            return Ok(());
        };
        self.save_entries(principal, doc, Vec::new()).await
    }
}

fn entries_of(doc: &Document) -> Vec<TagAssociation> {
    doc.property(TAGS_PROPERTY)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| entry_of(doc, item))
                .collect()
        })
        .unwrap_or_default()
}

fn entry_of(doc: &Document, item: &Value) -> Option<TagAssociation> {
    let label = item.get("label")?.as_str()?;
    let username = item.get("username")?.as_str()?;
    let creation_date = item
        .get("date")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Some(TagAssociation {
        doc_id: doc.id.clone(),
        label: label.to_string(),
        username: username.to_string(),
        creation_date,
    })
}

fn entries_value(entries: &[TagAssociation]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|e| {
                json!({
                    "label": e.label,
                    "username": e.username,
                    "date": e.creation_date.to_rfc3339(),
                })
            })
            .collect(),
    )
}
