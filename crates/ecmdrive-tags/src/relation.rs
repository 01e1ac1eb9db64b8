//! Legacy relation-graph tag storage
//!
//! One `Tag` document per distinct label, one `Tagging` relation document
//! per applied tag, linking source (the tagged document) to target (the
//! label document). The label is denormalized onto the `Tagging` document
//! so association reads need no join.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use ecmdrive_core::domain::{sanitize_label, DocId, DomainError, PrincipalName, TagAssociation};
use ecmdrive_core::ports::{
    transitive_groups_of_user, DocQuery, Document, IDocumentRepository, IGroupDirectory,
};

use crate::store::{check_untag_allowed, TagStore};

/// Document type of a label document (one per distinct label)
pub const TAG_DOC_TYPE: &str = "Tag";

/// Document type of a relation document (one per applied tag)
pub const TAGGING_DOC_TYPE: &str = "Tagging";

/// Sanitized label, present on both `Tag` and `Tagging` documents
pub const TAG_LABEL_PROPERTY: &str = "tag:label";

/// Id of the tagged document on a `Tagging` document
pub const RELATION_SOURCE_PROPERTY: &str = "relation:source";

/// Id of the `Tag` label document on a `Tagging` document
pub const RELATION_TARGET_PROPERTY: &str = "relation:target";

const CREATOR_PROPERTY: &str = "dc:creator";
const CREATED_PROPERTY: &str = "dc:created";
const TAG_ROOT_PATH: &str = "/tags";
const TAGGING_ROOT_PATH: &str = "/taggings";

/// Tag store over `Tag`/`Tagging` relation documents.
pub struct RelationTagStore {
    repository: Arc<dyn IDocumentRepository>,
    directory: Arc<dyn IGroupDirectory>,
}

impl RelationTagStore {
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

    async fn find_tag_doc(&self, label: &str) -> anyhow::Result<Option<Document>> {
        let query = DocQuery::new()
            .of_type(TAG_DOC_TYPE)
            .property_eq(TAG_LABEL_PROPERTY, label);
        Ok(self.repository.query(&query).await?.into_iter().next())
    }

    async fn taggings_of(&self, doc_id: &DocId) -> anyhow::Result<Vec<Document>> {
        let query = DocQuery::new()
            .of_type(TAGGING_DOC_TYPE)
            .property_eq(RELATION_SOURCE_PROPERTY, doc_id.as_str());
        self.repository.query(&query).await
    }

    /// Creates the `Tagging` (and, if needed, the `Tag` label document)
    /// for one association, unless an identical `(source, label, author)`
    /// tuple already exists. Returns whether anything was created.
    async fn ensure_tagging(
        &self,
        author: &PrincipalName,
        doc_id: &DocId,
        label: &str,
        date: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let existing = self.taggings_of(doc_id).await?;
        let duplicate = existing.iter().any(|t| {
            t.property_str(TAG_LABEL_PROPERTY) == Some(label)
                && t.property_str(CREATOR_PROPERTY) == Some(author.as_str())
        });
        if duplicate {
            return Ok(false);
        }

        let target = self
            .repository
            .get(doc_id)
            .await?
            .with_context(|| format!("Cannot tag missing document {doc_id}"))?;

        let tag_doc = match self.find_tag_doc(label).await? {
            Some(doc) => doc,
            None => {
                let mut doc = Document::new(
                    target.repository_id.clone(),
                    format!("{TAG_ROOT_PATH}/{label}"),
                    TAG_DOC_TYPE,
                    false,
                );
                doc.set_property(TAG_LABEL_PROPERTY, label);
                self.repository.create(author, doc).await?
            }
        };

        let mut tagging = Document::new(
            target.repository_id,
            format!("{TAGGING_ROOT_PATH}/{}", DocId::generate()),
            TAGGING_DOC_TYPE,
            false,
        );
        tagging.set_property(TAG_LABEL_PROPERTY, label);
        tagging.set_property(RELATION_SOURCE_PROPERTY, doc_id.as_str());
        tagging.set_property(RELATION_TARGET_PROPERTY, tag_doc.id.as_str());
        tagging.set_property(CREATOR_PROPERTY, author.as_str());
        tagging.set_property(CREATED_PROPERTY, date.to_rfc3339());
        self.repository.create(author, tagging).await?;
        debug!(doc_id = %doc_id, label, author = %author, "Created tagging relation");
        Ok(true)
    }
}

#[async_trait::async_trait]
impl TagStore for RelationTagStore {
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
        self.ensure_tagging(principal, doc_id, &label, Utc::now())
            .await?;
        Ok(())
    }

    async fn untag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: Option<&str>,
    ) -> anyhow::Result<()> {
        let filter = label.map(sanitize_label);
        let groups: Vec<String> = transitive_groups_of_user(&self.directory, principal)
            .await?
            .into_iter()
            .collect();
        for tagging in self.taggings_of(doc_id).await? {
            let Some(association) = association_of(&tagging) else {
                continue;
            };
            if let Some(ref wanted) = filter {
                if association.label != *wanted {
                    continue;
                }
            }
            check_untag_allowed(&self.repository, principal, &groups, &association).await?;
            self.repository.delete(principal, &tagging.id).await?;
        }
        Ok(())
    }

    async fn get_tags(&self, doc_id: &DocId) -> anyhow::Result<BTreeSet<String>> {
        let mut labels = BTreeSet::new();
        for tagging in self.taggings_of(doc_id).await? {
            if let Some(label) = tagging.property_str(TAG_LABEL_PROPERTY) {
                labels.insert(label.to_string());
            }
        }
        Ok(labels)
    }

    async fn get_tag_document_ids(&self, label: &str) -> anyhow::Result<Vec<DocId>> {
        let label = sanitize_label(label);
        let query = DocQuery::new()
            .of_type(TAGGING_DOC_TYPE)
            .property_eq(TAG_LABEL_PROPERTY, label);
        let mut ids = BTreeSet::new();
        for tagging in self.repository.query(&query).await? {
            if let Some(source) = tagging.property_str(RELATION_SOURCE_PROPERTY) {
                ids.insert(DocId::try_from(source.to_string())?);
            }
        }
        Ok(ids.into_iter().collect())
    }

    async fn get_suggestions(&self, prefix: &str) -> anyhow::Result<BTreeSet<String>> {
        let prefix = sanitize_label(prefix);
        let query = DocQuery::new().of_type(TAG_DOC_TYPE);
        let mut labels = BTreeSet::new();
        for tag_doc in self.repository.query(&query).await? {
            if let Some(label) = tag_doc.property_str(TAG_LABEL_PROPERTY) {
                if label.starts_with(&prefix) {
                    labels.insert(label.to_string());
                }
            }
        }
        Ok(labels)
    }

    async fn copy_tags(
        &self,
        _principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()> {
        for tagging in self.taggings_of(src).await? {
            let Some(association) = association_of(&tagging) else {
                continue;
            };
            // the copy keeps the original author and date
            let author = PrincipalName::try_from(association.username.clone())?;
            self.ensure_tagging(&author, dst, &association.label, association.creation_date)
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
        for tagging in self.taggings_of(doc_id).await? {
            self.repository.delete(principal, &tagging.id).await?;
        }
        Ok(())
    }
}

/// Reads one `Tagging` document back into a [`TagAssociation`]; documents
/// missing a field are skipped with a warning rather than failing the
/// whole read.
pub(crate) fn association_of(tagging: &Document) -> Option<TagAssociation> {
    let source = tagging.property_str(RELATION_SOURCE_PROPERTY)?;
    let label = tagging.property_str(TAG_LABEL_PROPERTY)?;
    let username = tagging.property_str(CREATOR_PROPERTY)?;
    let Ok(doc_id) = DocId::try_from(source.to_string()) else {
        warn!(tagging = %tagging.id, "Tagging document with malformed source id");
        return None;
    };
    let creation_date = tagging
        .property_str(CREATED_PROPERTY)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Some(TagAssociation {
        doc_id,
        label: label.to_string(),
        username: username.to_string(),
        creation_date,
    })
}
