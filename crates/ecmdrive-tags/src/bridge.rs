//! Migration-window bridge store
//!
//! While the relations-to-facets migration runs, writes fan out to both
//! backends so neither falls behind live traffic, and reads keep hitting
//! the legacy store, which stays complete until the migration deletes it.

use std::collections::BTreeSet;
use std::sync::Arc;

use ecmdrive_core::domain::{DocId, PrincipalName};

use crate::facet::FacetedTagStore;
use crate::relation::RelationTagStore;
use crate::store::TagStore;

/// Tag store active during the migration window.
pub struct BridgeTagStore {
    legacy: Arc<RelationTagStore>,
    facet: Arc<FacetedTagStore>,
}

impl BridgeTagStore {
    /// Creates a bridge over the two backends
    pub fn new(legacy: Arc<RelationTagStore>, facet: Arc<FacetedTagStore>) -> Self {
        Self { legacy, facet }
    }
}

#[async_trait::async_trait]
impl TagStore for BridgeTagStore {
    async fn tag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: &str,
    ) -> anyhow::Result<()> {
        self.legacy.tag(principal, doc_id, label).await?;
        self.facet.tag(principal, doc_id, label).await
    }

    async fn untag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: Option<&str>,
    ) -> anyhow::Result<()> {
        // the legacy store holds the authoritative instances, so its
        // permission verdict comes first; the facet side then only sees
        // entries the principal was already allowed to remove
        self.legacy.untag(principal, doc_id, label).await?;
        self.facet.untag(principal, doc_id, label).await
    }

    async fn get_tags(&self, doc_id: &DocId) -> anyhow::Result<BTreeSet<String>> {
        self.legacy.get_tags(doc_id).await
    }

    async fn get_tag_document_ids(&self, label: &str) -> anyhow::Result<Vec<DocId>> {
        self.legacy.get_tag_document_ids(label).await
    }

    async fn get_suggestions(&self, prefix: &str) -> anyhow::Result<BTreeSet<String>> {
        self.legacy.get_suggestions(prefix).await
    }

    async fn copy_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()> {
        self.legacy.copy_tags(principal, src, dst).await?;
        self.facet.copy_tags(principal, src, dst).await
    }

    async fn replace_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()> {
        self.legacy.replace_tags(principal, src, dst).await?;
        self.facet.replace_tags(principal, src, dst).await
    }

    async fn remove_tags(&self, principal: &PrincipalName, doc_id: &DocId) -> anyhow::Result<()> {
        self.legacy.remove_tags(principal, doc_id).await?;
        self.facet.remove_tags(principal, doc_id).await
    }
}
