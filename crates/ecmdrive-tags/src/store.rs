//! Tag store contract
//!
//! Capability-typed strategy trait implemented by both storage backends and
//! the migration bridge. Callers never inspect which backend they hold; the
//! facade selects one per call from the migration status.

use std::collections::BTreeSet;
use std::sync::Arc;

use ecmdrive_core::domain::{DocId, DomainError, PrincipalName, TagAssociation};
use ecmdrive_core::ports::{IDocumentRepository, Permission};

/// Contract honored identically by the relation and facet backends.
///
/// Labels are sanitized on write and on query, so `tag("My Tag")` followed
/// by `get_tag_document_ids("my%tag")` finds the document. `untag` with
/// `None` removes every tag on the document the acting user is allowed to
/// remove; `remove_tags` is the unconditional variant used on document
/// deletion and by `replace_tags`.
#[async_trait::async_trait]
pub trait TagStore: Send + Sync {
    /// Applies a tag to a document, recording the acting user as author.
    /// Idempotent per `(document, label, author)` tuple.
    async fn tag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: &str,
    ) -> anyhow::Result<()>;

    /// Removes one labeled tag (or, with `None`, all tags) from a document.
    ///
    /// The permission check is per tag instance: the acting user must be
    /// the tag's author or hold WRITE on the document, otherwise the call
    /// fails with [`DomainError::TagPermissionDenied`].
    async fn untag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: Option<&str>,
    ) -> anyhow::Result<()>;

    /// Sanitized labels currently applied to the document
    async fn get_tags(&self, doc_id: &DocId) -> anyhow::Result<BTreeSet<String>>;

    /// Documents carrying the given label (sanitized before matching)
    async fn get_tag_document_ids(&self, label: &str) -> anyhow::Result<Vec<DocId>>;

    /// Known labels starting with the given prefix (sanitized before
    /// matching)
    async fn get_suggestions(&self, prefix: &str) -> anyhow::Result<BTreeSet<String>>;

    /// Snapshots the source document's tags onto the destination, keeping
    /// each tag's original author and date. Later changes on the source do
    /// not affect the destination.
    async fn copy_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()>;

    /// Copies the source document's tags onto the destination, then removes
    /// them from the source
    async fn replace_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()>;

    /// Removes every tag from the document, without per-tag permission
    /// checks
    async fn remove_tags(&self, principal: &PrincipalName, doc_id: &DocId) -> anyhow::Result<()>;
}

/// Per-tag-instance removal check: the author may always remove their own
/// tag; anyone else needs WRITE on the document, held directly or through
/// one of the given groups.
pub(crate) async fn check_untag_allowed(
    repository: &Arc<dyn IDocumentRepository>,
    principal: &PrincipalName,
    groups: &[String],
    association: &TagAssociation,
) -> anyhow::Result<()> {
    if association.username == principal.as_str() {
        return Ok(());
    }
    let writable = repository
        .has_permission(principal, groups, &association.doc_id, Permission::Write)
        .await?;
    if writable {
        return Ok(());
    }
    Err(DomainError::TagPermissionDenied {
        username: principal.as_str().to_string(),
        label: association.label.clone(),
        doc_id: association.doc_id.as_str().to_string(),
    }
    .into())
}
