//! In-memory document repository adapter

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use ecmdrive_core::domain::{
    event_names, extended_info_keys, AuditEvent, DocId, PrincipalName,
};
use ecmdrive_core::ports::{
    DocQuery, Document, IAuditLog, IDocumentRepository, Permission, SaveFlags,
};

/// One ACL grant on a document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Grant {
    subject: String,
    permission: Permission,
}

/// Embedded in-memory repository.
///
/// Every mutation emits the corresponding audit event into the injected
/// audit log, the same way the repository server publishes core events.
/// Permission model: a document with no effective grants (own or inherited
/// from path ancestors) is open; once any grant applies, access is limited
/// to the granted subjects. `Administrator` bypasses all checks.
pub struct MemoryRepository {
    docs: DashMap<DocId, Document>,
    acls: DashMap<DocId, Vec<Grant>>,
    audit: Arc<dyn IAuditLog>,
}

impl MemoryRepository {
    /// Creates an empty repository emitting into `audit`
    pub fn new(audit: Arc<dyn IAuditLog>) -> Self {
        Self {
            docs: DashMap::new(),
            acls: DashMap::new(),
            audit,
        }
    }

    async fn emit(
        &self,
        event_name: &str,
        doc: &Document,
        principal: &PrincipalName,
    ) -> anyhow::Result<AuditEvent> {
        let event = AuditEvent::new(
            event_name,
            doc.id.clone(),
            doc.path.clone(),
            doc.repository_id.clone(),
            principal.clone(),
        );
        Ok(event)
    }

    async fn emit_now(
        &self,
        event_name: &str,
        doc: &Document,
        principal: &PrincipalName,
    ) -> anyhow::Result<()> {
        let event = self.emit(event_name, doc, principal).await?;
        self.audit.append(event).await?;
        Ok(())
    }

    fn ancestors_and_self(&self, doc: &Document) -> Vec<DocId> {
        let mut ids = vec![doc.id.clone()];
        let mut path = doc.path.as_str();
        while let Some(pos) = path.rfind('/') {
            path = &path[..pos];
            if path.is_empty() {
                break;
            }
            if let Some(parent) = self
                .docs
                .iter()
                .find(|entry| entry.value().path == path)
            {
                ids.push(parent.key().clone());
            }
        }
        ids
    }

    fn effective_grants(&self, doc: &Document) -> Vec<Grant> {
        self.ancestors_and_self(doc)
            .into_iter()
            .flat_map(|id| {
                self.acls
                    .get(&id)
                    .map(|g| g.value().clone())
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl IDocumentRepository for MemoryRepository {
    async fn get(&self, id: &DocId) -> anyhow::Result<Option<Document>> {
        Ok(self.docs.get(id).map(|entry| entry.value().clone()))
    }

    async fn query(&self, query: &DocQuery) -> anyhow::Result<Vec<Document>> {
        let mut found: Vec<Document> = self
            .docs
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    async fn create(
        &self,
        principal: &PrincipalName,
        mut doc: Document,
    ) -> anyhow::Result<Document> {
        doc.set_property("dc:creator", principal.as_str());
        doc.set_property("dc:lastContributor", principal.as_str());
        debug!(doc_id = %doc.id, path = %doc.path, "Creating document");
        self.docs.insert(doc.id.clone(), doc.clone());
        self.emit_now(event_names::DOCUMENT_CREATED, &doc, principal)
            .await?;
        Ok(doc)
    }

    async fn save(
        &self,
        principal: &PrincipalName,
        doc: &Document,
        flags: SaveFlags,
    ) -> anyhow::Result<Document> {
        let mut stored = self
            .docs
            .get(&doc.id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Document not found: {}", doc.id))?;
        stored.properties = doc.properties.clone();
        stored.facets = doc.facets.clone();
        stored.life_cycle_state = doc.life_cycle_state.clone();
        if !flags.skip_versioning {
            stored.version += 1;
        }
        if !flags.skip_contributor {
            stored.set_property("dc:lastContributor", principal.as_str());
        }
        self.docs.insert(stored.id.clone(), stored.clone());
        if !flags.skip_audit {
            self.emit_now(event_names::DOCUMENT_MODIFIED, &stored, principal)
                .await?;
        }
        Ok(stored)
    }

    async fn delete(&self, principal: &PrincipalName, id: &DocId) -> anyhow::Result<()> {
        let (_, doc) = self
            .docs
            .remove(id)
            .ok_or_else(|| anyhow::anyhow!("Document not found: {id}"))?;
        self.acls.remove(id);
        self.emit_now(event_names::DELETED, &doc, principal).await?;
        Ok(())
    }

    async fn trash(&self, principal: &PrincipalName, id: &DocId) -> anyhow::Result<()> {
        let mut doc = self
            .docs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Document not found: {id}"))?;
        doc.trashed = true;
        doc.life_cycle_state = "deleted".to_string();
        self.docs.insert(doc.id.clone(), doc.clone());
        let event = self
            .emit(event_names::LIFECYCLE_TRANSITION, &doc, principal)
            .await?
            .with_extended(extended_info_keys::TRANSITION, "delete");
        self.audit.append(event).await?;
        Ok(())
    }

    async fn copy(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        new_path: &str,
    ) -> anyhow::Result<Document> {
        let source = self
            .docs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Document not found: {id}"))?;
        let mut copy = source.clone();
        copy.id = DocId::generate();
        copy.path = new_path.to_string();
        copy.name = new_path.rsplit('/').next().unwrap_or_default().to_string();
        copy.version = 0;
        self.docs.insert(copy.id.clone(), copy.clone());
        if let Some(grants) = self.acls.get(id).map(|g| g.value().clone()) {
            self.acls.insert(copy.id.clone(), grants);
        }
        self.emit_now(event_names::DOCUMENT_CREATED_BY_COPY, &copy, principal)
            .await?;
        Ok(copy)
    }

    async fn move_to(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        new_path: &str,
    ) -> anyhow::Result<Document> {
        let mut doc = self
            .docs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Document not found: {id}"))?;
        let old_path = doc.path.clone();
        doc.path = new_path.to_string();
        doc.name = new_path.rsplit('/').next().unwrap_or_default().to_string();
        self.docs.insert(doc.id.clone(), doc.clone());

        // keep the subtree consistent
        let old_prefix = format!("{old_path}/");
        let descendants: Vec<DocId> = self
            .docs
            .iter()
            .filter(|entry| entry.value().path.starts_with(&old_prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for child_id in descendants {
            if let Some(mut child) = self.docs.get_mut(&child_id) {
                let suffix = child.path[old_path.len()..].to_string();
                child.path = format!("{new_path}{suffix}");
            }
        }

        self.emit_now(event_names::DOCUMENT_MOVED, &doc, principal)
            .await?;
        Ok(doc)
    }

    async fn grant(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        subject: &str,
        permission: Permission,
    ) -> anyhow::Result<()> {
        let doc = self
            .docs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Document not found: {id}"))?;
        self.acls.entry(id.clone()).or_default().push(Grant {
            subject: subject.to_string(),
            permission,
        });
        self.emit_now(event_names::SECURITY_UPDATED, &doc, principal)
            .await?;
        Ok(())
    }

    async fn revoke(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        subject: &str,
    ) -> anyhow::Result<()> {
        let doc = self
            .docs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow::anyhow!("Document not found: {id}"))?;
        if let Some(mut grants) = self.acls.get_mut(id) {
            grants.retain(|g| g.subject != subject);
        }
        self.emit_now(event_names::SECURITY_UPDATED, &doc, principal)
            .await?;
        Ok(())
    }

    async fn has_permission(
        &self,
        principal: &PrincipalName,
        groups: &[String],
        id: &DocId,
        permission: Permission,
    ) -> anyhow::Result<bool> {
        if principal.as_str() == "Administrator" {
            return Ok(true);
        }
        let doc = match self.docs.get(id).map(|entry| entry.value().clone()) {
            Some(doc) => doc,
            None => return Ok(false),
        };
        let grants = self.effective_grants(&doc);
        if grants.is_empty() {
            return Ok(true);
        }
        let allowed = |g: &Grant| {
            g.subject == principal.as_str()
                || g.subject == "Everyone"
                || groups.iter().any(|group| *group == g.subject)
        };
        let holds = grants.iter().any(|g| {
            allowed(g)
                && (g.permission == permission || g.permission == Permission::Write)
        });
        Ok(holds)
    }
}
