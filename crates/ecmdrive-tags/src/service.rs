//! Tag service facade
//!
//! Selects the storage backend once per call from the shared migration
//! status: `Relations` routes to the legacy store, `Facets` to the facet
//! store, and `Running` to the bridge. The status lives in a small shared
//! handle so the migrator can flip it while calls are in flight.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use ecmdrive_core::domain::{DocId, MigrationState, MigrationStatus, PrincipalName};
use ecmdrive_core::ports::{IDocumentRepository, IGroupDirectory};

use crate::bridge::BridgeTagStore;
use crate::facet::FacetedTagStore;
use crate::relation::RelationTagStore;
use crate::store::TagStore;

const STATUS_RELATIONS: u8 = 0;
const STATUS_FACETS: u8 = 1;
const STATUS_RUNNING: u8 = 2;

/// Shared, lock-free handle on the current migration status.
#[derive(Debug, Clone)]
pub struct MigrationStatusHandle(Arc<AtomicU8>);

impl MigrationStatusHandle {
    /// Creates a handle in the given initial status
    pub fn new(initial: MigrationStatus) -> Self {
        let handle = Self(Arc::new(AtomicU8::new(STATUS_RELATIONS)));
        handle.set(initial);
        handle
    }

    /// Current status
    pub fn get(&self) -> MigrationStatus {
        match self.0.load(Ordering::Relaxed) {
            STATUS_FACETS => MigrationStatus::Settled(MigrationState::Facets),
            STATUS_RUNNING => MigrationStatus::Running,
            _ => MigrationStatus::Settled(MigrationState::Relations),
        }
    }

    /// Replaces the status, visible to all clones of this handle
    pub fn set(&self, status: MigrationStatus) {
        let encoded = match status {
            MigrationStatus::Settled(MigrationState::Relations) => STATUS_RELATIONS,
            MigrationStatus::Settled(MigrationState::Facets) => STATUS_FACETS,
            MigrationStatus::Running => STATUS_RUNNING,
        };
        self.0.store(encoded, Ordering::Relaxed);
    }
}

/// Facade routing each tag operation to the backend the migration status
/// designates.
pub struct TagService {
    relation: Arc<RelationTagStore>,
    facet: Arc<FacetedTagStore>,
    bridge: Arc<BridgeTagStore>,
    status: MigrationStatusHandle,
}

impl TagService {
    /// Wires the three stores over one repository and group directory
    pub fn new(
        repository: Arc<dyn IDocumentRepository>,
        directory: Arc<dyn IGroupDirectory>,
        status: MigrationStatusHandle,
    ) -> Self {
        let relation = Arc::new(RelationTagStore::new(repository.clone(), directory.clone()));
        let facet = Arc::new(FacetedTagStore::new(repository, directory));
        let bridge = Arc::new(BridgeTagStore::new(relation.clone(), facet.clone()));
        Self {
            relation,
            facet,
            bridge,
            status,
        }
    }

    /// The shared migration status handle
    pub fn status(&self) -> &MigrationStatusHandle {
        &self.status
    }

    fn store(&self) -> Arc<dyn TagStore> {
        match self.status.get() {
            MigrationStatus::Settled(MigrationState::Relations) => self.relation.clone(),
            MigrationStatus::Settled(MigrationState::Facets) => self.facet.clone(),
            MigrationStatus::Running => self.bridge.clone(),
        }
    }

    /// See [`TagStore::tag`]
    pub async fn tag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: &str,
    ) -> anyhow::Result<()> {
        self.store().tag(principal, doc_id, label).await
    }

    /// See [`TagStore::untag`]
    pub async fn untag(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
        label: Option<&str>,
    ) -> anyhow::Result<()> {
        self.store().untag(principal, doc_id, label).await
    }

    /// See [`TagStore::get_tags`]
    pub async fn get_tags(&self, doc_id: &DocId) -> anyhow::Result<BTreeSet<String>> {
        self.store().get_tags(doc_id).await
    }

    /// See [`TagStore::get_tag_document_ids`]
    pub async fn get_tag_document_ids(&self, label: &str) -> anyhow::Result<Vec<DocId>> {
        self.store().get_tag_document_ids(label).await
    }

    /// See [`TagStore::get_suggestions`]
    pub async fn get_suggestions(&self, prefix: &str) -> anyhow::Result<BTreeSet<String>> {
        self.store().get_suggestions(prefix).await
    }

    /// See [`TagStore::copy_tags`]
    pub async fn copy_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()> {
        self.store().copy_tags(principal, src, dst).await
    }

    /// See [`TagStore::replace_tags`]
    pub async fn replace_tags(
        &self,
        principal: &PrincipalName,
        src: &DocId,
        dst: &DocId,
    ) -> anyhow::Result<()> {
        self.store().replace_tags(principal, src, dst).await
    }

    /// See [`TagStore::remove_tags`]
    pub async fn remove_tags(
        &self,
        principal: &PrincipalName,
        doc_id: &DocId,
    ) -> anyhow::Result<()> {
        self.store().remove_tags(principal, doc_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::NXTAG_FACET;
    use crate::relation::TAGGING_DOC_TYPE;
    use ecmdrive_core::domain::RepositoryId;
    use ecmdrive_core::ports::{DocQuery, Document, Permission};
    use ecmdrive_audit::MemoryAuditLog;
    use ecmdrive_repo::{MemoryGroupDirectory, MemoryRepository};

    fn user(name: &str) -> PrincipalName {
        PrincipalName::try_from(name.to_string()).unwrap()
    }

    struct Fixture {
        repository: Arc<dyn IDocumentRepository>,
        directory: Arc<MemoryGroupDirectory>,
        service: TagService,
    }

    fn fixture(initial: MigrationStatus) -> Fixture {
        let audit = Arc::new(MemoryAuditLog::new());
        let repository: Arc<dyn IDocumentRepository> =
            Arc::new(MemoryRepository::new(audit.clone()));
        let directory = Arc::new(MemoryGroupDirectory::new(audit));
        let service = TagService::new(
            repository.clone(),
            directory.clone(),
            MigrationStatusHandle::new(initial),
        );
        Fixture {
            repository,
            directory,
            service,
        }
    }

    fn service(initial: MigrationStatus) -> (Arc<dyn IDocumentRepository>, TagService) {
        let f = fixture(initial);
        (f.repository, f.service)
    }

    async fn create_file(repository: &Arc<dyn IDocumentRepository>, path: &str) -> DocId {
        let doc = Document::new(
            RepositoryId::try_from("test".to_string()).unwrap(),
            path,
            "File",
            false,
        );
        repository.create(&user("Administrator"), doc).await.unwrap().id
    }

    async fn tagging_count(repository: &Arc<dyn IDocumentRepository>) -> usize {
        repository
            .query(&DocQuery::new().of_type(TAGGING_DOC_TYPE))
            .await
            .unwrap()
            .len()
    }

    async fn has_facet(repository: &Arc<dyn IDocumentRepository>, doc_id: &DocId) -> bool {
        repository
            .get(doc_id)
            .await
            .unwrap()
            .unwrap()
            .facets
            .contains(NXTAG_FACET)
    }

    #[tokio::test]
    async fn test_relations_status_routes_to_legacy_store() {
        let (repository, service) =
            service(MigrationStatus::Settled(MigrationState::Relations));
        let doc_id = create_file(&repository, "/folder1/file1").await;

        service.tag(&user("joe"), &doc_id, "mytag").await.unwrap();

        assert_eq!(tagging_count(&repository).await, 1);
        assert!(!has_facet(&repository, &doc_id).await);
    }

    #[tokio::test]
    async fn test_facets_status_routes_to_facet_store() {
        let (repository, service) = service(MigrationStatus::Settled(MigrationState::Facets));
        let doc_id = create_file(&repository, "/folder1/file1").await;

        service.tag(&user("joe"), &doc_id, "mytag").await.unwrap();

        assert_eq!(tagging_count(&repository).await, 0);
        assert!(has_facet(&repository, &doc_id).await);
    }

    #[tokio::test]
    async fn test_running_status_routes_to_bridge() {
        let (repository, service) = service(MigrationStatus::Running);
        let doc_id = create_file(&repository, "/folder1/file1").await;

        service.tag(&user("joe"), &doc_id, "mytag").await.unwrap();

        assert_eq!(tagging_count(&repository).await, 1);
        assert!(has_facet(&repository, &doc_id).await);
    }

    #[tokio::test]
    async fn test_status_flip_takes_effect_per_call() {
        let (repository, service) =
            service(MigrationStatus::Settled(MigrationState::Relations));
        let doc_id = create_file(&repository, "/folder1/file1").await;

        service.tag(&user("joe"), &doc_id, "before").await.unwrap();
        service
            .status()
            .set(MigrationStatus::Settled(MigrationState::Facets));
        service.tag(&user("joe"), &doc_id, "after").await.unwrap();

        assert_eq!(tagging_count(&repository).await, 1);
        assert_eq!(
            service.get_tags(&doc_id).await.unwrap(),
            BTreeSet::from(["after".to_string()])
        );
    }

    #[tokio::test]
    async fn test_untag_permission_message_names_user_tag_and_document() {
        let (repository, service) =
            service(MigrationStatus::Settled(MigrationState::Relations));
        let doc_id = create_file(&repository, "/folder1/file1").await;
        let admin = user("Administrator");
        repository
            .grant(&admin, &doc_id, "bender", Permission::Write)
            .await
            .unwrap();

        service
            .tag(&user("bender"), &doc_id, "mytag")
            .await
            .unwrap();

        let err = service
            .untag(&user("bob"), &doc_id, Some("mytag"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("User 'bob' is not allowed to remove tag 'mytag' on document '{doc_id}'")
        );
        assert_eq!(
            service.get_tags(&doc_id).await.unwrap(),
            BTreeSet::from(["mytag".to_string()])
        );
    }

    #[tokio::test]
    async fn test_untag_honors_group_held_write() {
        let f = fixture(MigrationStatus::Settled(MigrationState::Relations));
        let doc_id = create_file(&f.repository, "/folder1/file1").await;
        let admin = user("Administrator");
        f.repository
            .grant(&admin, &doc_id, "editors", Permission::Write)
            .await
            .unwrap();
        f.directory
            .set_group("editors", &["joe"], &[])
            .await
            .unwrap();

        f.service
            .tag(&user("bender"), &doc_id, "mytag")
            .await
            .unwrap();

        // joe is not the author; his WRITE comes only through the group
        f.service
            .untag(&user("joe"), &doc_id, Some("mytag"))
            .await
            .unwrap();
        assert!(f.service.get_tags(&doc_id).await.unwrap().is_empty());
    }
}
