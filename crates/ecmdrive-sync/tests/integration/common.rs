//! Shared fixtures for the change detection integration tests
//!
//! One `Server` bundles the in-memory adapters and the manager wired over
//! them, the way the embedded runtime assembles them.

use std::sync::{Arc, Once};

use ecmdrive_audit::MemoryAuditLog;
use ecmdrive_core::config::DriveConfig;
use ecmdrive_core::domain::{PrincipalName, RepositoryId};
use ecmdrive_core::ports::{Document, IDocumentRepository};
use ecmdrive_repo::{MemoryGroupDirectory, MemoryRepository};
use ecmdrive_sync::DriveManager;

pub struct Server {
    pub repository: Arc<MemoryRepository>,
    pub directory: Arc<MemoryGroupDirectory>,
    pub manager: DriveManager,
}

/// Honors `RUST_LOG` when set, so a failing run can be replayed verbosely
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An embedded server with default configuration
pub fn server() -> Server {
    server_with_config(DriveConfig::default())
}

pub fn server_with_config(config: DriveConfig) -> Server {
    init_tracing();
    let audit = Arc::new(match config.clustering_delay_ms {
        Some(delay_ms) => MemoryAuditLog::with_clustering_delay(delay_ms),
        None => MemoryAuditLog::new(),
    });
    let repository = Arc::new(MemoryRepository::new(audit.clone()));
    let directory = Arc::new(MemoryGroupDirectory::new(audit.clone()));
    let manager = DriveManager::new(
        repository.clone(),
        directory.clone(),
        audit.clone(),
        &config,
    );
    Server {
        repository,
        directory,
        manager,
    }
}

pub fn user(name: &str) -> PrincipalName {
    PrincipalName::try_from(name.to_string()).unwrap()
}

pub fn admin() -> PrincipalName {
    user("Administrator")
}

pub fn test_repo() -> RepositoryId {
    RepositoryId::try_from("test".to_string()).unwrap()
}

pub async fn create_folder(repository: &Arc<MemoryRepository>, path: &str) -> Document {
    let doc = Document::new(test_repo(), path, "Folder", true);
    repository.create(&admin(), doc).await.unwrap()
}

pub async fn create_file(repository: &Arc<MemoryRepository>, path: &str) -> Document {
    let doc = Document::new(test_repo(), path, "File", false);
    repository.create(&admin(), doc).await.unwrap()
}
