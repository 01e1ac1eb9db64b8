//! End-to-end change summary scenarios: register/create/unregister, cursor
//! handoff, the too-many-changes circuit breaker, and clustering delay.

use std::collections::BTreeSet;

use ecmdrive_core::config::DriveConfig;
use ecmdrive_core::domain::{event_names, parse_root_definitions};
use ecmdrive_core::ports::IDocumentRepository;

use crate::common;

#[tokio::test]
async fn test_register_create_unregister_scenario() {
    let server = common::server();
    let joe = common::user("joe");
    let folder = common::create_folder(&server.repository, "/folder1").await;

    // register: the summary carries exactly the folder creation and the
    // registration, both targeting the root document
    server
        .manager
        .register_synchronization_root(&joe, &folder.id)
        .await
        .unwrap();
    let summary = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();

    assert!(!summary.has_too_many_changes);
    let names: Vec<&str> = summary
        .changes
        .iter()
        .map(|c| c.event_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![event_names::DOCUMENT_CREATED, event_names::ROOT_REGISTERED]
    );
    assert!(summary.changes.iter().all(|c| c.doc_id == folder.id));
    assert!(summary.changes.iter().all(|c| c.fs_item.is_some()));
    let registered = &summary.changes[1];
    assert_eq!(registered.fs_item_name.as_deref(), Some("folder1"));
    assert!(registered.fs_item.as_ref().unwrap().folderish);

    // create a file under the root: exactly one documentCreated, with the
    // root as parent item
    let mut last_roots = parse_root_definitions(&summary.active_root_definitions).unwrap();
    let mut cursor = summary.upper_bound;
    let file = common::create_file(&server.repository, "/folder1/file1").await;

    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, cursor)
        .await
        .unwrap();
    assert_eq!(summary.changes.len(), 1);
    let change = &summary.changes[0];
    assert_eq!(change.event_name, event_names::DOCUMENT_CREATED);
    assert_eq!(change.doc_id, file.id);
    let item = change.fs_item.as_ref().unwrap();
    assert!(!item.folderish);
    assert_eq!(
        item.parent_id.as_ref().map(|p| p.doc_id().clone()),
        Some(folder.id.clone())
    );
    assert!(summary.upper_bound > cursor);
    last_roots = parse_root_definitions(&summary.active_root_definitions).unwrap();
    cursor = summary.upper_bound;

    // unregister: exactly one virtual deletion, with no resolved item
    server
        .manager
        .unregister_synchronization_root(&joe, &folder.id)
        .await
        .unwrap();
    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, cursor)
        .await
        .unwrap();
    assert_eq!(summary.changes.len(), 1);
    let change = &summary.changes[0];
    assert_eq!(change.event_name, event_names::DELETED);
    assert_eq!(change.doc_id, folder.id);
    assert!(change.fs_item.is_none());
    assert!(change.fs_item_id.is_some());
    assert!(summary.active_root_definitions.is_empty());
}

#[tokio::test]
async fn test_quiet_window_yields_no_changes() {
    let server = common::server();
    let joe = common::user("joe");
    let folder = common::create_folder(&server.repository, "/folder1").await;
    server
        .manager
        .register_synchronization_root(&joe, &folder.id)
        .await
        .unwrap();

    let first = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();
    let last_roots = parse_root_definitions(&first.active_root_definitions).unwrap();

    let second = server
        .manager
        .get_change_summary(&joe, &last_roots, first.upper_bound)
        .await
        .unwrap();
    assert!(second.changes.is_empty());
    assert_eq!(second.upper_bound, first.upper_bound);
}

#[tokio::test]
async fn test_no_roots_short_circuits_with_current_bound() {
    let server = common::server();
    let joe = common::user("joe");
    // unrelated activity still advances the bound handed to the client
    common::create_folder(&server.repository, "/folder1").await;
    common::create_file(&server.repository, "/folder1/file1").await;

    let summary = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();
    assert!(summary.changes.is_empty());
    assert!(!summary.has_too_many_changes);
    assert_eq!(summary.upper_bound, 2);
    assert!(summary.active_root_definitions.is_empty());
}

#[tokio::test]
async fn test_too_many_changes_trips_the_circuit_breaker() {
    let server = common::server();
    let joe = common::user("joe");
    let admin = common::admin();
    let folder = common::create_folder(&server.repository, "/folder1").await;
    let file1 = common::create_file(&server.repository, "/folder1/file1").await;
    let file2 = common::create_file(&server.repository, "/folder1/file2").await;
    server
        .manager
        .register_synchronization_root(&joe, &folder.id)
        .await
        .unwrap();
    let baseline = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();
    let last_roots = parse_root_definitions(&baseline.active_root_definitions).unwrap();

    // two trash events against a limit of one
    server.manager.change_limit().set(1);
    server.repository.trash(&admin, &file1.id).await.unwrap();
    server.repository.trash(&admin, &file2.id).await.unwrap();

    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, baseline.upper_bound)
        .await
        .unwrap();
    assert!(summary.has_too_many_changes);
    assert!(summary.changes.is_empty());
    assert!(summary.upper_bound > baseline.upper_bound);
    assert_eq!(
        summary.active_root_definitions,
        baseline.active_root_definitions
    );

    // the limit is read at query time: restored, the same window resolves,
    // and the trash transitions surface as deletions
    server.manager.change_limit().set(1000);
    let resolved = server
        .manager
        .get_change_summary(&joe, &last_roots, baseline.upper_bound)
        .await
        .unwrap();
    assert!(!resolved.has_too_many_changes);
    assert_eq!(resolved.changes.len(), 2);
    assert!(resolved
        .changes
        .iter()
        .all(|c| c.event_name == event_names::DELETED && c.fs_item.is_none()));
}

#[tokio::test]
async fn test_trashed_root_drops_out_of_the_active_set() {
    let server = common::server();
    let admin = common::admin();
    let joe = common::user("joe");
    let folder = common::create_folder(&server.repository, "/folder1").await;
    server
        .manager
        .register_synchronization_root(&joe, &folder.id)
        .await
        .unwrap();
    let baseline = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();
    let last_roots = parse_root_definitions(&baseline.active_root_definitions).unwrap();
    assert_eq!(last_roots.len(), 1);

    // trashing the root emits no event addressed to joe, yet the root
    // must stop being active on the very next summary
    server.repository.trash(&admin, &folder.id).await.unwrap();

    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, baseline.upper_bound)
        .await
        .unwrap();
    assert!(summary.active_root_definitions.is_empty());
    assert_eq!(summary.changes.len(), 1);
    let change = &summary.changes[0];
    assert_eq!(change.event_name, event_names::DELETED);
    assert_eq!(change.doc_id, folder.id);
    assert!(change.fs_item.is_none());
}

#[tokio::test]
async fn test_hard_deleted_root_drops_out_of_the_active_set() {
    let server = common::server();
    let admin = common::admin();
    let joe = common::user("joe");
    let folder = common::create_folder(&server.repository, "/folder1").await;
    server
        .manager
        .register_synchronization_root(&joe, &folder.id)
        .await
        .unwrap();
    let baseline = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();
    let last_roots = parse_root_definitions(&baseline.active_root_definitions).unwrap();

    server.repository.delete(&admin, &folder.id).await.unwrap();

    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, baseline.upper_bound)
        .await
        .unwrap();
    assert!(summary.active_root_definitions.is_empty());
    assert_eq!(summary.changes.len(), 1);
    assert_eq!(summary.changes[0].event_name, event_names::DELETED);
}

#[tokio::test]
async fn test_upper_bound_agrees_across_repositories() {
    let server = common::server();
    common::create_folder(&server.repository, "/folder1").await;
    common::create_file(&server.repository, "/folder1/file1").await;

    let finder = server.manager.finder();
    let all = [common::test_repo()];
    assert_eq!(
        finder.get_upper_bound().await.unwrap(),
        finder.get_upper_bound_for(&all).await.unwrap()
    );
}

#[tokio::test]
async fn test_clustering_delay_hides_fresh_events() {
    let config = DriveConfig {
        clustering_delay_ms: Some(60_000),
        ..DriveConfig::default()
    };
    let server = common::server_with_config(config);
    let joe = common::user("joe");
    let folder = common::create_folder(&server.repository, "/folder1").await;
    server
        .manager
        .register_synchronization_root(&joe, &folder.id)
        .await
        .unwrap();

    // committed but not yet visible: the bound does not move and no change
    // leaks out before the delay elapses
    let summary = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();
    assert!(summary.changes.is_empty());
    assert_eq!(summary.upper_bound, 0);
}
