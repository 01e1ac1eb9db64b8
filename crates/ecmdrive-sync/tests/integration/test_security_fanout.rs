//! Security and group-membership fan-out: ACL changes on ancestors surface
//! for the roots they cover, group updates surface for every member's
//! roots, and a revocation turns the root into a deletion.

use std::collections::BTreeSet;

use ecmdrive_core::domain::{event_names, parse_root_definitions};
use ecmdrive_core::ports::{IDocumentRepository, Permission};

use crate::common;

#[tokio::test]
async fn test_ancestor_acl_change_surfaces_for_covered_roots() {
    let server = common::server();
    let admin = common::admin();
    let joe = common::user("joe");
    let parent = common::create_folder(&server.repository, "/folder1").await;
    let sub = common::create_folder(&server.repository, "/folder1/sub").await;
    server
        .repository
        .grant(&admin, &parent.id, "joe", Permission::Read)
        .await
        .unwrap();
    server
        .manager
        .register_synchronization_root(&joe, &sub.id)
        .await
        .unwrap();
    let baseline = server
        .manager
        .get_change_summary(&joe, &BTreeSet::new(), 0)
        .await
        .unwrap();
    let last_roots = parse_root_definitions(&baseline.active_root_definitions).unwrap();

    // the ACL change happens above the root, outside its subtree
    server
        .repository
        .grant(&admin, &parent.id, "jack", Permission::Read)
        .await
        .unwrap();

    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, baseline.upper_bound)
        .await
        .unwrap();
    assert_eq!(summary.changes.len(), 1);
    let change = &summary.changes[0];
    assert_eq!(change.event_name, event_names::SECURITY_UPDATED);
    assert_eq!(change.doc_id, sub.id, "the change targets the root, not the ancestor");
    assert!(change.fs_item.is_some(), "joe still reads the root");
}

#[tokio::test]
async fn test_group_update_surfaces_for_member_roots() {
    let server = common::server();
    let joe = common::user("joe");
    server
        .directory
        .set_group("editors", &["joe"], &[])
        .await
        .unwrap();
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

    // a membership change on joe's group publishes a groupUpdated event
    server
        .directory
        .set_group("editors", &["joe", "jane"], &[])
        .await
        .unwrap();

    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, baseline.upper_bound)
        .await
        .unwrap();
    assert_eq!(summary.changes.len(), 1);
    let change = &summary.changes[0];
    assert_eq!(change.event_name, event_names::SECURITY_UPDATED);
    assert_eq!(change.doc_id, folder.id);
}

#[tokio::test]
async fn test_unrelated_group_update_is_invisible() {
    let server = common::server();
    let joe = common::user("joe");
    server
        .directory
        .set_group("editors", &["joe"], &[])
        .await
        .unwrap();
    server
        .directory
        .set_group("reviewers", &["jack"], &[])
        .await
        .unwrap();
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

    // joe is not in reviewers, so its update stays invisible to him
    server
        .directory
        .set_group("reviewers", &["jack", "jill"], &[])
        .await
        .unwrap();

    let summary = server
        .manager
        .get_change_summary(&joe, &last_roots, baseline.upper_bound)
        .await
        .unwrap();
    assert!(summary.changes.is_empty());
}

#[tokio::test]
async fn test_revoked_read_turns_the_root_into_a_deletion() {
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

    // granting jack makes the folder restricted; joe, holding no grant,
    // loses read access and the root silently drops out
    server
        .repository
        .grant(&admin, &folder.id, "jack", Permission::Read)
        .await
        .unwrap();

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
