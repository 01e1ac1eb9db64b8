//! Group directory port (driven/secondary port)
//!
//! Exposes single-hop group membership plus the transitive closure helpers
//! built on it. Groups are a directed graph, never assumed to be a DAG:
//! both traversals carry a visited set so no group is expanded twice in one
//! resolution, which also terminates cycles.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use crate::domain::PrincipalName;

/// Direct members of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMembers {
    /// User principals directly in the group
    pub users: Vec<PrincipalName>,
    /// Subgroups directly in the group
    pub subgroups: Vec<String>,
}

/// Port trait for user/group directory lookups.
#[async_trait::async_trait]
pub trait IGroupDirectory: Send + Sync {
    /// Direct members (users and subgroups) of a group; empty for an
    /// unknown group
    async fn members_of(&self, group: &str) -> anyhow::Result<GroupMembers>;

    /// Groups a user directly belongs to
    async fn groups_of(&self, user: &PrincipalName) -> anyhow::Result<Vec<String>>;

    /// Direct parent groups of a group
    async fn parents_of(&self, group: &str) -> anyhow::Result<Vec<String>>;
}

/// All groups a user belongs to, directly or through arbitrarily deep
/// group nesting (walking parent groups upward).
pub async fn transitive_groups_of_user(
    directory: &Arc<dyn IGroupDirectory>,
    user: &PrincipalName,
) -> anyhow::Result<BTreeSet<String>> {
    let mut found = BTreeSet::new();
    let mut queue: VecDeque<String> = directory.groups_of(user).await?.into();
    while let Some(group) = queue.pop_front() {
        if !found.insert(group.clone()) {
            continue;
        }
        for parent in directory.parents_of(&group).await? {
            if !found.contains(&parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(found)
}

/// All user principals affected by a change on `group`: its direct users
/// plus the users of every transitively nested subgroup.
pub async fn affected_users_of_group(
    directory: &Arc<dyn IGroupDirectory>,
    group: &str,
) -> anyhow::Result<BTreeSet<PrincipalName>> {
    let mut users = BTreeSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([group.to_string()]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let members = directory.members_of(&current).await?;
        users.extend(members.users);
        for subgroup in members.subgroups {
            if !visited.contains(&subgroup) {
                queue.push_back(subgroup);
            }
        }
    }
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubDirectory {
        groups: HashMap<String, GroupMembers>,
    }

    impl StubDirectory {
        fn with(mut self, name: &str, users: &[&str], subgroups: &[&str]) -> Self {
            let members = GroupMembers {
                users: users
                    .iter()
                    .map(|u| PrincipalName::try_from((*u).to_string()).unwrap())
                    .collect(),
                subgroups: subgroups.iter().map(|g| (*g).to_string()).collect(),
            };
            self.groups.insert(name.to_string(), members);
            self
        }

        fn port(self) -> Arc<dyn IGroupDirectory> {
            Arc::new(self)
        }
    }

    #[async_trait::async_trait]
    impl IGroupDirectory for StubDirectory {
        async fn members_of(&self, group: &str) -> anyhow::Result<GroupMembers> {
            Ok(self.groups.get(group).cloned().unwrap_or_default())
        }

        async fn groups_of(&self, user: &PrincipalName) -> anyhow::Result<Vec<String>> {
            let mut found: Vec<String> = self
                .groups
                .iter()
                .filter(|(_, members)| members.users.contains(user))
                .map(|(name, _)| name.clone())
                .collect();
            found.sort();
            Ok(found)
        }

        async fn parents_of(&self, group: &str) -> anyhow::Result<Vec<String>> {
            let mut found: Vec<String> = self
                .groups
                .iter()
                .filter(|(_, members)| members.subgroups.iter().any(|g| g == group))
                .map(|(name, _)| name.clone())
                .collect();
            found.sort();
            Ok(found)
        }
    }

    fn user(name: &str) -> PrincipalName {
        PrincipalName::try_from(name.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_user_groups_walk_ancestors() {
        // joe ∈ editors ⊂ members ⊂ everyone
        let port = StubDirectory::default()
            .with("everyone", &[], &["members"])
            .with("members", &[], &["editors"])
            .with("editors", &["joe"], &[])
            .port();

        let groups = transitive_groups_of_user(&port, &user("joe")).await.unwrap();
        assert_eq!(
            groups,
            ["editors", "members", "everyone"]
                .map(String::from)
                .into_iter()
                .collect()
        );
    }

    #[tokio::test]
    async fn test_affected_users_walk_descendants() {
        let port = StubDirectory::default()
            .with("members", &["jack"], &["editors"])
            .with("editors", &["joe"], &[])
            .port();

        let affected = affected_users_of_group(&port, "members").await.unwrap();
        assert_eq!(affected, [user("jack"), user("joe")].into_iter().collect());

        // a change on the leaf group does not affect jack
        let affected = affected_users_of_group(&port, "editors").await.unwrap();
        assert_eq!(affected, [user("joe")].into_iter().collect());
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let port = StubDirectory::default()
            .with("a", &["joe"], &["b"])
            .with("b", &["jack"], &["a"])
            .port();

        let affected = affected_users_of_group(&port, "a").await.unwrap();
        assert_eq!(affected, [user("jack"), user("joe")].into_iter().collect());

        let groups = transitive_groups_of_user(&port, &user("joe")).await.unwrap();
        assert_eq!(groups, ["a", "b"].map(String::from).into_iter().collect());
    }

    #[tokio::test]
    async fn test_unknown_group_yields_nothing() {
        let port = StubDirectory::default().port();
        assert!(affected_users_of_group(&port, "ghost")
            .await
            .unwrap()
            .is_empty());
    }
}
