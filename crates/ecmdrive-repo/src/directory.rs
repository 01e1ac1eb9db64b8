//! In-memory group directory adapter

use std::sync::Arc;

use dashmap::DashMap;

use ecmdrive_core::domain::{
    event_names, extended_info_keys, AuditEvent, DocId, PrincipalName, RepositoryId,
};
use ecmdrive_core::ports::{GroupMembers, IAuditLog, IGroupDirectory};

/// Group definitions are not repository documents; their audit events
/// publish under this fixed repository id.
const DIRECTORY_REPOSITORY: &str = "default";

const SYSTEM_PRINCIPAL: &str = "Administrator";

/// Embedded group membership graph.
///
/// Groups may reference each other in cycles; this adapter only answers
/// single-hop lookups, closure (and the cycle guard) lives with the caller.
/// Every mutation publishes a `groupUpdated` audit event carrying the group
/// name, so change detection can fan the update out to affected members.
pub struct MemoryGroupDirectory {
    groups: DashMap<String, GroupMembers>,
    audit: Arc<dyn IAuditLog>,
}

impl MemoryGroupDirectory {
    /// Creates an empty directory emitting into `audit`
    pub fn new(audit: Arc<dyn IAuditLog>) -> Self {
        Self {
            groups: DashMap::new(),
            audit,
        }
    }

    /// Defines (or redefines) a group with its direct members
    pub async fn set_group(
        &self,
        name: &str,
        users: &[&str],
        subgroups: &[&str],
    ) -> anyhow::Result<()> {
        let members = GroupMembers {
            users: users
                .iter()
                .map(|u| PrincipalName::try_from((*u).to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            subgroups: subgroups.iter().map(|g| (*g).to_string()).collect(),
        };
        self.groups.insert(name.to_string(), members);
        self.emit_group_updated(name).await
    }

    /// Removes a group definition entirely
    pub async fn delete_group(&self, name: &str) -> anyhow::Result<()> {
        self.groups.remove(name);
        self.emit_group_updated(name).await
    }

    async fn emit_group_updated(&self, name: &str) -> anyhow::Result<()> {
        let event = AuditEvent::new(
            event_names::GROUP_UPDATED,
            DocId::generate(),
            "/",
            RepositoryId::try_from(DIRECTORY_REPOSITORY.to_string())?,
            PrincipalName::try_from(SYSTEM_PRINCIPAL.to_string())?,
        )
        .with_extended(extended_info_keys::GROUP_NAME, name);
        self.audit.append(event).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl IGroupDirectory for MemoryGroupDirectory {
    async fn members_of(&self, group: &str) -> anyhow::Result<GroupMembers> {
        Ok(self
            .groups
            .get(group)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn groups_of(&self, user: &PrincipalName) -> anyhow::Result<Vec<String>> {
        let mut found: Vec<String> = self
            .groups
            .iter()
            .filter(|entry| entry.value().users.contains(user))
            .map(|entry| entry.key().clone())
            .collect();
        found.sort();
        Ok(found)
    }

    async fn parents_of(&self, group: &str) -> anyhow::Result<Vec<String>> {
        let mut found: Vec<String> = self
            .groups
            .iter()
            .filter(|entry| entry.value().subgroups.iter().any(|g| g == group))
            .map(|entry| entry.key().clone())
            .collect();
        found.sort();
        Ok(found)
    }
}
