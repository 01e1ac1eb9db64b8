//! Synchronization root definitions and their wire format
//!
//! Root definitions round-trip across client sessions as a delimited string
//! (`repo:docId,repo:docId,...`). This serialization is the wire contract:
//! parsing is lenient (empty segments ignored) and order-insensitive,
//! formatting is deterministic and order-preserving.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{DocId, RepositoryId};

/// A document designated as a top-level synchronization root for a
/// principal, scoped to one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncRootDefinition {
    /// Repository holding the root document
    pub repository_id: RepositoryId,
    /// The root document
    pub doc_id: DocId,
}

impl SyncRootDefinition {
    /// Builds a definition from its two components
    pub fn new(repository_id: RepositoryId, doc_id: DocId) -> Self {
        Self {
            repository_id,
            doc_id,
        }
    }
}

impl Display for SyncRootDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository_id, self.doc_id)
    }
}

/// Formats root definitions as the delimited wire string.
///
/// Iteration order is preserved, so a caller formatting a sorted set gets a
/// deterministic string suitable for caching and equality checks.
pub fn format_root_definitions<'a, I>(roots: I) -> String
where
    I: IntoIterator<Item = &'a SyncRootDefinition>,
{
    roots
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the delimited wire string back into a set of definitions.
///
/// Empty segments (leading/trailing/double commas, whitespace-only input)
/// are ignored. A non-empty segment that is not `repo:docId` is an error.
pub fn parse_root_definitions(raw: &str) -> Result<BTreeSet<SyncRootDefinition>, DomainError> {
    let mut roots = BTreeSet::new();
    for segment in raw.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (repo, doc) = segment
            .split_once(':')
            .ok_or_else(|| DomainError::InvalidRootDefinition(segment.to_string()))?;
        let repository_id = RepositoryId::try_from(repo.to_string())
            .map_err(|_| DomainError::InvalidRootDefinition(segment.to_string()))?;
        let doc_id = DocId::try_from(doc.to_string())
            .map_err(|_| DomainError::InvalidRootDefinition(segment.to_string()))?;
        roots.insert(SyncRootDefinition::new(repository_id, doc_id));
    }
    Ok(roots)
}
