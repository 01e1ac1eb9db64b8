//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for repository, document and principal
//! identifiers, plus the composite `FileSystemItemId` used by sync clients.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

macro_rules! string_newtype {
    ($(#[$doc:meta])* $name:ident, $what:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns the inner string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                if value.trim().is_empty() {
                    return Err(DomainError::InvalidId(format!(
                        concat!($what, " must not be empty (got '{}')"),
                        value
                    )));
                }
                Ok(Self(value))
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::try_from(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(
    /// Identifier of a repository (e.g. `"default"`, `"test"`)
    RepositoryId,
    "repository id"
);

string_newtype!(
    /// Identifier of a document within a repository
    DocId,
    "document id"
);

string_newtype!(
    /// Name of an acting principal (user)
    PrincipalName,
    "principal name"
);

impl DocId {
    /// Generates a fresh random document id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Composite identifier of a file system item, serialized as
/// `factoryName#repositoryName#docId`.
///
/// Parsing fails fast on malformed input with a descriptive error; a
/// well-formed id whose document no longer exists is a different situation
/// and resolves to `None` at lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileSystemItemId {
    factory: String,
    repository_id: RepositoryId,
    doc_id: DocId,
}

impl FileSystemItemId {
    /// Builds an id from its three components
    pub fn new(factory: impl Into<String>, repository_id: RepositoryId, doc_id: DocId) -> Self {
        Self {
            factory: factory.into(),
            repository_id,
            doc_id,
        }
    }

    /// Returns the factory name component
    pub fn factory(&self) -> &str {
        &self.factory
    }

    /// Returns the repository component
    pub fn repository_id(&self) -> &RepositoryId {
        &self.repository_id
    }

    /// Returns the document component
    pub fn doc_id(&self) -> &DocId {
        &self.doc_id
    }
}

impl FromStr for FileSystemItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('#').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(DomainError::InvalidFileSystemItemId(s.to_string()));
        }
        Ok(Self {
            factory: parts[0].to_string(),
            repository_id: RepositoryId::try_from(parts[1].to_string())
                .map_err(|_| DomainError::InvalidFileSystemItemId(s.to_string()))?,
            doc_id: DocId::try_from(parts[2].to_string())
                .map_err(|_| DomainError::InvalidFileSystemItemId(s.to_string()))?,
        })
    }
}

impl Display for FileSystemItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}#{}", self.factory, self.repository_id, self.doc_id)
    }
}
