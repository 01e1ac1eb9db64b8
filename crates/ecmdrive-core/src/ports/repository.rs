//! Document repository port (driven/secondary port)
//!
//! The repository is a black-box collaborator exposing documents,
//! permissions and lifecycle; this subsystem never reaches into its storage.
//! Mutating operations take the acting principal so the adapter can record
//! it (audit trail, `dc:lastContributor`).
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - `DocQuery` provides a composable predicate surface without exposing
//!   a query language.
//! - `SaveFlags` models the versioning-exemption invariant: tag mutation is
//!   a side-channel property change that must neither auto-version the
//!   document nor touch `dc:lastContributor`.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::domain::{DocId, PrincipalName, RepositoryId};

/// Permissions checked against documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read access
    Read,
    /// Write access (implies read)
    Write,
}

/// A detached document model: id, path, type, facets, properties and
/// lifecycle, mirrored from the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Unique document id
    pub id: DocId,
    /// Absolute path within the repository
    pub path: String,
    /// Display name (last path segment)
    pub name: String,
    /// Document type (e.g. `Folder`, `File`, `Tag`, `Tagging`)
    pub doc_type: String,
    /// Repository holding the document
    pub repository_id: RepositoryId,
    /// Schema extension facets present on the document
    pub facets: BTreeSet<String>,
    /// Property map, `schema:field` keyed
    pub properties: HashMap<String, Value>,
    /// Current life cycle state
    pub life_cycle_state: String,
    /// Soft-deletion flag
    pub trashed: bool,
    /// Whether the document can have children
    pub folderish: bool,
    /// Version counter, bumped on save unless versioning is skipped
    pub version: u64,
}

impl Document {
    /// Builds a new unsaved document at `path`.
    pub fn new(
        repository_id: RepositoryId,
        path: impl Into<String>,
        doc_type: impl Into<String>,
        folderish: bool,
    ) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id: DocId::generate(),
            path,
            name,
            doc_type: doc_type.into(),
            repository_id,
            facets: BTreeSet::new(),
            properties: HashMap::new(),
            life_cycle_state: "project".to_string(),
            trashed: false,
            folderish,
            version: 0,
        }
    }

    /// Returns a property value
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns a property as a string slice
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }

    /// Sets a property value
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Reads a multi-valued string property, empty when absent
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.property(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Adds a value to a multi-valued string property (no duplicates)
    pub fn add_to_string_list(&mut self, key: &str, value: &str) {
        let mut values = self.string_list(key);
        if !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
        self.set_property(key, Value::from(values));
    }

    /// Removes a value from a multi-valued string property
    pub fn remove_from_string_list(&mut self, key: &str, value: &str) {
        let values: Vec<String> = self
            .string_list(key)
            .into_iter()
            .filter(|v| v != value)
            .collect();
        self.set_property(key, Value::from(values));
    }
}

/// Save behavior flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveFlags {
    /// Do not bump the document version on this save
    pub skip_versioning: bool,
    /// Do not update `dc:lastContributor` on this save
    pub skip_contributor: bool,
    /// Do not emit a `documentModified` audit event for this save
    pub skip_audit: bool,
}

impl SaveFlags {
    /// Ordinary save: version bump, contributor update and audit all apply
    pub fn standard() -> Self {
        Self::default()
    }

    /// Side-channel save used for tag mutation and sync-root subscription
    /// bookkeeping: the document content did not change from the user's
    /// perspective, so no version bump, no contributor update, and no
    /// `documentModified` audit noise.
    pub fn side_channel() -> Self {
        Self {
            skip_versioning: true,
            skip_contributor: true,
            skip_audit: true,
        }
    }
}

/// Filter criteria for querying documents.
///
/// All fields are optional; unset fields do not filter. Multiple filters
/// combine with AND logic. Trashed documents are excluded unless
/// `include_trashed` is set.
#[derive(Debug, Clone, Default)]
pub struct DocQuery {
    /// Filter by document type
    pub doc_type: Option<String>,
    /// Filter by facet presence
    pub facet: Option<String>,
    /// Filter by exact property value
    pub property_eq: Option<(String, Value)>,
    /// Filter by membership in a multi-valued string property
    pub property_contains: Option<(String, String)>,
    /// Filter by path prefix (equal or underneath)
    pub under_path: Option<String>,
    /// Include soft-deleted documents
    pub include_trashed: bool,
}

impl DocQuery {
    /// Creates an empty filter (matches all non-trashed documents)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by document type
    pub fn of_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Filters by facet presence
    pub fn with_facet(mut self, facet: impl Into<String>) -> Self {
        self.facet = Some(facet.into());
        self
    }

    /// Filters by exact property value
    pub fn property_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.property_eq = Some((key.into(), value.into()));
        self
    }

    /// Filters by multi-valued string property membership
    pub fn property_contains(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.property_contains = Some((key.into(), value.into()));
        self
    }

    /// Filters by path prefix
    pub fn under_path(mut self, path: impl Into<String>) -> Self {
        self.under_path = Some(path.into());
        self
    }

    /// Also matches soft-deleted documents
    pub fn include_trashed(mut self) -> Self {
        self.include_trashed = true;
        self
    }

    /// Evaluates this filter against one document.
    pub fn matches(&self, doc: &Document) -> bool {
        if doc.trashed && !self.include_trashed {
            return false;
        }
        if let Some(ref doc_type) = self.doc_type {
            if doc.doc_type != *doc_type {
                return false;
            }
        }
        if let Some(ref facet) = self.facet {
            if !doc.facets.contains(facet) {
                return false;
            }
        }
        if let Some((ref key, ref value)) = self.property_eq {
            if doc.property(key) != Some(value) {
                return false;
            }
        }
        if let Some((ref key, ref value)) = self.property_contains {
            if !doc.string_list(key).iter().any(|v| v == value) {
                return false;
            }
        }
        if let Some(ref path) = self.under_path {
            if doc.path != *path && !doc.path.starts_with(&format!("{path}/")) {
                return false;
            }
        }
        true
    }
}

/// Port trait for the document repository collaborator.
#[async_trait::async_trait]
pub trait IDocumentRepository: Send + Sync {
    /// Retrieves a document by id (trashed documents included)
    async fn get(&self, id: &DocId) -> anyhow::Result<Option<Document>>;

    /// Queries documents matching the filter
    async fn query(&self, query: &DocQuery) -> anyhow::Result<Vec<Document>>;

    /// Creates a document, emitting a `documentCreated` event
    async fn create(
        &self,
        principal: &PrincipalName,
        doc: Document,
    ) -> anyhow::Result<Document>;

    /// Saves a document, emitting a `documentModified` event; `flags`
    /// control versioning and contributor updates
    async fn save(
        &self,
        principal: &PrincipalName,
        doc: &Document,
        flags: SaveFlags,
    ) -> anyhow::Result<Document>;

    /// Hard-deletes a document, emitting a `deleted` event
    async fn delete(&self, principal: &PrincipalName, id: &DocId) -> anyhow::Result<()>;

    /// Soft-deletes (trashes) a document, emitting a lifecycle transition
    /// event with the `deleted` target state
    async fn trash(&self, principal: &PrincipalName, id: &DocId) -> anyhow::Result<()>;

    /// Copies a document to a new path, emitting `documentCreatedByCopy`;
    /// the copy gets a fresh id and a snapshot of properties and facets
    async fn copy(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        new_path: &str,
    ) -> anyhow::Result<Document>;

    /// Moves a document to a new path, emitting `documentMoved`
    async fn move_to(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        new_path: &str,
    ) -> anyhow::Result<Document>;

    /// Grants a permission to a user or group on a document, emitting
    /// `securityUpdated`
    async fn grant(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        subject: &str,
        permission: Permission,
    ) -> anyhow::Result<()>;

    /// Revokes all grants held by a user or group on a document, emitting
    /// `securityUpdated`
    async fn revoke(
        &self,
        principal: &PrincipalName,
        id: &DocId,
        subject: &str,
    ) -> anyhow::Result<()>;

    /// Checks whether the principal (directly or via one of `groups`)
    /// holds the permission on the document
    async fn has_permission(
        &self,
        principal: &PrincipalName,
        groups: &[String],
        id: &DocId,
        permission: Permission,
    ) -> anyhow::Result<bool>;
}
