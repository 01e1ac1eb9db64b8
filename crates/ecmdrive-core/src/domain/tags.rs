//! Tag associations and label sanitization
//!
//! Tag labels are normalized on write so they are safe as query-literal
//! fragments and path segments; queries must match against the sanitized
//! form regardless of how the caller typed them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::DocId;

/// Characters stripped from tag labels on sanitization
const FORBIDDEN_LABEL_CHARS: &[char] = &['\\', '/', '\'', '%'];

/// Normalizes a tag label: lowercases, then strips whitespace, backslash,
/// forward slash, single-quote and percent characters.
///
/// Idempotent: `sanitize_label(sanitize_label(x)) == sanitize_label(x)`.
pub fn sanitize_label(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !FORBIDDEN_LABEL_CHARS.contains(c))
        .collect()
}

/// A many-to-many association between a document and a tag label, with the
/// author recorded for removal-permission checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagAssociation {
    /// The tagged document
    pub doc_id: DocId,
    /// The sanitized label
    pub label: String,
    /// The user that applied the tag
    pub username: String,
    /// When the tag was applied
    pub creation_date: DateTime<Utc>,
}

impl TagAssociation {
    /// Builds an association dated now; the label is sanitized here so no
    /// unsanitized label can enter storage.
    pub fn new(doc_id: DocId, label: &str, username: impl Into<String>) -> Self {
        Self {
            doc_id,
            label: sanitize_label(label),
            username: username.into(),
            creation_date: Utc::now(),
        }
    }
}
