//! Data model for documents, versions, sessions, and envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::publication::PublicationSlots;

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Logical identity of one document within a workspace.
///
/// Content lives in [`Version`] rows; a document row only changes through
/// title edits and the `updated_at_utc` touch performed on every new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

/// Request for creating a document together with its first version.
#[derive(Debug, Clone, Default)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: String,
    /// Metadata recorded on version 1.
    pub metadata: Option<JsonValue>,
}

impl CreateDocumentRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            metadata: None,
        }
    }
}

/// A freshly created document and its first version.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithVersion {
    pub document: Document,
    pub version: Version,
}

/// Result of appending to an owner's document, creating it when absent.
#[derive(Debug, Clone, Serialize)]
pub struct AppendOutcome {
    pub document: Document,
    pub version: Version,
    /// True when the document was created by this call.
    pub is_first_version: bool,
}

// =============================================================================
// VERSIONS
// =============================================================================

/// Immutable content snapshot within a document's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Version {
    pub id: Uuid,
    pub document_id: Uuid,
    /// Starts at 1 and increases by one per document.
    pub version_number: i32,
    pub content: String,
    /// Auxiliary notes carried forward to the next version unless replaced.
    pub punchlist: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    /// Authoring session that produced this version, if any.
    pub chat_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at_utc: DateTime<Utc>,
}

/// Version listing entry without the content body.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VersionSummary {
    pub id: Uuid,
    pub version_number: i32,
    pub created_by: Uuid,
    pub created_at_utc: DateTime<Utc>,
    pub chat_id: Option<Uuid>,
    pub content_len: i32,
    pub has_punchlist: bool,
}

/// Input for a new version.
///
/// `punchlist: None` means "carry the previous version's punchlist forward";
/// pass `Some(JsonValue::Null)` to clear it explicitly.
#[derive(Debug, Clone, Default)]
pub struct NewVersion {
    pub content: String,
    pub punchlist: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
}

impl NewVersion {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            punchlist: None,
            metadata: None,
        }
    }

    pub fn with_punchlist(mut self, punchlist: JsonValue) -> Self {
        self.punchlist = Some(punchlist);
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Resolve the punchlist to store given the latest version's punchlist.
    pub fn resolve_punchlist(&self, previous: Option<JsonValue>) -> Option<JsonValue> {
        match &self.punchlist {
            Some(JsonValue::Null) => None,
            Some(explicit) => Some(explicit.clone()),
            None => previous,
        }
    }
}

// =============================================================================
// AUTHORING SESSIONS
// =============================================================================

/// Outcome of binding a chat to its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatVersionBinding {
    pub version_id: Uuid,
    pub document_id: Uuid,
    pub is_first_version: bool,
}

// =============================================================================
// PUBLICATION
// =============================================================================

/// A document together with its draft/published/searchable state.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub document: Document,
    #[serde(flatten)]
    pub slots: PublicationSlots,
}

impl Envelope {
    pub fn id(&self) -> Uuid {
        self.document.id
    }
}

/// Published, searchable version as seen by the search collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchableVersion {
    pub document_id: Uuid,
    pub workspace_id: Uuid,
    pub title: String,
    pub version_id: Uuid,
    pub version_number: i32,
    pub content: String,
    pub published_at_utc: DateTime<Utc>,
}

// =============================================================================
// SOURCES
// =============================================================================

/// Read-only source material consumed by generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SourceDocument {
    pub id: Uuid,
    pub title: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_punchlist_carries_forward_when_absent() {
        let v = NewVersion::new("body");
        let previous = Some(json!({"todo": ["a", "b"]}));
        assert_eq!(v.resolve_punchlist(previous.clone()), previous);
    }

    #[test]
    fn test_resolve_punchlist_explicit_wins() {
        let v = NewVersion::new("body").with_punchlist(json!(["new"]));
        assert_eq!(
            v.resolve_punchlist(Some(json!(["old"]))),
            Some(json!(["new"]))
        );
    }

    #[test]
    fn test_resolve_punchlist_explicit_null_clears() {
        let v = NewVersion::new("body").with_punchlist(JsonValue::Null);
        assert_eq!(v.resolve_punchlist(Some(json!(["old"]))), None);
    }

    #[test]
    fn test_resolve_punchlist_none_without_previous() {
        assert_eq!(NewVersion::new("").resolve_punchlist(None), None);
    }

    #[test]
    fn test_create_document_request_new() {
        let req = CreateDocumentRequest::new("Goals", "");
        assert_eq!(req.title, "Goals");
        assert!(req.content.is_empty());
        assert!(req.metadata.is_none());
    }

    #[test]
    fn test_envelope_serializes_slots_flat() {
        let now = Utc::now();
        let envelope = Envelope {
            document: Document {
                id: Uuid::nil(),
                workspace_id: Uuid::nil(),
                title: "Summary".to_string(),
                created_by: Uuid::nil(),
                created_at_utc: now,
                updated_at_utc: now,
            },
            slots: PublicationSlots::default(),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["searchable"], json!(false));
        assert!(value["draft_version_id"].is_null());
        assert_eq!(value["document"]["title"], json!("Summary"));
    }
}
