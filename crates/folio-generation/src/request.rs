//! Generation and revision requests.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use folio_core::{Error, Result};

/// What kind of document a generation pass produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Goal,
    Summary,
    Analysis,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Summary => "summary",
            Self::Analysis => "analysis",
        }
    }

    /// Meeting summaries may be written straight from a pasted transcript;
    /// every other kind needs stored source documents.
    pub fn allows_inline_transcript(&self) -> bool {
        matches!(self, Self::Summary)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "goal" => Ok(Self::Goal),
            "summary" => Ok(Self::Summary),
            "analysis" => Ok(Self::Analysis),
            other => Err(Error::InvalidInput(format!(
                "Unknown document kind '{}' (expected goal, summary or analysis)",
                other
            ))),
        }
    }
}

/// Material a generation pass works from.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationSource {
    /// Stored source documents, resolved within the request's workspace.
    Documents(Vec<Uuid>),
    /// Text supplied with the request.
    Transcript(String),
}

/// Free-form parameters embedded in the prompt and recorded on the version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<String>,
    /// Kind-specific fields (department, audience, horizon, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, JsonValue>,
}

impl GenerationParameters {
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = participants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// A generation pass that appends to (or creates) the owner's document.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub owner_id: Uuid,
    pub workspace_id: Uuid,
    pub author_id: Uuid,
    /// Title used when the owner has no document yet.
    pub title: String,
    pub kind: DocumentKind,
    pub source: GenerationSource,
    pub parameters: GenerationParameters,
    /// Style instruction sent as the system message, passed through untouched.
    pub system_instruction: String,
    /// Overrides the configured token budget.
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        kind: DocumentKind,
        source: GenerationSource,
    ) -> Self {
        Self {
            owner_id,
            workspace_id,
            author_id,
            title: String::new(),
            kind,
            source,
            parameters: GenerationParameters::default(),
            system_instruction: String::new(),
            max_tokens: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A pass that rewrites the latest version of an existing document.
#[derive(Debug, Clone)]
pub struct RevisionRequest {
    pub document_id: Uuid,
    pub workspace_id: Uuid,
    pub author_id: Uuid,
    /// What to change, in the user's words.
    pub instruction: String,
    pub system_instruction: String,
    pub max_tokens: Option<u32>,
}

impl RevisionRequest {
    pub fn new(
        document_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            workspace_id,
            author_id,
            instruction: instruction.into(),
            system_instruction: String::new(),
            max_tokens: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }
}

/// Result of a persisted generation or revision pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub version_id: Uuid,
    pub document_id: Uuid,
    pub version_number: i32,
    /// True when this pass created the document.
    pub is_first_version: bool,
    /// True when the pass was cancelled and its partial text was kept.
    pub partial: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_only_summaries_accept_transcripts() {
        assert!(DocumentKind::Summary.allows_inline_transcript());
        assert!(!DocumentKind::Goal.allows_inline_transcript());
        assert!(!DocumentKind::Analysis.allows_inline_transcript());
    }

    #[test]
    fn test_kind_parses_case_insensitively() {
        assert_eq!("Summary".parse::<DocumentKind>().unwrap(), DocumentKind::Summary);
        assert_eq!("goal".parse::<DocumentKind>().unwrap(), DocumentKind::Goal);
        assert!(matches!(
            "memo".parse::<DocumentKind>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(serde_json::to_value(DocumentKind::Analysis).unwrap(), json!("analysis"));
    }

    #[test]
    fn test_parameters_omit_empty_parts() {
        let params = GenerationParameters::default();
        assert_eq!(serde_json::to_value(&params).unwrap(), json!({}));

        let params = GenerationParameters::default()
            .with_date(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap())
            .with_participants(["Ana", "Ben"])
            .with_field("department", json!("Sales"));
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "date": "2026-03-04",
                "participants": ["Ana", "Ben"],
                "fields": {"department": "Sales"}
            })
        );
    }
}
