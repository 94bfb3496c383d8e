//! Prompt composition for generation and revision passes.
//!
//! Source material is wrapped in numbered delimiters so the model can tell
//! documents apart; parameters travel as a JSON context block.

use serde_json::json;

use folio_core::{Result, SourceDocument, Version};

use crate::request::{DocumentKind, GenerationParameters};

/// Material a prompt is composed from, after source resolution.
#[derive(Debug, Clone, Copy)]
pub enum SourceMaterial<'a> {
    Documents(&'a [SourceDocument]),
    Transcript(&'a str),
}

/// Render the JSON context block for a generation pass.
pub fn context_block(
    kind: DocumentKind,
    title: &str,
    parameters: &GenerationParameters,
) -> Result<String> {
    let mut context = json!({
        "document_kind": kind,
        "title": title,
    });
    if let serde_json::Value::Object(params) = serde_json::to_value(parameters)? {
        if let Some(map) = context.as_object_mut() {
            map.extend(params);
        }
    }
    Ok(serde_json::to_string_pretty(&context)?)
}

/// Wrap each source in its own delimiters.
pub fn render_sources(material: SourceMaterial<'_>) -> String {
    match material {
        SourceMaterial::Documents(docs) => docs
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                format!(
                    "=== BEGIN SOURCE {n}: {title} ===\n{content}\n=== END SOURCE {n} ===",
                    n = i + 1,
                    title = doc.title,
                    content = doc.content.trim_end()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        SourceMaterial::Transcript(text) => format!(
            "=== BEGIN TRANSCRIPT ===\n{}\n=== END TRANSCRIPT ===",
            text.trim_end()
        ),
    }
}

/// User prompt for a generation pass.
pub fn generation_prompt(
    kind: DocumentKind,
    title: &str,
    parameters: &GenerationParameters,
    material: SourceMaterial<'_>,
) -> Result<String> {
    let context = context_block(kind, title, parameters)?;
    let sources = render_sources(material);
    Ok(format!(
        r#"Write the {kind} document from the source material below.

Context:
```json
{context}
```

Source material:
{sources}

Output only the document text."#
    ))
}

/// User prompt for revising the latest version of a document.
pub fn revision_prompt(title: &str, current: &Version, instruction: &str) -> String {
    let content = current.content.trim_end();
    let number = current.version_number;
    format!(
        r#"Revise the document "{title}" according to the instruction.

Instruction:
{instruction}

=== BEGIN CURRENT VERSION {number} ===
{content}
=== END CURRENT VERSION {number} ===

Output the complete revised document, no explanations."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn source(title: &str, content: &str) -> SourceDocument {
        SourceDocument {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_sources_are_numbered_and_delimited() {
        let docs = vec![source("Kickoff", "We met.\n"), source("Retro", "It went well.")];
        let rendered = render_sources(SourceMaterial::Documents(&docs));
        assert!(rendered.starts_with("=== BEGIN SOURCE 1: Kickoff ===\nWe met.\n=== END SOURCE 1 ==="));
        assert!(rendered.contains("=== BEGIN SOURCE 2: Retro ===\nIt went well.\n=== END SOURCE 2 ==="));
    }

    #[test]
    fn test_transcript_is_delimited() {
        let rendered = render_sources(SourceMaterial::Transcript("Ana: hi\n"));
        assert_eq!(rendered, "=== BEGIN TRANSCRIPT ===\nAna: hi\n=== END TRANSCRIPT ===");
    }

    #[test]
    fn test_context_block_merges_parameters() {
        let params = GenerationParameters::default()
            .with_date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
            .with_participants(["Ana"]);
        let block = context_block(DocumentKind::Summary, "Weekly sync", &params).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&block).unwrap();
        assert_eq!(
            parsed,
            json!({
                "document_kind": "summary",
                "title": "Weekly sync",
                "date": "2026-01-15",
                "participants": ["Ana"]
            })
        );
    }

    #[test]
    fn test_generation_prompt_contains_context_and_sources() {
        let docs = vec![source("Notes", "Revenue grew.")];
        let prompt = generation_prompt(
            DocumentKind::Analysis,
            "Q3",
            &GenerationParameters::default(),
            SourceMaterial::Documents(&docs),
        )
        .unwrap();
        assert!(prompt.starts_with("Write the analysis document"));
        assert!(prompt.contains("\"title\": \"Q3\""));
        assert!(prompt.contains("Revenue grew."));
    }

    #[test]
    fn test_revision_prompt_embeds_current_version() {
        let version = Version {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            version_number: 4,
            content: "Old text".to_string(),
            punchlist: None,
            metadata: None,
            chat_id: None,
            created_by: Uuid::new_v4(),
            created_at_utc: Utc::now(),
        };
        let prompt = revision_prompt("Plan", &version, "Make it shorter");
        assert!(prompt.contains("Make it shorter"));
        assert!(prompt.contains("=== BEGIN CURRENT VERSION 4 ===\nOld text\n=== END CURRENT VERSION 4 ==="));
    }
}
