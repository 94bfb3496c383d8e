//! folio: operator CLI for the document engine.
//!
//! Runs generation and revision passes (streaming the text to stdout),
//! inspects version history, and drives the publication state machine.
//! Logs go to stderr (or `LOG_FILE`) so stdout carries only command output.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use folio_db::{Database, DocumentRepository, PoolConfig, PublicationRepository};
use folio_generation::{
    DocumentKind, GenerationConfig, GenerationHandle, GenerationParameters, GenerationPipeline,
    GenerationRequest, GenerationSource, RevisionRequest,
};
use folio_inference::OpenAIBackend;

#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about = "Versioned documents and publication for folio")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost/folio")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Generate a new version of an owner's document
    Generate {
        /// Owning objective
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        workspace: Uuid,
        #[arg(long)]
        author: Uuid,
        /// goal, summary or analysis
        #[arg(long, default_value = "summary")]
        kind: DocumentKind,
        /// Title used when the owner has no document yet
        #[arg(long, default_value = "")]
        title: String,
        /// Source document ids (repeatable)
        #[arg(long = "source", num_args = 1..)]
        sources: Vec<Uuid>,
        /// Read an inline transcript from this file instead of source ids
        #[arg(long, conflicts_with = "sources")]
        transcript: Option<PathBuf>,
        /// Meeting or reference date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Participant names (repeatable)
        #[arg(long = "participant")]
        participants: Vec<String>,
        /// Extra parameter as key=value (repeatable)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// File holding the style instruction
        #[arg(long)]
        system_file: Option<PathBuf>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Revise the latest version of a document
    Revise {
        #[arg(long)]
        document: Uuid,
        #[arg(long)]
        workspace: Uuid,
        #[arg(long)]
        author: Uuid,
        /// What to change
        #[arg(long)]
        instruction: String,
        #[arg(long)]
        system_file: Option<PathBuf>,
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// List versions of a document, newest first
    History {
        #[arg(long)]
        document: Uuid,
        #[arg(long, default_value_t = folio_core::defaults::HISTORY_PAGE_LIMIT)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Show a unified diff between two versions
    Diff {
        #[arg(long)]
        document: Uuid,
        #[arg(long)]
        from: i32,
        #[arg(long)]
        to: i32,
    },

    /// Publish the envelope's draft
    Publish {
        #[arg(long)]
        envelope: Uuid,
        /// Version to publish (must be the current draft)
        #[arg(long = "version-id")]
        version_id: Uuid,
        #[arg(long)]
        searchable: bool,
    },

    /// Clear the published slot
    Unpublish {
        #[arg(long)]
        envelope: Uuid,
    },

    /// Flip the searchable flag of the published version
    ToggleSearchable {
        #[arg(long)]
        envelope: Uuid,
    },

    /// Get the envelope's draft, cloning the published version if needed
    Draft {
        #[arg(long)]
        envelope: Uuid,
        #[arg(long)]
        author: Uuid,
    },

    /// Clear the draft slot
    DiscardDraft {
        #[arg(long)]
        envelope: Uuid,
    },

    /// Delete a document with all its versions
    Delete {
        #[arg(long)]
        document: Uuid,
        #[arg(long)]
        author: Uuid,
    },
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn read_optional(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read {}", p.display())),
        None => Ok(String::new()),
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   RUST_LOG    - standard env filter (default: info for every folio crate)
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "folio=info,folio_generation=info,folio_db=info,folio_inference=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("folio.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        None
    }
}

fn build_pipeline(db: &Database) -> anyhow::Result<GenerationPipeline> {
    let backend = OpenAIBackend::from_env().context("Failed to configure completion backend")?;
    Ok(GenerationPipeline::new(
        Arc::new(backend),
        Arc::new(db.sources.clone()),
        Arc::new(db.documents.clone()),
        Arc::new(db.versions.clone()),
    )
    .with_config(GenerationConfig::from_env()))
}

/// Print increments as they arrive; Ctrl-C cancels the pass.
async fn stream_to_stdout(mut handle: GenerationHandle) -> anyhow::Result<()> {
    let cancel = handle.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    while let Some(increment) = handle.next_increment().await {
        stdout.write_all(increment.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    let outcome = handle.join().await?;
    eprintln!(
        "document {} version {} ({}){}",
        outcome.document_id,
        outcome.version_number,
        outcome.version_id,
        if outcome.partial { " [partial]" } else { "" }
    );
    Ok(())
}

fn print_envelope(envelope: &folio_core::Envelope) {
    println!(
        "{} state={:?} draft={} published={} searchable={} indexed={}",
        envelope.id(),
        envelope.slots.state(),
        envelope
            .slots
            .draft_version_id
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string()),
        envelope
            .slots
            .published_version_id
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string()),
        envelope.slots.searchable,
        envelope.slots.is_indexed()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();

    let cli = Cli::parse();
    let db = Database::connect_with_config(&cli.database_url, PoolConfig::from_env())
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Migrate => {
            db.migrate().await?;
            info!(subsystem = "cli", op = "migrate", "Migrations applied");
        }
        Commands::Generate {
            owner,
            workspace,
            author,
            kind,
            title,
            sources,
            transcript,
            date,
            participants,
            fields,
            system_file,
            max_tokens,
        } => {
            let source = match transcript {
                Some(path) => GenerationSource::Transcript(read_optional(Some(path.as_path()))?),
                None => GenerationSource::Documents(sources),
            };
            let parameters = GenerationParameters {
                date,
                participants,
                fields: fields
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect::<BTreeMap<_, _>>(),
            };
            let mut req = GenerationRequest::new(owner, workspace, author, kind, source)
                .with_title(title)
                .with_parameters(parameters)
                .with_system_instruction(read_optional(system_file.as_deref())?);
            req.max_tokens = max_tokens;

            let pipeline = build_pipeline(&db)?;
            stream_to_stdout(pipeline.spawn(req)).await?;
        }
        Commands::Revise {
            document,
            workspace,
            author,
            instruction,
            system_file,
            max_tokens,
        } => {
            let mut req = RevisionRequest::new(document, workspace, author, instruction)
                .with_system_instruction(read_optional(system_file.as_deref())?);
            req.max_tokens = max_tokens;

            let pipeline = build_pipeline(&db)?;
            stream_to_stdout(pipeline.spawn_revision(req)).await?;
        }
        Commands::History {
            document,
            limit,
            offset,
        } => {
            let summaries = db
                .versions
                .list_version_summaries(document, limit, offset)
                .await?;
            if summaries.is_empty() {
                bail!("No versions found for document {}", document);
            }
            for s in summaries {
                println!(
                    "v{:<4} {} {} {:>7} chars{}{}",
                    s.version_number,
                    s.id,
                    s.created_at_utc.format("%Y-%m-%d %H:%M:%S"),
                    s.content_len,
                    if s.has_punchlist { " +punchlist" } else { "" },
                    s.chat_id
                        .map(|c| format!(" chat={}", c))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Diff { document, from, to } => {
            print!("{}", db.versions.diff_versions(document, from, to).await?);
        }
        Commands::Publish {
            envelope,
            version_id,
            searchable,
        } => {
            print_envelope(
                &db.publication
                    .publish(envelope, version_id, searchable)
                    .await?,
            );
        }
        Commands::Unpublish { envelope } => {
            print_envelope(&db.publication.unpublish(envelope).await?);
        }
        Commands::ToggleSearchable { envelope } => {
            let searchable = db.publication.toggle_searchable(envelope).await?;
            println!("{} searchable={}", envelope, searchable);
        }
        Commands::Draft { envelope, author } => {
            let draft = db
                .publication
                .create_standalone_draft(envelope, author)
                .await?;
            println!("draft {} (version {})", draft.id, draft.version_number);
        }
        Commands::DiscardDraft { envelope } => {
            print_envelope(&db.publication.discard_draft(envelope).await?);
        }
        Commands::Delete { document, author } => {
            db.documents.delete_document(document, author).await?;
            println!("deleted {}", document);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("department=Sales").unwrap(),
            ("department".to_string(), "Sales".to_string())
        );
        assert_eq!(
            parse_field("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_field("novalue").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn test_generate_args_parse() {
        let owner = Uuid::new_v4();
        let ws = Uuid::new_v4();
        let author = Uuid::new_v4();
        let src = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "folio",
            "generate",
            "--owner",
            &owner.to_string(),
            "--workspace",
            &ws.to_string(),
            "--author",
            &author.to_string(),
            "--kind",
            "analysis",
            "--source",
            &src.to_string(),
            "--field",
            "horizon=Q4",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                kind,
                sources,
                fields,
                ..
            } => {
                assert_eq!(kind, DocumentKind::Analysis);
                assert_eq!(sources, vec![src]);
                assert_eq!(fields, vec![("horizon".to_string(), "Q4".to_string())]);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_publish_args_parse() {
        let envelope = Uuid::new_v4();
        let version = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "folio",
            "publish",
            "--envelope",
            &envelope.to_string(),
            "--version-id",
            &version.to_string(),
            "--searchable",
        ])
        .unwrap();
        match cli.command {
            Commands::Publish {
                envelope: e,
                version_id,
                searchable,
            } => {
                assert_eq!(e, envelope);
                assert_eq!(version_id, version);
                assert!(searchable);
            }
            _ => panic!("expected publish"),
        }
    }
}
