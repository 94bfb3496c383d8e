//! Generation pipeline: sources in, streamed increments out, one new version
//! persisted at the end.
//!
//! A pass resolves its source material, composes the prompt, forwards every
//! stream increment to a single observer while accumulating the text, and
//! hands the accumulated text to the version store once the stream ends.
//!
//! Cancellation (explicit token or dropped observer) stops forwarding. The
//! partial text is persisted only when
//! [`GenerationConfig::save_partial_on_cancel`] is set; otherwise a cancelled
//! pass leaves the document untouched and returns [`Error::Cancelled`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use folio_core::{
    defaults, DocumentRepository, Error, NewVersion, Result, SourceDocument,
    SourceDocumentResolver, StreamingCompletion, VersionRepository,
};

use crate::config::GenerationConfig;
use crate::prompt::{generation_prompt, revision_prompt, SourceMaterial};
use crate::request::{GenerationOutcome, GenerationRequest, GenerationSource, RevisionRequest};

/// Text accumulated from one completion stream.
#[derive(Debug)]
struct StreamedText {
    text: String,
    increments: usize,
    partial: bool,
}

/// Source material after resolution.
enum Resolved {
    Documents(Vec<SourceDocument>),
    Transcript(String),
}

impl Resolved {
    fn material(&self) -> SourceMaterial<'_> {
        match self {
            Self::Documents(docs) => SourceMaterial::Documents(docs),
            Self::Transcript(text) => SourceMaterial::Transcript(text),
        }
    }

    fn source_ids(&self) -> Vec<Uuid> {
        match self {
            Self::Documents(docs) => docs.iter().map(|d| d.id).collect(),
            Self::Transcript(_) => Vec::new(),
        }
    }
}

/// Runs generation and revision passes against the configured collaborators.
#[derive(Clone)]
pub struct GenerationPipeline {
    completion: Arc<dyn StreamingCompletion>,
    sources: Arc<dyn SourceDocumentResolver>,
    documents: Arc<dyn DocumentRepository>,
    versions: Arc<dyn VersionRepository>,
    config: GenerationConfig,
}

impl GenerationPipeline {
    pub fn new(
        completion: Arc<dyn StreamingCompletion>,
        sources: Arc<dyn SourceDocumentResolver>,
        documents: Arc<dyn DocumentRepository>,
        versions: Arc<dyn VersionRepository>,
    ) -> Self {
        Self {
            completion,
            sources,
            documents,
            versions,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate a new version of the owner's document from the request's
    /// sources, creating the document on the first pass.
    pub async fn generate(
        &self,
        req: GenerationRequest,
        observer: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<GenerationOutcome> {
        let start = Instant::now();
        let resolved = self.resolve_sources(&req).await?;
        let source_ids = resolved.source_ids();

        let title = if req.title.trim().is_empty() {
            defaults::UNTITLED_DOCUMENT.to_string()
        } else {
            req.title.clone()
        };
        let prompt = generation_prompt(req.kind, &title, &req.parameters, resolved.material())?;
        debug!(
            subsystem = "generation",
            component = "pipeline",
            op = "generate",
            owner_id = %req.owner_id,
            kind = %req.kind,
            source_count = source_ids.len(),
            prompt_len = prompt.len(),
            "Prompt composed"
        );

        let max_tokens = req.max_tokens.unwrap_or(self.config.max_tokens);
        let streamed = self
            .consume(&req.system_instruction, &prompt, max_tokens, &observer, &cancel)
            .await?;

        let mut metadata = Map::new();
        metadata.insert("kind".to_string(), json!(req.kind));
        metadata.insert("source_ids".to_string(), json!(source_ids));
        if matches!(resolved, Resolved::Transcript(_)) {
            metadata.insert("source".to_string(), json!("transcript"));
        }
        metadata.insert("parameters".to_string(), serde_json::to_value(&req.parameters)?);
        metadata.insert("model".to_string(), json!(self.completion.model_name()));
        if streamed.partial {
            metadata.insert("partial".to_string(), json!(true));
        }

        let outcome = self
            .documents
            .append_or_create(
                req.owner_id,
                req.workspace_id,
                req.author_id,
                &title,
                NewVersion::new(streamed.text).with_metadata(JsonValue::Object(metadata)),
            )
            .await?;

        info!(
            subsystem = "generation",
            component = "pipeline",
            op = "generate",
            document_id = %outcome.document.id,
            version_id = %outcome.version.id,
            version_number = outcome.version.version_number,
            is_first_version = outcome.is_first_version,
            partial = streamed.partial,
            increment_count = streamed.increments,
            duration_ms = start.elapsed().as_millis() as u64,
            "Generated version persisted"
        );

        Ok(GenerationOutcome {
            version_id: outcome.version.id,
            document_id: outcome.document.id,
            version_number: outcome.version.version_number,
            is_first_version: outcome.is_first_version,
            partial: streamed.partial,
        })
    }

    /// Rewrite the latest version of an existing document following a
    /// free-text instruction.
    pub async fn revise(
        &self,
        req: RevisionRequest,
        observer: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<GenerationOutcome> {
        let start = Instant::now();
        if req.instruction.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Revision instruction cannot be empty".to_string(),
            ));
        }

        let not_found = || Error::NotFound(format!("Document {} not found", req.document_id));
        let document = self
            .documents
            .get_document(req.document_id)
            .await?
            .filter(|d| d.workspace_id == req.workspace_id)
            .ok_or_else(not_found)?;
        let current = self
            .versions
            .get_latest_version(document.id)
            .await?
            .ok_or_else(not_found)?;

        let prompt = revision_prompt(&document.title, &current, &req.instruction);
        let max_tokens = req.max_tokens.unwrap_or(self.config.max_tokens);
        let streamed = self
            .consume(&req.system_instruction, &prompt, max_tokens, &observer, &cancel)
            .await?;

        let mut metadata = Map::new();
        metadata.insert("revision_of".to_string(), json!(current.id));
        metadata.insert(
            "base_version_number".to_string(),
            json!(current.version_number),
        );
        metadata.insert("instruction".to_string(), json!(req.instruction));
        metadata.insert("model".to_string(), json!(self.completion.model_name()));
        if streamed.partial {
            metadata.insert("partial".to_string(), json!(true));
        }

        let version = self
            .versions
            .create_version(
                document.id,
                req.author_id,
                NewVersion::new(streamed.text).with_metadata(JsonValue::Object(metadata)),
            )
            .await?;

        info!(
            subsystem = "generation",
            component = "pipeline",
            op = "revise",
            document_id = %document.id,
            version_id = %version.id,
            version_number = version.version_number,
            partial = streamed.partial,
            duration_ms = start.elapsed().as_millis() as u64,
            "Revised version persisted"
        );

        Ok(GenerationOutcome {
            version_id: version.id,
            document_id: document.id,
            version_number: version.version_number,
            is_first_version: false,
            partial: streamed.partial,
        })
    }

    /// Run [`Self::generate`] on a tokio task.
    pub fn spawn(&self, req: GenerationRequest) -> GenerationHandle {
        self.spawn_with(move |pipeline, tx, cancel| async move {
            pipeline.generate(req, tx, cancel).await
        })
    }

    /// Run [`Self::revise`] on a tokio task.
    pub fn spawn_revision(&self, req: RevisionRequest) -> GenerationHandle {
        self.spawn_with(move |pipeline, tx, cancel| async move {
            pipeline.revise(req, tx, cancel).await
        })
    }

    fn spawn_with<F, Fut>(&self, run: F) -> GenerationHandle
    where
        F: FnOnce(GenerationPipeline, mpsc::Sender<String>, CancellationToken) -> Fut,
        Fut: Future<Output = Result<GenerationOutcome>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(self.clone(), tx, cancel.clone()));
        GenerationHandle {
            increments: rx,
            cancel,
            task,
        }
    }

    async fn resolve_sources(&self, req: &GenerationRequest) -> Result<Resolved> {
        match &req.source {
            GenerationSource::Documents(ids) => {
                if ids.is_empty() {
                    return Err(Error::NoValidSource);
                }
                let docs = self.sources.resolve(req.workspace_id, ids).await?;
                if docs.is_empty() {
                    warn!(
                        subsystem = "generation",
                        component = "pipeline",
                        op = "resolve_sources",
                        requested = ids.len(),
                        "No source document resolved"
                    );
                    return Err(Error::NoValidSource);
                }
                if docs.len() < ids.len() {
                    warn!(
                        subsystem = "generation",
                        component = "pipeline",
                        op = "resolve_sources",
                        requested = ids.len(),
                        resolved = docs.len(),
                        "Some source documents did not resolve, continuing with the rest"
                    );
                }
                Ok(Resolved::Documents(docs))
            }
            GenerationSource::Transcript(text) => {
                if !req.kind.allows_inline_transcript() {
                    return Err(Error::InvalidInput(format!(
                        "{} documents cannot be generated from an inline transcript",
                        req.kind
                    )));
                }
                if text.trim().is_empty() {
                    return Err(Error::NoValidSource);
                }
                Ok(Resolved::Transcript(text.clone()))
            }
        }
    }

    /// Drive one completion stream to its end, forwarding increments.
    async fn consume(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        observer: &mpsc::Sender<String>,
        cancel: &CancellationToken,
    ) -> Result<StreamedText> {
        let mut acc = StreamedText {
            text: String::new(),
            increments: 0,
            partial: false,
        };

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.interrupted(acc),
            opened = self.completion.stream_completion(system, prompt, Some(max_tokens)) => {
                opened.map_err(into_generation_error)?
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.interrupted(acc),
                _ = observer.closed() => return self.interrupted(acc),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(increment)) => {
                    trace!(len = increment.len(), "Stream increment");
                    acc.text.push_str(&increment);
                    acc.increments += 1;
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return self.interrupted(acc),
                        sent = observer.send(increment) => sent,
                    };
                    if sent.is_err() {
                        return self.interrupted(acc);
                    }
                }
                Some(Err(e)) => {
                    warn!(
                        subsystem = "generation",
                        component = "pipeline",
                        op = "consume",
                        increment_count = acc.increments,
                        error = %e,
                        "Completion stream failed, nothing persisted"
                    );
                    return Err(into_generation_error(e));
                }
                None => return Ok(acc),
            }
        }
    }

    fn interrupted(&self, mut acc: StreamedText) -> Result<StreamedText> {
        if self.config.save_partial_on_cancel && !acc.text.is_empty() {
            info!(
                subsystem = "generation",
                component = "pipeline",
                increment_count = acc.increments,
                response_len = acc.text.len(),
                "Generation cancelled, keeping partial text"
            );
            acc.partial = true;
            return Ok(acc);
        }
        info!(
            subsystem = "generation",
            component = "pipeline",
            increment_count = acc.increments,
            "Generation cancelled, nothing persisted"
        );
        Err(Error::Cancelled)
    }
}

fn into_generation_error(e: Error) -> Error {
    match e {
        Error::Generation(_) => e,
        other => Error::Generation(other.to_string()),
    }
}

/// A generation pass running on its own task.
///
/// Dropping `increments` cancels the pass, so callers that do not care about
/// the live text should use [`GenerationHandle::finish`].
pub struct GenerationHandle {
    pub increments: mpsc::Receiver<String>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<Result<GenerationOutcome>>,
}

impl GenerationHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next increment, or `None` once the stream is over.
    pub async fn next_increment(&mut self) -> Option<String> {
        self.increments.recv().await
    }

    /// Drain remaining increments and wait for the outcome.
    pub async fn finish(mut self) -> Result<GenerationOutcome> {
        while self.increments.recv().await.is_some() {}
        self.join().await
    }

    /// Wait for the outcome without draining. Pending increments are dropped,
    /// which cancels a pass that is still streaming.
    pub async fn join(self) -> Result<GenerationOutcome> {
        let Self { increments, task, .. } = self;
        drop(increments);
        task.await
            .map_err(|e| Error::Generation(format!("Generation task failed: {}", e)))?
    }
}
