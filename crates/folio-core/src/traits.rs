//! Core traits for folio abstractions.
//!
//! Repositories are implemented over PostgreSQL in `folio-db`; the completion
//! backend lives in `folio-inference`. Keeping the seams here lets the
//! generation pipeline run against in-memory fakes in tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// VERSION STORE
// =============================================================================

/// Append-only version storage.
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// Append a version, carrying the latest punchlist forward unless one is
    /// supplied, and touch the document's `updated_at_utc`.
    async fn create_version(
        &self,
        document_id: Uuid,
        author_id: Uuid,
        version: NewVersion,
    ) -> Result<Version>;

    /// Most recent version, or `None` for a document without versions.
    async fn get_latest_version(&self, document_id: Uuid) -> Result<Option<Version>>;

    /// All versions, newest first.
    async fn list_versions(&self, document_id: Uuid) -> Result<Vec<Version>>;

    /// Fetch a single version by id.
    async fn get_version(&self, version_id: Uuid) -> Result<Option<Version>>;
}

// =============================================================================
// DOCUMENT LIFECYCLE
// =============================================================================

/// Document creation, lookup, and cascading deletion.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert the document, its first version, and the owner's reference in
    /// one transaction.
    async fn create_document(
        &self,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        req: CreateDocumentRequest,
    ) -> Result<DocumentWithVersion>;

    /// Append to the owner's document, creating it (with `title`) when the
    /// owner has none yet.
    async fn append_or_create(
        &self,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        title: &str,
        version: NewVersion,
    ) -> Result<AppendOutcome>;

    /// Delete versions, owner references, and the document. Missing documents
    /// and documents the caller may not delete are reported identically.
    async fn delete_document(&self, document_id: Uuid, author_id: Uuid) -> Result<()>;

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>>;

    /// Document currently referenced by the owner, if any.
    async fn find_by_owner(&self, owner_id: Uuid, workspace_id: Uuid)
        -> Result<Option<Document>>;
}

// =============================================================================
// SESSION BINDING
// =============================================================================

/// One authoring session, one version.
#[async_trait]
pub trait ChatBindingRepository: Send + Sync {
    /// Mint the session's version (creating the document on first use) and
    /// bind it. A session that is already bound gets its existing binding back.
    async fn initialize_version_for_chat(
        &self,
        chat_id: Uuid,
        owner_id: Uuid,
        author_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<ChatVersionBinding>;

    async fn get_version_by_chat_id(&self, chat_id: Uuid) -> Result<Option<Version>>;
}

// =============================================================================
// PUBLICATION
// =============================================================================

/// Draft/published/searchable transitions on envelopes.
#[async_trait]
pub trait PublicationRepository: Send + Sync {
    /// Create a document with version 1 installed as its draft.
    async fn create_envelope(
        &self,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        req: CreateDocumentRequest,
    ) -> Result<Envelope>;

    async fn get_envelope(&self, envelope_id: Uuid) -> Result<Option<Envelope>>;

    async fn publish(
        &self,
        envelope_id: Uuid,
        version_id: Uuid,
        make_searchable: bool,
    ) -> Result<Envelope>;

    async fn unpublish(&self, envelope_id: Uuid) -> Result<Envelope>;

    /// Flip the searchable flag; returns the new value.
    async fn toggle_searchable(&self, envelope_id: Uuid) -> Result<bool>;

    /// Existing draft, or a fresh clone of the published version.
    async fn create_standalone_draft(&self, envelope_id: Uuid, author_id: Uuid)
        -> Result<Version>;

    async fn discard_draft(&self, envelope_id: Uuid) -> Result<Envelope>;
}

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Resolves source-document ids to their content.
#[async_trait]
pub trait SourceDocumentResolver: Send + Sync {
    /// Ids that do not resolve (missing, other workspace) are omitted.
    async fn resolve(&self, workspace_id: Uuid, ids: &[Uuid]) -> Result<Vec<SourceDocument>>;
}

/// Stream of generated text increments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Completion service that streams its output.
#[async_trait]
pub trait StreamingCompletion: Send + Sync {
    /// Open a completion stream. Failures, including mid-stream failures,
    /// surface as `Error::Generation`.
    async fn stream_completion(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> Result<TokenStream>;

    fn model_name(&self) -> &str;
}
