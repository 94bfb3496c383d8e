//! Envelope persistence for the draft/published/searchable state machine.
//!
//! Transition rules live in [`PublicationSlots`]; this module loads the slots
//! under a row lock, applies the transition, and writes the result back in the
//! same transaction. An invalid transition leaves the row untouched.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use folio_core::{
    CreateDocumentRequest, Document, DocumentEvent, DraftSource, Envelope, Error, EventBus,
    NewVersion, PublicationRepository, PublicationSlots, Result, SearchableVersion, Version,
};

use crate::documents::PgDocumentRepository;
use crate::versions::PgVersionRepository;

#[derive(sqlx::FromRow)]
struct EnvelopeRow {
    id: Uuid,
    workspace_id: Uuid,
    title: String,
    created_by: Uuid,
    created_at_utc: DateTime<Utc>,
    updated_at_utc: DateTime<Utc>,
    draft_version_id: Option<Uuid>,
    published_version_id: Option<Uuid>,
    searchable: bool,
}

impl From<EnvelopeRow> for Envelope {
    fn from(row: EnvelopeRow) -> Self {
        Envelope {
            document: Document {
                id: row.id,
                workspace_id: row.workspace_id,
                title: row.title,
                created_by: row.created_by,
                created_at_utc: row.created_at_utc,
                updated_at_utc: row.updated_at_utc,
            },
            slots: PublicationSlots {
                draft_version_id: row.draft_version_id,
                published_version_id: row.published_version_id,
                searchable: row.searchable,
            },
        }
    }
}

const ENVELOPE_SELECT: &str = r#"
    SELECT d.id, d.workspace_id, d.title, d.created_by, d.created_at_utc, d.updated_at_utc,
           p.draft_version_id, p.published_version_id, p.searchable
    FROM document_publication p
    JOIN document d ON d.id = p.document_id
    WHERE p.document_id = $1
"#;

/// PostgreSQL implementation of [`PublicationRepository`].
#[derive(Clone)]
pub struct PgPublicationRepository {
    pool: PgPool,
    documents: PgDocumentRepository,
    versions: PgVersionRepository,
    events: EventBus,
}

impl PgPublicationRepository {
    pub fn new(
        pool: PgPool,
        documents: PgDocumentRepository,
        versions: PgVersionRepository,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            documents,
            versions,
            events,
        }
    }

    /// Load an envelope with its publication row locked.
    async fn lock_envelope_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        envelope_id: Uuid,
    ) -> Result<Envelope> {
        let row: Option<EnvelopeRow> =
            sqlx::query_as(&format!("{} FOR UPDATE OF p", ENVELOPE_SELECT))
                .bind(envelope_id)
                .fetch_optional(&mut **tx)
                .await?;
        row.map(Envelope::from)
            .ok_or_else(|| Error::NotFound(format!("envelope {}", envelope_id)))
    }

    async fn write_slots_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        envelope_id: Uuid,
        before: PublicationSlots,
        after: PublicationSlots,
    ) -> Result<()> {
        let newly_published = after.published_version_id.is_some()
            && after.published_version_id != before.published_version_id;

        sqlx::query(
            r#"
            UPDATE document_publication
            SET draft_version_id = $2,
                published_version_id = $3,
                searchable = $4,
                published_at_utc = CASE
                    WHEN $5 THEN NOW()
                    WHEN $3 IS NULL THEN NULL
                    ELSE published_at_utc
                END,
                updated_at_utc = NOW()
            WHERE document_id = $1
            "#,
        )
        .bind(envelope_id)
        .bind(after.draft_version_id)
        .bind(after.published_version_id)
        .bind(after.searchable)
        .bind(newly_published)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Apply a slot transition under the envelope's row lock.
    async fn transition<F>(&self, envelope_id: Uuid, op: &'static str, apply: F) -> Result<Envelope>
    where
        F: FnOnce(PublicationSlots) -> Result<PublicationSlots> + Send,
    {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;
        let mut envelope = self.lock_envelope_tx(&mut tx, envelope_id).await?;

        let before = envelope.slots;
        let after = apply(before)?;
        self.write_slots_tx(&mut tx, envelope_id, before, after)
            .await?;
        tx.commit().await?;

        envelope.slots = after;
        info!(
            subsystem = "db",
            component = "publication",
            op = op,
            document_id = %envelope_id,
            state = ?after.state(),
            searchable = after.searchable,
            indexed = after.is_indexed(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Publication state changed"
        );
        self.emit_changed(&envelope);
        Ok(envelope)
    }

    fn emit_changed(&self, envelope: &Envelope) {
        self.events.emit(DocumentEvent::PublicationChanged {
            workspace_id: envelope.document.workspace_id,
            document_id: envelope.id(),
            draft_version_id: envelope.slots.draft_version_id,
            published_version_id: envelope.slots.published_version_id,
            searchable: envelope.slots.searchable,
        });
    }

    /// Layer publication state onto an existing document with empty slots.
    ///
    /// Attaching an already attached document returns its current envelope.
    pub async fn attach_envelope(&self, document_id: Uuid) -> Result<Envelope> {
        let mut tx = self.pool.begin().await?;
        if self
            .documents
            .get_document_tx(&mut tx, document_id)
            .await?
            .is_none()
        {
            return Err(Error::NotFound(format!("document {}", document_id)));
        }

        let inserted = sqlx::query(
            "INSERT INTO document_publication (document_id) VALUES ($1) ON CONFLICT (document_id) DO NOTHING",
        )
        .bind(document_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let envelope = self.lock_envelope_tx(&mut tx, document_id).await?;
        tx.commit().await?;

        debug!(
            subsystem = "db",
            component = "publication",
            op = "attach_envelope",
            document_id = %document_id,
            attached = inserted > 0,
            "Envelope attached"
        );
        Ok(envelope)
    }

    /// Published, searchable versions in a workspace, most recently published first.
    pub async fn list_searchable(&self, workspace_id: Uuid) -> Result<Vec<SearchableVersion>> {
        let rows = sqlx::query_as(
            r#"
            SELECT d.id AS document_id, d.workspace_id, d.title,
                   v.id AS version_id, v.version_number, v.content,
                   COALESCE(p.published_at_utc, p.updated_at_utc) AS published_at_utc
            FROM document_publication p
            JOIN document d ON d.id = p.document_id
            JOIN document_version v ON v.id = p.published_version_id
            WHERE p.searchable AND d.workspace_id = $1
            ORDER BY published_at_utc DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl PublicationRepository for PgPublicationRepository {
    async fn create_envelope(
        &self,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        req: CreateDocumentRequest,
    ) -> Result<Envelope> {
        let mut tx = self.pool.begin().await?;
        let created = self
            .documents
            .create_document_tx(&mut tx, owner_id, workspace_id, author_id, req)
            .await?;

        let slots = PublicationSlots::with_draft(created.version.id);
        sqlx::query(
            "INSERT INTO document_publication (document_id, draft_version_id) VALUES ($1, $2)",
        )
        .bind(created.document.id)
        .bind(created.version.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let envelope = Envelope {
            document: created.document,
            slots,
        };
        info!(
            subsystem = "db",
            component = "publication",
            op = "create_envelope",
            workspace_id = %workspace_id,
            owner_id = %owner_id,
            document_id = %envelope.id(),
            version_id = %created.version.id,
            "Envelope created with draft"
        );
        self.events.emit(DocumentEvent::DocumentCreated {
            workspace_id,
            owner_id: Some(owner_id),
            document_id: envelope.id(),
            version_id: created.version.id,
        });
        self.emit_changed(&envelope);
        Ok(envelope)
    }

    async fn get_envelope(&self, envelope_id: Uuid) -> Result<Option<Envelope>> {
        let row: Option<EnvelopeRow> = sqlx::query_as(ENVELOPE_SELECT)
            .bind(envelope_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Envelope::from))
    }

    async fn publish(
        &self,
        envelope_id: Uuid,
        version_id: Uuid,
        make_searchable: bool,
    ) -> Result<Envelope> {
        self.transition(envelope_id, "publish", |slots| {
            slots.publish(version_id, make_searchable)
        })
        .await
    }

    async fn unpublish(&self, envelope_id: Uuid) -> Result<Envelope> {
        self.transition(envelope_id, "unpublish", PublicationSlots::unpublish)
            .await
    }

    async fn toggle_searchable(&self, envelope_id: Uuid) -> Result<bool> {
        let envelope = self
            .transition(
                envelope_id,
                "toggle_searchable",
                PublicationSlots::toggle_searchable,
            )
            .await?;
        Ok(envelope.slots.searchable)
    }

    async fn create_standalone_draft(
        &self,
        envelope_id: Uuid,
        author_id: Uuid,
    ) -> Result<Version> {
        let mut tx = self.pool.begin().await?;
        let mut envelope = self.lock_envelope_tx(&mut tx, envelope_id).await?;

        let published_id = match envelope.slots.draft_source()? {
            DraftSource::Existing(draft_id) => {
                let draft = self
                    .versions
                    .get_version_tx(&mut tx, draft_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("version {}", draft_id)))?;
                tx.commit().await?;
                debug!(
                    subsystem = "db",
                    component = "publication",
                    op = "create_standalone_draft",
                    document_id = %envelope_id,
                    version_id = %draft_id,
                    "Returning existing draft"
                );
                return Ok(draft);
            }
            DraftSource::CloneFrom(published_id) => published_id,
        };

        let published = self
            .versions
            .get_version_tx(&mut tx, published_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("version {}", published_id)))?;

        let clone = NewVersion::new(published.content)
            .with_metadata(json!({ "cloned_from": published_id }));
        let (draft, workspace_id) = self
            .versions
            .append_tx(&mut tx, envelope_id, author_id, clone, None)
            .await?;

        let before = envelope.slots;
        let after = before.set_draft(draft.id)?;
        self.write_slots_tx(&mut tx, envelope_id, before, after)
            .await?;
        tx.commit().await?;

        envelope.slots = after;
        info!(
            subsystem = "db",
            component = "publication",
            op = "create_standalone_draft",
            document_id = %envelope_id,
            version_id = %draft.id,
            version_number = draft.version_number,
            "Draft cloned from published version"
        );
        self.events.emit(DocumentEvent::VersionCreated {
            workspace_id,
            document_id: envelope_id,
            version_id: draft.id,
            version_number: draft.version_number,
        });
        self.emit_changed(&envelope);
        Ok(draft)
    }

    async fn discard_draft(&self, envelope_id: Uuid) -> Result<Envelope> {
        self.transition(envelope_id, "discard_draft", PublicationSlots::discard_draft)
            .await
    }
}
