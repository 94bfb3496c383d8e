//! Document lifecycle: atomic creation with the first version, owner linking,
//! and cascading deletion.
//!
//! The owner of a document is an `objective` row whose `document_id` points at
//! it. Creation and append-or-create lock the objective row so two writers
//! cannot both decide the owner has no document yet.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use folio_core::{
    new_v7, AppendOutcome, CreateDocumentRequest, Document, DocumentEvent, DocumentRepository,
    DocumentWithVersion, Error, EventBus, NewVersion, Result, Version,
};

use crate::versions::PgVersionRepository;

const DOCUMENT_COLUMNS: &str = "id, workspace_id, title, created_by, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of [`DocumentRepository`].
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
    versions: PgVersionRepository,
    events: EventBus,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool, versions: PgVersionRepository, events: EventBus) -> Self {
        Self {
            pool,
            versions,
            events,
        }
    }

    /// Lock the objective and return its current document reference.
    ///
    /// `None` when the objective does not exist in the workspace.
    pub(crate) async fn lock_owner_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Option<Option<Uuid>>> {
        let row: Option<(Option<Uuid>,)> = sqlx::query_as(
            "SELECT document_id FROM objective WHERE id = $1 AND workspace_id = $2 FOR UPDATE",
        )
        .bind(owner_id)
        .bind(workspace_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|(document_id,)| document_id))
    }

    async fn insert_document_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        workspace_id: Uuid,
        author_id: Uuid,
        title: &str,
    ) -> Result<Document> {
        let document = sqlx::query_as(&format!(
            r#"
            INSERT INTO document (id, workspace_id, title, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(new_v7())
        .bind(workspace_id)
        .bind(title)
        .bind(author_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(document)
    }

    async fn link_owner_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        document_id: Uuid,
    ) -> Result<()> {
        sqlx::query("UPDATE objective SET document_id = $2 WHERE id = $1")
            .bind(owner_id)
            .bind(document_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Insert a document, its version 1, and link it to an owner that must
    /// already be locked and known to have no document.
    ///
    /// `chat_id` is recorded on version 1 when a session mints it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn create_linked_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        title: &str,
        version: NewVersion,
        chat_id: Option<Uuid>,
    ) -> Result<(Document, Version)> {
        let inserted = self
            .insert_document_tx(tx, workspace_id, author_id, title)
            .await?;
        let (version, _) = self
            .versions
            .append_tx(tx, inserted.id, author_id, version, chat_id)
            .await?;
        self.link_owner_tx(tx, owner_id, inserted.id).await?;

        // Re-read so updated_at_utc reflects the version touch.
        let document = self
            .get_document_tx(tx, inserted.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", inserted.id)))?;
        Ok((document, version))
    }

    /// Transaction-aware variant of `create_document`.
    pub async fn create_document_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        req: CreateDocumentRequest,
    ) -> Result<DocumentWithVersion> {
        match self.lock_owner_tx(tx, owner_id, workspace_id).await? {
            None => return Err(Error::NotFound(format!("objective {}", owner_id))),
            Some(Some(existing)) => {
                return Err(Error::InvalidState(format!(
                    "objective {} already owns document {}",
                    owner_id, existing
                )))
            }
            Some(None) => {}
        }

        let mut version = NewVersion::new(req.content);
        version.metadata = req.metadata;

        let (document, version) = self
            .create_linked_tx(
                tx,
                owner_id,
                workspace_id,
                author_id,
                &req.title,
                version,
                None,
            )
            .await?;
        Ok(DocumentWithVersion { document, version })
    }

    /// Transaction-aware variant of `append_or_create`.
    pub async fn append_or_create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        title: &str,
        version: NewVersion,
    ) -> Result<AppendOutcome> {
        let existing = self
            .lock_owner_tx(tx, owner_id, workspace_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("objective {}", owner_id)))?;

        match existing {
            Some(document_id) => {
                let (version, _) = self
                    .versions
                    .append_tx(tx, document_id, author_id, version, None)
                    .await?;
                let document = self
                    .get_document_tx(tx, document_id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;
                Ok(AppendOutcome {
                    document,
                    version,
                    is_first_version: false,
                })
            }
            None => {
                let (document, version) = self
                    .create_linked_tx(tx, owner_id, workspace_id, author_id, title, version, None)
                    .await?;
                Ok(AppendOutcome {
                    document,
                    version,
                    is_first_version: true,
                })
            }
        }
    }

    pub async fn get_document_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
    ) -> Result<Option<Document>> {
        let document = sqlx::query_as(&format!(
            "SELECT {} FROM document WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(document)
    }

    /// Transaction-aware variant of `delete_document`.
    ///
    /// Returns the workspace id and the owners whose reference was cleared.
    pub async fn delete_document_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        author_id: Uuid,
    ) -> Result<(Uuid, Vec<Uuid>)> {
        let accessible: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT d.workspace_id
            FROM document d
            JOIN workspace w ON w.id = d.workspace_id
            WHERE d.id = $1 AND w.owner_id = $2
            FOR UPDATE OF d
            "#,
        )
        .bind(document_id)
        .bind(author_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (workspace_id,) =
            accessible.ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;

        sqlx::query("DELETE FROM document_publication WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await?;

        let unbound = sqlx::query(
            r#"
            UPDATE chat SET version_id = NULL
            WHERE version_id IN (SELECT id FROM document_version WHERE document_id = $1)
            "#,
        )
        .bind(document_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        let versions = sqlx::query("DELETE FROM document_version WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        let owners: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE objective SET document_id = NULL WHERE document_id = $1 RETURNING id",
        )
        .bind(document_id)
        .fetch_all(&mut **tx)
        .await?;

        sqlx::query("DELETE FROM document WHERE id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await?;

        debug!(
            subsystem = "db",
            component = "documents",
            document_id = %document_id,
            versions_deleted = versions,
            chats_unbound = unbound,
            owners_cleared = owners.len(),
            "Cascade delete applied"
        );

        Ok((workspace_id, owners.into_iter().map(|(id,)| id).collect()))
    }

    /// Change the title. Content history is unaffected.
    pub async fn rename_document(&self, document_id: Uuid, title: &str) -> Result<Document> {
        let document: Option<Document> = sqlx::query_as(&format!(
            r#"
            UPDATE document SET title = $2, updated_at_utc = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        let document = document.ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;

        info!(
            subsystem = "db",
            component = "documents",
            op = "rename",
            document_id = %document_id,
            "Document renamed"
        );
        self.events.emit(DocumentEvent::DocumentRenamed {
            workspace_id: document.workspace_id,
            document_id,
        });
        Ok(document)
    }

    /// Clear an objective's document reference without touching history.
    ///
    /// Returns the document that was unlinked, or `None` if there was none.
    pub async fn unlink_owner(&self, owner_id: Uuid, workspace_id: Uuid) -> Result<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;
        let previous = self
            .lock_owner_tx(&mut tx, owner_id, workspace_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("objective {}", owner_id)))?;

        if let Some(document_id) = previous {
            sqlx::query("UPDATE objective SET document_id = NULL WHERE id = $1")
                .bind(owner_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            info!(
                subsystem = "db",
                component = "documents",
                op = "unlink_owner",
                owner_id = %owner_id,
                document_id = %document_id,
                "Owner unlinked from document"
            );
            self.events.emit(DocumentEvent::OwnerUnlinked {
                workspace_id,
                owner_id,
                document_id,
            });
        }
        Ok(previous)
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn create_document(
        &self,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        req: CreateDocumentRequest,
    ) -> Result<DocumentWithVersion> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;
        let created = self
            .create_document_tx(&mut tx, owner_id, workspace_id, author_id, req)
            .await?;
        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "documents",
            op = "create_document",
            workspace_id = %workspace_id,
            owner_id = %owner_id,
            document_id = %created.document.id,
            version_id = %created.version.id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document created"
        );
        self.events.emit(DocumentEvent::DocumentCreated {
            workspace_id,
            owner_id: Some(owner_id),
            document_id: created.document.id,
            version_id: created.version.id,
        });
        Ok(created)
    }

    async fn append_or_create(
        &self,
        owner_id: Uuid,
        workspace_id: Uuid,
        author_id: Uuid,
        title: &str,
        version: NewVersion,
    ) -> Result<AppendOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = self
            .append_or_create_tx(&mut tx, owner_id, workspace_id, author_id, title, version)
            .await?;
        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "documents",
            op = "append_or_create",
            owner_id = %owner_id,
            document_id = %outcome.document.id,
            version_id = %outcome.version.id,
            version_number = outcome.version.version_number,
            created = outcome.is_first_version,
            "Version appended to owner document"
        );
        self.events.emit(if outcome.is_first_version {
            DocumentEvent::DocumentCreated {
                workspace_id,
                owner_id: Some(owner_id),
                document_id: outcome.document.id,
                version_id: outcome.version.id,
            }
        } else {
            DocumentEvent::VersionCreated {
                workspace_id,
                document_id: outcome.document.id,
                version_id: outcome.version.id,
                version_number: outcome.version.version_number,
            }
        });
        Ok(outcome)
    }

    async fn delete_document(&self, document_id: Uuid, author_id: Uuid) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;
        let (workspace_id, owner_ids) = self
            .delete_document_tx(&mut tx, document_id, author_id)
            .await?;
        tx.commit().await?;

        info!(
            subsystem = "db",
            component = "documents",
            op = "delete_document",
            workspace_id = %workspace_id,
            document_id = %document_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document deleted"
        );
        self.events.emit(DocumentEvent::DocumentDeleted {
            workspace_id,
            document_id,
            owner_ids,
        });
        Ok(())
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>> {
        let document = sqlx::query_as(&format!(
            "SELECT {} FROM document WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(document)
    }

    async fn find_by_owner(
        &self,
        owner_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<Option<Document>> {
        let document = sqlx::query_as(
            r#"
            SELECT d.id, d.workspace_id, d.title, d.created_by, d.created_at_utc, d.updated_at_utc
            FROM objective o
            JOIN document d ON d.id = o.document_id
            WHERE o.id = $1 AND o.workspace_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(document)
    }
}
