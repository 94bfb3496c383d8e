//! Session binding: one chat, one version.
//!
//! A chat row carries at most one `version_id` and the `uq_chat_version`
//! constraint keeps two chats from ever pointing at the same version. Binding
//! happens inside a transaction that holds the chat row lock, so concurrent
//! initialisation of the same chat cannot mint two versions.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use folio_core::{
    defaults, ChatBindingRepository, ChatVersionBinding, DocumentEvent, Error, EventBus,
    NewVersion, Result, Version,
};

use crate::documents::PgDocumentRepository;
use crate::versions::PgVersionRepository;

/// PostgreSQL implementation of [`ChatBindingRepository`].
#[derive(Clone)]
pub struct PgChatBindingRepository {
    pool: PgPool,
    documents: PgDocumentRepository,
    versions: PgVersionRepository,
    events: EventBus,
}

/// Binding result plus what the commit needs to announce.
struct BindOutcome {
    binding: ChatVersionBinding,
    newly_bound: bool,
}

impl PgChatBindingRepository {
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

    async fn bind_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        chat_id: Uuid,
        owner_id: Uuid,
        author_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<BindOutcome> {
        let chat: Option<(Option<Uuid>,)> = sqlx::query_as(
            "SELECT version_id FROM chat WHERE id = $1 AND workspace_id = $2 FOR UPDATE",
        )
        .bind(chat_id)
        .bind(workspace_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (bound,) = chat.ok_or_else(|| Error::NotFound(format!("chat {}", chat_id)))?;

        if let Some(version_id) = bound {
            let version = self
                .versions
                .get_version_tx(tx, version_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("version {}", version_id)))?;

            debug!(
                subsystem = "db",
                component = "chats",
                chat_id = %chat_id,
                version_id = %version_id,
                "Chat already bound, returning existing binding"
            );
            return Ok(BindOutcome {
                binding: ChatVersionBinding {
                    version_id,
                    document_id: version.document_id,
                    is_first_version: version.version_number == 1,
                },
                newly_bound: false,
            });
        }

        let existing = self
            .documents
            .lock_owner_tx(tx, owner_id, workspace_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("objective {}", owner_id)))?;

        let (version, is_first_version) = match existing {
            Some(document_id) => {
                let (version, _) = self
                    .versions
                    .append_tx(tx, document_id, author_id, NewVersion::new(""), Some(chat_id))
                    .await?;
                (version, false)
            }
            None => {
                let title = self.owner_title_tx(tx, owner_id).await?;
                let (_, version) = self
                    .documents
                    .create_linked_tx(
                        tx,
                        owner_id,
                        workspace_id,
                        author_id,
                        &title,
                        NewVersion::new(""),
                        Some(chat_id),
                    )
                    .await?;
                (version, true)
            }
        };

        sqlx::query("UPDATE chat SET version_id = $2 WHERE id = $1")
            .bind(chat_id)
            .bind(version.id)
            .execute(&mut **tx)
            .await?;

        Ok(BindOutcome {
            binding: ChatVersionBinding {
                version_id: version.id,
                document_id: version.document_id,
                is_first_version,
            },
            newly_bound: true,
        })
    }

    async fn owner_title_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        owner_id: Uuid,
    ) -> Result<String> {
        let title: Option<(String,)> = sqlx::query_as("SELECT title FROM objective WHERE id = $1")
            .bind(owner_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(title
            .map(|(t,)| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| defaults::UNTITLED_DOCUMENT.to_string()))
    }
}

#[async_trait]
impl ChatBindingRepository for PgChatBindingRepository {
    async fn initialize_version_for_chat(
        &self,
        chat_id: Uuid,
        owner_id: Uuid,
        author_id: Uuid,
        workspace_id: Uuid,
    ) -> Result<ChatVersionBinding> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;
        let outcome = self
            .bind_tx(&mut tx, chat_id, owner_id, author_id, workspace_id)
            .await?;
        tx.commit().await?;

        let binding = outcome.binding;
        if outcome.newly_bound {
            info!(
                subsystem = "db",
                component = "chats",
                op = "initialize_version_for_chat",
                chat_id = %chat_id,
                owner_id = %owner_id,
                document_id = %binding.document_id,
                version_id = %binding.version_id,
                is_first_version = binding.is_first_version,
                duration_ms = start.elapsed().as_millis() as u64,
                "Chat bound to new version"
            );

            if binding.is_first_version {
                self.events.emit(DocumentEvent::DocumentCreated {
                    workspace_id,
                    owner_id: Some(owner_id),
                    document_id: binding.document_id,
                    version_id: binding.version_id,
                });
            }
            self.events.emit(DocumentEvent::ChatBound {
                workspace_id,
                owner_id,
                chat_id,
                version_id: binding.version_id,
            });
        }
        Ok(binding)
    }

    async fn get_version_by_chat_id(&self, chat_id: Uuid) -> Result<Option<Version>> {
        let version = sqlx::query_as(
            r#"
            SELECT v.id, v.document_id, v.version_number, v.content, v.punchlist,
                   v.metadata, v.chat_id, v.created_by, v.created_at_utc
            FROM chat c
            JOIN document_version v ON v.id = c.version_id
            WHERE c.id = $1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }
}
