//! Source-document lookup for generation.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use folio_core::{new_v7, Result, SourceDocument, SourceDocumentResolver};

/// PostgreSQL implementation of [`SourceDocumentResolver`].
#[derive(Clone)]
pub struct PgSourceDocumentRepository {
    pool: PgPool,
}

impl PgSourceDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store source material for later generation passes.
    pub async fn insert(&self, workspace_id: Uuid, title: &str, content: &str) -> Result<Uuid> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO source_document (id, workspace_id, title, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(workspace_id)
        .bind(title)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl SourceDocumentResolver for PgSourceDocumentRepository {
    async fn resolve(&self, workspace_id: Uuid, ids: &[Uuid]) -> Result<Vec<SourceDocument>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique: Vec<Uuid> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }

        // Keep the caller's ordering so prompts are stable across runs.
        let rows: Vec<SourceDocument> = sqlx::query_as(
            r#"
            SELECT s.id, s.title, s.content
            FROM source_document s
            JOIN UNNEST($2::uuid[]) WITH ORDINALITY AS req(id, ord) ON req.id = s.id
            WHERE s.workspace_id = $1
            ORDER BY req.ord
            "#,
        )
        .bind(workspace_id)
        .bind(&unique)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            subsystem = "db",
            component = "sources",
            op = "resolve",
            requested = ids.len(),
            resolved = rows.len(),
            "Resolved source documents"
        );
        Ok(rows)
    }
}
