//! Append-only version store.
//!
//! Version numbers are assigned inside the inserting transaction: the owning
//! document row is locked (and its `updated_at_utc` touched) by an
//! `UPDATE ... RETURNING` before `MAX(version_number)` is read, so concurrent
//! writers to the same document serialize on that row. The
//! `uq_document_version_number` constraint backs this up; a writer that still
//! loses the race retries once.
//!
//! When the document carries publication state, the appended version becomes
//! the envelope's draft in the same transaction.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use folio_core::{
    new_v7, DocumentEvent, Error, EventBus, NewVersion, Result, Version, VersionRepository,
    VersionSummary,
};

pub(crate) const VERSION_COLUMNS: &str =
    "id, document_id, version_number, content, punchlist, metadata, chat_id, created_by, created_at_utc";

const VERSION_NUMBER_CONSTRAINT: &str = "uq_document_version_number";

/// PostgreSQL implementation of [`VersionRepository`].
#[derive(Clone)]
pub struct PgVersionRepository {
    pool: PgPool,
    events: EventBus,
}

impl PgVersionRepository {
    pub fn new(pool: PgPool, events: EventBus) -> Self {
        Self { pool, events }
    }

    /// Lock the document, derive the next number, and insert the version.
    ///
    /// Returns the version and the document's workspace id.
    pub(crate) async fn append_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        author_id: Uuid,
        version: NewVersion,
        chat_id: Option<Uuid>,
    ) -> Result<(Version, Uuid)> {
        let workspace_id: Option<(Uuid,)> = sqlx::query_as(
            "UPDATE document SET updated_at_utc = NOW() WHERE id = $1 RETURNING workspace_id",
        )
        .bind(document_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (workspace_id,) =
            workspace_id.ok_or_else(|| Error::NotFound(format!("document {}", document_id)))?;

        let previous: Option<(i32, Option<JsonValue>)> = sqlx::query_as(
            r#"
            SELECT version_number, punchlist
            FROM document_version
            WHERE document_id = $1
            ORDER BY version_number DESC
            LIMIT 1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (next_number, previous_punchlist) = match previous {
            Some((number, punchlist)) => (number + 1, punchlist),
            None => (1, None),
        };
        let punchlist = version.resolve_punchlist(previous_punchlist);

        debug!(
            subsystem = "db",
            component = "versions",
            document_id = %document_id,
            version_number = next_number,
            carried_punchlist = version.punchlist.is_none() && punchlist.is_some(),
            "Assigning version number"
        );

        let created: Version = sqlx::query_as(&format!(
            r#"
            INSERT INTO document_version
                (id, document_id, version_number, content, punchlist, metadata, chat_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            VERSION_COLUMNS
        ))
        .bind(new_v7())
        .bind(document_id)
        .bind(next_number)
        .bind(&version.content)
        .bind(&punchlist)
        .bind(&version.metadata)
        .bind(chat_id)
        .bind(author_id)
        .fetch_one(&mut **tx)
        .await?;

        // The newest version of an envelope is its draft.
        let advanced = sqlx::query(
            r#"
            UPDATE document_publication
            SET draft_version_id = $2, updated_at_utc = NOW()
            WHERE document_id = $1
            "#,
        )
        .bind(document_id)
        .bind(created.id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if advanced > 0 {
            debug!(
                subsystem = "db",
                component = "versions",
                document_id = %document_id,
                version_id = %created.id,
                "Envelope draft advanced"
            );
        }

        Ok((created, workspace_id))
    }

    /// Transaction-aware variant of `create_version`.
    ///
    /// Events are the caller's responsibility once its transaction commits.
    pub async fn create_version_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        author_id: Uuid,
        version: NewVersion,
    ) -> Result<Version> {
        self.append_tx(tx, document_id, author_id, version, None)
            .await
            .map(|(v, _)| v)
    }

    async fn create_version_once(
        &self,
        document_id: Uuid,
        author_id: Uuid,
        version: NewVersion,
    ) -> Result<(Version, Uuid)> {
        let mut tx = self.pool.begin().await?;
        let result = self
            .append_tx(&mut tx, document_id, author_id, version, None)
            .await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Transaction-aware variant of `get_version`.
    pub async fn get_version_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        version_id: Uuid,
    ) -> Result<Option<Version>> {
        let version = sqlx::query_as(&format!(
            "SELECT {} FROM document_version WHERE id = $1",
            VERSION_COLUMNS
        ))
        .bind(version_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(version)
    }

    /// Fetch a version by its per-document number.
    pub async fn get_version_by_number(
        &self,
        document_id: Uuid,
        version_number: i32,
    ) -> Result<Option<Version>> {
        let version = sqlx::query_as(&format!(
            "SELECT {} FROM document_version WHERE document_id = $1 AND version_number = $2",
            VERSION_COLUMNS
        ))
        .bind(document_id)
        .bind(version_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }

    /// History listing without content bodies, newest first.
    pub async fn list_version_summaries(
        &self,
        document_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<VersionSummary>> {
        let summaries = sqlx::query_as(
            r#"
            SELECT id, version_number, created_by, created_at_utc, chat_id,
                   LENGTH(content)::INTEGER AS content_len,
                   (punchlist IS NOT NULL) AS has_punchlist
            FROM document_version
            WHERE document_id = $1
            ORDER BY version_number DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(document_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    /// Unified line diff between two versions of a document.
    pub async fn diff_versions(
        &self,
        document_id: Uuid,
        from_version: i32,
        to_version: i32,
    ) -> Result<String> {
        let from = self
            .get_version_by_number(document_id, from_version)
            .await?
            .ok_or_else(|| Error::NotFound(format!("version {}", from_version)))?;

        let to = self
            .get_version_by_number(document_id, to_version)
            .await?
            .ok_or_else(|| Error::NotFound(format!("version {}", to_version)))?;

        Ok(render_diff(&from, &to))
    }
}

/// Render a unified-style diff with `---`/`+++` headers naming version numbers.
pub fn render_diff(from: &Version, to: &Version) -> String {
    let diff = similar::TextDiff::from_lines(&from.content, &to.content);
    let mut output = String::new();

    output.push_str(&format!("--- version {}\n", from.version_number));
    output.push_str(&format!("+++ version {}\n", to.version_number));

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => "-",
            similar::ChangeTag::Insert => "+",
            similar::ChangeTag::Equal => " ",
        };
        output.push_str(&format!("{}{}", sign, change));
        if change.missing_newline() {
            output.push('\n');
        }
    }

    output
}

/// True when the error is a lost race on the per-document version number.
pub(crate) fn is_version_conflict(err: &Error) -> bool {
    match err {
        Error::Persistence(sqlx::Error::Database(db)) => {
            db.constraint() == Some(VERSION_NUMBER_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl VersionRepository for PgVersionRepository {
    async fn create_version(
        &self,
        document_id: Uuid,
        author_id: Uuid,
        version: NewVersion,
    ) -> Result<Version> {
        let start = Instant::now();

        let (created, workspace_id) = match self
            .create_version_once(document_id, author_id, version.clone())
            .await
        {
            Err(e) if is_version_conflict(&e) => {
                warn!(
                    subsystem = "db",
                    component = "versions",
                    op = "create_version",
                    document_id = %document_id,
                    "Version number conflict, retrying once"
                );
                self.create_version_once(document_id, author_id, version)
                    .await?
            }
            other => other?,
        };

        info!(
            subsystem = "db",
            component = "versions",
            op = "create_version",
            document_id = %document_id,
            version_id = %created.id,
            version_number = created.version_number,
            duration_ms = start.elapsed().as_millis() as u64,
            "Version created"
        );

        self.events.emit(DocumentEvent::VersionCreated {
            workspace_id,
            document_id,
            version_id: created.id,
            version_number: created.version_number,
        });

        Ok(created)
    }

    async fn get_latest_version(&self, document_id: Uuid) -> Result<Option<Version>> {
        let version = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM document_version
            WHERE document_id = $1
            ORDER BY version_number DESC
            LIMIT 1
            "#,
            VERSION_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(version)
    }

    async fn list_versions(&self, document_id: Uuid) -> Result<Vec<Version>> {
        let versions = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM document_version
            WHERE document_id = $1
            ORDER BY version_number DESC
            "#,
            VERSION_COLUMNS
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions)
    }

    async fn get_version(&self, version_id: Uuid) -> Result<Option<Version>> {
        let mut tx = self.pool.begin().await?;
        let version = self.get_version_tx(&mut tx, version_id).await?;
        tx.commit().await?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn version(number: i32, content: &str) -> Version {
        Version {
            id: Uuid::nil(),
            document_id: Uuid::nil(),
            version_number: number,
            content: content.to_string(),
            punchlist: None,
            metadata: None,
            chat_id: None,
            created_by: Uuid::nil(),
            created_at_utc: Utc::now(),
        }
    }

    #[test]
    fn test_render_diff_headers_and_changes() {
        let from = version(1, "alpha\nbeta\n");
        let to = version(2, "alpha\ngamma\n");
        let diff = render_diff(&from, &to);

        assert!(diff.starts_with("--- version 1\n+++ version 2\n"));
        assert!(diff.contains(" alpha\n"));
        assert!(diff.contains("-beta\n"));
        assert!(diff.contains("+gamma\n"));
    }

    #[test]
    fn test_render_diff_handles_missing_trailing_newline() {
        let diff = render_diff(&version(1, "a"), &version(2, "b"));
        assert!(diff.contains("-a\n"));
        assert!(diff.contains("+b\n"));
    }

    #[test]
    fn test_is_version_conflict_ignores_other_errors() {
        assert!(!is_version_conflict(&Error::NotFound("x".to_string())));
        assert!(!is_version_conflict(&Error::Persistence(
            sqlx::Error::RowNotFound
        )));
    }
}
