//! # folio-db
//!
//! PostgreSQL persistence layer for folio.
//!
//! This crate provides:
//! - Connection pool management
//! - The append-only version store
//! - Document lifecycle (atomic creation, cascading deletion)
//! - Chat-to-version binding
//! - Envelope publication state
//!
//! ## Example
//!
//! ```rust,ignore
//! use folio_db::{CreateDocumentRequest, Database, DocumentRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/folio").await?;
//!
//!     let created = db
//!         .documents
//!         .create_document(objective_id, workspace_id, user_id, CreateDocumentRequest::new("Goals", ""))
//!         .await?;
//!
//!     println!("Created document {} at version {}", created.document.id, created.version.version_number);
//!     Ok(())
//! }
//! ```
pub mod chats;
pub mod documents;
pub mod pool;
pub mod publication;
pub mod sources;
pub mod versions;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use folio_core::*;

pub use chats::PgChatBindingRepository;
pub use documents::PgDocumentRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use publication::PgPublicationRepository;
pub use sources::PgSourceDocumentRepository;
pub use versions::{render_diff, PgVersionRepository};

/// Combined database context with all repositories.
///
/// Every repository shares the same pool and event bus.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Bus receiving an event after every committed mutation.
    pub events: EventBus,
    /// Append-only version store.
    pub versions: PgVersionRepository,
    /// Document creation, lookup, and deletion.
    pub documents: PgDocumentRepository,
    /// Chat-to-version binding.
    pub chats: PgChatBindingRepository,
    /// Envelope draft/published/searchable state.
    pub publication: PgPublicationRepository,
    /// Source material for generation.
    pub sources: PgSourceDocumentRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_event_bus(pool, EventBus::default())
    }

    /// Create a Database that publishes events on an existing bus.
    pub fn with_event_bus(pool: sqlx::Pool<sqlx::Postgres>, events: EventBus) -> Self {
        let versions = PgVersionRepository::new(pool.clone(), events.clone());
        let documents = PgDocumentRepository::new(pool.clone(), versions.clone(), events.clone());
        Self {
            chats: PgChatBindingRepository::new(
                pool.clone(),
                documents.clone(),
                versions.clone(),
                events.clone(),
            ),
            publication: PgPublicationRepository::new(
                pool.clone(),
                documents.clone(),
                versions.clone(),
                events.clone(),
            ),
            sources: PgSourceDocumentRepository::new(pool.clone()),
            versions,
            documents,
            events,
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Persistence(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
