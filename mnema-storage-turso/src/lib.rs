//! # Mnema Storage - Turso
//!
//! Turso/libSQL backend for durable persistence of the memory substrate:
//! projects, chunks, embeddings, relationships, working state, and archives.
//!
//! This crate provides:
//! - Connection management with enforced foreign keys and WAL journaling
//! - Idempotent schema creation
//! - CRUD plus the transactional multi-table operations the core's
//!   `StorageBackend` contract requires (supersede, question answering,
//!   decay batches, tombstone archiving, orientation saves)
//!
//! ## Example
//!
//! ```no_run
//! use mnema_storage_turso::TursoStorage;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let storage = TursoStorage::new("file:mnema.db", "").await?;
//! storage.initialize_schema().await?;
//! # Ok(())
//! # }
//! ```

use libsql::{Builder, Connection, Database};
use mnema_core::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

mod backend;
mod chunks;
mod graph;
mod orientation;
mod rows;
mod schema;
mod working_state;

/// Turso storage backend for durable persistence.
pub struct TursoStorage {
    db: Arc<Database>,
    config: TursoConfig,
}

/// Configuration for Turso storage.
#[derive(Debug, Clone)]
pub struct TursoConfig {
    /// Maximum retry attempts for failed DDL statements.
    pub max_retries: u32,
    /// Base delay for exponential backoff (milliseconds).
    pub retry_base_delay_ms: u64,
    /// Maximum delay for exponential backoff (milliseconds).
    pub retry_max_delay_ms: u64,
}

impl Default for TursoConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 5000,
        }
    }
}

impl TursoStorage {
    /// Create a new Turso storage instance.
    ///
    /// # Arguments
    ///
    /// * `url` - Database URL (only `libsql://`, `file:`, or `:memory:`)
    /// * `token` - Authentication token (required for `libsql://`, empty for
    ///   local files)
    pub async fn new(url: &str, token: &str) -> Result<Self> {
        Self::with_config(url, token, TursoConfig::default()).await
    }

    /// Create a storage instance from an existing database handle. Useful
    /// for tests with tempdir-local files.
    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            config: TursoConfig::default(),
        }
    }

    /// Create a new Turso storage instance with custom configuration.
    ///
    /// Remote connections must use `libsql://` with a non-empty token;
    /// plain HTTP URLs are rejected.
    pub async fn with_config(url: &str, token: &str, config: TursoConfig) -> Result<Self> {
        info!("Connecting to Turso database at {}", url);

        if !url.starts_with("libsql://") && !url.starts_with("file:") && !url.starts_with(":memory:")
        {
            return Err(Error::Configuration(format!(
                "Insecure database URL: {url}. Only libsql://, file:, or :memory: protocols are allowed"
            )));
        }
        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::Configuration(
                "Authentication token required for remote Turso connections".to_string(),
            ));
        }

        let db = if url.starts_with("libsql://") {
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| Error::Storage(format!("Failed to connect to Turso: {e}")))?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path)
                .build()
                .await
                .map_err(|e| Error::Storage(format!("Failed to connect to Turso: {e}")))?
        };

        info!("Successfully connected to Turso database");
        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    /// Initialize the database schema.
    ///
    /// Creates tables and indexes if they don't exist and switches local
    /// files to WAL journaling. Safe to call multiple times; a schema that
    /// cannot be created is fatal for the process.
    pub async fn initialize_schema(&self) -> Result<()> {
        info!("Initializing mnema schema");
        let conn = self.connect().await?;

        // WAL is persistent per database file; foreign keys are re-enabled
        // per connection in connect().
        if let Err(e) = conn.query("PRAGMA journal_mode = WAL", ()).await {
            warn!("could not switch to WAL journaling: {e}");
        }

        for sql in schema::ALL_TABLES {
            self.execute_with_retry(&conn, sql).await.map_err(|e| {
                Error::StoreCorruption(format!("schema initialization failed: {e}"))
            })?;
        }
        for sql in schema::ALL_INDEXES {
            self.execute_with_retry(&conn, sql).await.map_err(|e| {
                Error::StoreCorruption(format!("index initialization failed: {e}"))
            })?;
        }

        info!("Schema initialization complete");
        Ok(())
    }

    /// Get a database connection with foreign keys enforced.
    pub(crate) async fn connect(&self) -> Result<Connection> {
        let conn = self
            .db
            .connect()
            .map_err(|e| Error::Storage(format!("Failed to get connection: {e}")))?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| Error::Storage(format!("Failed to enable foreign keys: {e}")))?;
        Ok(conn)
    }

    /// Begin a write transaction on a connection.
    pub(crate) async fn begin(conn: &Connection) -> Result<libsql::Transaction> {
        conn.transaction()
            .await
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {e}")))
    }

    /// Commit, translating failures to a rolled-back partial write.
    pub(crate) async fn commit(tx: libsql::Transaction) -> Result<()> {
        tx.commit()
            .await
            .map_err(|e| Error::PartialWrite(format!("transaction commit failed: {e}")))
    }

    /// Execute a DDL statement with retry and exponential backoff.
    async fn execute_with_retry(&self, conn: &Connection, sql: &str) -> Result<()> {
        let mut attempts = 0;
        let mut delay = Duration::from_millis(self.config.retry_base_delay_ms);

        loop {
            match conn.execute(sql, ()).await {
                Ok(_) => {
                    if attempts > 0 {
                        debug!("SQL succeeded after {} retries", attempts);
                    }
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.config.max_retries {
                        error!("SQL failed after {} attempts: {}", attempts, e);
                        return Err(Error::Storage(format!(
                            "SQL execution failed after {attempts} retries: {e}"
                        )));
                    }
                    warn!("SQL attempt {} failed: {}, retrying...", attempts, e);
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(
                        delay * 2,
                        Duration::from_millis(self.config.retry_max_delay_ms),
                    );
                }
            }
        }
    }

    /// Verify database connectivity.
    pub async fn check_connectivity(&self) -> Result<bool> {
        let conn = self.connect().await?;
        match conn.query("SELECT 1", ()).await {
            Ok(_) => Ok(true),
            Err(e) => {
                error!("Health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Count rows in one table for a project.
    pub(crate) async fn count_for_project(
        &self,
        conn: &Connection,
        table: &str,
        project_id: uuid::Uuid,
    ) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE project_id = ?");
        let mut result_rows = conn
            .query(&sql, libsql::params![project_id.to_string()])
            .await
            .map_err(|e| Error::Storage(format!("Failed to count {table}: {e}")))?;

        if let Some(row) = result_rows
            .next()
            .await
            .map_err(|e| Error::Storage(format!("Failed to fetch count for {table}: {e}")))?
        {
            let count: i64 = row
                .get(0)
                .map_err(|e| Error::Storage(format!("Failed to parse count: {e}")))?;
            Ok(count as usize)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests;
