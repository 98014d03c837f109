use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{info, warn};

use super::{SessionSummary, Storage, StoredSession};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::session::{Session, SCHEMA_VERSION};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    async fn stored_revision(&self, id: &str) -> StorageResult<Option<i64>> {
        let row = sqlx::query("SELECT revision FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("revision")))
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn load(&self, id: &str) -> StorageResult<Option<StoredSession>> {
        let row = sqlx::query("SELECT payload, revision FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.get("payload");
        let revision: i64 = row.get("revision");

        let session: Session =
            serde_json::from_str(&payload).map_err(|e| StorageError::CorruptPayload {
                session_id: id.to_string(),
                message: e.to_string(),
            })?;

        if session.schema_version != SCHEMA_VERSION {
            warn!(
                session_id = id,
                stored = session.schema_version,
                current = SCHEMA_VERSION,
                "Session schema version differs; migration is the caller's responsibility"
            );
        }

        Ok(Some(StoredSession { session, revision }))
    }

    async fn save(&self, session: &Session, expected_revision: Option<i64>) -> StorageResult<i64> {
        let payload = serde_json::to_string(session)?;

        match expected_revision {
            None => {
                if let Some(stored) = self.stored_revision(&session.id).await? {
                    return Err(StorageError::Conflict {
                        session_id: session.id.clone(),
                        stored,
                        expected: 0,
                    });
                }
                sqlx::query(
                    "INSERT INTO sessions (id, schema_version, phase, payload, revision, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, 1, ?, ?)",
                )
                .bind(&session.id)
                .bind(session.schema_version as i64)
                .bind(session.phase.as_str())
                .bind(&payload)
                .bind(session.created_at.to_rfc3339())
                .bind(session.updated_at.to_rfc3339())
                .execute(&self.pool)
                .await?;
                Ok(1)
            }
            Some(expected) => {
                let result = sqlx::query(
                    "UPDATE sessions SET payload = ?, phase = ?, schema_version = ?, \
                     revision = revision + 1, updated_at = ? \
                     WHERE id = ? AND revision = ?",
                )
                .bind(&payload)
                .bind(session.phase.as_str())
                .bind(session.schema_version as i64)
                .bind(session.updated_at.to_rfc3339())
                .bind(&session.id)
                .bind(expected)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    return match self.stored_revision(&session.id).await? {
                        Some(stored) => Err(StorageError::Conflict {
                            session_id: session.id.clone(),
                            stored,
                            expected,
                        }),
                        None => Err(StorageError::SessionNotFound {
                            session_id: session.id.clone(),
                        }),
                    };
                }
                Ok(expected + 1)
            }
        }
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::SessionNotFound {
                session_id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<SessionSummary>> {
        let rows = sqlx::query("SELECT payload, revision FROM sessions ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.get("payload");
            let revision: i64 = row.get("revision");
            // A single corrupt row degrades the listing, not the whole call.
            match serde_json::from_str::<Session>(&payload) {
                Ok(session) => summaries.push(SessionSummary {
                    id: session.id.clone(),
                    phase: session.phase,
                    hypothesis_count: session.hypothesis_cards.len(),
                    revision,
                    updated_at: session.updated_at,
                }),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupt session payload in listing");
                }
            }
        }
        Ok(summaries)
    }
}
