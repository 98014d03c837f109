//! Storage layer for session persistence.
//!
//! The core treats persistence as a collaborator: sessions cross this
//! boundary as one JSON-serializable blob, loaded, mutated, and saved as a
//! single logical transaction. The collaborator owns schema-version
//! migration and must surface a conflict when the stored revision moved
//! between load and save.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::session::{Session, SessionPhase};

/// A session together with the storage revision it was loaded at.
///
/// The revision is handed back on save so stale writes are rejected
/// instead of silently clobbering a concurrent update.
#[derive(Debug, Clone)]
pub struct StoredSession {
    /// The decoded session.
    pub session: Session,
    /// Revision counter at load time.
    pub revision: i64,
}

/// Compact listing entry for a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session identifier.
    pub id: String,
    /// Phase at last save.
    pub phase: SessionPhase,
    /// Number of hypothesis cards.
    pub hypothesis_count: usize,
    /// Storage revision.
    pub revision: i64,
    /// When the session was last saved.
    pub updated_at: DateTime<Utc>,
}

/// Storage trait for session persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load a session by id, or `None` if absent.
    async fn load(&self, id: &str) -> StorageResult<Option<StoredSession>>;

    /// Persist a session.
    ///
    /// `expected_revision` is `None` for a first save and the loaded
    /// revision otherwise; a mismatch against the stored revision fails
    /// with a conflict and writes nothing. Returns the new revision.
    async fn save(&self, session: &Session, expected_revision: Option<i64>) -> StorageResult<i64>;

    /// Delete a session by id. Deleting an absent session is an error.
    async fn delete(&self, id: &str) -> StorageResult<()>;

    /// List summaries of all stored sessions, most recently updated first.
    async fn list(&self) -> StorageResult<Vec<SessionSummary>>;
}
