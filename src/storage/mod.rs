// Record store facade: point lookups and single-row upserts, nothing more.

mod sqlite;

use crate::config::StorageConfig;
use anyhow::Result;
use std::sync::Arc;

pub use sqlite::SqliteStorage;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    pub created_at: f64,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    /// Serialized event log; decoded lazily so a corrupt row never poisons
    /// a lookup.
    pub events: String,
    pub created_at: f64,
}

pub trait StorageBackend: Send + Sync {
    fn ensure_initialized(&self) -> Result<()>;

    fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>>;
    /// Insert-or-ignore; returns true when the row was actually created.
    fn insert_user(&self, user_id: &str) -> Result<bool>;

    fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;
    /// First session for a user, oldest first. The service assumes at most
    /// one active session per user; ordering keeps the pick deterministic.
    fn find_session_by_user(&self, user_id: &str) -> Result<Option<SessionRecord>>;
    /// Single-row atomic upsert keyed by session id: an existing row has
    /// its event blob replaced wholesale, otherwise a new row is inserted.
    fn upsert_session_events(&self, session_id: &str, user_id: &str, events: &str) -> Result<()>;
}

pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let storage = Arc::new(SqliteStorage::new(config.db_path.trim().to_string()));
    storage.ensure_initialized()?;
    Ok(storage)
}
