// SQLite record store: users and per-user session event logs.
use crate::storage::{SessionRecord, StorageBackend, UserRecord};
use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SqliteStorage {
    db_path: PathBuf,
    initialized: AtomicBool,
    init_guard: Mutex<()>,
}

impl SqliteStorage {
    pub fn new(db_path: String) -> Self {
        let path = if db_path.trim().is_empty() {
            PathBuf::from("./data/parley.db")
        } else {
            PathBuf::from(db_path)
        };
        Self {
            db_path: path,
            initialized: AtomicBool::new(false),
            init_guard: Mutex::new(()),
        }
    }

    fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        self.ensure_db_dir()?;
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Ok(conn)
    }

    fn now_ts() -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

impl StorageBackend for SqliteStorage {
    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.init_guard.lock();
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
              user_id TEXT PRIMARY KEY,
              created_at REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sessions (
              session_id TEXT PRIMARY KEY,
              user_id TEXT NOT NULL REFERENCES users (user_id),
              events TEXT NOT NULL,
              created_at REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user
              ON sessions (user_id, created_at);
            "#,
        )?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let conn = self.open()?;
        let record = conn
            .query_row(
                "SELECT user_id, created_at FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(UserRecord {
                        user_id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn insert_user(&self, user_id: &str) -> Result<bool> {
        let conn = self.open()?;
        let affected = conn.execute(
            "INSERT INTO users (user_id, created_at) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id, Self::now_ts()],
        )?;
        Ok(affected > 0)
    }

    fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.open()?;
        let record = conn
            .query_row(
                "SELECT session_id, user_id, events, created_at
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                map_session_row,
            )
            .optional()?;
        Ok(record)
    }

    fn find_session_by_user(&self, user_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.open()?;
        let record = conn
            .query_row(
                "SELECT session_id, user_id, events, created_at
                 FROM sessions WHERE user_id = ?1
                 ORDER BY created_at ASC, session_id ASC LIMIT 1",
                params![user_id],
                map_session_row,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert_session_events(&self, session_id: &str, user_id: &str, events: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "INSERT INTO sessions (session_id, user_id, events, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET events = excluded.events",
            params![session_id, user_id, events, Self::now_ts()],
        )?;
        Ok(())
    }
}

fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        events: row.get(2)?,
        created_at: row.get(3)?,
    })
}
