//! Usage: Single-slot bearer token storage behind the `CredentialStore` trait.

use crate::infra::db::Db;
use crate::shared::error::{storage_err, AppResult};
use crate::shared::mutex_ext::MutexExt;
use crate::shared::time::now_unix_seconds;
use rusqlite::{params, OptionalExtension};
use std::sync::Mutex;

/// Namespaced key for the one persisted bearer token. No multi-account
/// support: last write wins.
const ACCESS_TOKEN_KEY: &str = "seo_brain.auth.access_token";

/// Get/set/delete for the single stored bearer token. All methods are safe
/// to call before any session exists; `get` then returns `None`.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> AppResult<Option<String>>;
    fn set(&self, token: &str) -> AppResult<()>;
    fn delete(&self) -> AppResult<()>;
}

pub struct SqliteCredentialStore {
    db: Db,
}

impl SqliteCredentialStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self) -> AppResult<Option<String>> {
        let conn = self.db.open_connection()?;
        conn.query_row(
            "SELECT value FROM credentials WHERE key = ?1",
            params![ACCESS_TOKEN_KEY],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| storage_err!("failed to read stored token: {e}"))
    }

    fn set(&self, token: &str) -> AppResult<()> {
        let conn = self.db.open_connection()?;
        conn.execute(
            "INSERT INTO credentials (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![ACCESS_TOKEN_KEY, token, now_unix_seconds()],
        )
        .map_err(|e| storage_err!("failed to persist token: {e}"))?;
        Ok(())
    }

    fn delete(&self) -> AppResult<()> {
        let conn = self.db.open_connection()?;
        conn.execute(
            "DELETE FROM credentials WHERE key = ?1",
            params![ACCESS_TOKEN_KEY],
        )
        .map_err(|e| storage_err!("failed to delete stored token: {e}"))?;
        Ok(())
    }
}

/// In-memory store for tests and hosts that keep secrets elsewhere.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> AppResult<Option<String>> {
        Ok(self.slot.lock_or_recover().clone())
    }

    fn set(&self, token: &str) -> AppResult<()> {
        *self.slot.lock_or_recover() = Some(token.to_string());
        Ok(())
    }

    fn delete(&self) -> AppResult<()> {
        *self.slot.lock_or_recover() = None;
        Ok(())
    }
}
