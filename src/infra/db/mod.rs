//! Usage: SQLite connection setup, schema migrations, and pool helpers.

mod migrations;

use crate::shared::error::{storage_err, AppResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::env;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT_DEFAULT: Duration = Duration::from_millis(2000);
const POOL_MAX_SIZE_DEFAULT: u32 = 4;
const POOL_CONNECTION_TIMEOUT_DEFAULT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct DbRuntimeConfig {
    busy_timeout: Duration,
    pool_max_size: u32,
    pool_connection_timeout: Duration,
}

impl DbRuntimeConfig {
    fn from_env() -> Self {
        Self::from_env_get(|key| env::var(key).ok())
    }

    fn from_env_get(mut get: impl FnMut(&str) -> Option<String>) -> Self {
        let busy_timeout = get("SEO_BRAIN_DB_BUSY_TIMEOUT_MS")
            .as_deref()
            .and_then(parse_u64_trimmed)
            .filter(|v| *v > 0)
            .map(Duration::from_millis)
            .unwrap_or(BUSY_TIMEOUT_DEFAULT);

        let pool_max_size = get("SEO_BRAIN_DB_POOL_MAX_SIZE")
            .as_deref()
            .and_then(parse_u32_trimmed)
            .filter(|v| *v > 0)
            .unwrap_or(POOL_MAX_SIZE_DEFAULT);

        let pool_connection_timeout = get("SEO_BRAIN_DB_POOL_CONNECTION_TIMEOUT_MS")
            .as_deref()
            .and_then(parse_u64_trimmed)
            .filter(|v| *v > 0)
            .map(Duration::from_millis)
            .unwrap_or(POOL_CONNECTION_TIMEOUT_DEFAULT);

        Self {
            busy_timeout,
            pool_max_size,
            pool_connection_timeout,
        }
    }
}

fn parse_u32_trimmed(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u32>().ok()
}

fn parse_u64_trimmed(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u64>().ok()
}

#[derive(Clone)]
pub struct Db {
    pool: Pool<SqliteConnectionManager>,
}

impl Db {
    /// Open (or create) the database at `path`, applying pending migrations.
    pub fn open(path: &Path) -> AppResult<Self> {
        let path_hint = path.display().to_string();
        let config = DbRuntimeConfig::from_env();
        tracing::debug!(
            busy_timeout_ms = config.busy_timeout.as_millis(),
            pool_max_size = config.pool_max_size,
            pool_connection_timeout_ms = config.pool_connection_timeout.as_millis(),
            path = %path_hint,
            "sqlite runtime config"
        );

        let manager = SqliteConnectionManager::file(path).with_init({
            let busy_timeout = config.busy_timeout;
            move |conn| {
                conn.busy_timeout(busy_timeout)?;
                configure_connection(conn)
            }
        });

        let pool = Pool::builder()
            .max_size(config.pool_max_size)
            .connection_timeout(config.pool_connection_timeout)
            .build(manager)
            .map_err(|e| storage_err!("failed to create db pool: {e}"))?;
        let mut conn = pool
            .get()
            .map_err(|e| storage_err!("failed to get startup connection: {e}"))?;

        migrations::apply_migrations(&mut conn)
            .map_err(|e| storage_err!("sqlite migration failed at {path_hint}: {e}"))?;

        Ok(Self { pool })
    }

    pub(crate) fn open_connection(
        &self,
    ) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| storage_err!("failed to get connection from pool: {e}"))
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#,
    )
}
