//! Database module for dicecast
//!
//! SQLite persistence for characters. The overlay only needs lookups by id;
//! the admin CLI uses the rest.

mod schema;

pub mod characters;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub use characters::{parse_character_id, Character, CharacterStore};
pub use schema::{Migration, MIGRATIONS, SCHEMA_VERSION};

/// Get current Unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Format a timestamp (milliseconds since epoch) as ISO 8601 string
pub fn format_timestamp(ms: i64) -> String {
    use chrono::{DateTime, Utc};
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| format!("{}", ms))
}

/// Character database. One connection, shared behind a mutex.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) and bring the schema up to date
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Self::with_connection(conn)
    }

    /// Throwaway database for tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("character database lock poisoned: {}", e))
    }

    /// Migration step the database is currently at
    pub fn schema_version(&self) -> Result<i32> {
        user_version(&*self.conn()?)
    }
}

fn user_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read schema version")
}

/// Apply every migration newer than the database's `user_version`
fn migrate(conn: &mut Connection) -> Result<()> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        bail!(
            "database is at schema version {}, newer than this dicecast supports ({})",
            current,
            SCHEMA_VERSION
        );
    }

    for step in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction().context("failed to begin migration")?;
        tx.execute_batch(step.sql)
            .with_context(|| format!("migration {} ({}) failed", step.version, step.name))?;
        tx.pragma_update(None, "user_version", step.version)
            .context("failed to record schema version")?;
        tx.commit().context("failed to commit migration")?;
        info!(version = step.version, step = step.name, "applied database migration");
    }

    Ok(())
}
