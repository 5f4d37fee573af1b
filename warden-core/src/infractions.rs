// ABOUTME: Persistent per-(user, room) infraction counters using SQLite database.
// ABOUTME: Increments are single-statement upserts so concurrent callers never lose updates.
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Ordered schema migrations; index + 1 is the version each one produces
const MIGRATIONS: &[&str] = &["CREATE TABLE IF NOT EXISTS infractions (
        user_id TEXT NOT NULL,
        room_id TEXT NOT NULL,
        attempts INTEGER NOT NULL DEFAULT 0,
        UNIQUE (user_id, room_id)
    )"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfractionRecord {
    pub user_id: String,
    pub room_id: String,
    pub attempts: i64,
}

#[derive(Clone)]
pub struct InfractionStore {
    db: Arc<Mutex<Connection>>,
}

impl InfractionStore {
    /// Open (or create) the database file and bring the schema up to date
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self::from_connection(conn)?;

        tracing::info!(db = %path.display(), "InfractionStore initialized");
        Ok(store)
    }

    /// Throwaway database, used by tests and dry runs
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|e| anyhow::anyhow!("Database mutex poisoned: {}", e))
    }

    /// Current count for the pair, 0 when no record exists
    pub fn get_attempts(&self, user_id: &str, room_id: &str) -> Result<i64> {
        let db = self.conn()?;
        let attempts = db
            .query_row(
                "SELECT attempts FROM infractions WHERE user_id = ?1 AND room_id = ?2",
                params![user_id, room_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .context("Failed to read infraction count")?
            .unwrap_or(0);

        tracing::debug!(user_id, room_id, attempts, "Read infraction count");
        Ok(attempts)
    }

    /// Create the record with attempts = 1 or increment it; returns the new count
    pub fn record_infraction(&self, user_id: &str, room_id: &str) -> Result<i64> {
        let db = self.conn()?;
        let attempts = db
            .query_row(
                "INSERT INTO infractions (user_id, room_id, attempts) VALUES (?1, ?2, 1)
                 ON CONFLICT (user_id, room_id) DO UPDATE SET attempts = attempts + 1
                 RETURNING attempts",
                params![user_id, room_id],
                |row| row.get::<_, i64>(0),
            )
            .context("Failed to record infraction")?;

        tracing::debug!(user_id, room_id, attempts, "Recorded infraction");
        Ok(attempts)
    }

    /// Remove the record; a missing record is not an error
    pub fn clear(&self, user_id: &str, room_id: &str) -> Result<()> {
        let db = self.conn()?;
        let removed = db
            .execute(
                "DELETE FROM infractions WHERE user_id = ?1 AND room_id = ?2",
                params![user_id, room_id],
            )
            .context("Failed to clear infractions")?;

        tracing::debug!(user_id, room_id, removed, "Cleared infractions");
        Ok(())
    }

    /// All records for a room, highest count first
    pub fn list_for_room(&self, room_id: &str) -> Result<Vec<InfractionRecord>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(
            "SELECT user_id, room_id, attempts FROM infractions
             WHERE room_id = ?1 ORDER BY attempts DESC, user_id ASC",
        )?;

        let records = stmt
            .query_map(params![room_id], |row| {
                Ok(InfractionRecord {
                    user_id: row.get(0)?,
                    room_id: row.get(1)?,
                    attempts: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migration_version (
            version INTEGER PRIMARY KEY
        )",
        [],
    )?;

    let current: i64 = match conn
        .query_row("SELECT MAX(version) FROM migration_version", [], |row| {
            row.get::<_, Option<i64>>(0)
        })? {
        Some(v) => v,
        None => {
            tracing::info!("Performing initial database setup");
            conn.execute("INSERT INTO migration_version (version) VALUES (0)", [])?;
            0
        }
    };

    for (index, sql) in MIGRATIONS.iter().enumerate() {
        let version = index as i64 + 1;
        if version <= current {
            continue;
        }
        conn.execute(sql, [])
            .with_context(|| format!("Failed to apply migration v{}", version))?;
        conn.execute(
            "UPDATE migration_version SET version = ?1",
            params![version],
        )?;
        tracing::info!(version, "Database migrated");
    }

    Ok(())
}
