use super::schema::PREFERENCES_VERSIONED_SCHEMAS;
use super::PreferenceStore;
use crate::sqlite_persistence::stored_version;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Clone)]
pub struct SqlitePreferenceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePreferenceStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        info!("Opening preferences database at {:?}", path);
        let conn = Connection::open(path).context("Failed to open preferences database")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let latest_schema = PREFERENCES_VERSIONED_SCHEMAS
            .last()
            .context("No preferences schema defined")?;
        match stored_version(&conn)? {
            None => {
                info!(
                    "Creating preferences database schema at version {}",
                    latest_schema.version
                );
                latest_schema.create(&conn)?;
            }
            Some(version) if version == latest_schema.version => {
                latest_schema
                    .validate(&conn)
                    .context("Preferences database schema validation failed")?;
            }
            Some(version) => bail!("Unsupported preferences database version {}", version),
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Preferences connection lock is poisoned"))
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO preferences (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, now],
        )?;
        debug!("Stored preference {}", key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }
}
