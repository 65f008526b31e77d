//! SQLite-backed relation store for sources and artwork.

use super::schema::{CASCADE_VERSION, PROVIDER_VERSIONED_SCHEMAS};
use crate::error::{ProviderError, ProviderResult};
use crate::sqlite_persistence::{stored_version, BASE_DB_VERSION};
use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Owns the single writable connection to the provider database.
#[derive(Clone)]
pub struct SqliteProviderStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProviderStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        info!("Opening provider database at {:?}", path);
        let conn = Connection::open(path).context("Failed to open provider database")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        let latest_schema = PROVIDER_VERSIONED_SCHEMAS
            .last()
            .context("No provider schema defined")?;

        match stored_version(&conn)? {
            None => {
                info!(
                    "Creating provider database schema at version {}",
                    latest_schema.version
                );
                latest_schema.create(&conn)?;
            }
            Some(db_version) => {
                let schema = PROVIDER_VERSIONED_SCHEMAS
                    .iter()
                    .find(|s| s.version == db_version)
                    .with_context(|| format!("Unknown provider database version {}", db_version))?;
                schema.validate(&conn).with_context(|| {
                    format!(
                        "Provider database schema validation failed for version {}",
                        db_version
                    )
                })?;
                if db_version > latest_schema.version {
                    bail!(
                        "Provider database version {} is newer than supported version {}",
                        db_version,
                        latest_schema.version
                    );
                }
                if db_version < latest_schema.version {
                    Self::migrate(&mut conn, db_version)?;
                }
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &mut Connection, from_version: usize) -> Result<()> {
        if from_version < CASCADE_VERSION {
            warn!(
                "Provider database version {} predates the source cascade, the artwork table will be recreated",
                from_version
            );
        }
        let tx = conn.transaction()?;
        let mut current_version = from_version;
        for schema in PROVIDER_VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > from_version)
        {
            info!(
                "Migrating provider database from version {} to {}",
                current_version, schema.version
            );
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            current_version = schema.version;
        }
        tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
        tx.commit()?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> ProviderResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| ProviderError::Poisoned)
    }

    pub fn schema_version(&self) -> Result<usize> {
        let conn = self.lock()?;
        stored_version(&conn)?.context("Provider database has no schema")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_new_database_is_created_at_latest_version() {
        let store = SqliteProviderStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), CASCADE_VERSION);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.db");
        {
            let store = SqliteProviderStore::open(&path).unwrap();
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO sources (component_ref) VALUES (?1)",
                params!["com.example/.Featured"],
            )
            .unwrap();
        }
        let store = SqliteProviderStore::open(&path).unwrap();
        assert_eq!(count(&store.lock().unwrap(), "sources"), 1);
    }

    #[test]
    fn test_migration_from_v2_recreates_artwork_and_keeps_sources() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.db");
        {
            let conn = Connection::open(&path).unwrap();
            PROVIDER_VERSIONED_SCHEMAS[1].create(&conn).unwrap();
            conn.execute(
                "INSERT INTO sources (component_ref) VALUES (?1)",
                params!["com.example/.Featured"],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO artwork (source_ref, title) VALUES (?1, ?2)",
                params!["com.example/.Featured", "The Kiss"],
            )
            .unwrap();
        }

        let store = SqliteProviderStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), 3);

        let conn = store.lock().unwrap();
        assert_eq!(count(&conn, "artwork"), 0);
        assert_eq!(count(&conn, "sources"), 1);
        PROVIDER_VERSIONED_SCHEMAS[2].validate(&conn).unwrap();
    }

    #[test]
    fn test_migration_from_v1_adds_sources() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.db");
        {
            let conn = Connection::open(&path).unwrap();
            PROVIDER_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
            conn.execute(
                "INSERT INTO artwork (source_ref, title) VALUES (?1, ?2)",
                params!["com.example/.Featured", "The Kiss"],
            )
            .unwrap();
        }

        let store = SqliteProviderStore::open(&path).unwrap();
        let conn = store.lock().unwrap();
        assert_eq!(count(&conn, "artwork"), 0);
        assert_eq!(count(&conn, "sources"), 0);
        assert_eq!(store_version_raw(&conn), BASE_DB_VERSION as i64 + 3);
    }

    fn store_version_raw(conn: &Connection) -> i64 {
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("provider.db");
        {
            let conn = Connection::open(&path).unwrap();
            PROVIDER_VERSIONED_SCHEMAS[2].create(&conn).unwrap();
            conn.pragma_update(None, "user_version", BASE_DB_VERSION + 42)
                .unwrap();
        }
        let err = SqliteProviderStore::open(&path).err().unwrap();
        assert!(err.to_string().contains("Unknown provider database version 42"));
    }
}
