use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::error::StorageError;
use crate::models::{Fingerprint, SiteKey, SiteState};
use crate::storage::StateStore;

/// State kept in a SQLite table, one row per site. Every commit is its own
/// transaction, so `flush` has nothing left to do.
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS site_state (
                site_key TEXT PRIMARY KEY,
                hashes TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        info!("Database migration completed");
        Ok(())
    }

    /// Import a JSON state file in the `{site_key: {"hashes": [...]}}` format.
    /// Sites already present in the database are left alone.
    pub async fn import_from_json(
        &self,
        json_path: impl AsRef<Path>,
    ) -> Result<usize, StorageError> {
        let json_path = json_path.as_ref();
        if !json_path.exists() {
            info!("No existing JSON state to import at {}", json_path.display());
            return Ok(0);
        }

        let content = std::fs::read_to_string(json_path)?;
        let states: BTreeMap<SiteKey, SiteState> = serde_json::from_str(&content)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut imported = 0;

        for (key, mut state) in states {
            let hashes = std::mem::take(&mut state.hashes);
            state.replace(hashes);
            imported += tx.execute(
                "INSERT OR IGNORE INTO site_state (site_key, hashes) VALUES (?1, ?2)",
                params![key.as_str(), serde_json::to_string(&state.hashes)?],
            )?;
        }

        tx.commit()?;
        info!("Imported {} site states from {}", imported, json_path.display());
        Ok(imported)
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self, key: &SiteKey) -> Result<SiteState, StorageError> {
        let conn = self.conn()?;

        let hashes: Option<String> = conn
            .query_row(
                "SELECT hashes FROM site_state WHERE site_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match hashes {
            Some(raw) => SiteState {
                hashes: serde_json::from_str(&raw)?,
                ..SiteState::default()
            },
            None => SiteState::default(),
        })
    }

    async fn commit(
        &self,
        key: &SiteKey,
        fingerprints: Vec<Fingerprint>,
    ) -> Result<(), StorageError> {
        let mut state = SiteState::default();
        state.replace(fingerprints);
        let hashes = serde_json::to_string(&state.hashes)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO site_state (site_key, hashes, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(site_key) DO UPDATE SET hashes = excluded.hashes, updated_at = CURRENT_TIMESTAMP",
            params![key.as_str(), hashes],
        )?;
        tx.commit()?;

        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
