use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::{Config, StateBackend};
use crate::error::StorageError;
use crate::models::{Fingerprint, SiteKey, SiteState};

mod json;
mod sqlite;
pub use json::JsonStateStore;
pub use sqlite::SqliteStateStore;

/// Per-site fingerprint state shared by the whole process.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored state for `key`, empty if the site was never committed.
    async fn load(&self, key: &SiteKey) -> Result<SiteState, StorageError>;

    /// Overwrite the state for `key` with at most 50 of `fingerprints`.
    async fn commit(
        &self,
        key: &SiteKey,
        fingerprints: Vec<Fingerprint>,
    ) -> Result<(), StorageError>;

    /// Make every committed state durable.
    async fn flush(&self) -> Result<(), StorageError>;
}

/// Database and JSON state paths derived from `state_file`: a `.db` file is
/// the database with a `.json` sibling to import, anything else is the JSON
/// file with a `.db` sibling as the database.
pub fn sqlite_paths(state_file: &Path) -> (PathBuf, PathBuf) {
    if state_file.extension().is_some_and(|ext| ext == "db") {
        (state_file.to_path_buf(), state_file.with_extension("json"))
    } else {
        (state_file.with_extension("db"), state_file.to_path_buf())
    }
}

/// Open the backend selected in the config.
pub async fn open_store(config: &Config) -> Result<Box<dyn StateStore>, StorageError> {
    match config.state_backend {
        StateBackend::Json => Ok(Box::new(JsonStateStore::open(&config.state_file).await?)),
        StateBackend::Sqlite => {
            let (database, legacy) = sqlite_paths(&config.state_file);
            let store = SqliteStateStore::new(&database).await?;
            store.migrate().await?;
            store.import_from_json(&legacy).await?;

            Ok(Box::new(store))
        }
    }
}
