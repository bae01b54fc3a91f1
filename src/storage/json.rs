use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::models::{Fingerprint, SiteKey, SiteState};
use crate::storage::StateStore;

/// All sites' state in one JSON document, kept in memory and written out on
/// `flush`. Writes go to a sibling temp file that is renamed into place, so an
/// interrupted flush leaves the previous document intact.
pub struct JsonStateStore {
    path: PathBuf,
    states: Mutex<BTreeMap<SiteKey, SiteState>>,
}

impl JsonStateStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let states = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            states: Mutex::new(states),
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self, key: &SiteKey) -> Result<SiteState, StorageError> {
        let states = self.states.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(states.get(key).cloned().unwrap_or_default())
    }

    async fn commit(
        &self,
        key: &SiteKey,
        fingerprints: Vec<Fingerprint>,
    ) -> Result<(), StorageError> {
        let mut states = self.states.lock().map_err(|_| StorageError::Poisoned)?;
        states.entry(key.clone()).or_default().replace(fingerprints);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let body = {
            let states = self.states.lock().map_err(|_| StorageError::Poisoned)?;
            serde_json::to_string_pretty(&*states)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body.as_bytes()).await?;
        tokio::fs::File::open(&temp).await?.sync_all().await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!("State flushed to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MAX_FINGERPRINTS;
    use pretty_assertions::assert_eq;

    fn fps(n: usize) -> Vec<Fingerprint> {
        (0..n).map(|i| Fingerprint(format!("{i:032x}"))).collect()
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::open(dir.path().join("previous_data.json")).await.unwrap();

        let state = store.load(&SiteKey::from_url("https://example.com")).await.unwrap();
        assert!(state.hashes.is_empty());
    }

    #[tokio::test]
    async fn commit_truncates_and_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("previous_data.json");
        let key = SiteKey::from_url("https://example.com/notice");

        let store = JsonStateStore::open(&path).await.unwrap();
        store.commit(&key, fps(70)).await.unwrap();
        store.flush().await.unwrap();

        let reopened = JsonStateStore::open(&path).await.unwrap();
        let state = reopened.load(&key).await.unwrap();
        assert_eq!(state.hashes.len(), MAX_FINGERPRINTS);
        assert_eq!(state.hashes, fps(70)[..MAX_FINGERPRINTS].to_vec());
    }

    #[tokio::test]
    async fn commit_overwrites_instead_of_merging() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::open(dir.path().join("s.json")).await.unwrap();
        let key = SiteKey::from_url("https://example.com");

        store.commit(&key, fps(3)).await.unwrap();
        store.commit(&key, fps(1)).await.unwrap();

        assert_eq!(store.load(&key).await.unwrap().hashes, fps(1));
    }

    #[tokio::test]
    async fn reads_legacy_state_format_and_keeps_other_sites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_data.json");
        std::fs::write(
            &path,
            r#"{
              "aaaa": {"hashes": ["h1", "h2"]},
              "bbbb": {"hashes": ["h3"], "note": "kept"}
            }"#,
        )
        .unwrap();

        let store = JsonStateStore::open(&path).await.unwrap();
        store
            .commit(&SiteKey("aaaa".into()), vec![Fingerprint("h9".into())])
            .await
            .unwrap();
        store.flush().await.unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(raw["aaaa"]["hashes"], serde_json::json!(["h9"]));
        assert_eq!(raw["bbbb"]["hashes"], serde_json::json!(["h3"]));
        assert_eq!(raw["bbbb"]["note"], "kept");
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previous_data.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            JsonStateStore::open(&path).await,
            Err(StorageError::Json(_))
        ));
    }
}
