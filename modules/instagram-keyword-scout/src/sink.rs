// Run storage: where input is read from and results are written to.
//
// ApifyStorage talks to the run's default dataset and key-value store on the
// platform. LocalStorage mirrors the platform's local-storage directory layout
// so runs outside the platform leave the same artifacts on disk.

use std::path::{Path, PathBuf};

use apify_client::{ApifyClient, DatasetItem};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, ScoutError};

#[async_trait]
pub trait RunStorage: Send + Sync {
    /// Read a named value. `None` when nothing is stored under `key`.
    async fn get_value(&self, key: &str) -> Result<Option<Value>>;

    /// Write a named value, replacing whatever was stored under `key`.
    async fn set_value(&self, key: &str, value: &Value) -> Result<()>;

    /// Append records to the output dataset.
    async fn push_records(&self, records: &[DatasetItem]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ApifyStorage
// ---------------------------------------------------------------------------

pub struct ApifyStorage {
    client: ApifyClient,
    dataset_id: String,
    key_value_store_id: String,
}

impl ApifyStorage {
    pub fn new(client: ApifyClient, dataset_id: String, key_value_store_id: String) -> Self {
        Self {
            client,
            dataset_id,
            key_value_store_id,
        }
    }
}

#[async_trait]
impl RunStorage for ApifyStorage {
    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.client.get_record(&self.key_value_store_id, key).await?)
    }

    async fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        self.client
            .set_record(&self.key_value_store_id, key, value)
            .await?;
        tracing::debug!(key, store_id = %self.key_value_store_id, "Stored record");
        Ok(())
    }

    async fn push_records(&self, records: &[DatasetItem]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.client
            .push_dataset_items(&self.dataset_id, records)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LocalStorage
// ---------------------------------------------------------------------------

/// Directory-backed storage:
/// `<root>/key_value_stores/default/<KEY>.json` and
/// `<root>/datasets/default/<000000001>.json`.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_value_store_dir(&self) -> PathBuf {
        self.root.join("key_value_stores").join("default")
    }

    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join("datasets").join("default")
    }

    fn record_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(ScoutError::Storage(format!("invalid record key: {key:?}")));
        }
        Ok(self.key_value_store_dir().join(format!("{key}.json")))
    }

    /// Highest item number already present in the dataset directory.
    async fn last_item_number(&self, dir: &Path) -> Result<u64> {
        let mut last = 0;
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(n) = stem.parse::<u64>() {
                last = last.max(n);
            }
        }
        Ok(last)
    }
}

#[async_trait]
impl RunStorage for LocalStorage {
    async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let path = self.record_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_value(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.record_path(key)?;
        tokio::fs::create_dir_all(self.key_value_store_dir()).await?;
        tokio::fs::write(&path, serde_json::to_vec_pretty(value)?).await?;
        tracing::debug!(key, path = %path.display(), "Stored record");
        Ok(())
    }

    async fn push_records(&self, records: &[DatasetItem]) -> Result<()> {
        let dir = self.dataset_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let mut next = self.last_item_number(&dir).await? + 1;
        for record in records {
            let path = dir.join(format!("{next:09}.json"));
            tokio::fs::write(&path, serde_json::to_vec_pretty(record)?).await?;
            next += 1;
        }
        tracing::debug!(count = records.len(), dir = %dir.display(), "Pushed dataset items");
        Ok(())
    }
}
