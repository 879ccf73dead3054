//! Versioned JSON store under `<config_dir>/.storage/`
//!
//! Files use the envelope
//! ```json
//! { "version": 1, "minor_version": 1, "key": "core.config_entries", "data": { ... } }
//! ```

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{key} has version {found}, newer than supported {supported}")]
    UnsupportedVersion {
        key: String,
        found: u32,
        supported: u32,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    minor_version: u32,
    key: String,
    data: T,
}

/// One storage key holding a value of type `T`
#[derive(Debug, Clone)]
pub struct Store<T> {
    dir: PathBuf,
    key: String,
    version: u32,
    minor_version: u32,
    _data: PhantomData<fn() -> T>,
}

impl<T> Store<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(config_dir: impl AsRef<Path>, key: impl Into<String>, version: u32, minor_version: u32) -> Self {
        Self {
            dir: config_dir.as_ref().join(".storage"),
            key: key.into(),
            version,
            minor_version,
            _data: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.key)
    }

    /// Read the stored value; `None` when nothing was saved yet
    pub async fn load(&self) -> StorageResult<Option<T>> {
        let path = self.path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("Storage file not found: {}", self.key);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let envelope: Envelope<T> = serde_json::from_str(&content)?;
        if envelope.version > self.version {
            return Err(StorageError::UnsupportedVersion {
                key: self.key.clone(),
                found: envelope.version,
                supported: self.version,
            });
        }

        debug!(
            "Loaded {} (v{}.{})",
            self.key, envelope.version, envelope.minor_version
        );
        Ok(Some(envelope.data))
    }

    /// Write `data`, replacing the file atomically
    pub async fn save(&self, data: &T) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let envelope = Envelope {
            version: self.version,
            minor_version: self.minor_version,
            key: self.key.clone(),
            data,
        };
        let content = serde_json::to_string_pretty(&envelope)?;

        let temp_path = self.dir.join(format!("{}.tmp", self.key));
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, self.path()).await?;

        debug!("Saved {}", self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Hosts {
        hosts: Vec<String>,
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let store: Store<Hosts> = Store::new(dir.path(), "test.hosts", 1, 1);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_writes_envelope() {
        let dir = TempDir::new().unwrap();
        let store = Store::new(dir.path(), "test.hosts", 1, 2);
        let hosts = Hosts {
            hosts: vec!["10.0.0.5".into()],
        };

        store.save(&hosts).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["minor_version"], 2);
        assert_eq!(raw["key"], "test.hosts");
        assert_eq!(raw["data"]["hosts"][0], "10.0.0.5");
        assert!(!dir.path().join(".storage/test.hosts.tmp").exists());

        assert_eq!(store.load().await.unwrap(), Some(hosts));
    }

    #[tokio::test]
    async fn test_newer_major_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let newer: Store<Hosts> = Store::new(dir.path(), "test.hosts", 2, 1);
        newer.save(&Hosts { hosts: vec![] }).await.unwrap();

        let older: Store<Hosts> = Store::new(dir.path(), "test.hosts", 1, 1);
        let err = older.load().await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::UnsupportedVersion {
                found: 2,
                supported: 1,
                ..
            }
        ));
    }
}
