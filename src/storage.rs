//! Key/value persistence behind the cache.
//!
//! The cache only needs string values under string keys. [`MemoryStorage`]
//! backs tests and ephemeral verifiers; [`FileStorage`] keeps one file per key
//! in a directory so a cache survives restarts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_std::sync::RwLock;
use async_trait::async_trait;

use crate::error::Error;

#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;
    async fn set(&self, key: &str, value: String) -> Result<(), Error>;
    async fn remove(&self, key: &str) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// One file per key under a directory. Values are written to a temporary
/// file and renamed into place, so readers never see a partial value.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        async_std::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match async_std::fs::read_to_string(self.path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("read {key}: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), Error> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        async_std::fs::write(&tmp, value)
            .await
            .map_err(|e| Error::Storage(format!("write {key}: {e}")))?;
        async_std::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Storage(format!("write {key}: {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        match async_std::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("remove {key}: {e}"))),
        }
    }
}
