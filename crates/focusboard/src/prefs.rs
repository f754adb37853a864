//! Small local key-value store for user preferences: the credential override
//! and the date the daily summary was last shown.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config_store::write_atomic_string;

pub const CREDENTIAL_KEY: &str = "focusboard-api-key";

#[async_trait]
pub trait Prefs: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// JSON object on disk, rewritten atomically on every change.
#[derive(Debug)]
pub struct FilePrefs {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePrefs {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parse prefs: {}", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err).with_context(|| format!("read prefs: {}", self.path.display())),
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let s = serde_json::to_string_pretty(map).context("serialize prefs")?;
        write_atomic_string(&self.path, &s).await
    }
}

#[async_trait]
impl Prefs for FilePrefs {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_owned(), value.to_owned());
        self.write_all(&map).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPrefs {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: &[(&str, &str)]) -> Self {
        Self {
            map: Mutex::new(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl Prefs for MemoryPrefs {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .lock()
            .await
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.lock().await.remove(key);
        Ok(())
    }
}

/// The stored credential override, if any. Read failures count as unset.
pub async fn stored_credential(prefs: &dyn Prefs) -> Option<String> {
    match prefs.get(CREDENTIAL_KEY).await {
        Ok(v) => v.filter(|s| !s.trim().is_empty()),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "read stored credential failed");
            None
        }
    }
}
