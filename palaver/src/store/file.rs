//! File-backed session store.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::SessionStore;

/// On-disk representation of one entry.
///
/// The payload is base64 so arbitrary bytes survive the JSON envelope.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    /// Expiry as unix milliseconds, absent for entries without TTL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
    /// Base64-encoded value.
    payload: String,
}

/// Session store that keeps one JSON file per key.
///
/// Keys are sanitized into file names, so distinct keys that differ only
/// in `:`, `/` or `\` characters would collide; the key layouts used by
/// the crate never do. Expiry is checked on read and expired files are
/// removed.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `base_path`. The directory is created on
    /// first write.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Default storage location, `~/.palaver/sessions`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".palaver")
            .join("sessions")
    }

    /// The directory entries are stored in.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let safe_key = key.replace([':', '/', '\\'], "_");
        self.base_path.join(format!("{safe_key}.json"))
    }

    async fn ensure_dir(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry = serde_json::from_slice(&raw)?;

        if entry.expires_at.is_some_and(|at| now_ms() >= at) {
            debug!(key = %key, "entry expired, removing");
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        let value = STANDARD
            .decode(entry.payload)
            .map_err(|e| StoreError::decode(e.to_string()))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.ensure_dir().await?;
        let entry = StoredEntry {
            expires_at: (!ttl.is_zero()).then(|| now_ms().saturating_add(duration_ms(ttl))),
            payload: STANDARD.encode(value),
        };
        let json = serde_json::to_vec_pretty(&entry)?;
        tokio::fs::write(self.entry_path(key), json).await?;
        debug!(key = %key, "entry saved");
        Ok(())
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => {
                debug!(key = %key, "entry deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, duration_ms)
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> FileStore {
        let dir = std::env::temp_dir().join(format!("palaver-store-{}-{tag}", std::process::id()));
        FileStore::new(dir)
    }

    async fn cleanup(store: &FileStore) {
        let _ = tokio::fs::remove_dir_all(store.base_path()).await;
    }

    #[tokio::test]
    async fn test_round_trip_and_delete() {
        let store = temp_store("round-trip");
        store.set("dialog:1:2", b"payload", Duration::ZERO).await.unwrap();
        assert_eq!(
            store.get("dialog:1:2").await.unwrap(),
            Some(b"payload".to_vec())
        );

        store.del("dialog:1:2").await.unwrap();
        assert_eq!(store.get("dialog:1:2").await.unwrap(), None);
        store.del("dialog:1:2").await.unwrap();
        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_keys_are_sanitized() {
        let store = temp_store("sanitize");
        store.set("dialog:1:2", b"x", Duration::ZERO).await.unwrap();
        assert!(store.base_path().join("dialog_1_2.json").exists());
        cleanup(&store).await;
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = temp_store("expiry");
        store
            .set("k", b"v", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        cleanup(&store).await;
    }
}
