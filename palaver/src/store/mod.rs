//! Session storage backends.
//!
//! The engine treats storage as a flat TTL key/value space through the
//! [`SessionStore`] trait. Two backends ship with the crate:
//!
//! - [`MemoryStore`]: in-process `HashMap`, the default
//! - [`FileStore`]: one JSON file per key under a base directory
//!
//! [`ScopedStore`] wraps any backend behind a key prefix, which is how
//! per-user and per-chat scratch caches share the session backend.

mod file;
mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;

/// A flat key/value store with per-entry TTL.
///
/// Values are opaque bytes. A zero TTL stores the value without expiry.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the value under `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()>;

    /// Delete the value under `key`. Deleting an absent key is not an error.
    async fn del(&self, key: &str) -> StoreResult<()>;

    /// Whether a live value exists under `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// A view of a [`SessionStore`] with every key prefixed.
///
/// Used for the per-user and per-chat caches, which live in the same
/// backend as dialog sessions but under their own namespaces.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn SessionStore>,
    prefix: String,
}

impl ScopedStore {
    /// Wrap `inner`, prepending `prefix` to every key.
    #[must_use]
    pub fn new(inner: Arc<dyn SessionStore>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// The prefix applied to keys.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionStore for ScopedStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(&self.scoped(key)).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> StoreResult<()> {
        self.inner.set(&self.scoped(key), value, ttl).await
    }

    async fn del(&self, key: &str) -> StoreResult<()> {
        self.inner.del(&self.scoped(key)).await
    }
}
