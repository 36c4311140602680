//! In-memory blob store.
//!
//! Retains bodies together with the options they were written with, so
//! tests can assert on content type, encoding, and ACL — the pieces a
//! remote store would have recorded as object metadata.

use super::{AccessPolicy, BlobStore, PutOptions};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A stored object plus the metadata it was written with.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub access: AccessPolicy,
}

#[derive(Default, Debug)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of one stored object, if present.
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects().get(key).cloned()
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects()
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Bytes, opts: &PutOptions) -> StorageResult<()> {
        self.objects().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: opts.content_type.clone(),
                content_encoding: opts.content_encoding.clone(),
                access: opts.access,
            },
        );
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> StorageResult<()> {
        let body = tokio::fs::read(path).await?;
        self.put(key, Bytes::from(body), opts).await
    }
}
