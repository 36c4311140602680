//! Shared fixtures and blob store doubles for the storage integration
//! suite.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use registry_core::{Entry, ExtensionMetadata, Registry, ReleasedVersion};
use registry_storage::blobstore::{BlobStore, PutOptions};
use registry_storage::error::{StorageError, StorageResult};
use registry_storage::store::{BACKUP_PREFIX, REGISTRY_KEY};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One write observed by a test store, in arrival order.
#[derive(Clone, Debug)]
pub struct RecordedPut {
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub access: String,
}

/// Blob store double that records every write and can hold writes to
/// the primary registry key open until the test releases them, so the
/// test controls exactly when a "network" round trip completes.
#[derive(Debug)]
pub struct GatedStore {
    log: Mutex<Vec<RecordedPut>>,
    objects: Mutex<HashMap<String, RecordedPut>>,
    gate: Option<Semaphore>,
    active_primary: AtomicUsize,
    max_active_primary: AtomicUsize,
    fail_primary: AtomicBool,
    fail_backups: AtomicBool,
}

impl GatedStore {
    /// Writes complete immediately.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Writes to the primary key block until [`release`](Self::release)
    /// grants a permit.
    pub fn gated() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            objects: Mutex::new(HashMap::new()),
            gate,
            active_primary: AtomicUsize::new(0),
            max_active_primary: AtomicUsize::new(0),
            fail_primary: AtomicBool::new(false),
            fail_backups: AtomicBool::new(false),
        }
    }

    /// Let `count` gated primary writes proceed.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn set_fail_primary(&self, fail: bool) {
        self.fail_primary.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_backups(&self, fail: bool) {
        self.fail_backups.store(fail, Ordering::SeqCst);
    }

    /// Every write attempt so far, in arrival order.
    pub fn recorded(&self) -> Vec<RecordedPut> {
        self.log.lock().unwrap().clone()
    }

    /// Write attempts against the primary registry key.
    pub fn primary_puts(&self) -> Vec<RecordedPut> {
        self.recorded()
            .into_iter()
            .filter(|put| put.key == REGISTRY_KEY)
            .collect()
    }

    /// Write attempts against backup keys.
    pub fn backup_puts(&self) -> Vec<RecordedPut> {
        self.recorded()
            .into_iter()
            .filter(|put| put.key.starts_with(BACKUP_PREFIX))
            .collect()
    }

    /// Most writes to the primary key ever in flight at once.
    pub fn max_concurrent_primary_puts(&self) -> usize {
        self.max_active_primary.load(Ordering::SeqCst)
    }

    /// Primary writes currently in flight (including gated ones).
    pub fn active_primary_puts(&self) -> usize {
        self.active_primary.load(Ordering::SeqCst)
    }

    /// Latest successfully stored object under `key`.
    pub fn object(&self, key: &str) -> Option<RecordedPut> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for GatedStore {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.object(key)
            .map(|put| put.body)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Bytes, opts: &PutOptions) -> StorageResult<()> {
        let is_primary = key == REGISTRY_KEY;
        if is_primary {
            let active = self.active_primary.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active_primary.fetch_max(active, Ordering::SeqCst);
        }

        let record = RecordedPut {
            key: key.to_string(),
            body,
            content_type: opts.content_type.clone(),
            content_encoding: opts.content_encoding.clone(),
            access: opts.access.as_str().to_string(),
        };
        self.log.lock().unwrap().push(record.clone());

        if is_primary {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
        }

        let fail = (is_primary && self.fail_primary.load(Ordering::SeqCst))
            || (key.starts_with(BACKUP_PREFIX) && self.fail_backups.load(Ordering::SeqCst));

        let result = if fail {
            Err(StorageError::Backend {
                key: key.to_string(),
                status: 503,
            })
        } else {
            self.objects.lock().unwrap().insert(key.to_string(), record);
            Ok(())
        };

        if is_primary {
            self.active_primary.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }

    async fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> StorageResult<()> {
        let body = tokio::fs::read(path).await?;
        self.put(key, Bytes::from(body), opts).await
    }
}

/// Busy-wait (cooperatively) until `condition` holds.
pub async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached within timeout");
}

/// Entry with a single dated release.
pub fn entry(name: &str, version: &str, published: &str) -> Entry {
    Entry {
        metadata: ExtensionMetadata::new(name, version),
        owner: Some(format!("github:{name}-author")),
        versions: vec![ReleasedVersion {
            version: version.to_string(),
            published: Some(published.parse().unwrap()),
            downloads: None,
        }],
        total_downloads: None,
    }
}

/// Registry holding the given entries, keyed by name.
pub fn registry_with(entries: &[Entry]) -> Registry {
    entries
        .iter()
        .map(|entry| (entry.metadata.name.clone(), entry.clone()))
        .collect()
}

/// Decode a stored registry payload, panicking on corruption.
pub fn decode_payload(bytes: &[u8]) -> Registry {
    registry_storage::codec::decode(bytes).expect("stored payload should decode")
}
