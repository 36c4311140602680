//! # Registry Store
//!
//! Owns persistence of the canonical catalog document: fetch and
//! decode, coalesced wholesale saves, rolling backup copies, and
//! package archive uploads.
//!
//! ## Coalescing
//!
//! The catalog is rewritten in full on every save, so overlapping
//! writes buy nothing and can interleave badly on an eventually
//! consistent store. The store therefore keeps at most one primary
//! write in flight. A save requested while one is outstanding parks
//! its snapshot in a single pending slot (newest wins); when the
//! in-flight write completes — successfully or not — the pending
//! snapshot, if any, starts the next cycle. Once the store goes idle,
//! the last snapshot handed in is the one the object store holds.

use crate::blobstore::{BlobStore, PutOptions};
use crate::codec;
use crate::error::StorageResult;
use crate::upload;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use registry_core::{Entry, Registry};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Key of the canonical registry document.
pub const REGISTRY_KEY: &str = "registry.json";

/// Key prefix for timestamped backup copies.
pub const BACKUP_PREFIX: &str = "registry_backups/registry-";

#[derive(Default)]
struct SaveState {
    in_flight: bool,
    /// Newest snapshot queued behind the in-flight write.
    pending: Option<Registry>,
    /// Snapshot of the most recent cycle whose primary write failed
    /// with nothing newer queued behind it; [`RegistryStore::flush`]
    /// re-issues it.
    failed: Option<Registry>,
}

struct StoreInner {
    blobs: Arc<dyn BlobStore>,
    state: Mutex<SaveState>,
    /// Backup writes still running, tracked so `flush` can drain them.
    backups_in_flight: AtomicUsize,
    idle: Notify,
}

impl StoreInner {
    fn state(&self) -> MutexGuard<'_, SaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the persistence engine. Cheap to clone; all clones share
/// one coalescing pipeline.
///
/// Precondition: one logical mutator sequence per process. Callers
/// mutate their in-memory catalog and hand completed snapshots to
/// [`save_registry`](Self::save_registry); the store serializes its
/// own writes, not concurrent mutation of the caller's map.
#[derive(Clone)]
pub struct RegistryStore {
    inner: Arc<StoreInner>,
}

impl RegistryStore {
    /// Build a store on top of an already-constructed backend.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                blobs,
                state: Mutex::default(),
                backups_in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Fetch and decode the canonical catalog document.
    ///
    /// Decode failures come back as
    /// [`StorageError::UnreadableRegistry`](crate::error::StorageError::UnreadableRegistry)
    /// with the cause logged; fetch failures propagate the backend
    /// error as-is. Neither touches any queued save state.
    pub async fn get_registry(&self) -> StorageResult<Registry> {
        let bytes = self.inner.blobs.get(REGISTRY_KEY).await?;
        codec::decode(&bytes)
    }

    /// Queue a catalog snapshot for persistence. Fire and forget.
    ///
    /// If no write is outstanding the snapshot is written immediately;
    /// otherwise it replaces any previously queued snapshot and is
    /// written when the outstanding cycle completes. Snapshots
    /// overtaken in the queue are never persisted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn save_registry(&self, snapshot: Registry) {
        let mut state = self.inner.state();
        state.failed = None;
        if state.in_flight {
            debug!(key = REGISTRY_KEY, "write outstanding, queueing snapshot");
            state.pending = Some(snapshot);
            return;
        }
        state.in_flight = true;
        drop(state);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run_save_cycles(inner, snapshot).await;
        });
    }

    /// Drain the save pipeline.
    ///
    /// Re-issues the most recent snapshot whose primary write failed
    /// with nothing queued behind it, then waits until no primary
    /// write is in flight, no snapshot is pending, and every backup
    /// task has finished. A failed write is never retried on a timer;
    /// callers that need a durability point call this explicitly. If
    /// the retried write fails again its snapshot is stashed for the
    /// next `flush`.
    pub async fn flush(&self) {
        let retry = self.inner.state().failed.take();
        if let Some(snapshot) = retry {
            info!(key = REGISTRY_KEY, "retrying previously failed write");
            self.save_registry(snapshot);
        }

        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn is_idle(&self) -> bool {
        let state = self.inner.state();
        !state.in_flight
            && state.pending.is_none()
            && self.inner.backups_in_flight.load(Ordering::SeqCst) == 0
    }

    /// Upload a package archive for `entry`.
    ///
    /// On success the caller adds `entry` to its in-memory catalog and
    /// calls [`save_registry`](Self::save_registry). The archive file
    /// is left in place either way; its cleanup stays with the caller,
    /// which is why it needs this result.
    pub async fn save_package(&self, entry: &Entry, archive: &Path) -> StorageResult<()> {
        upload::upload_package(self.inner.blobs.as_ref(), entry, archive).await
    }
}

async fn run_save_cycles(inner: Arc<StoreInner>, first: Registry) {
    let mut snapshot = first;
    loop {
        let succeeded = write_primary(&inner, &snapshot).await;

        let mut state = inner.state();
        match state.pending.take() {
            Some(next) => {
                drop(state);
                snapshot = next;
            }
            None => {
                if !succeeded {
                    state.failed = Some(snapshot);
                }
                state.in_flight = false;
                drop(state);
                inner.idle.notify_waiters();
                return;
            }
        }
    }
}

/// One save cycle: encode, write the primary key, then hand the same
/// payload to a detached backup task. Returns whether the primary
/// write succeeded.
async fn write_primary(inner: &Arc<StoreInner>, snapshot: &Registry) -> bool {
    let payload = match codec::encode(snapshot) {
        Ok(payload) => payload,
        Err(err) => {
            error!(error = %err, key = REGISTRY_KEY, "failed to encode registry document");
            return false;
        }
    };

    match inner
        .blobs
        .put(REGISTRY_KEY, payload.clone(), &PutOptions::gzipped_json())
        .await
    {
        Ok(()) => {
            info!(key = REGISTRY_KEY, size = payload.len(), "registry document persisted");
            spawn_backup(inner, payload);
            true
        }
        Err(err) => {
            error!(error = %err, key = REGISTRY_KEY, "failed to persist registry document");
            false
        }
    }
}

/// Write a timestamped backup copy of an already-persisted payload.
///
/// Runs detached from the save pipeline, so a slow or failing backup
/// never delays the next coalesced save. Failures are logged, not
/// retried, and never surfaced to the save path.
fn spawn_backup(inner: &Arc<StoreInner>, payload: Bytes) {
    let key = format!(
        "{BACKUP_PREFIX}{}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    inner.backups_in_flight.fetch_add(1, Ordering::SeqCst);

    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        match inner.blobs.put(&key, payload, &PutOptions::gzipped_json()).await {
            Ok(()) => debug!(key = %key, "backup written"),
            Err(err) => warn!(error = %err, key = %key, "backup write failed"),
        }
        inner.backups_in_flight.fetch_sub(1, Ordering::SeqCst);
        inner.idle.notify_waiters();
    });
}
