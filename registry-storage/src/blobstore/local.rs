//! Local-filesystem blob store.
//!
//! Maps object keys onto paths under a root directory. Content type,
//! encoding, and ACL have no filesystem analog and are ignored here;
//! this backend exists for development and tests.

use super::{BlobStore, PutOptions};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys use `/` separators; join per component so the layout comes
    /// out the same on every platform.
    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
            debug!(parent = %parent.display(), "created parent directory");
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.object_path(key);
        match fs::read(&path).await {
            Ok(body) => Ok(Bytes::from(body)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(key = %key, path = %path.display(), "object not found");
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, key: &str, body: Bytes, _opts: &PutOptions) -> StorageResult<()> {
        let path = self.object_path(key);
        Self::ensure_parent(&path).await?;
        fs::write(&path, &body).await?;
        info!(
            key = %key,
            path = %path.display(),
            size = body.len(),
            "object written"
        );
        Ok(())
    }

    async fn put_file(&self, key: &str, source: &Path, _opts: &PutOptions) -> StorageResult<()> {
        let path = self.object_path(key);
        Self::ensure_parent(&path).await?;
        let size = fs::copy(source, &path).await?;
        info!(
            key = %key,
            source = %source.display(),
            size,
            "file copied into store"
        );
        Ok(())
    }
}
