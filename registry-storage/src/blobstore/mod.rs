//! # Blob Store Adapter
//!
//! Uniform interface over a key-addressed object store. The registry
//! store and package uploader only ever see [`BlobStore`]; which
//! backend sits behind it is decided once, from configuration, in
//! [`from_config`].
//!
//! Operations carry no retry policy of their own. Callers decide what
//! a failed read or write means.

pub mod local;
pub mod memory;
pub mod s3;
mod sign;

use crate::config::{BackendKind, StorageConfig};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

/// Object ACL applied at write time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessPolicy {
    /// World-readable. Registry documents and package archives are
    /// served straight out of the store.
    PublicRead,
    Private,
}

impl AccessPolicy {
    /// Canned ACL name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublicRead => "public-read",
            Self::Private => "private",
        }
    }
}

/// Write-time object metadata.
#[derive(Clone, Debug)]
pub struct PutOptions {
    pub content_type: String,
    pub content_encoding: Option<String>,
    pub access: AccessPolicy,
}

impl PutOptions {
    /// Options for the gzip-compressed registry document.
    pub fn gzipped_json() -> Self {
        Self {
            content_type: "application/json".to_string(),
            content_encoding: Some("gzip".to_string()),
            access: AccessPolicy::PublicRead,
        }
    }

    /// Options for an uploaded package archive.
    pub fn zip_archive() -> Self {
        Self {
            content_type: "application/zip".to_string(),
            content_encoding: None,
            access: AccessPolicy::PublicRead,
        }
    }
}

/// Uniform interface over a remote key/value object store.
///
/// Implementations must be shareable behind an `Arc` across tasks. No
/// method retries internally.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Fetch an object's bytes. A missing key surfaces as
    /// [`StorageError::NotFound`].
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Write an object from an in-memory payload.
    async fn put(&self, key: &str, body: Bytes, opts: &PutOptions) -> StorageResult<()>;

    /// Stream a local file to the store without buffering it whole.
    async fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> StorageResult<()>;
}

/// Construct the configured backend.
///
/// Fails fast with [`StorageError::Config`] when the selected backend
/// is missing required settings.
pub fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    config.validate()?;
    match config.backend {
        BackendKind::S3 => Ok(Arc::new(s3::S3Store::new(config)?)),
        BackendKind::Local => {
            let root = config.root.clone().ok_or_else(|| {
                StorageError::Config("root is required for the local backend".to_string())
            })?;
            Ok(Arc::new(local::LocalStore::new(root)))
        }
        BackendKind::Memory => Ok(Arc::new(memory::MemoryStore::new())),
    }
}
