//! Storage backend configuration.
//!
//! The surrounding application loads and deserializes these settings;
//! the engine only validates them when a backend is constructed.
//! Validation fails fast: a store with missing credentials must never
//! get as far as a first request.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Which blob store implementation to construct.
///
/// Selected explicitly from configuration; all backends implement the
/// same [`BlobStore`](crate::blobstore::BlobStore) contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote S3-compatible object store.
    #[default]
    S3,
    /// Directory on the local filesystem (development, tests).
    Local,
    /// Ephemeral in-process store (tests).
    Memory,
}

/// Connection settings for the blob store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend implementation to use.
    pub backend: BackendKind,
    /// Bucket (or namespace) holding the registry document and the
    /// package archives.
    pub bucket: String,
    /// Access key id for the remote store.
    pub access_key: Option<String>,
    /// Secret access key for the remote store.
    pub secret_key: Option<String>,
    /// Region used for request signing.
    pub region: String,
    /// Explicit endpoint for S3-compatible stores. Defaults to the AWS
    /// endpoint for `region`.
    pub endpoint: Option<Url>,
    /// Refuse plaintext endpoints. On by default.
    pub require_tls: bool,
    /// Root directory for the `local` backend.
    pub root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::S3,
            bucket: String::new(),
            access_key: None,
            secret_key: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            require_tls: true,
            root: None,
        }
    }
}

impl StorageConfig {
    /// Settings for a remote S3-compatible store.
    pub fn s3(
        bucket: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            backend: BackendKind::S3,
            bucket: bucket.into(),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            ..Self::default()
        }
    }

    /// Settings for a directory-rooted local store.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Local,
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Settings for the ephemeral in-memory store.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }

    /// Check that every setting the selected backend needs is present.
    ///
    /// Returns [`StorageError::Config`] naming the first missing
    /// setting.
    pub fn validate(&self) -> StorageResult<()> {
        match self.backend {
            BackendKind::S3 => {
                if self.bucket.is_empty() {
                    return Err(StorageError::Config(
                        "bucket is required for the s3 backend".to_string(),
                    ));
                }
                if self.access_key.as_deref().is_none_or(str::is_empty) {
                    return Err(StorageError::Config(
                        "access_key is required for the s3 backend".to_string(),
                    ));
                }
                if self.secret_key.as_deref().is_none_or(str::is_empty) {
                    return Err(StorageError::Config(
                        "secret_key is required for the s3 backend".to_string(),
                    ));
                }
                if self.require_tls {
                    if let Some(endpoint) = &self.endpoint {
                        if endpoint.scheme() != "https" {
                            return Err(StorageError::Config(format!(
                                "endpoint {endpoint} is not https but require_tls is set"
                            )));
                        }
                    }
                }
                Ok(())
            }
            BackendKind::Local => {
                if self.root.is_none() {
                    return Err(StorageError::Config(
                        "root is required for the local backend".to_string(),
                    ));
                }
                Ok(())
            }
            BackendKind::Memory => Ok(()),
        }
    }
}
