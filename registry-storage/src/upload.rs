//! Package archive uploads.
//!
//! Archives are immutable blobs keyed by name and version. Uploading
//! the same version again overwrites the same key, which keeps retried
//! publishes idempotent.

use crate::blobstore::{BlobStore, PutOptions};
use crate::error::{StorageError, StorageResult};
use registry_core::Entry;
use std::path::Path;
use tracing::info;

/// Storage key for a package archive: `<name>/<name>-<version>.zip`.
pub fn package_key(name: &str, version: &str) -> String {
    format!("{name}/{name}-{version}.zip")
}

/// Reject names and versions that would escape or mangle the key
/// pattern.
fn validate_component(label: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidPackage(format!("{label} is empty")));
    }
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(StorageError::InvalidPackage(format!(
            "{label} {value:?} is not a valid key component"
        )));
    }
    Ok(())
}

/// Stream a package archive to the blob store.
///
/// Backend errors are forwarded untouched. The archive file is left in
/// place regardless of outcome; deleting it is the caller's decision.
pub async fn upload_package(
    blobs: &dyn BlobStore,
    entry: &Entry,
    archive: &Path,
) -> StorageResult<()> {
    let name = &entry.metadata.name;
    let version = &entry.metadata.version;
    validate_component("package name", name)?;
    validate_component("package version", version)?;

    let key = package_key(name, version);
    blobs
        .put_file(&key, archive, &PutOptions::zip_archive())
        .await?;
    info!(key = %key, archive = %archive.display(), "package archive uploaded");
    Ok(())
}
