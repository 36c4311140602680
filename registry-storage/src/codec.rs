//! Registry document codec.
//!
//! The canonical catalog is stored as gzip-compressed JSON. Encoding
//! is deterministic — sorted keys come from the `BTreeMap` document —
//! so identical catalogs produce identical payloads.

use crate::error::{RegistryDecodeError, StorageError, StorageResult};
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use registry_core::Registry;
use std::io::{Read, Write};
use tracing::error;

/// Serialize and compress a catalog snapshot.
pub fn encode(registry: &Registry) -> StorageResult<Bytes> {
    let json = serde_json::to_vec(registry)?;
    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json)?;
    Ok(Bytes::from(encoder.finish()?))
}

/// Decompress and parse a catalog document.
///
/// Every failure mode — corrupt stream, malformed JSON, a payload that
/// is not an object — collapses into
/// [`StorageError::UnreadableRegistry`] after the underlying cause is
/// logged, so callers keep serving their last known-good catalog.
pub fn decode(bytes: &[u8]) -> StorageResult<Registry> {
    let mut json = Vec::new();
    if let Err(cause) = GzDecoder::new(bytes).read_to_end(&mut json) {
        error!(error = %cause, "failed to decompress registry document");
        return Err(StorageError::UnreadableRegistry(
            RegistryDecodeError::Decompress(cause),
        ));
    }

    match serde_json::from_slice(&json) {
        Ok(registry) => Ok(registry),
        Err(cause) => {
            error!(error = %cause, "failed to parse registry document");
            Err(StorageError::UnreadableRegistry(
                RegistryDecodeError::Parse(cause),
            ))
        }
    }
}
