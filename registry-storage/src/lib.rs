//! # Extension Registry Persistence
//!
//! Object-store persistence engine for the extension registry: keeps
//! the in-memory catalog document synchronized with a durable blob
//! store and stores uploaded package archives alongside it.
//!
//! ## Key Modules
//!
//! - [`config`]: backend selection and connection settings
//! - [`blobstore`]: the swappable object-store adapter with S3,
//!   local-filesystem, and in-memory backends
//! - [`codec`]: gzip + JSON encoding of the catalog document
//! - [`store`]: the coalescing registry store
//! - [`upload`]: package archive uploads
//!
//! ## Write coalescing
//!
//! The catalog document is rewritten wholesale on every mutation, so
//! the store never runs two primary writes at once. Saves that arrive
//! while a write is outstanding collapse into a single follow-up write
//! of the newest snapshot; intermediate snapshots are never persisted.
//! See [`store::RegistryStore::save_registry`].

pub mod blobstore;
pub mod codec;
pub mod config;
pub mod error;
pub mod store;
pub mod upload;

pub use blobstore::{from_config, AccessPolicy, BlobStore, PutOptions};
pub use config::{BackendKind, StorageConfig};
pub use error::{RegistryDecodeError, StorageError, StorageResult};
pub use store::RegistryStore;
pub use upload::package_key;
