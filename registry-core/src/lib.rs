//! # Extension Registry Data Model
//!
//! Core types for the extension registry catalog: the registry document
//! itself, per-extension entries with their version history, and the
//! derived views that route and feed code present to users.
//!
//! This crate is I/O-free. Persistence of the catalog lives in
//! `registry-storage`; everything here is plain data plus a few helpers
//! over it.

pub mod catalog;

pub use catalog::{
    owner_account, sorted_by_publish_date, Entry, ExtensionMetadata, Registry, ReleasedVersion,
};
