//! Catalog document types.
//!
//! The registry is a single JSON document: a map from extension name to
//! entry. The application mutates entries in memory and hands complete
//! snapshots to the storage layer; nothing in this module performs I/O.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The catalog of published extensions, keyed by extension name.
///
/// `BTreeMap` keeps serialization order stable, so encoding the same
/// catalog twice yields byte-identical documents.
pub type Registry = BTreeMap<String, Entry>;

/// Latest published manifest metadata for an extension.
///
/// Only `name` and `version` are interpreted by the registry; every
/// other field the manifest carried (description, homepage, engine
/// ranges, ...) is preserved untouched in `extra` so rewriting the
/// catalog never drops data written by other producers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    pub name: String,
    pub version: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExtensionMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// One published version in an entry's history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReleasedVersion {
    pub version: String,
    /// Publish timestamp. Absent in documents written by very old
    /// tooling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    /// Per-version download count, maintained by the stats importer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
}

/// One extension's record in the registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub metadata: ExtensionMetadata,
    /// Owner identity, e.g. `"github:jdoe"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Publish history, oldest first; the latest release is the last
    /// element. May be empty, and every consumer must tolerate that.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<ReleasedVersion>,
    /// Aggregate download count across all versions. Monotonically
    /// non-decreasing; only the stats importer adds to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_downloads: Option<u64>,
}

impl Entry {
    /// The most recently published version, if any.
    pub fn latest_version(&self) -> Option<&ReleasedVersion> {
        self.versions.last()
    }

    /// Publish date of the latest version as an RFC 3339 string.
    ///
    /// Returns the empty string when the entry has no versions or the
    /// latest version carries no timestamp.
    pub fn last_published(&self) -> String {
        self.latest_version()
            .and_then(|version| version.published)
            .map(|published| published.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    /// Fold freshly imported download counts into the running total.
    pub fn add_downloads(&mut self, count: u64) {
        *self.total_downloads.get_or_insert(0) += count;
    }
}

/// Entries ordered newest publish first.
///
/// Entries without any dated version sort last, in name order, rather
/// than being dropped or causing an error.
pub fn sorted_by_publish_date(registry: &Registry) -> Vec<&Entry> {
    let mut entries: Vec<&Entry> = registry.values().collect();
    entries.sort_by(|a, b| {
        let a_published = a.latest_version().and_then(|version| version.published);
        let b_published = b.latest_version().and_then(|version| version.published);
        b_published
            .cmp(&a_published)
            .then_with(|| a.metadata.name.cmp(&b.metadata.name))
    });
    entries
}

/// Strip the auth-service prefix from an owner identity string
/// (`"github:jdoe"` becomes `"jdoe"`).
///
/// Identities without a prefix come back unchanged.
pub fn owner_account(owner: &str) -> &str {
    owner
        .split_once(':')
        .map_or(owner, |(_service, account)| account)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated_entry(name: &str, version: &str, published: &str) -> Entry {
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

    #[test]
    fn last_published_returns_latest_version_date() {
        let mut entry = dated_entry("my-extension", "1.0.0", "2013-04-02T21:12:33.865Z");
        entry.versions.push(ReleasedVersion {
            version: "1.1.0".to_string(),
            published: Some("2013-05-01T10:00:00.000Z".parse().unwrap()),
            downloads: Some(12),
        });

        assert_eq!(entry.last_published(), "2013-05-01T10:00:00.000Z");
    }

    #[test]
    fn last_published_is_empty_for_entry_without_versions() {
        let entry = Entry {
            metadata: ExtensionMetadata::new("bare", "1.0.0"),
            owner: None,
            versions: Vec::new(),
            total_downloads: None,
        };

        assert_eq!(entry.last_published(), "");
    }

    #[test]
    fn entry_round_trips_with_absent_optional_fields() {
        let json = r#"{"metadata":{"name":"foo","version":"1.0.0"}}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();

        assert!(entry.owner.is_none());
        assert!(entry.versions.is_empty());
        assert!(entry.total_downloads.is_none());

        // Absent fields stay absent on the way back out.
        let out = serde_json::to_value(&entry).unwrap();
        assert_eq!(out, serde_json::from_str::<serde_json::Value>(json).unwrap());
    }

    #[test]
    fn unknown_metadata_fields_are_preserved() {
        let json = r#"{"metadata":{"name":"foo","version":"1.0.0","description":"A thing","homepage":"https://example.com"}}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();

        assert_eq!(
            entry.metadata.extra.get("description").unwrap(),
            "A thing"
        );
        let out = serde_json::to_value(&entry).unwrap();
        assert_eq!(out["metadata"]["homepage"], "https://example.com");
    }

    #[test]
    fn total_downloads_serializes_camel_case() {
        let mut entry = dated_entry("foo", "1.0.0", "2013-04-02T21:12:33.865Z");
        entry.add_downloads(10);
        entry.add_downloads(5);

        let out = serde_json::to_value(&entry).unwrap();
        assert_eq!(out["totalDownloads"], 15);
    }

    #[test]
    fn sort_is_newest_first_with_undated_entries_last() {
        let mut registry = Registry::new();
        registry.insert(
            "older".to_string(),
            dated_entry("older", "1.0.0", "2013-04-02T21:12:33.865Z"),
        );
        registry.insert(
            "newer".to_string(),
            dated_entry("newer", "2.0.0", "2013-04-03T08:32:02.153Z"),
        );
        registry.insert(
            "undated".to_string(),
            Entry {
                metadata: ExtensionMetadata::new("undated", "0.1.0"),
                owner: None,
                versions: Vec::new(),
                total_downloads: None,
            },
        );

        let sorted = sorted_by_publish_date(&registry);
        let names: Vec<&str> = sorted
            .iter()
            .map(|entry| entry.metadata.name.as_str())
            .collect();
        assert_eq!(names, vec!["newer", "older", "undated"]);
    }

    #[test]
    fn owner_account_strips_service_prefix() {
        assert_eq!(owner_account("github:jdoe"), "jdoe");
        assert_eq!(owner_account("no-prefix"), "no-prefix");
    }
}
