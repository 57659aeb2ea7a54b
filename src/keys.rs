//! Key scheme for the backing store.
//!
//! Every persisted item for a record shares the partition key
//! `RECORD#<bare id>`; core and extension documents are distinguished by the
//! `VERSION#` / `EXTENSION#` sort-key prefixes followed by a version token.
//! The encoding is a compatibility contract: items written under this scheme
//! must decode forever, so nothing here may depend on configuration.

use std::fmt;

use crate::error::{Result, StoreError};

pub const RECORD_NAMESPACE: &str = "RECORD#";
pub const VERSION_PREFIX: &str = "VERSION#";
pub const EXTENSION_PREFIX: &str = "EXTENSION#";

/// Position of a stored item in a record's version history.
///
/// `Timestamp` carries the RFC3339 `modified` value of the snapshot it names.
/// The token string is embedded verbatim in sort keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionToken {
    Latest,
    Timestamp(String),
    Tombstone,
}

impl VersionToken {
    pub const LATEST: &'static str = "latest";
    pub const TOMBSTONE: &'static str = "tombstone";

    pub fn timestamp(value: impl Into<String>) -> Self {
        Self::Timestamp(value.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Latest => Self::LATEST,
            Self::Timestamp(value) => value,
            Self::Tombstone => Self::TOMBSTONE,
        }
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        match value {
            Self::LATEST => Self::Latest,
            Self::TOMBSTONE => Self::Tombstone,
            other => Self::Timestamp(other.to_string()),
        }
    }
}

/// Partition key for a record identifier.
///
/// The scheme and separating slashes of URL-form identifiers are stripped so
/// that `https://doi.org/10.48321/D1ABCD` and its bare `doi.org/...` form
/// land on the same partition.
pub fn record_key(dmp_id: &str) -> String {
    let trimmed = dmp_id.trim();
    let bare = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed)
        .trim_start_matches('/');
    format!("{RECORD_NAMESPACE}{bare}")
}

/// Recover the record identifier from a partition key.
///
/// Keys whose first path segment names a host (contains a dot, and is not a
/// bare DOI prefix such as `10.48321`) are restored to their canonical
/// `https://` form; anything else is returned verbatim.
pub fn decode_record_key(partition_key: &str) -> Result<String> {
    let bare = partition_key
        .strip_prefix(RECORD_NAMESPACE)
        .ok_or_else(|| {
            StoreError::validation(format!("not a record partition key: {partition_key}"))
        })?;
    let head = bare.split('/').next().unwrap_or_default();
    if head.contains('.') && !head.starts_with("10.") {
        Ok(format!("https://{bare}"))
    } else {
        Ok(bare.to_string())
    }
}

/// Sort key of the core document at `version`.
pub fn core_key(version: &VersionToken) -> String {
    format!("{VERSION_PREFIX}{version}")
}

/// Sort key of the extension document at `version`.
pub fn extension_key(version: &VersionToken) -> String {
    format!("{EXTENSION_PREFIX}{version}")
}

/// Extract the version token from a core or extension sort key.
pub fn version_from_sort_key(sort_key: &str) -> Option<VersionToken> {
    sort_key
        .strip_prefix(VERSION_PREFIX)
        .or_else(|| sort_key.strip_prefix(EXTENSION_PREFIX))
        .map(VersionToken::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_key_strips_scheme_and_slashes() {
        assert_eq!(
            record_key("https://doi.org/10.48321/D1ABCD"),
            "RECORD#doi.org/10.48321/D1ABCD"
        );
        assert_eq!(
            record_key("http://doi.org/10.48321/D1ABCD"),
            "RECORD#doi.org/10.48321/D1ABCD"
        );
        assert_eq!(record_key("10.48321/D1ABCD"), "RECORD#10.48321/D1ABCD");
        assert_eq!(record_key("  //doi.org/10.1/x "), "RECORD#doi.org/10.1/x");
    }

    #[test]
    fn record_key_round_trips_canonical_ids() {
        for id in [
            "https://doi.org/10.48321/D1ABCD",
            "https://dmphub.example.org/dmps/12345",
            "10.48321/D1ABCD",
        ] {
            assert_eq!(decode_record_key(&record_key(id)).unwrap(), id);
        }
    }

    #[test]
    fn decode_rejects_foreign_keys() {
        assert!(decode_record_key("VERSION#latest").is_err());
    }

    #[test]
    fn sort_keys_carry_version_tokens() {
        assert_eq!(core_key(&VersionToken::Latest), "VERSION#latest");
        assert_eq!(extension_key(&VersionToken::Tombstone), "EXTENSION#tombstone");
        assert_eq!(
            core_key(&VersionToken::timestamp("2023-07-07T10:00:00Z")),
            "VERSION#2023-07-07T10:00:00Z"
        );
    }

    #[test]
    fn version_tokens_parse_back_from_sort_keys() {
        assert_eq!(
            version_from_sort_key("VERSION#latest"),
            Some(VersionToken::Latest)
        );
        assert_eq!(
            version_from_sort_key("EXTENSION#2023-07-07T10:00:00Z"),
            Some(VersionToken::timestamp("2023-07-07T10:00:00Z"))
        );
        assert_eq!(
            version_from_sort_key("VERSION#tombstone"),
            Some(VersionToken::Tombstone)
        );
        assert_eq!(version_from_sort_key("RECORD#doi.org/10.1/x"), None);
    }
}
