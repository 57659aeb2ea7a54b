//! Backing store capability contract.
//!
//! The store needs a sorted key-value service with per-item atomic writes and
//! prefix-ordered reads; nothing more. A production deployment implements
//! [`KeyValueAdapter`] over its managed table service, configuring any retry
//! budget (`StoreConfig::max_attempts`) on the underlying client; the store
//! layer never retries. Reads may be eventually consistent.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Physical location of one stored item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub partition_key: String,
    pub sort_key: String,
}

impl ItemKey {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }
}

/// One physical row: key pair plus its attribute map.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub key: ItemKey,
    pub attributes: Map<String, Value>,
}

impl StoredItem {
    pub fn new(key: ItemKey, attributes: Map<String, Value>) -> Self {
        Self { key, attributes }
    }
}

/// Sort-key condition for `query` and `scan`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyMatch {
    Exact(String),
    Prefix(String),
}

impl SortKeyMatch {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            Self::Exact(value) => sort_key == value,
            Self::Prefix(prefix) => sort_key.starts_with(prefix.as_str()),
        }
    }
}

/// One page of results, ascending by sort key. `next_token` is opaque to the
/// caller and resumes the read where this page ended.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<StoredItem>,
    pub next_token: Option<String>,
}

/// Failure raised by an adapter implementation (timeout, throttling, I/O).
#[derive(Error, Debug)]
#[error("{message}")]
pub struct AdapterError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Sorted key-value backing store.
///
/// `put` and `delete` are single-item and atomic; there are no cross-item
/// transactions. A stronger conditional-write (compare-and-swap on an
/// attribute) would slot in here if the optimistic update guard ever needs
/// hardening.
#[async_trait]
pub trait KeyValueAdapter: Send + Sync {
    async fn put(&self, item: StoredItem) -> AdapterResult<()>;

    async fn delete(&self, key: &ItemKey) -> AdapterResult<()>;

    /// Items under one partition key matching the sort-key condition,
    /// ascending by sort key, one page at a time.
    async fn query(
        &self,
        partition_key: &str,
        sort_key: &SortKeyMatch,
        start_token: Option<&str>,
    ) -> AdapterResult<Page>;

    /// Full-table sweep filtered by sort-key condition. For cross-record
    /// maintenance only; never on a record's hot path.
    async fn scan(&self, sort_key: &SortKeyMatch, start_token: Option<&str>) -> AdapterResult<Page>;
}
