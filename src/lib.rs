//! # DMP Store
//!
//! A versioned document store for Data Management Plan (DMP) metadata
//! records, persisting structured documents inside a sorted key-value
//! backing store.
//!
//! ## Features
//!
//! - **Versioning**: updates snapshot the current record when the writing
//!   system changes or a grace period elapses; snapshots are immutable
//! - **Core/extension split**: standard-compliant fields and tool-specific
//!   fields are stored as separate items joined by version token
//! - **Lifecycle**: registered records are retired with a terminal
//!   tombstone; unregistered ones can be removed entirely
//! - **Pluggable backing store**: any sorted key-value service with
//!   per-item atomic writes and prefix queries implements one async trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dmp_store::*;
//!
//! # async fn example() -> Result<()> {
//! let store = DmpStore::new(Arc::new(MemoryAdapter::new()), StoreConfig::default());
//!
//! let dmp_id = "https://doi.org/10.48321/D1ABCD";
//! let document = Document::from_value(serde_json::json!({
//!     "dmp_id": { "type": "doi", "identifier": dmp_id },
//!     "title": "Coral reef acoustics",
//!     "modified": "2023-07-07T10:00:00+00:00",
//!     "provenance": "dmptool"
//! }))?;
//!
//! let created = store.create(dmp_id, document, true).await?;
//! assert_eq!(created.title(), Some("Coral reef acoustics"));
//! assert!(store.exists(dmp_id).await?);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod document;
pub mod error;
pub mod keys;
pub mod policy;
pub mod store;

pub use adapter::{
    AdapterError, AdapterResult, ItemKey, KeyValueAdapter, MemoryAdapter, Page, SortKeyMatch,
    StoredItem,
};
pub use config::StoreConfig;
pub use document::{CoreDocument, Document, ExtensionDocument, VersionEntry, merge, split};
pub use error::{Result, StoreError};
pub use keys::{
    EXTENSION_PREFIX, RECORD_NAMESPACE, VERSION_PREFIX, VersionToken, core_key, decode_record_key,
    extension_key, record_key, version_from_sort_key,
};
pub use policy::{DEFAULT_GRACE_PERIOD_MS, SnapshotPolicy};
pub use store::{DmpStore, VersionInfo};
