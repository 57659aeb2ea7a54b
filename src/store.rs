//! Store operations over the backing key-value adapter.
//!
//! `DmpStore` orchestrates the key codec, the document splitter, and the
//! snapshot policy to persist, version, and retire DMP records. Multi-item
//! sequences are not atomic: the write order is fixed (core before
//! extension) and every read path tolerates a missing extension item, so a
//! crash mid-sequence degrades to a core-only record instead of corruption.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use url::Url;

use crate::adapter::{ItemKey, KeyValueAdapter, SortKeyMatch, StoredItem};
use crate::config::StoreConfig;
use crate::document::{
    CoreDocument, Document, ExtensionDocument, VersionEntry, merge, split,
};
use crate::error::{Result, StoreError};
use crate::keys::{
    EXTENSION_PREFIX, VERSION_PREFIX, VersionToken, core_key, extension_key, record_key,
    version_from_sort_key,
};
use crate::policy::SnapshotPolicy;

/// One entry of `list_versions`: the version token and the `modified`
/// timestamp recorded on that version's core item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: VersionToken,
    pub modified: Option<String>,
}

/// Versioned document store for DMP records.
pub struct DmpStore {
    adapter: Arc<dyn KeyValueAdapter>,
    config: StoreConfig,
}

impl DmpStore {
    pub fn new(adapter: Arc<dyn KeyValueAdapter>, config: StoreConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Lightweight existence probe on the `latest` core key only.
    pub async fn exists(&self, dmp_id: &str) -> Result<bool> {
        let dmp_id = required_id(dmp_id)?;
        let partition_key = record_key(dmp_id);
        let page = self
            .adapter
            .query(
                &partition_key,
                &SortKeyMatch::Exact(core_key(&VersionToken::Latest)),
                None,
            )
            .await
            .map_err(|e| StoreError::backing_store("exists", dmp_id, VersionToken::LATEST, e))?;
        Ok(!page.items.is_empty())
    }

    /// Every stored version of a record, newest first. Absent records yield
    /// an empty list.
    pub async fn list_versions(&self, dmp_id: &str) -> Result<Vec<VersionInfo>> {
        let dmp_id = required_id(dmp_id)?;
        let partition_key = record_key(dmp_id);
        let cores = self
            .query_all(
                "list_versions",
                dmp_id,
                "all",
                &partition_key,
                &SortKeyMatch::Prefix(VERSION_PREFIX.to_string()),
            )
            .await?;
        let mut versions: Vec<VersionInfo> = cores
            .iter()
            .filter_map(|item| {
                version_from_sort_key(&item.key.sort_key).map(|version| VersionInfo {
                    version,
                    modified: item
                        .attributes
                        .get("modified")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            })
            .collect();
        versions.sort_by_key(|info| {
            std::cmp::Reverse(info.modified.as_deref().and_then(parse_rfc3339))
        });
        Ok(versions)
    }

    /// Read one version, or every version when `version` is `None`, newest
    /// first. Each result is the core document merged with its matching
    /// extension document unless `include_extensions` is false. An absent
    /// record or version is an empty result, not an error.
    pub async fn get(
        &self,
        dmp_id: &str,
        version: Option<&VersionToken>,
        include_extensions: bool,
    ) -> Result<Vec<Document>> {
        let dmp_id = required_id(dmp_id)?;
        let partition_key = record_key(dmp_id);
        let version_label = version.map_or("all", VersionToken::as_str).to_string();

        let core_match = match version {
            Some(token) => SortKeyMatch::Exact(core_key(token)),
            None => SortKeyMatch::Prefix(VERSION_PREFIX.to_string()),
        };
        let cores = self
            .query_all("get", dmp_id, &version_label, &partition_key, &core_match)
            .await?;
        if cores.is_empty() {
            return Ok(Vec::new());
        }

        let mut extensions: HashMap<String, ExtensionDocument> = HashMap::new();
        let mut version_index: Option<Vec<VersionEntry>> = None;
        if include_extensions {
            let extension_match = match version {
                Some(token) => SortKeyMatch::Exact(extension_key(token)),
                None => SortKeyMatch::Prefix(EXTENSION_PREFIX.to_string()),
            };
            let items = self
                .query_all(
                    "get",
                    dmp_id,
                    &version_label,
                    &partition_key,
                    &extension_match,
                )
                .await?;
            for item in items {
                if let Some(token) = version_from_sort_key(&item.key.sort_key) {
                    let extension =
                        serde_json::from_value(Value::Object(item.attributes))?;
                    extensions.insert(token.as_str().to_string(), extension);
                }
            }
            version_index = self.version_index(dmp_id, &partition_key).await?;
        }

        let mut documents: Vec<(Option<DateTime<Utc>>, Document)> = Vec::new();
        for item in cores {
            let Some(token) = version_from_sort_key(&item.key.sort_key) else {
                continue;
            };
            let core = CoreDocument(item.attributes);
            let document = if include_extensions {
                // A missing extension item is a transient, tolerated state:
                // treat the record as core-only.
                let mut extension = extensions.remove(token.as_str()).unwrap_or_default();
                if version_index.is_some() {
                    extension.versions = version_index.clone();
                }
                merge(&core, &extension)?
            } else {
                Document::from(core)
            };
            documents.push((document.modified(), document));
        }
        documents.sort_by_key(|(modified, _)| std::cmp::Reverse(*modified));
        Ok(documents.into_iter().map(|(_, document)| document).collect())
    }

    /// Persist a record's first version. Fails with a conflict when a
    /// `latest` already exists.
    pub async fn create(
        &self,
        dmp_id: &str,
        document: Document,
        include_extensions: bool,
    ) -> Result<Document> {
        self.create_version(dmp_id, document, &VersionToken::Latest, include_extensions)
            .await
    }

    /// Persist a record under an explicit version token. Only `latest`
    /// creations are guarded against conflicts; timestamp tokens write
    /// immutable snapshots and are never overwritten afterwards.
    pub async fn create_version(
        &self,
        dmp_id: &str,
        document: Document,
        version: &VersionToken,
        include_extensions: bool,
    ) -> Result<Document> {
        let dmp_id = required_id(dmp_id)?;
        if document.0.is_empty() {
            return Err(StoreError::validation("missing document argument"));
        }
        if *version == VersionToken::Latest {
            if self.exists(dmp_id).await? {
                return Err(StoreError::conflict(dmp_id));
            }
            // The tombstone is terminal; a new latest must not resurrect it.
            if self.has_version(dmp_id, &VersionToken::Tombstone).await? {
                return Err(StoreError::tombstoned(dmp_id));
            }
        }

        let mut document = document;
        let now = now_rfc3339();
        if document.created().is_none() {
            document.set("created", Value::String(now.clone()));
        }
        if document.modified_raw().is_none() {
            document.set("modified", Value::String(now));
        }

        self.put_pair(dmp_id, &document, version, "create").await?;
        tracing::debug!(dmp_id = %dmp_id, version = %version, table = %self.config.table, "created record version");

        self.get(dmp_id, Some(version), include_extensions)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(dmp_id, version.as_str()))
    }

    /// Overwrite the current latest with an incoming document, snapshotting
    /// the stored latest first when the policy demands it.
    pub async fn update(
        &self,
        document: Document,
        grace_period: Option<chrono::Duration>,
        include_extensions: bool,
    ) -> Result<Document> {
        let dmp_id = document
            .dmp_id()
            .ok_or_else(|| StoreError::validation("document has no identifier"))?
            .to_string();
        let incoming_modified = document.modified().ok_or_else(|| {
            StoreError::validation("document has no parseable modified timestamp")
        })?;

        let current = match self
            .get(&dmp_id, Some(&VersionToken::Latest), true)
            .await?
            .into_iter()
            .next()
        {
            Some(current) => current,
            None => {
                if self.has_version(&dmp_id, &VersionToken::Tombstone).await? {
                    return Err(StoreError::tombstoned(&dmp_id));
                }
                return Err(StoreError::not_found(&dmp_id, VersionToken::LATEST));
            }
        };

        if let Some(current_modified) = current.modified() {
            if incoming_modified <= current_modified {
                return Err(StoreError::stale_write(
                    &dmp_id,
                    incoming_modified.to_rfc3339(),
                    current_modified.to_rfc3339(),
                ));
            }
        }

        let policy = SnapshotPolicy::new(grace_period.unwrap_or(self.config.grace_period));
        if policy.must_snapshot(&current, &document, Utc::now()) {
            let snapshot_token = current
                .modified_raw()
                .map(VersionToken::timestamp)
                .unwrap_or_else(|| VersionToken::timestamp(now_rfc3339()));
            tracing::info!(dmp_id = %dmp_id, snapshot = %snapshot_token, "snapshotting latest before overwrite");
            self.create_version(&dmp_id, current, &snapshot_token, false)
                .await?;
        }

        self.put_pair(&dmp_id, &document, &VersionToken::Latest, "update")
            .await?;
        tracing::debug!(dmp_id = %dmp_id, table = %self.config.table, "updated latest version");

        self.get(&dmp_id, Some(&VersionToken::Latest), include_extensions)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(&dmp_id, VersionToken::LATEST))
    }

    /// Retire a registered record: move `latest` to the terminal `tombstone`
    /// version, prefixing the title with `"OBSOLETE: "`. Irreversible here.
    pub async fn tombstone(&self, dmp_id: &str, include_extensions: bool) -> Result<Document> {
        let dmp_id = required_id(dmp_id)?;
        let current = self
            .get(dmp_id, Some(&VersionToken::Latest), true)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::precondition(dmp_id, "no latest version to tombstone"))?;

        let (mut core, mut extension) = split(&current)?;
        if !extension.is_registered() {
            return Err(StoreError::precondition(
                dmp_id,
                "only registered records can be tombstoned",
            ));
        }

        let now = now_rfc3339();
        let title = current.title().unwrap_or_default();
        core.0.insert(
            "title".to_string(),
            Value::String(format!("OBSOLETE: {title}")),
        );
        core.0
            .insert("modified".to_string(), Value::String(now.clone()));
        extension.tombstoned = Some(now);
        extension.versions = None;

        let partition_key = record_key(dmp_id);
        let tombstone = VersionToken::Tombstone;
        let latest = VersionToken::Latest;

        self.put_item(
            dmp_id,
            &partition_key,
            core_key(&tombstone),
            core.0,
            "tombstone",
            &tombstone,
        )
        .await?;
        self.delete_item(dmp_id, &partition_key, core_key(&latest), "tombstone", &latest)
            .await?;
        let extension_fields = extension_attributes(&extension)?;
        self.put_item(
            dmp_id,
            &partition_key,
            extension_key(&tombstone),
            extension_fields,
            "tombstone",
            &tombstone,
        )
        .await?;
        self.delete_item(
            dmp_id,
            &partition_key,
            extension_key(&latest),
            "tombstone",
            &latest,
        )
        .await?;
        tracing::info!(dmp_id = %dmp_id, table = %self.config.table, "tombstoned record");

        self.get(dmp_id, Some(&tombstone), include_extensions)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(dmp_id, VersionToken::TOMBSTONE))
    }

    /// Remove every item of an unregistered record. Registered records must
    /// be tombstoned instead. Returns the pre-delete merged document.
    pub async fn delete(&self, dmp_id: &str, include_extensions: bool) -> Result<Document> {
        let dmp_id = required_id(dmp_id)?;
        let current = self
            .get(dmp_id, Some(&VersionToken::Latest), true)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(dmp_id, VersionToken::LATEST))?;

        let (core, _extension) = split(&current)?;
        if current.registered().is_some() {
            return Err(StoreError::precondition(
                dmp_id,
                "registered records must be tombstoned, not deleted",
            ));
        }
        let result = if include_extensions {
            current
        } else {
            Document::from(core)
        };

        let partition_key = record_key(dmp_id);
        let items = self
            .query_all(
                "delete",
                dmp_id,
                "all",
                &partition_key,
                &SortKeyMatch::Prefix(String::new()),
            )
            .await?;
        for item in items {
            self.adapter.delete(&item.key).await.map_err(|e| {
                StoreError::backing_store("delete", dmp_id, item.key.sort_key.clone(), e)
            })?;
        }
        tracing::info!(dmp_id = %dmp_id, table = %self.config.table, "deleted record");
        Ok(result)
    }

    /// Maintenance sweep: the current core document of every record. Built
    /// on `scan`; never part of a record's hot path.
    pub async fn list_latest(&self) -> Result<Vec<Document>> {
        let filter = SortKeyMatch::Exact(core_key(&VersionToken::Latest));
        let mut documents = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .adapter
                .scan(&filter, token.as_deref())
                .await
                .map_err(|e| {
                    StoreError::backing_store("scan", "all", VersionToken::LATEST, e)
                })?;
            documents.extend(
                page.items
                    .into_iter()
                    .map(|item| Document::from(CoreDocument(item.attributes))),
            );
            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(documents),
            }
        }
    }

    async fn has_version(&self, dmp_id: &str, version: &VersionToken) -> Result<bool> {
        let partition_key = record_key(dmp_id);
        let page = self
            .adapter
            .query(
                &partition_key,
                &SortKeyMatch::Exact(core_key(version)),
                None,
            )
            .await
            .map_err(|e| StoreError::backing_store("get", dmp_id, version.as_str(), e))?;
        Ok(!page.items.is_empty())
    }

    /// Split a document and write its core item, then its extension item.
    /// The order is fixed so a crash in between leaves a readable core-only
    /// record.
    async fn put_pair(
        &self,
        dmp_id: &str,
        document: &Document,
        version: &VersionToken,
        operation: &str,
    ) -> Result<()> {
        let (core, mut extension) = split(document)?;
        // The version index is derived at read time, never persisted.
        extension.versions = None;

        let partition_key = record_key(dmp_id);
        self.put_item(
            dmp_id,
            &partition_key,
            core_key(version),
            core.0,
            operation,
            version,
        )
        .await?;
        let extension_fields = extension_attributes(&extension)?;
        self.put_item(
            dmp_id,
            &partition_key,
            extension_key(version),
            extension_fields,
            operation,
            version,
        )
        .await
    }

    async fn put_item(
        &self,
        dmp_id: &str,
        partition_key: &str,
        sort_key: String,
        attributes: serde_json::Map<String, Value>,
        operation: &str,
        version: &VersionToken,
    ) -> Result<()> {
        self.adapter
            .put(StoredItem::new(
                ItemKey::new(partition_key, sort_key),
                attributes,
            ))
            .await
            .map_err(|e| StoreError::backing_store(operation, dmp_id, version.as_str(), e))
    }

    async fn delete_item(
        &self,
        dmp_id: &str,
        partition_key: &str,
        sort_key: String,
        operation: &str,
        version: &VersionToken,
    ) -> Result<()> {
        self.adapter
            .delete(&ItemKey::new(partition_key, sort_key))
            .await
            .map_err(|e| StoreError::backing_store(operation, dmp_id, version.as_str(), e))
    }

    async fn query_all(
        &self,
        operation: &str,
        dmp_id: &str,
        version: &str,
        partition_key: &str,
        sort_key: &SortKeyMatch,
    ) -> Result<Vec<StoredItem>> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .adapter
                .query(partition_key, sort_key, token.as_deref())
                .await
                .map_err(|e| StoreError::backing_store(operation, dmp_id, version, e))?;
            items.extend(page.items);
            match page.next_token {
                Some(next) => token = Some(next),
                None => return Ok(items),
            }
        }
    }

    /// Derived version index: `{access_url, version}` newest first, the
    /// newest entry addressed by the bare record identifier and the rest by
    /// a `?version=<token>` suffix. The tombstone never appears in it.
    async fn version_index(
        &self,
        dmp_id: &str,
        partition_key: &str,
    ) -> Result<Option<Vec<VersionEntry>>> {
        let cores = self
            .query_all(
                "get",
                dmp_id,
                "all",
                partition_key,
                &SortKeyMatch::Prefix(VERSION_PREFIX.to_string()),
            )
            .await?;
        let mut dated: Vec<(Option<DateTime<Utc>>, VersionToken)> = cores
            .iter()
            .filter_map(|item| version_from_sort_key(&item.key.sort_key))
            .filter(|token| *token != VersionToken::Tombstone)
            .map(|token| {
                let modified = cores
                    .iter()
                    .find(|item| item.key.sort_key == core_key(&token))
                    .and_then(|item| item.attributes.get("modified"))
                    .and_then(Value::as_str)
                    .and_then(parse_rfc3339);
                (modified, token)
            })
            .collect();
        if dated.is_empty() {
            return Ok(None);
        }
        dated.sort_by_key(|(modified, _)| std::cmp::Reverse(*modified));
        let entries = dated
            .into_iter()
            .enumerate()
            .map(|(position, (_, token))| VersionEntry {
                access_url: if position == 0 {
                    dmp_id.to_string()
                } else {
                    versioned_access_url(dmp_id, token.as_str())
                },
                version: token.as_str().to_string(),
            })
            .collect();
        Ok(Some(entries))
    }
}

fn required_id(dmp_id: &str) -> Result<&str> {
    let trimmed = dmp_id.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation("missing record identifier"));
    }
    Ok(trimmed)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn extension_attributes(extension: &ExtensionDocument) -> Result<serde_json::Map<String, Value>> {
    match serde_json::to_value(extension)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::validation(format!(
            "extension document serialized to a non-object: {other}"
        ))),
    }
}

fn versioned_access_url(dmp_id: &str, version: &str) -> String {
    match Url::parse(dmp_id) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("version", version);
            url.to_string()
        }
        Err(_) => format!("{dmp_id}?version={version}"),
    }
}
