//! DMP documents and the core/extension splitter.
//!
//! A record arrives as one JSON object produced by the upstream mapping
//! pipeline. Before persisting, it is split into a standard-compliant *core*
//! document and a tool-specific *extension* document; the extension field set
//! is the closed list defined by [`ExtensionDocument`]. Only top-level keys
//! are classified; nested objects and arrays pass through untouched.
//!
//! Timestamps stay RFC3339 strings end to end and are parsed with `chrono`
//! only where ordering matters, so `merge(split(doc)) == doc` holds
//! byte-for-byte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Result, StoreError};

/// A full DMP record: core fields plus any extension fields, as one
/// top-level JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

/// The standard-compliant portion of a record. Opaque to the store except
/// for `title`, `created`, and `modified`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct CoreDocument(pub Map<String, Value>);

/// Tool-specific fields layered alongside the core document.
///
/// This is the complete extension field set; a top-level key not named here
/// belongs to the core document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtensionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tombstoned: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_facility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_opportunity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionEntry>>,
}

/// One entry of the derived version index attached to the extension payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub access_url: String,
    pub version: String,
}

impl ExtensionDocument {
    /// Top-level keys claimed by the extension document.
    pub const FIELDS: [&'static str; 12] = [
        "provenance",
        "privacy",
        "status",
        "featured",
        "registered",
        "tombstoned",
        "narrative",
        "research_domain",
        "research_facility",
        "funding_opportunity",
        "funding_project",
        "versions",
    ];

    pub fn is_registered(&self) -> bool {
        self.registered.is_some()
    }
}

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::validation(format!(
                "document must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Record identifier: either a plain `dmp_id` string or the common
    /// standard's `dmp_id: { identifier, type }` object.
    pub fn dmp_id(&self) -> Option<&str> {
        match self.0.get("dmp_id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Object(obj)) => obj.get("identifier").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.str_field("title")
    }

    pub fn created(&self) -> Option<&str> {
        self.str_field("created")
    }

    pub fn modified_raw(&self) -> Option<&str> {
        self.str_field("modified")
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified_raw()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
    }

    pub fn provenance(&self) -> Option<&str> {
        self.str_field("provenance")
    }

    pub fn registered(&self) -> Option<&str> {
        self.str_field("registered")
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }
}

impl From<CoreDocument> for Document {
    fn from(core: CoreDocument) -> Self {
        Self(core.0)
    }
}

/// Partition a record's top-level fields into core and extension documents.
///
/// Fields on the [`ExtensionDocument::FIELDS`] allow-list move to the
/// extension; everything else stays core. Fails with a serialization error
/// when an extension field carries a value of the wrong shape.
pub fn split(document: &Document) -> Result<(CoreDocument, ExtensionDocument)> {
    let mut core = Map::new();
    let mut extension_fields = Map::new();
    for (key, value) in &document.0 {
        if ExtensionDocument::FIELDS.contains(&key.as_str()) {
            extension_fields.insert(key.clone(), value.clone());
        } else {
            core.insert(key.clone(), value.clone());
        }
    }
    let extension = serde_json::from_value(Value::Object(extension_fields))?;
    Ok((CoreDocument(core), extension))
}

/// Shallow union of a core and extension document. Extension fields win on
/// key collision; none are expected in practice.
pub fn merge(core: &CoreDocument, extension: &ExtensionDocument) -> Result<Document> {
    let mut fields = core.0.clone();
    match serde_json::to_value(extension)? {
        Value::Object(extension_fields) => {
            for (key, value) in extension_fields {
                fields.insert(key, value);
            }
        }
        other => {
            return Err(StoreError::validation(format!(
                "extension document serialized to a non-object: {other}"
            )));
        }
    }
    Ok(Document(fields))
}
