use std::sync::Arc;

use dmp_store::*;
use serde_json::json;

#[allow(dead_code)]
pub const DMP_ID: &str = "https://doi.org/10.48321/D1ABCD";

#[allow(dead_code)]
pub fn test_store() -> (DmpStore, MemoryAdapter) {
    // Small pages so every multi-item read crosses a continuation token.
    let adapter = MemoryAdapter::new().with_page_size(2);
    let store = DmpStore::new(Arc::new(adapter.clone()), StoreConfig::default());
    (store, adapter)
}

#[allow(dead_code)]
pub fn draft_document(modified: &str) -> Document {
    Document::from_value(json!({
        "dmp_id": { "type": "doi", "identifier": DMP_ID },
        "title": "Coral reef acoustics",
        "created": "2023-07-07T10:00:00+00:00",
        "modified": modified,
        "contact": { "name": "R. Tang", "mbox": "r.tang@example.edu" },
        "dataset": [{ "title": "Hydrophone captures" }],
        "provenance": "dmptool",
        "privacy": "public"
    }))
    .unwrap()
}

#[allow(dead_code)]
pub fn registered_document(modified: &str) -> Document {
    let mut document = draft_document(modified);
    document.set("registered", json!("2023-07-08T09:30:00+00:00"));
    document
}

#[allow(dead_code)]
pub fn with_field(mut document: Document, key: &str, value: serde_json::Value) -> Document {
    document.set(key, value);
    document
}
