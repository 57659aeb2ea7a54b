use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{AdapterResult, ItemKey, KeyValueAdapter, Page, SortKeyMatch, StoredItem};

const DEFAULT_PAGE_SIZE: usize = 100;

// Scan tokens span partitions, so they carry both key halves.
const TOKEN_SEPARATOR: char = '\u{1f}';

/// In-memory backing store over a `BTreeMap`, which gives the sort order the
/// contract requires. Used by the test suite and for local runs; shares its
/// state across clones like the real client handles it stands in for.
#[derive(Debug)]
pub struct MemoryAdapter {
    items: Arc<RwLock<BTreeMap<(String, String), Map<String, Value>>>>,
    page_size: usize,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Shrink pages so tests exercise continuation tokens.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.items.write().await.clear();
    }

    fn page_from(items: Vec<StoredItem>, page_size: usize, token_of: fn(&StoredItem) -> String) -> Page {
        if items.len() > page_size {
            let page: Vec<StoredItem> = items.into_iter().take(page_size).collect();
            let next_token = page.last().map(token_of);
            Page {
                items: page,
                next_token,
            }
        } else {
            Page {
                items,
                next_token: None,
            }
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryAdapter {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            page_size: self.page_size,
        }
    }
}

#[async_trait]
impl KeyValueAdapter for MemoryAdapter {
    async fn put(&self, item: StoredItem) -> AdapterResult<()> {
        let mut items = self.items.write().await;
        items.insert(
            (item.key.partition_key, item.key.sort_key),
            item.attributes,
        );
        Ok(())
    }

    async fn delete(&self, key: &ItemKey) -> AdapterResult<()> {
        let mut items = self.items.write().await;
        items.remove(&(key.partition_key.clone(), key.sort_key.clone()));
        Ok(())
    }

    async fn query(
        &self,
        partition_key: &str,
        sort_key: &SortKeyMatch,
        start_token: Option<&str>,
    ) -> AdapterResult<Page> {
        let items = self.items.read().await;
        let matching: Vec<StoredItem> = items
            .range((partition_key.to_string(), String::new())..)
            .take_while(|((pk, _), _)| pk == partition_key)
            .filter(|((_, sk), _)| sort_key.matches(sk))
            .filter(|((_, sk), _)| start_token.is_none_or(|token| sk.as_str() > token))
            .map(|((pk, sk), attributes)| {
                StoredItem::new(ItemKey::new(pk.clone(), sk.clone()), attributes.clone())
            })
            .collect();
        Ok(Self::page_from(matching, self.page_size, |item| {
            item.key.sort_key.clone()
        }))
    }

    async fn scan(&self, sort_key: &SortKeyMatch, start_token: Option<&str>) -> AdapterResult<Page> {
        let start = start_token.and_then(|token| token.split_once(TOKEN_SEPARATOR));
        let items = self.items.read().await;
        let matching: Vec<StoredItem> = items
            .iter()
            .filter(|((_, sk), _)| sort_key.matches(sk))
            .filter(|((pk, sk), _)| {
                start.is_none_or(|(start_pk, start_sk)| {
                    (pk.as_str(), sk.as_str()) > (start_pk, start_sk)
                })
            })
            .map(|((pk, sk), attributes)| {
                StoredItem::new(ItemKey::new(pk.clone(), sk.clone()), attributes.clone())
            })
            .collect();
        Ok(Self::page_from(matching, self.page_size, |item| {
            format!(
                "{}{TOKEN_SEPARATOR}{}",
                item.key.partition_key, item.key.sort_key
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(pk: &str, sk: &str, title: &str) -> StoredItem {
        StoredItem::new(
            ItemKey::new(pk, sk),
            json!({ "title": title }).as_object().unwrap().clone(),
        )
    }

    #[tokio::test]
    async fn query_is_ordered_and_scoped_to_the_partition() {
        let adapter = MemoryAdapter::new();
        adapter.put(item("RECORD#a", "VERSION#latest", "a")).await.unwrap();
        adapter
            .put(item("RECORD#a", "VERSION#2023-01-01T00:00:00Z", "a-old"))
            .await
            .unwrap();
        adapter.put(item("RECORD#b", "VERSION#latest", "b")).await.unwrap();

        let page = adapter
            .query(
                "RECORD#a",
                &SortKeyMatch::Prefix("VERSION#".to_string()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next_token.is_none());
        assert_eq!(page.items[0].key.sort_key, "VERSION#2023-01-01T00:00:00Z");
        assert_eq!(page.items[1].key.sort_key, "VERSION#latest");
    }

    #[tokio::test]
    async fn query_paginates_with_continuation_tokens() {
        let adapter = MemoryAdapter::new().with_page_size(2);
        for day in ["01", "02", "03", "04", "05"] {
            adapter
                .put(item(
                    "RECORD#a",
                    &format!("VERSION#2023-01-{day}T00:00:00Z"),
                    day,
                ))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = adapter
                .query(
                    "RECORD#a",
                    &SortKeyMatch::Prefix("VERSION#".to_string()),
                    token.as_deref(),
                )
                .await
                .unwrap();
            seen.extend(page.items.into_iter().map(|i| i.key.sort_key));
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 5);
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[tokio::test]
    async fn put_overwrites_and_delete_removes() {
        let adapter = MemoryAdapter::new();
        let key = ItemKey::new("RECORD#a", "VERSION#latest");
        adapter.put(item("RECORD#a", "VERSION#latest", "one")).await.unwrap();
        adapter.put(item("RECORD#a", "VERSION#latest", "two")).await.unwrap();
        assert_eq!(adapter.len().await, 1);

        let page = adapter
            .query(
                "RECORD#a",
                &SortKeyMatch::Exact("VERSION#latest".to_string()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.items[0].attributes["title"], "two");

        adapter.delete(&key).await.unwrap();
        assert!(adapter.is_empty().await);
    }

    #[tokio::test]
    async fn scan_sweeps_across_partitions() {
        let adapter = MemoryAdapter::new().with_page_size(1);
        adapter.put(item("RECORD#a", "VERSION#latest", "a")).await.unwrap();
        adapter.put(item("RECORD#b", "VERSION#latest", "b")).await.unwrap();
        adapter
            .put(item("RECORD#b", "EXTENSION#latest", "b-ext"))
            .await
            .unwrap();

        let filter = SortKeyMatch::Exact("VERSION#latest".to_string());
        let first = adapter.scan(&filter, None).await.unwrap();
        assert_eq!(first.items.len(), 1);
        let second = adapter
            .scan(&filter, first.next_token.as_deref())
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.next_token.is_none());
        assert_ne!(
            first.items[0].key.partition_key,
            second.items[0].key.partition_key
        );
    }
}
