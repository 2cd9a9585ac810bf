use super::store::{ItemStore, ListFilter, StoreError};
use crate::models::Item;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-process store keyed by `(pk, id)`, for local runs and tests.
#[derive(Default)]
pub struct InMemoryItemStore {
    items: RwLock<BTreeMap<(String, String), Item>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

fn key(id: &str, pk: &str) -> (String, String) {
    (pk.to_string(), id.to_string())
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn create(&self, item: Item) -> Result<Item, StoreError> {
        let mut items = self.items.write().await;
        let key = key(&item.id, &item.pk);
        if items.contains_key(&key) {
            return Err(StoreError::Conflict {
                id: item.id,
                pk: item.pk,
            });
        }
        items.insert(key, item.clone());
        Ok(item)
    }

    async fn read(&self, id: &str, pk: &str) -> Result<Item, StoreError> {
        self.items
            .read()
            .await
            .get(&key(id, pk))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
                pk: pk.to_string(),
            })
    }

    async fn upsert(&self, item: Item) -> Result<Item, StoreError> {
        self.items
            .write()
            .await
            .insert(key(&item.id, &item.pk), item.clone());
        Ok(item)
    }

    async fn delete(&self, id: &str, pk: &str) -> Result<(), StoreError> {
        self.items
            .write()
            .await
            .remove(&key(id, pk))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                id: id.to_string(),
                pk: pk.to_string(),
            })
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<Item>, StoreError> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| filter.pk.as_deref().map_or(true, |pk| item.pk == pk))
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn item(id: &str, pk: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            pk: pk.to_string(),
            name: name.to_string(),
            description: None,
            extra: Map::new(),
        }
    }

    fn all(pk: Option<&str>) -> ListFilter {
        ListFilter {
            pk: pk.map(str::to_string),
            limit: 100,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let store = InMemoryItemStore::new();
        store.create(item("a1", "t1", "widget")).await.unwrap();

        let found = store.read("a1", "t1").await.unwrap();
        assert_eq!(found, item("a1", "t1", "widget"));
    }

    #[tokio::test]
    async fn same_id_in_another_partition_is_a_different_item() {
        let store = InMemoryItemStore::new();
        store.create(item("a1", "t1", "one")).await.unwrap();
        store.create(item("a1", "t2", "two")).await.unwrap();

        assert_eq!(store.read("a1", "t2").await.unwrap().name, "two");
        assert!(matches!(
            store.read("a1", "t3").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let store = InMemoryItemStore::new();
        store.create(item("a1", "t1", "one")).await.unwrap();

        let err = store.create(item("a1", "t1", "again")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.read("a1", "t1").await.unwrap().name, "one");
    }

    #[tokio::test]
    async fn upsert_creates_then_replaces() {
        let store = InMemoryItemStore::new();
        store.upsert(item("a1", "t1", "one")).await.unwrap();
        store.upsert(item("a1", "t1", "two")).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.read("a1", "t1").await.unwrap().name, "two");
    }

    #[tokio::test]
    async fn delete_removes_once() {
        let store = InMemoryItemStore::new();
        store.create(item("a1", "t1", "one")).await.unwrap();

        store.delete("a1", "t1").await.unwrap();
        assert!(store.is_empty().await);
        assert!(matches!(
            store.delete("a1", "t1").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_filters_by_partition_and_pages_in_key_order() {
        let store = InMemoryItemStore::new();
        for (id, pk) in [("b", "t1"), ("a", "t1"), ("c", "t2"), ("d", "t1")] {
            store.create(item(id, pk, id)).await.unwrap();
        }

        let t1: Vec<String> = store
            .list(all(Some("t1")))
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(t1, ["a", "b", "d"]);

        assert_eq!(store.list(all(None)).await.unwrap().len(), 4);

        let page = store
            .list(ListFilter {
                pk: None,
                limit: 2,
                offset: 2,
            })
            .await
            .unwrap();
        let ids: Vec<&str> = page.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["d", "c"]);
    }
}
