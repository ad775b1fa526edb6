//! In-memory record store backed by DashMap.
//!
//! Used for tests and for running without a data directory. All data is lost
//! on process exit.

use dashmap::DashMap;

use super::{Collection, Document, Filter, RecordStore, StoreResult};

/// Concurrent in-memory store, one document list per collection.
#[derive(Debug, Default)]
pub struct MemStore {
    data: DashMap<Collection, Vec<Document>>,
}

impl MemStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: Collection) -> usize {
        self.data.get(&collection).map(|docs| docs.len()).unwrap_or(0)
    }
}

impl RecordStore for MemStore {
    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        Ok(self
            .data
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn insert_many(&self, collection: Collection, documents: Vec<Document>) -> StoreResult<usize> {
        let count = documents.len();
        self.data.entry(collection).or_default().extend(documents);
        Ok(count)
    }

    fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        let Some(mut docs) = self.data.get_mut(&collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok(before - docs.len())
    }

    fn replace_all(&self, collection: Collection, documents: Vec<Document>) -> StoreResult<usize> {
        let previous = self.data.insert(collection, documents);
        Ok(previous.map(|docs| docs.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_and_find() {
        let store = MemStore::new();
        store
            .insert_many(
                Collection::Tasks,
                vec![json!({"owner": "SK"}), json!({"owner": "ML"})],
            )
            .unwrap();
        let found = store
            .find(Collection::Tasks, &Filter::all().eq("owner", "ML"))
            .unwrap();
        assert_eq!(found, vec![json!({"owner": "ML"})]);
        assert!(store
            .find(Collection::ParsedEntries, &Filter::all())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_many_counts_removed() {
        let store = MemStore::new();
        store
            .insert_many(
                Collection::Tasks,
                vec![json!({"m": 1}), json!({"m": 2}), json!({"m": 1})],
            )
            .unwrap();
        assert_eq!(store.delete_many(Collection::Tasks, &Filter::all().eq("m", 1)).unwrap(), 2);
        assert_eq!(store.len(Collection::Tasks), 1);
        assert_eq!(store.delete_many(Collection::Tasks, &Filter::all()).unwrap(), 1);
        assert_eq!(store.delete_many(Collection::ParsedEntries, &Filter::all()).unwrap(), 0);
    }

    #[test]
    fn replace_all_swaps_one_collection() {
        let store = MemStore::new();
        store
            .insert_many(Collection::Tasks, vec![json!({"m": 1}), json!({"m": 2})])
            .unwrap();
        store
            .insert_many(Collection::ParsedEntries, vec![json!({"e": 1})])
            .unwrap();

        assert_eq!(store.replace_all(Collection::Tasks, vec![json!({"m": 3})]).unwrap(), 2);
        assert_eq!(
            store.find(Collection::Tasks, &Filter::all()).unwrap(),
            vec![json!({"m": 3})]
        );
        assert_eq!(store.len(Collection::ParsedEntries), 1);
        assert_eq!(store.replace_all(Collection::ParsedEntries, Vec::new()).unwrap(), 1);
        assert_eq!(store.len(Collection::ParsedEntries), 0);
    }

    #[test]
    fn concurrent_inserts() {
        use std::sync::Arc;
        let store = Arc::new(MemStore::new());
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .insert_many(Collection::ParsedEntries, vec![json!({ "i": i })])
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(Collection::ParsedEntries), 50);
    }
}
