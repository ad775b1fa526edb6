//! ACID-durable record store backed by redb.
//!
//! Each collection is one table keyed by a monotonically increasing `u64`, so
//! iteration order is insertion order. Values are JSON-encoded documents.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use super::{Collection, Document, Filter, RecordStore, StoreResult};
use crate::error::StoreError;

const TASKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("tasks");
const ENTRIES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("parsedentries");

fn table(collection: Collection) -> TableDefinition<'static, u64, &'static [u8]> {
    match collection {
        Collection::Tasks => TASKS_TABLE,
        Collection::ParsedEntries => ENTRIES_TABLE,
    }
}

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl Fn(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

/// Record store using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("aufgaben.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create every table up front so read transactions never miss one.
        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        for collection in Collection::ALL {
            txn.open_table(table(collection))
                .map_err(redb_err("open_table"))?;
        }
        txn.commit().map_err(redb_err("commit"))?;

        tracing::debug!(path = %db_path.display(), "opened durable store");
        Ok(Self { db: Arc::new(db) })
    }

    fn encode(collection: Collection, documents: &[Document]) -> StoreResult<Vec<Vec<u8>>> {
        documents
            .iter()
            .map(|doc| {
                serde_json::to_vec(doc).map_err(|e| StoreError::Serialization {
                    collection: collection.to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    fn decode(collection: Collection, bytes: &[u8]) -> StoreResult<Document> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization {
            collection: collection.to_string(),
            message: e.to_string(),
        })
    }
}

impl RecordStore for DurableStore {
    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn
            .open_table(table(collection))
            .map_err(redb_err("open_table"))?;

        let mut found = Vec::new();
        for item in table.iter().map_err(redb_err("iter"))? {
            let (_, value) = item.map_err(redb_err("read"))?;
            let doc = Self::decode(collection, value.value())?;
            if filter.matches(&doc) {
                found.push(doc);
            }
        }
        Ok(found)
    }

    fn insert_many(&self, collection: Collection, documents: Vec<Document>) -> StoreResult<usize> {
        let encoded = Self::encode(collection, &documents)?;

        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn
                .open_table(table(collection))
                .map_err(redb_err("open_table"))?;
            let mut next = table
                .last()
                .map_err(redb_err("last"))?
                .map(|(key, _)| key.value() + 1)
                .unwrap_or(0);
            for bytes in &encoded {
                table
                    .insert(next, bytes.as_slice())
                    .map_err(redb_err("insert"))?;
                next += 1;
            }
        }
        txn.commit().map_err(redb_err("commit"))?;

        tracing::debug!(%collection, count = encoded.len(), "inserted documents");
        Ok(encoded.len())
    }

    fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let removed = {
            let mut table = txn
                .open_table(table(collection))
                .map_err(redb_err("open_table"))?;

            let mut doomed = Vec::new();
            for item in table.iter().map_err(redb_err("iter"))? {
                let (key, value) = item.map_err(redb_err("read"))?;
                if filter.is_all() || filter.matches(&Self::decode(collection, value.value())?) {
                    doomed.push(key.value());
                }
            }
            for key in &doomed {
                table.remove(*key).map_err(redb_err("remove"))?;
            }
            doomed.len()
        };
        txn.commit().map_err(redb_err("commit"))?;

        tracing::debug!(%collection, removed, "deleted documents");
        Ok(removed)
    }

    fn replace_all(&self, collection: Collection, documents: Vec<Document>) -> StoreResult<usize> {
        let encoded = Self::encode(collection, &documents)?;

        // Delete and insert commit together or not at all.
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let removed = {
            let mut table = txn
                .open_table(table(collection))
                .map_err(redb_err("open_table"))?;

            let mut old_keys = Vec::new();
            for item in table.iter().map_err(redb_err("iter"))? {
                let (key, _) = item.map_err(redb_err("read"))?;
                old_keys.push(key.value());
            }
            for key in &old_keys {
                table.remove(*key).map_err(redb_err("remove"))?;
            }
            for (key, bytes) in encoded.iter().enumerate() {
                table
                    .insert(key as u64, bytes.as_slice())
                    .map_err(redb_err("insert"))?;
            }
            old_keys.len()
        };
        txn.commit().map_err(redb_err("commit"))?;

        tracing::debug!(%collection, removed, inserted = encoded.len(), "replaced collection");
        Ok(removed)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn insert_find_delete() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        let n = store
            .insert_many(
                Collection::Tasks,
                vec![
                    json!({"owner": "SK", "month": "2025-04"}),
                    json!({"owner": "ML", "month": "2025-04"}),
                ],
            )
            .unwrap();
        assert_eq!(n, 2);

        let sk = store
            .find(Collection::Tasks, &Filter::all().eq("owner", "SK"))
            .unwrap();
        assert_eq!(sk.len(), 1);

        assert_eq!(
            store
                .delete_many(Collection::Tasks, &Filter::all().eq("owner", "SK"))
                .unwrap(),
            1
        );
        assert_eq!(store.find(Collection::Tasks, &Filter::all()).unwrap().len(), 1);
    }

    #[test]
    fn insertion_order_is_kept_across_batches() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        store
            .insert_many(Collection::ParsedEntries, vec![json!({"n": 1}), json!({"n": 2})])
            .unwrap();
        store
            .insert_many(Collection::ParsedEntries, vec![json!({"n": 3})])
            .unwrap();
        let all = store.find(Collection::ParsedEntries, &Filter::all()).unwrap();
        let ns: Vec<_> = all.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[test]
    fn collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();
        store
            .insert_many(Collection::Tasks, vec![json!({"t": 1})])
            .unwrap();
        assert!(store
            .find(Collection::ParsedEntries, &Filter::all())
            .unwrap()
            .is_empty());
        assert_eq!(store.delete_many(Collection::ParsedEntries, &Filter::all()).unwrap(), 0);
    }

    #[test]
    fn replace_all_swaps_contents_durably() {
        let dir = TempDir::new().unwrap();
        {
            let store = DurableStore::open(dir.path()).unwrap();
            store
                .insert_many(Collection::Tasks, vec![json!({"t": 1}), json!({"t": 2})])
                .unwrap();
            store
                .insert_many(Collection::ParsedEntries, vec![json!({"e": 1})])
                .unwrap();
            let removed = store
                .replace_all(Collection::Tasks, vec![json!({"t": 3}), json!({"t": 4})])
                .unwrap();
            assert_eq!(removed, 2);
        }
        let store = DurableStore::open(dir.path()).unwrap();
        let tasks = store.find(Collection::Tasks, &Filter::all()).unwrap();
        assert_eq!(tasks, vec![json!({"t": 3}), json!({"t": 4})]);
        assert_eq!(store.find(Collection::ParsedEntries, &Filter::all()).unwrap().len(), 1);

        // Later appends keep insertion order after a replace.
        store.insert_many(Collection::Tasks, vec![json!({"t": 5})]).unwrap();
        let ts: Vec<_> = store
            .find(Collection::Tasks, &Filter::all())
            .unwrap()
            .iter()
            .map(|d| d["t"].as_i64().unwrap())
            .collect();
        assert_eq!(ts, vec![3, 4, 5]);
    }

    #[test]
    fn persistence_across_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let store = DurableStore::open(dir.path()).unwrap();
            store
                .insert_many(Collection::ParsedEntries, vec![json!({"date": "2025-04-03"})])
                .unwrap();
        }
        let store = DurableStore::open(dir.path()).unwrap();
        let all = store.find(Collection::ParsedEntries, &Filter::all()).unwrap();
        assert_eq!(all, vec![json!({"date": "2025-04-03"})]);
    }
}
