//! Record persistence behind a small set-oriented interface.
//!
//! The rest of the crate only needs `find`, `insert_many`, `delete_many` and
//! `replace_all`
//! over two collections, expressed by [`RecordStore`]. Two backends:
//!
//! - [`MemStore`] keeps documents in a concurrent hashmap (DashMap); nothing survives exit
//! - [`DurableStore`] keeps them in redb with full ACID transactions
//!
//! Documents are plain JSON values; typed access goes through [`find_as`],
//! [`insert_all`] and [`replace_all`].

pub mod durable;
pub mod mem;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

pub use durable::DurableStore;
pub use mem::MemStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A stored record.
pub type Document = Value;

/// The collections the application keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Flattened catalog records, rebuilt on every import.
    Tasks,
    /// Entries the user chose to save.
    ParsedEntries,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Tasks, Collection::ParsedEntries];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::ParsedEntries => "parsedentries",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conjunction of field equalities. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Match every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add `field == value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    /// A missing field compares equal to `null`.
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            document.get(field).unwrap_or(&Value::Null) == expected
        })
    }

    pub fn is_all(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Set-oriented document store.
pub trait RecordStore: Send + Sync {
    /// All documents in `collection` matching `filter`, in insertion order.
    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Append `documents`; all or nothing. Returns how many were stored.
    fn insert_many(&self, collection: Collection, documents: Vec<Document>) -> StoreResult<usize>;

    /// Remove every matching document. Returns how many were removed.
    fn delete_many(&self, collection: Collection, filter: &Filter) -> StoreResult<usize>;

    /// Swap the whole contents of `collection` for `documents` in one step.
    /// On error the previous contents are left in place. Returns how many
    /// documents were removed.
    fn replace_all(&self, collection: Collection, documents: Vec<Document>) -> StoreResult<usize>;
}

/// Typed [`RecordStore::find`].
pub fn find_as<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
    filter: &Filter,
) -> StoreResult<Vec<T>> {
    store
        .find(collection, filter)?
        .into_iter()
        .map(|doc| {
            serde_json::from_value(doc).map_err(|e| StoreError::Serialization {
                collection: collection.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn to_documents<T: Serialize>(collection: Collection, items: &[T]) -> StoreResult<Vec<Document>> {
    items
        .iter()
        .map(|item| {
            serde_json::to_value(item).map_err(|e| StoreError::Serialization {
                collection: collection.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Typed [`RecordStore::insert_many`].
pub fn insert_all<T: Serialize>(
    store: &dyn RecordStore,
    collection: Collection,
    items: &[T],
) -> StoreResult<usize> {
    store.insert_many(collection, to_documents(collection, items)?)
}

/// Typed [`RecordStore::replace_all`].
pub fn replace_all<T: Serialize>(
    store: &dyn RecordStore,
    collection: Collection,
    items: &[T],
) -> StoreResult<usize> {
    store.replace_all(collection, to_documents(collection, items)?)
}
