//! In-memory index over the flattened catalog.
//!
//! The record set is held behind an `Arc` snapshot: [`CatalogIndex::load`]
//! builds the new set completely and swaps it in, so a reader sees either the
//! old set or the new one, never a mix.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::model::{FlatTaskRecord, GroupedTask, ProjectGroup};

/// Queryable set of flattened catalog records.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    records: RwLock<Arc<Vec<FlatTaskRecord>>>,
}

impl CatalogIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index pre-loaded with `records`.
    pub fn with_records(records: Vec<FlatTaskRecord>) -> Self {
        Self {
            records: RwLock::new(Arc::new(records)),
        }
    }

    /// Replace the whole record set.
    pub fn load(&self, records: Vec<FlatTaskRecord>) {
        let snapshot = Arc::new(records);
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
    }

    /// Current snapshot of all records.
    pub fn records(&self) -> Arc<Vec<FlatTaskRecord>> {
        Arc::clone(&self.records.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Records whose owner and month both equal the query exactly (case-sensitive).
    pub fn query(&self, owner: &str, month: &str) -> Vec<FlatTaskRecord> {
        self.records()
            .iter()
            .filter(|r| r.owner.as_deref() == Some(owner) && r.month.as_deref() == Some(month))
            .cloned()
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

/// Group records by project name, keeping first-seen project order and the
/// order in which tasks were appended within each project.
pub fn group_by_project(records: &[FlatTaskRecord]) -> Vec<ProjectGroup> {
    let mut groups: Vec<ProjectGroup> = Vec::new();
    let mut positions: HashMap<Option<&str>, usize> = HashMap::new();

    for record in records {
        let key = record.project_name.as_deref();
        let pos = *positions.entry(key).or_insert_with(|| {
            groups.push(ProjectGroup {
                project_id: record.project_id,
                project_name: record.project_name.clone(),
                tasks: Vec::new(),
            });
            groups.len() - 1
        });
        groups[pos].tasks.push(GroupedTask::from(record));
    }
    groups
}
