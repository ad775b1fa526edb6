//! Application service: the operations exposed to the CLI and HTTP layers.
//!
//! [`TimeTracker`] ties together the catalog index, the parse pipeline and the
//! record store. It is cheap to share behind an `Arc`; after startup the
//! catalog is only read.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::catalog::{
    flatten, group_by_project, load_source, CatalogIndex, CatalogSource, FlatTaskRecord,
    ProjectGroup,
};
use crate::config::{AppConfig, StoreKind};
use crate::error::AufgabenResult;
use crate::llm::{OllamaClient, TextCompletion};
use crate::paths::{AppPaths, PathError};
use crate::pipeline::{ParseOutcome, ParsePipeline, ParsedEntry, PipelineResult};
use crate::store::{
    find_as, insert_all, replace_all, Collection, DurableStore, Filter, MemStore, RecordStore,
};

/// A persisted entry: the entry exactly as submitted plus its save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedEntry {
    #[serde(flatten)]
    pub entry: ParsedEntry,
    /// Seconds since UNIX epoch.
    pub saved_at: u64,
}

/// Saved entries sharing one `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateGroup {
    pub date: Option<String>,
    pub entries: Vec<SavedEntry>,
}

/// Counts reported after a catalog import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub projects: usize,
    pub tasks: usize,
    pub with_owner: usize,
    pub with_month: usize,
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tasks from {} projects ({} with owner, {} with month)",
            self.tasks, self.projects, self.with_owner, self.with_month
        )
    }
}

/// Catalog, pipeline and store behind one façade.
pub struct TimeTracker<C> {
    pipeline: ParsePipeline<C>,
    store: Arc<dyn RecordStore>,
}

impl<C: TextCompletion> TimeTracker<C> {
    /// A tracker with an empty catalog.
    pub fn new(backend: C, store: Arc<dyn RecordStore>) -> Self {
        Self {
            pipeline: ParsePipeline::new(backend, Arc::new(CatalogIndex::new())),
            store,
        }
    }

    pub fn index(&self) -> &Arc<CatalogIndex> {
        self.pipeline.index()
    }

    pub fn backend(&self) -> &C {
        self.pipeline.backend()
    }

    /// Flatten `source`, replace the stored task collection with the result,
    /// and load it into the index. If flattening or the store write fails,
    /// both the stored tasks and the index keep the previous import.
    pub fn import_catalog(&self, source: &CatalogSource) -> AufgabenResult<ImportSummary> {
        let records = flatten(&source.projects)?;

        let removed = replace_all(self.store.as_ref(), Collection::Tasks, &records)?;

        let summary = ImportSummary {
            projects: source.projects.len(),
            tasks: records.len(),
            with_owner: records.iter().filter(|r| r.owner.is_some()).count(),
            with_month: records.iter().filter(|r| r.month.is_some()).count(),
        };
        self.index().load(records);
        tracing::info!(
            projects = summary.projects,
            tasks = summary.tasks,
            replaced = removed,
            "imported catalog"
        );
        Ok(summary)
    }

    /// [`import_catalog`](Self::import_catalog) from a JSON file.
    pub fn import_catalog_file(&self, path: &Path) -> AufgabenResult<ImportSummary> {
        let source = load_source(path)?;
        self.import_catalog(&source)
    }

    /// Load the index from the task collection of a previous import.
    pub fn restore_index(&self) -> AufgabenResult<usize> {
        let records: Vec<FlatTaskRecord> =
            find_as(self.store.as_ref(), Collection::Tasks, &Filter::all())?;
        let count = records.len();
        self.index().load(records);
        tracing::info!(tasks = count, "restored catalog index from store");
        Ok(count)
    }

    /// Remove every saved entry. Returns how many were removed.
    pub fn reset_entries(&self) -> AufgabenResult<usize> {
        let removed = self
            .store
            .delete_many(Collection::ParsedEntries, &Filter::all())?;
        tracing::info!(removed, "cleared saved entries");
        Ok(removed)
    }

    /// Catalog groups for one owner and month, as offered to the matcher.
    pub fn catalog_context(&self, owner: &str, month: &str) -> Vec<ProjectGroup> {
        group_by_project(&self.index().query(owner, month))
    }

    /// Run the two-stage pipeline on raw notes.
    pub fn parse(&self, raw_text: &str) -> PipelineResult<ParseOutcome> {
        self.pipeline.run(raw_text)
    }

    /// Persist `entries` verbatim, stamped with the current time.
    pub fn save(&self, entries: Vec<ParsedEntry>) -> AufgabenResult<Vec<SavedEntry>> {
        let saved_at = unix_now();
        let saved: Vec<SavedEntry> = entries
            .into_iter()
            .map(|entry| SavedEntry { entry, saved_at })
            .collect();
        insert_all(self.store.as_ref(), Collection::ParsedEntries, &saved)?;
        tracing::info!(count = saved.len(), "saved entries");
        Ok(saved)
    }

    /// All saved entries in insertion order.
    pub fn saved(&self) -> AufgabenResult<Vec<SavedEntry>> {
        Ok(find_as(
            self.store.as_ref(),
            Collection::ParsedEntries,
            &Filter::all(),
        )?)
    }

    /// Saved entries grouped by `date`, groups in first-seen order.
    pub fn saved_by_date(&self) -> AufgabenResult<Vec<DateGroup>> {
        Ok(group_by_date(self.saved()?))
    }
}

/// Group entries by date, keeping first-seen order of dates and entries.
pub fn group_by_date(entries: Vec<SavedEntry>) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();
    for saved in entries {
        match groups.iter_mut().find(|g| g.date == saved.entry.date) {
            Some(group) => group.entries.push(saved),
            None => groups.push(DateGroup {
                date: saved.entry.date.clone(),
                entries: vec![saved],
            }),
        }
    }
    groups
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Open the store selected by `config`.
pub fn open_store(
    config: &AppConfig,
    paths: Option<&AppPaths>,
) -> AufgabenResult<Arc<dyn RecordStore>> {
    match config.store {
        StoreKind::Memory => Ok(Arc::new(MemStore::new())),
        StoreKind::Durable => {
            if let (None, Some(paths)) = (&config.data_dir, paths) {
                paths.ensure_dirs()?;
            }
            let dir = config.resolve_data_dir(paths).ok_or(PathError::NoHome)?;
            Ok(Arc::new(DurableStore::open(&dir)?))
        }
    }
}

/// Startup sequence: open the store, import the catalog (replacing any
/// previous import) and optionally clear saved entries.
pub fn bootstrap(
    config: &AppConfig,
    paths: Option<&AppPaths>,
) -> AufgabenResult<TimeTracker<OllamaClient>> {
    let store = open_store(config, paths)?;
    let tracker = TimeTracker::new(OllamaClient::new(config.ollama.clone()), store);
    if config.reset_entries_on_start {
        tracker.reset_entries()?;
    }
    tracker.import_catalog_file(&config.catalog_path)?;
    Ok(tracker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogNode, CatalogProject};
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::error::StoreError;
    use crate::llm::LlmError;
    use crate::store::{Document, StoreResult};

    struct Offline;

    impl TextCompletion for Offline {
        fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::Unavailable {
                url: "offline".into(),
            })
        }
    }

    fn tracker() -> TimeTracker<Offline> {
        TimeTracker::new(Offline, Arc::new(MemStore::new()))
    }

    fn source() -> CatalogSource {
        CatalogSource {
            projects: vec![CatalogProject {
                id: 1258,
                name: "1258 - PDM".into(),
                tasks: vec![CatalogNode::group(
                    "April'25",
                    vec![
                        CatalogNode::leaf("(SK) - BuP - April'25"),
                        CatalogNode::leaf("Allgemein"),
                    ],
                )],
            }],
        }
    }

    fn entry(date: &str, description: &str) -> ParsedEntry {
        ParsedEntry {
            date: Some(date.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    #[test]
    fn import_replaces_previous_catalog() {
        let tracker = tracker();
        let summary = tracker.import_catalog(&source()).unwrap();
        assert_eq!(summary.tasks, 2);
        assert_eq!(summary.with_owner, 1);
        assert_eq!(summary.with_month, 2);

        tracker.import_catalog(&source()).unwrap();
        assert_eq!(tracker.index().len(), 2);
        assert_eq!(tracker.restore_index().unwrap(), 2);
    }

    #[test]
    fn failed_import_leaves_store_untouched() {
        let tracker = tracker();
        tracker.import_catalog(&source()).unwrap();

        let mut broken = source();
        broken.projects[0].tasks.push(CatalogNode::default());
        assert!(tracker.import_catalog(&broken).is_err());
        assert_eq!(tracker.restore_index().unwrap(), 2);
    }

    /// Wraps a [`MemStore`] and refuses every write once `fail` is set.
    struct FailingWrites {
        inner: MemStore,
        fail: AtomicBool,
    }

    impl FailingWrites {
        fn check(&self) -> StoreResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Redb {
                    message: "commit failed: disk full".into(),
                });
            }
            Ok(())
        }
    }

    impl RecordStore for FailingWrites {
        fn find(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> StoreResult<Vec<Document>> {
            self.inner.find(collection, filter)
        }

        fn insert_many(
            &self,
            collection: Collection,
            documents: Vec<Document>,
        ) -> StoreResult<usize> {
            self.check()?;
            self.inner.insert_many(collection, documents)
        }

        fn delete_many(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> StoreResult<usize> {
            self.check()?;
            self.inner.delete_many(collection, filter)
        }

        fn replace_all(
            &self,
            collection: Collection,
            documents: Vec<Document>,
        ) -> StoreResult<usize> {
            self.check()?;
            self.inner.replace_all(collection, documents)
        }
    }

    #[test]
    fn failed_store_write_keeps_previous_import() {
        let store = Arc::new(FailingWrites {
            inner: MemStore::new(),
            fail: AtomicBool::new(false),
        });
        let tracker = TimeTracker::new(Offline, store.clone());
        tracker.import_catalog(&source()).unwrap();

        let mut bigger = source();
        bigger.projects[0]
            .tasks
            .push(CatalogNode::leaf("(ML) - Support - April'25"));
        store.fail.store(true, Ordering::SeqCst);
        assert!(tracker.import_catalog(&bigger).is_err());

        assert_eq!(store.inner.len(Collection::Tasks), 2);
        assert_eq!(tracker.index().len(), 2);
        assert!(tracker.catalog_context("ML", "2025-04").is_empty());

        store.fail.store(false, Ordering::SeqCst);
        assert_eq!(tracker.import_catalog(&bigger).unwrap().tasks, 3);
        assert_eq!(store.inner.len(Collection::Tasks), 3);
    }

    #[test]
    fn catalog_context_is_grouped() {
        let tracker = tracker();
        tracker.import_catalog(&source()).unwrap();
        let groups = tracker.catalog_context("SK", "2025-04");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tasks.len(), 1);
        assert!(tracker.catalog_context("SK", "2025-05").is_empty());
    }

    #[test]
    fn save_then_fetch_verbatim() {
        let tracker = tracker();
        let mut first = entry("2025-04-03", "Figma-Export Konzept");
        first.extra.insert("note".into(), serde_json::json!("edited"));
        let saved = tracker.save(vec![first.clone()]).unwrap();
        assert_eq!(saved[0].entry, first);

        let back = tracker.saved().unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].entry, first);
        assert_eq!(back[0].saved_at, saved[0].saved_at);
    }

    #[test]
    fn saved_by_date_groups_in_first_seen_order() {
        let tracker = tracker();
        tracker
            .save(vec![
                entry("2025-04-04", "b"),
                entry("2025-04-03", "a"),
                entry("2025-04-04", "c"),
            ])
            .unwrap();
        let groups = tracker.saved_by_date().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date.as_deref(), Some("2025-04-04"));
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[1].entries[0].entry.description.as_deref(), Some("a"));
    }

    #[test]
    fn reset_entries_clears_saved() {
        let tracker = tracker();
        tracker.save(vec![entry("2025-04-03", "a")]).unwrap();
        assert_eq!(tracker.reset_entries().unwrap(), 1);
        assert!(tracker.saved().unwrap().is_empty());
    }

    #[test]
    fn parse_reports_backend_failure() {
        let tracker = tracker();
        let err = tracker.parse("03.04. 9-11 BuP").unwrap_err();
        assert!(matches!(
            err,
            crate::pipeline::PipelineError::Backend {
                stage: crate::pipeline::BackendStage::Metadata,
                ..
            }
        ));
        assert!(!err.is_metadata_failure());
    }

    #[test]
    fn memory_store_needs_no_paths() {
        let config = AppConfig {
            store: StoreKind::Memory,
            ..Default::default()
        };
        assert!(open_store(&config, None).is_ok());
    }

    #[test]
    fn durable_store_without_any_dir_is_an_error() {
        let config = AppConfig::default();
        assert!(open_store(&config, None).is_err());
    }
}
