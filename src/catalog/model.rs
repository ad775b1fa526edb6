//! Core data types for the task catalog.

use serde::{Deserialize, Serialize};

/// The catalog document as it is stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSource {
    pub projects: Vec<CatalogProject>,
}

/// A top-level project with its task tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProject {
    pub id: i64,
    pub name: String,
    /// The source files spell this key `Tasks`.
    #[serde(rename = "Tasks", alias = "tasks", default)]
    pub tasks: Vec<CatalogNode>,
}

/// One node of the task tree.
///
/// A node is a leaf iff `subtasks` is absent. Leaves are bookable tasks;
/// internal nodes only group and may carry a month token in their name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<CatalogNode>>,
}

impl CatalogNode {
    /// A named leaf.
    pub fn leaf(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            subtasks: None,
        }
    }

    /// A named grouping node with the given children.
    pub fn group(name: &str, subtasks: Vec<CatalogNode>) -> Self {
        Self {
            name: Some(name.to_string()),
            subtasks: Some(subtasks),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.subtasks.is_none()
    }
}

/// A flattened leaf task, stamped with the project and month it was found under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTaskRecord {
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    /// The leaf's raw name, e.g. `(SK) - BuP - April'25`.
    pub task_name: String,
    /// Two-letter owner code from a leading `(XX)`.
    pub owner: Option<String>,
    /// `YYYY-MM` of the nearest month-labelled ancestor (or the leaf itself).
    pub month: Option<String>,
}

/// Catalog context handed to the entry matcher: one group per project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectGroup {
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    pub tasks: Vec<GroupedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedTask {
    pub task_name: String,
    pub owner: Option<String>,
    pub month: Option<String>,
}

impl From<&FlatTaskRecord> for GroupedTask {
    fn from(record: &FlatTaskRecord) -> Self {
        Self {
            task_name: record.task_name.clone(),
            owner: record.owner.clone(),
            month: record.month.clone(),
        }
    }
}
