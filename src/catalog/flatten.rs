//! Flattening of the nested catalog tree into owner/month-stamped records.
//!
//! The walk is a plain recursion that takes its [`TraversalContext`] by value:
//! each child receives its own copy, so a month label found inside one branch
//! never leaks into a sibling branch, while a month set on a shared ancestor is
//! seen by every descendant.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::error::{CatalogError, CatalogResult};
use super::model::{CatalogNode, CatalogProject, CatalogSource, FlatTaskRecord};

// ── Regex patterns ──────────────────────────────────────────────────────

/// A month name directly followed by a two-digit year, e.g. `April'25` or `Mai25`.
/// The trailing group stops `April'2025` from reading as 2020.
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(January|Januar|February|Februar|March|März|April|May|Mai|June|Juni|July|Juli|August|September|October|Oktober|November|December|Dezember)'?([0-9]{2})(?:[^0-9]|$)",
    )
    .unwrap()
});

/// Leading owner tag, e.g. `(SK) - BuP - April'25`.
static RE_OWNER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\((\w{2})\)").unwrap());

fn month_number(name: &str) -> Option<&'static str> {
    let number = match name {
        "Januar" | "January" => "01",
        "Februar" | "February" => "02",
        "März" | "March" => "03",
        "April" => "04",
        "Mai" | "May" => "05",
        "Juni" | "June" => "06",
        "Juli" | "July" => "07",
        "August" => "08",
        "September" => "09",
        "Oktober" | "October" => "10",
        "November" => "11",
        "Dezember" | "December" => "12",
        _ => return None,
    };
    Some(number)
}

/// Resolve the first month token in `text` to `YYYY-MM`.
pub fn month_token(text: &str) -> Option<String> {
    let caps = RE_MONTH.captures(text)?;
    let month = month_number(caps.get(1)?.as_str())?;
    let year = caps.get(2)?.as_str();
    Some(format!("20{year}-{month}"))
}

/// Owner code from a leading parenthesised two-character tag.
pub fn owner_code(name: &str) -> Option<String> {
    RE_OWNER
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// State carried down one branch of the walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalContext {
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    pub current_month: Option<String>,
}

impl TraversalContext {
    fn for_project(project: &CatalogProject) -> Self {
        Self {
            project_id: Some(project.id),
            project_name: Some(project.name.clone()),
            current_month: None,
        }
    }
}

/// Flatten every project's task tree. Exactly one record per leaf.
pub fn flatten(projects: &[CatalogProject]) -> CatalogResult<Vec<FlatTaskRecord>> {
    let mut records = Vec::new();
    for project in projects {
        let context = TraversalContext::for_project(project);
        for (i, task) in project.tasks.iter().enumerate() {
            visit(task, context.clone(), &format!("Tasks[{i}]"), &mut records)?;
        }
    }
    Ok(records)
}

fn visit(
    node: &CatalogNode,
    mut context: TraversalContext,
    path: &str,
    out: &mut Vec<FlatTaskRecord>,
) -> CatalogResult<()> {
    if let Some(month) = node.name.as_deref().and_then(month_token) {
        context.current_month = Some(month);
    }

    match &node.subtasks {
        Some(children) => {
            for (i, child) in children.iter().enumerate() {
                visit(child, context.clone(), &format!("{path}.subtasks[{i}]"), out)?;
            }
        }
        None => {
            let name = node.name.as_deref().ok_or_else(|| CatalogError::InputShape {
                project: context.project_name.clone().unwrap_or_default(),
                path: path.to_string(),
            })?;
            out.push(FlatTaskRecord {
                project_id: context.project_id,
                project_name: context.project_name,
                task_name: name.to_string(),
                owner: owner_code(name),
                month: context.current_month,
            });
        }
    }
    Ok(())
}

/// Read and decode a catalog document from disk.
pub fn load_source(path: &Path) -> CatalogResult<CatalogSource> {
    let data = std::fs::read_to_string(path).map_err(|e| CatalogError::SourceRead {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&data).map_err(|e| CatalogError::SourceParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
