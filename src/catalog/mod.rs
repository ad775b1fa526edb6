//! Project/task catalog: the nested reference tree that time entries are
//! matched against.
//!
//! The catalog arrives as a JSON document of projects, each holding a tree of
//! task nodes. Internal nodes are grouping labels (usually a month such as
//! `April'25`), leaves are the concrete tasks people book time on. At startup
//! the tree is flattened once into [`FlatTaskRecord`]s and loaded into a
//! [`CatalogIndex`] that the parse pipeline queries by owner and month.

pub mod error;
pub mod flatten;
pub mod index;
pub mod model;

pub use error::{CatalogError, CatalogResult};
pub use flatten::{flatten, load_source, month_token, owner_code};
pub use index::{group_by_project, CatalogIndex};
pub use model::{CatalogNode, CatalogProject, CatalogSource, FlatTaskRecord, GroupedTask, ProjectGroup};
