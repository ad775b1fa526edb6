// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # aufgaben
//!
//! Turns free-text time-tracking notes into structured entries that reference
//! a known project/task catalog.
//!
//! ## Architecture
//!
//! - **Catalog** (`catalog`): flattens the nested project/task tree into
//!   owner- and month-stamped records and indexes them
//! - **Pipeline** (`pipeline`): two completion round trips, first inferring
//!   owner and month, then matching the notes against that owner's tasks
//! - **Backend** (`llm`): the `TextCompletion` capability and its Ollama client
//! - **Store** (`store`): set-oriented persistence, in memory (DashMap) or durable (redb)
//! - **Service** (`service`): import, parse, save and fetch behind one type
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use aufgaben::llm::{OllamaClient, OllamaConfig};
//! use aufgaben::service::TimeTracker;
//! use aufgaben::store::MemStore;
//!
//! let tracker = TimeTracker::new(
//!     OllamaClient::new(OllamaConfig::default()),
//!     Arc::new(MemStore::new()),
//! );
//! tracker.import_catalog_file("appendix2.json".as_ref()).unwrap();
//! let outcome = tracker.parse("03.04. 09:00-11:30 Figma-Export Konzept (SK)").unwrap();
//! tracker.save(outcome.entries).unwrap();
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod llm;
pub mod paths;
pub mod pipeline;
pub mod service;
pub mod store;
