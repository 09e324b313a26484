//! # meshlink-core
//!
//! Answers two connectivity questions over a corpus of documents and the
//! entities they mention:
//!
//! 1. **Shortest-path** — given several named sets of entity identifiers and
//!    a hop budget, find every minimum-length path connecting an entity from
//!    one set to an entity from a different set.
//! 2. **Spider** — given a set of seed entity identifiers and a step budget,
//!    return the subgraph of entities reachable within that many hops.
//!
//! ## Architecture
//!
//! Entities and documents form a bipartite graph ([`store::BipartiteStore`],
//! [`model`]); [`projection`] collapses it into a unipartite entity↔entity
//! graph ([`store::UnipartiteStore`]) that [`pathfinder`] and [`spider`] query.
//! [`graph::build`] is the top-level entry point: it loads a
//! [`config::MeshlinkConfig`], consults the [`signature`] rebuild gate, and
//! drives [`ingest`] + [`projection`] when the configured inputs changed.
//! [`export`] turns path/spider results into row form for a spreadsheet
//! export, and [`jobs::JobRunner`] runs those queries asynchronously behind a
//! job-status contract that the `service`-gated [`http`] facade exposes over
//! HTTP. [`search`] answers ancillary presence/detail lookups used by the
//! facade.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//!
//! use meshlink_core::config::MeshlinkConfig;
//! use meshlink_core::ingest::IngestOptions;
//! use meshlink_core::pathfinder::find_connections;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), meshlink_core::error::MeshlinkError> {
//!     let config = MeshlinkConfig::load("data-config.json")?;
//!     let handles = meshlink_core::graph::build(
//!         &config,
//!         IngestOptions::default(),
//!         Arc::new(AtomicBool::new(false)),
//!     )
//!     .await?;
//!
//!     let mut sets = std::collections::BTreeMap::new();
//!     sets.insert("A".to_string(), ["e1".to_string()].into_iter().collect());
//!     sets.insert("B".to_string(), ["e4".to_string()].into_iter().collect());
//!     let connections = find_connections(handles.unipartite.as_ref(), &sets, 3)?;
//!     println!("found connections for {} set pairs", connections.set_pairs.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: the core graph/ingest/query library, usable in-process
//!   with no networking.
//! - **service**: adds the HTTP facade ([`http`]) and `ctrlc`-driven
//!   cooperative ingest cancellation.
//! - **bin**: builds the `meshlink` binary (always pulls in `service`).

pub mod config;
pub mod csv_readers;
pub mod error;
pub mod export;
pub mod graph;
#[cfg(feature = "service")]
pub mod http;
pub mod ingest;
pub mod jobs;
pub mod model;
pub mod pathfinder;
pub mod projection;
pub mod search;
pub mod signature;
pub mod spider;
pub mod store;

pub use error::MeshlinkError;
