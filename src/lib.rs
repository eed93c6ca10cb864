//! # netsnap-core
//!
//! Block parsing and dependency-ordered ingestion of network device command-output captures.
//!
//! ## Overview
//!
//! A capture is the plain-text console log of one device: prompts, echoed commands and the tables
//! those commands printed (`display interface brief`, `display arp`, `display ip routing-table`,
//! ...). netsnap-core recognizes those tables as *blocks*, extracts typed records from them and
//! writes the records into a [`NetworkStore`](store::NetworkStore) under a per-run snapshot.
//!
//! ### Key Features
//!
//! - **Overlapping blocks**: every line is offered to every active parser, and a new block can
//!   start while another is still open
//! - **Error tolerance**: bad lines become per-block diagnostics; a file is only abandoned after
//!   a configurable run of consecutive failures
//! - **Dependency ordering**: identity and interfaces are ingested before anything that references
//!   them, whatever order the capture printed them in
//! - **Idempotent upserts**: re-ingesting the same capture into the same snapshot changes nothing
//! - **Per-device isolation**: devices ingest concurrently; one failing device does not stop the
//!   batch
//!
//! ## Architecture
//!
//! - **[`codec`]**: block parsers, the parser registry and the [`ParsingEngine`](codec::ParsingEngine)
//! - **[`ingest`]**: ingestors, the ingestion context and the orchestrator
//! - **[`store`]**: the `NetworkStore` seam and its in-memory implementation
//! - **`db`**: SQLite-backed store (`service` feature)
//! - **[`discover`]** / **[`pipeline`]**: finding device captures and running a batch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netsnap_core::{config::NetsnapConfig, pipeline::run_batch, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netsnap_core::NetsnapError> {
//!     let store = MemoryStore::new();
//!     let summary = run_batch(
//!         "./captures".as_ref(),
//!         &NetsnapConfig::default(),
//!         store.clone(),
//!         Some("nightly".to_string()),
//!     )
//!     .await?;
//!     print!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! Parsing alone needs no store:
//!
//! ```rust
//! use netsnap_core::codec::{ParsingEngine, PARSERS};
//!
//! let run = ParsingEngine::new(&PARSERS, 50).parse_str("<CORE-01>display current-configuration\n sysname CORE-01\n");
//! assert_eq!(run.prompt_hostname.as_deref(), Some("CORE-01"));
//! assert_eq!(run.blocks.len(), 1);
//! ```

pub mod codec;
pub mod config;
#[cfg(all(feature = "service", not(target_arch = "wasm32")))]
pub mod db;
pub mod discover;
pub mod error;
pub mod ifname;
pub mod ingest;
#[cfg(not(target_arch = "wasm32"))]
pub mod pipeline;
pub mod store;
#[cfg(test)]
mod tests;

pub use error::*;
