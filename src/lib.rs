//! Mediathek: catalog harvester and prefix-compressed CSV exporter
//!
//! This crate harvests the MDR Mediathek into a flat list of playable streams
//! and writes it as a compact CSV:
//!
//! 1. **Expansion** -- Two seed pages (shows by letter, broadcasts by day) expand
//!    into index pages, index pages into shows, shows into broadcasts, and each
//!    broadcast into at most one stream record read from its asset feed
//! 2. **Storage** -- Records go into an in-memory SQLite table keyed by the
//!    asset feed URL; the first record seen for a key wins
//! 3. **Export** -- Rows are written ordered by channel, topic and title, with
//!    shared URL prefixes factored out per channel and per topic and repeated
//!    values left empty
//!
//! # Architecture
//!
//! - **Stage barriers** -- Each expansion stage finishes completely before the
//!   next one starts
//! - **Bounded pools** -- Every stage runs on its own pool; each worker owns its
//!   HTTP session, created on first use
//! - **Ordered results** -- Task results are kept in submission order, so the
//!   same site content always produces the same CSV
//! - **Failure containment** -- A failed fetch or unexpected page only drops
//!   that page's contribution; only store errors abort the run
//!
//! # Key Modules
//!
//! - [`pipeline`] -- The four expansion stages and their driver
//! - [`pool`] -- Bounded, order-preserving worker pool
//! - [`fetch`] -- Transport trait and per-worker HTTP session
//! - [`extract`] -- Field selection from HTML pages and asset feeds
//! - [`store`] -- SQLite record store and grouping queries
//! - [`export`] -- Prefix search and compressed CSV writer
//! - [`decode`] -- Reader for the compressed CSV
//! - [`models`] -- Pipeline values and the stream record
//! - [`stats`] -- Run counters
//! - [`config`] -- Site constants and run configuration
//!
//! # Example Usage
//!
//! ```bash
//! # Harvest and export to output/mediathek-<timestamp>.csv
//! mediathek -v harvest -o output/
//!
//! # Inspect an export with all values restored
//! mediathek expand -i output/mediathek-20170201-190000.csv -o full.csv
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod stats;
pub mod store;
