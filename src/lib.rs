//! Collector for Monit agent reports
//!
//! Agents push XML status reports; each report is decoded, reconciled against
//! the stored state of its host and persisted into a normalized SQLite store
//! as one transaction.
//!
//! - [`report`]: payload decoding into a typed model
//! - [`ingest`]: the reconciliation pipeline and its coordinator
//! - [`storage`]: the store, its schema and the read seam
//! - [`api`]: the HTTP shell (feature `api`)

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod id;
pub mod ingest;
pub mod report;
pub mod storage;
pub mod util;
