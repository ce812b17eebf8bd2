//! Normalized relational store for agent reports
//!
//! ## Design
//!
//! - **Trait-based reads**: `StorageBackend` is what the HTTP layer queries
//! - **Transactional writes**: the ingestion pipeline borrows a connection
//!   from [`sqlite::SqliteBackend::pool`] and runs every step of a report in
//!   one transaction
//! - **Embedded migrations**: the schema ships inside the binary
//!
//! ## Usage
//!
//! ```no_run
//! use monit_collector::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./monit.db").await?;
//!     let hosts = backend.list_hosts().await?;
//!     println!("{} hosts", hosts.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod schema;
pub mod sqlite;

pub use backend::{EventQuery, HealthStatus, StatisticsQuery, StorageBackend, StorageStats};
pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteBackend;
