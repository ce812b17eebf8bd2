//! Storage backend trait definition
//!
//! This module defines the read and maintenance seam of the store. Writes go
//! through the ingestion pipeline, which needs a single transaction spanning
//! several tables and therefore works on a raw connection instead.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Serialize;

use super::error::StorageResult;
use super::schema::{
    DashboardSummary, EventRow, GroupRow, HostRow, ServiceRow, StatisticPointRow,
};

/// Health status of the storage backend
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Size of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageStats {
    /// Row count per table
    pub tables: BTreeMap<String, i64>,

    /// Database file size in bytes (0 for in-memory databases)
    pub file_size_bytes: u64,
}

/// Filter for metric point queries
#[derive(Debug, Clone, Default)]
pub struct StatisticsQuery {
    /// Only this descriptor (e.g. `cpu_user`)
    pub descriptor: Option<String>,

    /// Only points collected at or after this unix second
    pub since: Option<i64>,

    /// Maximum number of points, newest first
    pub limit: usize,
}

/// Filter for event listings
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Only events of this host
    pub host_id: Option<i64>,

    /// Only events still marked active
    pub active_only: bool,

    /// Maximum number of events, newest first
    pub limit: usize,

    /// Events to skip before the first returned one
    pub offset: usize,
}

/// Trait for persistent storage backends
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across request
/// handlers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// All known hosts, most recently updated first
    async fn list_hosts(&self) -> StorageResult<Vec<HostRow>>;

    async fn find_host(&self, host_id: i64) -> StorageResult<Option<HostRow>>;

    /// Stored services of a host ordered by name
    async fn host_services(&self, host_id: i64) -> StorageResult<Vec<ServiceRow>>;

    /// Metric points of one service
    async fn service_statistics(
        &self,
        service_id: i64,
        query: StatisticsQuery,
    ) -> StorageResult<Vec<StatisticPointRow>>;

    /// Events across all hosts, newest first
    async fn list_events(&self, query: EventQuery) -> StorageResult<Vec<EventRow>>;

    /// Most recent events of a host, newest first
    async fn host_events(&self, host_id: i64, limit: usize) -> StorageResult<Vec<EventRow>> {
        self.list_events(EventQuery {
            host_id: Some(host_id),
            limit,
            ..Default::default()
        })
        .await
    }

    /// Fleet-wide host, service and event counts
    async fn dashboard(&self) -> StorageResult<DashboardSummary>;

    /// Service groups of a host with their current members
    async fn group_members(&self, host_id: i64) -> StorageResult<Vec<GroupRow>>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend is
    /// operational. Failures are reported in the status, not as an error.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Row counts per table and on-disk size
    async fn get_stats(&self) -> StorageResult<StorageStats>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
