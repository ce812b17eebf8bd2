//! API response types

use serde::Serialize;

use crate::ingest::IngestStatsSnapshot;
use crate::storage::schema::{
    DashboardSummary, EventRow, GroupRow, HostRow, ServiceRow, StatisticPointRow,
};
use crate::storage::{HealthStatus, StorageStats};

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "ok" when the database answers, "degraded" otherwise
    pub status: String,
    pub timestamp: String,
    pub storage: HealthStatus,
}

/// Collector statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub storage: StorageStats,
    pub ingest: IngestStatsSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostsResponse {
    pub hosts: Vec<HostRow>,
    pub count: usize,
}

/// One host with its service groups
#[derive(Debug, Clone, Serialize)]
pub struct HostDetailResponse {
    #[serde(flatten)]
    pub host: HostRow,
    pub groups: Vec<GroupRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicesResponse {
    pub host_id: i64,
    pub services: Vec<ServiceRow>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsResponse {
    pub host_id: i64,
    pub events: Vec<EventRow>,
    pub count: usize,
}

/// Events across hosts, one page at a time
#[derive(Debug, Clone, Serialize)]
pub struct EventListResponse {
    pub events: Vec<EventRow>,
    pub count: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub timestamp: String,
    #[serde(flatten)]
    pub summary: DashboardSummary,
    /// Newest active events
    pub recent_events: Vec<EventRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsResponse {
    pub service_id: i64,
    pub points: Vec<StatisticPointRow>,
    pub count: usize,
}
