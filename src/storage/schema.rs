//! Row projections read back from the normalized store
//!
//! The write side lives in [`crate::ingest`] and talks to the tables
//! directly. The types below are what the read seam hands out: one struct per
//! projection, with interned names already joined back to their text.
//!
//! ## Tables
//!
//! | Table                  | Holds                                         |
//! |------------------------|-----------------------------------------------|
//! | `name`                 | interned strings                              |
//! | `host`                 | one row per agent identity (`monitid`)        |
//! | `service`              | one row per (host, service name)              |
//! | `statistics`           | metric descriptors per service                |
//! | `statistics_double`    | append-only metric points                     |
//! | `event`                | append-only state transitions                 |
//! | `servicegroup`         | one row per (host, group name)                |
//! | `servicegroup_service` | current members of each group                 |

use serde::Serialize;
use sqlx::FromRow;

/// Every table the migration creates, in dependency order
pub const TABLES: [&str; 8] = [
    "name",
    "host",
    "service",
    "statistics",
    "statistics_double",
    "event",
    "servicegroup",
    "servicegroup_service",
];

/// `host` status for an active agent
pub const HOST_STATUS_ACTIVE: i64 = 0;

/// Monit service status when every check passes
pub const SERVICE_STATUS_OK: i64 = 0;

/// `statistics.type` for plain gauge descriptors
pub const STATISTIC_TYPE_GAUGE: i64 = 0;

/// `statistics.datatype` for values stored in `statistics_double`
pub const STATISTIC_DATATYPE_DOUBLE: i64 = 5;

/// Monit monitoring mode that marks manual unmonitoring
pub const MONITORING_MODE_MANUAL: i64 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct HostRow {
    pub id: i64,
    pub monitid: String,
    pub hostname: String,
    pub incarnation: i64,
    pub status: i64,
    pub description: String,
    pub ipaddrin: String,
    pub ipaddrout: String,
    pub portin: i64,
    pub portout: i64,
    pub sslin: bool,
    pub sslout: bool,
    pub uname: String,
    pub poll: i64,
    pub startdelay: i64,
    pub controlfile: String,
    pub statusmodified: i64,
    pub statusheartbeat: i64,
    pub version: String,
    pub platformname: String,
    pub platformrelease: String,
    pub platformversion: String,
    pub platformmachine: String,
    pub platformcpu: i64,
    pub platformmemory: i64,
    pub platformswap: i64,
    pub platformuptime: i64,
    pub serviceup: i64,
    pub servicedown: i64,
    pub serviceunmonitorauto: i64,
    pub serviceunmonitormanual: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ServiceRow {
    pub id: i64,
    pub hostid: i64,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub service_type: i64,
    pub status: i64,
    pub statushint: i64,
    pub monitoringstate: i64,
    pub monitoringmode: i64,
    pub onreboot: i64,
    pub statusmodified: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One metric point joined with its descriptor name
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StatisticPointRow {
    pub descriptor: String,
    pub collectedsec: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub hostid: i64,
    pub hostname: String,
    pub serviceid: i64,
    pub service: String,
    pub servicetype: i64,
    pub eventtype: i64,
    pub eventstate: i64,
    pub eventaction: i64,
    pub message: String,
    pub collectedsec: i64,
    pub collectedusec: i64,
    pub active: bool,
}

/// Fleet-wide counts for an overview page
///
/// The `services_*` sums come from the per-host counters written with each
/// report, so they describe what the agents last said rather than the rows
/// currently stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct DashboardSummary {
    pub total_hosts: i64,
    pub hosts_ok: i64,
    pub total_services: i64,
    pub services_ok: i64,
    pub services_up: i64,
    pub services_down: i64,
    pub services_unmonitored: i64,
    pub active_events: i64,
}

/// A service group with its current member names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRow {
    pub id: i64,
    pub name: String,
    pub members: Vec<String>,
}
