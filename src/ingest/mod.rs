//! Ingestion and reconciliation pipeline
//!
//! One agent report is applied as one unit:
//!
//! ```text
//! Received → Decoded → HostResolved → ServicesReconciled
//!          → GroupsRecorded → EventsRecorded → Committed
//! ```
//!
//! Decoding happens before any connection is taken. Every storage step runs
//! on the same `BEGIN IMMEDIATE` transaction; an error at any step drops the
//! transaction, which rolls back everything the report had written.

pub mod error;
pub mod events;
pub mod groups;
pub mod hosts;
pub mod metrics;
pub mod names;
pub mod services;

use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, instrument, warn};

pub use error::IngestError;

use crate::report::{Report, decode_report};

/// Bind parameters allowed in one statement
///
/// This is SQLite's historical default; statements are chunked below it.
pub(crate) const MAX_BINDS: usize = 999;

/// Where a report is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Received,
    Decoded,
    HostResolved,
    ServicesReconciled,
    GroupsRecorded,
    EventsRecorded,
    Committed,
    Failed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Decoded => "decoded",
            IngestStage::HostResolved => "host_resolved",
            IngestStage::ServicesReconciled => "services_reconciled",
            IngestStage::GroupsRecorded => "groups_recorded",
            IngestStage::EventsRecorded => "events_recorded",
            IngestStage::Committed => "committed",
            IngestStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What one committed report changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub host_id: i64,
    pub hostname: String,
    pub service_count: usize,
    pub event_count: usize,
    pub events_recorded: usize,
    pub events_dropped: usize,
    pub reincarnated: bool,
    pub new_host: bool,
}

/// Process-wide ingestion counters
#[derive(Debug, Default)]
pub struct IngestStats {
    reports_ingested: AtomicU64,
    reports_failed: AtomicU64,
    events_dropped: AtomicU64,
    reincarnations: AtomicU64,
    hosts_created: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub reports_ingested: u64,
    pub reports_failed: u64,
    pub events_dropped: u64,
    pub reincarnations: u64,
    pub hosts_created: u64,
}

impl IngestStats {
    fn record_success(&self, summary: &IngestSummary) {
        self.reports_ingested.fetch_add(1, Ordering::Relaxed);
        self.events_dropped
            .fetch_add(summary.events_dropped as u64, Ordering::Relaxed);
        if summary.reincarnated {
            self.reincarnations.fetch_add(1, Ordering::Relaxed);
        }
        if summary.new_host {
            self.hosts_created.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_failure(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            reports_ingested: self.reports_ingested.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            reincarnations: self.reincarnations.load(Ordering::Relaxed),
            hosts_created: self.hosts_created.load(Ordering::Relaxed),
        }
    }
}

/// Applies agent reports to the store
///
/// Cheap to share behind an `Arc`; every call to [`Ingestor::submit`] takes
/// its own connection from the pool.
pub struct Ingestor {
    pool: SqlitePool,
    timeout: Duration,
    stats: IngestStats,
}

impl Ingestor {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self {
            pool,
            timeout,
            stats: IngestStats::default(),
        }
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Decode and apply one report sent from `source`
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn submit(
        &self,
        payload: &[u8],
        source: IpAddr,
    ) -> Result<IngestSummary, IngestError> {
        let result = match tokio::time::timeout(self.timeout, self.run(payload, source)).await {
            Ok(result) => result,
            Err(_) => Err(IngestError::Timeout(self.timeout)),
        };

        match &result {
            Ok(summary) => {
                self.stats.record_success(summary);
                info!(
                    host_id = summary.host_id,
                    hostname = %summary.hostname,
                    services = summary.service_count,
                    events = summary.events_recorded,
                    "report ingested"
                );
            }
            Err(e) if e.is_client_error() => {
                self.stats.record_failure();
                warn!(%source, "report rejected: {e}");
            }
            Err(e @ IngestError::Timeout(_)) => {
                self.stats.record_failure();
                error!(stage = %IngestStage::Failed, "report abandoned: {e}");
            }
            // storage failures were logged with their stage by `run`
            Err(_) => self.stats.record_failure(),
        }

        result
    }

    async fn run(&self, payload: &[u8], source: IpAddr) -> Result<IngestSummary, IngestError> {
        let mut stage = IngestStage::Received;
        let now = Utc::now();

        let report = decode_report(payload, now).inspect_err(|e| {
            debug!(%stage, "decode failed: {e}");
        })?;
        stage = IngestStage::Decoded;

        let applied: crate::storage::StorageResult<IngestSummary> = async {
            let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
            let summary = apply(&mut tx, &report, source, now, &mut stage).await?;
            tx.commit().await?;
            Ok(summary)
        }
        .await;

        match applied {
            Ok(summary) => {
                debug!(stage = %IngestStage::Committed, "transaction committed");
                Ok(summary)
            }
            Err(e) => {
                // Dropping the transaction rolled it back
                error!(%stage, "storage step failed: {e}");
                Err(e.into())
            }
        }
    }
}

/// Run every storage step of one report on `conn`
async fn apply(
    conn: &mut SqliteConnection,
    report: &Report,
    source: IpAddr,
    now: DateTime<Utc>,
    stage: &mut IngestStage,
) -> crate::storage::StorageResult<IngestSummary> {
    let host = hosts::resolve_host(conn, &report.host, source, now).await?;
    *stage = IngestStage::HostResolved;

    let services = services::reconcile(conn, host.host_id, &report.services, now).await?;
    *stage = IngestStage::ServicesReconciled;

    groups::reconcile(conn, host.host_id, &report.groups, &services.name_ids).await?;
    *stage = IngestStage::GroupsRecorded;

    let events = events::record(conn, host.host_id, &report.events).await?;
    *stage = IngestStage::EventsRecorded;

    Ok(IngestSummary {
        host_id: host.host_id,
        hostname: report.host.hostname.clone(),
        service_count: report.services.len(),
        event_count: report.events.len(),
        events_recorded: events.recorded,
        events_dropped: events.dropped,
        reincarnated: host.reincarnated,
        new_host: host.created,
    })
}
