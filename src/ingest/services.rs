//! Service reconciliation
//!
//! Diffs the services of a report against the rows stored for the host,
//! updates the known ones and inserts the new ones with one batched statement
//! each, forwards every service's samples to the metric recorder and finally
//! recomputes the host's service counters.
//!
//! Services that disappear from a report are left alone; history is never
//! deleted by ingestion.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, instrument};

use super::metrics::{self, ServiceSamples};
use super::{MAX_BINDS, names};
use crate::id;
use crate::report::ServiceDescriptor;
use crate::storage::schema::MONITORING_MODE_MANUAL;
use crate::storage::{StorageError, StorageResult};

/// Columns of the `incoming` table used by the batched update
const UPDATE_COLUMNS: usize = 8;

/// Columns written per inserted service row
const INSERT_COLUMNS: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceReconciliation {
    /// Service row id of every reported service, in report order
    pub ids: Vec<i64>,
    /// Service name to name id, for the group reconciler
    pub name_ids: HashMap<String, i64>,
    pub inserted: usize,
    pub updated: usize,
    /// Metric points appended
    pub points: usize,
}

struct Row<'a> {
    id: i64,
    name_id: i64,
    service: &'a ServiceDescriptor,
}

#[instrument(skip(conn, services, now), fields(count = services.len()))]
pub async fn reconcile(
    conn: &mut SqliteConnection,
    host_id: i64,
    services: &[ServiceDescriptor],
    now: DateTime<Utc>,
) -> StorageResult<ServiceReconciliation> {
    let texts: Vec<&str> = services.iter().map(|s| s.name.as_str()).collect();
    let name_ids = names::resolve_batch(conn, &texts).await?;

    let stored: HashMap<i64, i64> =
        sqlx::query_as::<_, (i64, i64)>("SELECT nameid, id FROM service WHERE hostid = ?")
            .bind(host_id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    // Duplicate names collapse onto one row; the last descriptor wins
    let mut latest: HashMap<i64, &ServiceDescriptor> = HashMap::with_capacity(services.len());
    let mut order = Vec::with_capacity(services.len());
    for service in services {
        let name_id = names::id_of(&name_ids, &service.name)?;
        if latest.insert(name_id, service).is_none() {
            order.push(name_id);
        }
    }

    let mut row_ids: HashMap<i64, i64> = HashMap::with_capacity(order.len());
    let mut updates = Vec::new();
    let mut inserts = Vec::new();
    for name_id in order {
        let Some(service) = latest.get(&name_id).copied() else {
            continue;
        };
        match stored.get(&name_id) {
            Some(id) => {
                row_ids.insert(name_id, *id);
                updates.push(Row {
                    id: *id,
                    name_id,
                    service,
                });
            }
            None => {
                let id = id::next_id();
                row_ids.insert(name_id, id);
                inserts.push(Row {
                    id,
                    name_id,
                    service,
                });
            }
        }
    }

    let timestamp = now.timestamp();
    update_batch(conn, &updates, timestamp).await?;
    insert_batch(conn, host_id, &inserts, timestamp).await?;

    let mut ids = Vec::with_capacity(services.len());
    let mut samples = Vec::with_capacity(services.len());
    for service in services {
        let name_id = names::id_of(&name_ids, &service.name)?;
        let id = row_ids.get(&name_id).copied().ok_or_else(|| {
            StorageError::QueryFailed(format!("service {:?} has no row", service.name))
        })?;
        ids.push(id);
        samples.push(ServiceSamples {
            service_id: id,
            collected_sec: service.collected_sec,
            samples: service.metric_samples(),
        });
    }
    let points = metrics::record_all(conn, &samples).await?;

    refresh_counters(conn, host_id).await?;

    debug!(
        inserted = inserts.len(),
        updated = updates.len(),
        points,
        "services reconciled"
    );

    Ok(ServiceReconciliation {
        ids,
        name_ids,
        inserted: inserts.len(),
        updated: updates.len(),
        points,
    })
}

async fn update_batch(
    conn: &mut SqliteConnection,
    rows: &[Row<'_>],
    timestamp: i64,
) -> StorageResult<()> {
    for chunk in rows.chunks(MAX_BINDS / UPDATE_COLUMNS) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "WITH incoming (id, type, status, statushint, monitoringstate, monitoringmode, \
             onreboot, updated_at) AS (",
        );
        builder.push_values(chunk, |mut row, incoming| {
            let service = incoming.service;
            row.push_bind(incoming.id)
                .push_bind(service.type_code)
                .push_bind(service.status)
                .push_bind(service.status_hint)
                .push_bind(service.monitoring_state)
                .push_bind(service.monitoring_mode)
                .push_bind(service.on_reboot)
                .push_bind(timestamp);
        });
        builder.push(
            r#")
            UPDATE service SET
                type = incoming.type,
                statusmodified = CASE
                    WHEN service.status <> incoming.status THEN incoming.updated_at
                    ELSE service.statusmodified
                END,
                status = incoming.status,
                statushint = incoming.statushint,
                monitoringstate = incoming.monitoringstate,
                monitoringmode = incoming.monitoringmode,
                onreboot = incoming.onreboot,
                updated_at = incoming.updated_at
            FROM incoming
            WHERE service.id = incoming.id"#,
        );
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_batch(
    conn: &mut SqliteConnection,
    host_id: i64,
    rows: &[Row<'_>],
    timestamp: i64,
) -> StorageResult<()> {
    for chunk in rows.chunks(MAX_BINDS / INSERT_COLUMNS) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO service (id, created_at, updated_at, hostid, nameid, type, status, \
             statushint, monitoringstate, monitoringmode, onreboot, statusmodified) ",
        );
        builder.push_values(chunk, |mut row, new| {
            let service = new.service;
            row.push_bind(new.id)
                .push_bind(timestamp)
                .push_bind(timestamp)
                .push_bind(host_id)
                .push_bind(new.name_id)
                .push_bind(service.type_code)
                .push_bind(service.status)
                .push_bind(service.status_hint)
                .push_bind(service.monitoring_state)
                .push_bind(service.monitoring_mode)
                .push_bind(service.on_reboot)
                .push_bind(timestamp);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

/// Recompute the per-host service counters from the stored rows
async fn refresh_counters(conn: &mut SqliteConnection, host_id: i64) -> StorageResult<()> {
    sqlx::query(
        r#"
        UPDATE host SET (serviceup, servicedown, serviceunmonitorauto, serviceunmonitormanual) = (
            SELECT
                COALESCE(SUM(monitoringstate > 0 AND status = 0), 0),
                COALESCE(SUM(monitoringstate > 0 AND status <> 0), 0),
                COALESCE(SUM(monitoringstate = 0 AND monitoringmode <> ?), 0),
                COALESCE(SUM(monitoringstate = 0 AND monitoringmode = ?), 0)
            FROM service
            WHERE hostid = ?
        )
        WHERE id = ?
        "#,
    )
    .bind(MONITORING_MODE_MANUAL)
    .bind(MONITORING_MODE_MANUAL)
    .bind(host_id)
    .bind(host_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
