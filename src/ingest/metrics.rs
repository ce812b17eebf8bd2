//! Metric recording
//!
//! A metric is a descriptor row in `statistics` (one per service and metric
//! name, created on first sight) plus append-only points in
//! `statistics_double`. Points are never updated or deduplicated: two reports
//! carrying the same `collected_sec` produce two points.

use std::collections::{BTreeSet, HashMap};

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{instrument, trace};

use super::MAX_BINDS;
use crate::id;
use crate::report::MetricSample;
use crate::storage::schema::{STATISTIC_DATATYPE_DOUBLE, STATISTIC_TYPE_GAUGE};
use crate::storage::{StorageError, StorageResult};

/// The samples one service produced in one report
#[derive(Debug, Clone)]
pub struct ServiceSamples {
    pub service_id: i64,
    pub collected_sec: i64,
    pub samples: Vec<MetricSample>,
}

struct Point<'a> {
    service_id: i64,
    name: &'a str,
    value: f64,
    collected_sec: i64,
}

/// Record one value; `None` is skipped. Returns whether a point was written.
pub async fn record(
    conn: &mut SqliteConnection,
    service_id: i64,
    name: &str,
    value: Option<f64>,
    collected_sec: i64,
) -> StorageResult<bool> {
    let Some(value) = value else {
        return Ok(false);
    };

    let written = append(
        conn,
        &[Point {
            service_id,
            name,
            value,
            collected_sec,
        }],
    )
    .await?;
    Ok(written == 1)
}

/// Record every present sample of one service, returning the points written
pub async fn record_samples(
    conn: &mut SqliteConnection,
    service_id: i64,
    samples: &[MetricSample],
    collected_sec: i64,
) -> StorageResult<usize> {
    let points: Vec<Point<'_>> = samples
        .iter()
        .filter_map(|sample| {
            sample.value.map(|value| Point {
                service_id,
                name: sample.name,
                value,
                collected_sec,
            })
        })
        .collect();

    append(conn, &points).await
}

/// Record the samples of many services with batched statements
#[instrument(skip_all, fields(services = batches.len()))]
pub async fn record_all(
    conn: &mut SqliteConnection,
    batches: &[ServiceSamples],
) -> StorageResult<usize> {
    let points: Vec<Point<'_>> = batches
        .iter()
        .flat_map(|batch| {
            batch.samples.iter().filter_map(move |sample| {
                sample.value.map(|value| Point {
                    service_id: batch.service_id,
                    name: sample.name,
                    value,
                    collected_sec: batch.collected_sec,
                })
            })
        })
        .collect();

    append(conn, &points).await
}

async fn append(conn: &mut SqliteConnection, points: &[Point<'_>]) -> StorageResult<usize> {
    if points.is_empty() {
        return Ok(0);
    }

    let wanted: BTreeSet<(i64, &str)> = points.iter().map(|p| (p.service_id, p.name)).collect();
    let descriptors = resolve_descriptors(conn, &wanted).await?;

    for chunk in points.chunks(MAX_BINDS / 3) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO statistics_double (statisticsid, collectedsec, value) ");
        let mut rows = Vec::with_capacity(chunk.len());
        for point in chunk {
            let statistics_id = descriptors
                .get(&(point.service_id, point.name.to_string()))
                .copied()
                .ok_or_else(|| {
                    StorageError::QueryFailed(format!(
                        "no descriptor {:?} for service {}",
                        point.name, point.service_id
                    ))
                })?;
            rows.push((statistics_id, point.collected_sec, point.value));
        }
        builder.push_values(rows, |mut row, (statistics_id, collected_sec, value)| {
            row.push_bind(statistics_id)
                .push_bind(collected_sec)
                .push_bind(value);
        });
        builder.build().execute(&mut *conn).await?;
    }

    trace!("appended {} points", points.len());
    Ok(points.len())
}

/// Descriptor ids keyed by (service id, metric name), creating missing ones
async fn resolve_descriptors(
    conn: &mut SqliteConnection,
    wanted: &BTreeSet<(i64, &str)>,
) -> StorageResult<HashMap<(i64, String), i64>> {
    let services: Vec<i64> = wanted
        .iter()
        .map(|(service_id, _)| *service_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut descriptors = lookup(conn, &services).await?;

    let unknown: Vec<(i64, &str)> = wanted
        .iter()
        .filter(|(service_id, name)| !descriptors.contains_key(&(*service_id, name.to_string())))
        .copied()
        .collect();
    let missing: Vec<(i64, i64, &str)> = id::next_ids(unknown.len())
        .into_iter()
        .zip(unknown)
        .map(|(id, (service_id, name))| (id, service_id, name))
        .collect();

    if !missing.is_empty() {
        trace!("creating {} metric descriptors", missing.len());

        for chunk in missing.chunks(MAX_BINDS / 5) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO statistics (id, serviceid, type, datatype, descriptor) ",
            );
            builder.push_values(chunk, |mut row, (id, service_id, name)| {
                row.push_bind(*id)
                    .push_bind(*service_id)
                    .push_bind(STATISTIC_TYPE_GAUGE)
                    .push_bind(STATISTIC_DATATYPE_DOUBLE)
                    .push_bind(*name);
            });
            builder.push(" ON CONFLICT (serviceid, descriptor) DO NOTHING");
            builder.build().execute(&mut *conn).await?;
        }

        descriptors = lookup(conn, &services).await?;
    }

    Ok(descriptors)
}

async fn lookup(
    conn: &mut SqliteConnection,
    services: &[i64],
) -> StorageResult<HashMap<(i64, String), i64>> {
    let mut descriptors = HashMap::new();

    for chunk in services.chunks(MAX_BINDS) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, serviceid, descriptor FROM statistics WHERE serviceid IN (");
        let mut list = builder.separated(", ");
        for service_id in chunk {
            list.push_bind(*service_id);
        }
        list.push_unseparated(")");

        let rows: Vec<(i64, i64, String)> =
            builder.build_query_as().fetch_all(&mut *conn).await?;
        descriptors.extend(
            rows.into_iter()
                .map(|(id, service_id, name)| ((service_id, name), id)),
        );
    }

    Ok(descriptors)
}
