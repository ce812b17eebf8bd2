//! Event recording
//!
//! Events are append-only. An event naming a service the host does not have
//! cannot be attached to anything and is dropped; that is a data-quality
//! signal, not a failure of the report.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{instrument, trace, warn};

use super::{MAX_BINDS, names};
use crate::id;
use crate::report::EventDescriptor;
use crate::storage::StorageResult;

/// Columns written per event row
const EVENT_COLUMNS: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventRecording {
    pub recorded: usize,
    pub dropped: usize,
}

struct EventRow<'a> {
    id: i64,
    service_id: i64,
    service_name_id: i64,
    event: &'a EventDescriptor,
}

/// Append the events of one report for `host_id`
#[instrument(skip(conn, events), fields(count = events.len()))]
pub async fn record(
    conn: &mut SqliteConnection,
    host_id: i64,
    events: &[EventDescriptor],
) -> StorageResult<EventRecording> {
    if events.is_empty() {
        return Ok(EventRecording::default());
    }

    let texts: Vec<&str> = events.iter().map(|e| e.service.as_str()).collect();
    let name_ids = names::resolve_batch(conn, &texts).await?;

    let services: HashMap<i64, i64> =
        sqlx::query_as::<_, (i64, i64)>("SELECT nameid, id FROM service WHERE hostid = ?")
            .bind(host_id)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    let mut rows = Vec::with_capacity(events.len());
    let mut dropped = 0;

    for event in events {
        let service_name_id = names::id_of(&name_ids, &event.service)?;
        match services.get(&service_name_id) {
            Some(service_id) => rows.push(EventRow {
                id: id::next_id(),
                service_id: *service_id,
                service_name_id,
                event,
            }),
            None => {
                warn!(
                    host_id,
                    service = %event.service,
                    event_id = event.event_id,
                    "dropping event for unknown service"
                );
                dropped += 1;
            }
        }
    }

    for chunk in rows.chunks(MAX_BINDS / EVENT_COLUMNS) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO event (id, hostid, serviceid, collectedsec, collectedusec, \
             service_nameid, servicetype, eventtype, eventstate, eventaction, message, active) ",
        );
        builder.push_values(chunk, |mut row, event_row| {
            let event = event_row.event;
            row.push_bind(event_row.id)
                .push_bind(host_id)
                .push_bind(event_row.service_id)
                .push_bind(event.collected_sec)
                .push_bind(event.collected_usec)
                .push_bind(event_row.service_name_id)
                .push_bind(event.service_type)
                .push_bind(event.event_id)
                .push_bind(event.state)
                .push_bind(event.action)
                .push_bind(event.message.as_str())
                .push_bind(true);
        });
        builder.build().execute(&mut *conn).await?;
    }

    trace!(recorded = rows.len(), dropped, "events recorded");

    Ok(EventRecording {
        recorded: rows.len(),
        dropped,
    })
}
