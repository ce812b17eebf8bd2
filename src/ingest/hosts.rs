//! Host identity resolution
//!
//! An agent is identified by its `monitid`, which survives restarts. The
//! incarnation counter does not: a changed incarnation on a known `monitid`
//! is a reincarnation of the same host, never a new one.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use super::names;
use crate::id;
use crate::report::HostDescriptor;
use crate::storage::StorageResult;
use crate::storage::schema::HOST_STATUS_ACTIVE;
use crate::util;

/// Outcome of resolving the reporting host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostResolution {
    pub host_id: i64,
    /// The host was seen for the first time
    pub created: bool,
    /// The agent restarted since its previous report
    pub reincarnated: bool,
    pub previous_incarnation: Option<i64>,
}

/// Find or create the host row for `host` and refresh its fields
///
/// Every mutable column is overwritten with the reported value, including the
/// host name. `statusmodified` only moves on creation and on reincarnation;
/// `statusheartbeat` moves on every report.
#[instrument(skip(conn, host), fields(monit_id = %host.monit_id, hostname = %host.hostname))]
pub async fn resolve_host(
    conn: &mut SqliteConnection,
    host: &HostDescriptor,
    source: IpAddr,
    now: DateTime<Utc>,
) -> StorageResult<HostResolution> {
    let name_ids = names::resolve_batch(
        conn,
        &[host.hostname.as_str(), host.control_file.as_str()],
    )
    .await?;
    let name_id = names::id_of(&name_ids, &host.hostname)?;
    let control_file_id = names::id_of(&name_ids, &host.control_file)?;

    let previous: Option<(i64, i64)> =
        sqlx::query_as("SELECT id, incarnation FROM host WHERE monitid = ?")
            .bind(&host.monit_id)
            .fetch_optional(&mut *conn)
            .await?;

    let timestamp = now.timestamp();
    let source = util::canonical_addr(source).to_string();

    let host_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO host (
            id, created_at, updated_at, monitid, nameid, incarnation, status,
            description, ipaddrin, ipaddrout, portin, portout, sslin, sslout,
            uname, password, poll, startdelay, controlfilenameid,
            statusmodified, statusheartbeat, version,
            platformname, platformrelease, platformversion, platformmachine,
            platformcpu, platformmemory, platformswap, platformuptime
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (monitid) DO UPDATE SET
            updated_at = excluded.updated_at,
            nameid = excluded.nameid,
            statusmodified = CASE
                WHEN host.incarnation <> excluded.incarnation THEN excluded.statusmodified
                ELSE host.statusmodified
            END,
            incarnation = excluded.incarnation,
            status = excluded.status,
            description = excluded.description,
            ipaddrin = excluded.ipaddrin,
            ipaddrout = excluded.ipaddrout,
            portin = excluded.portin,
            portout = excluded.portout,
            sslin = excluded.sslin,
            sslout = excluded.sslout,
            uname = excluded.uname,
            password = excluded.password,
            poll = excluded.poll,
            startdelay = excluded.startdelay,
            controlfilenameid = excluded.controlfilenameid,
            statusheartbeat = excluded.statusheartbeat,
            version = excluded.version,
            platformname = excluded.platformname,
            platformrelease = excluded.platformrelease,
            platformversion = excluded.platformversion,
            platformmachine = excluded.platformmachine,
            platformcpu = excluded.platformcpu,
            platformmemory = excluded.platformmemory,
            platformswap = excluded.platformswap,
            platformuptime = excluded.platformuptime
        RETURNING id
        "#,
    )
    .bind(id::next_id())
    .bind(timestamp)
    .bind(timestamp)
    .bind(&host.monit_id)
    .bind(name_id)
    .bind(host.incarnation)
    .bind(HOST_STATUS_ACTIVE)
    .bind(&host.description)
    .bind(&host.httpd.address)
    .bind(&source)
    .bind(host.httpd.port)
    .bind(host.httpd.port)
    .bind(host.httpd.ssl)
    .bind(host.httpd.ssl)
    .bind(&host.credentials.username)
    .bind(&host.credentials.password)
    .bind(host.poll)
    .bind(host.start_delay)
    .bind(control_file_id)
    .bind(timestamp)
    .bind(timestamp)
    .bind(&host.version)
    .bind(&host.platform.name)
    .bind(&host.platform.release)
    .bind(&host.platform.version)
    .bind(&host.platform.machine)
    .bind(host.platform.cpu)
    .bind(host.platform.memory)
    .bind(host.platform.swap)
    .bind(host.uptime)
    .fetch_one(&mut *conn)
    .await?;

    let resolution = match previous {
        None => {
            debug!(host_id, "registered new host");
            HostResolution {
                host_id,
                created: true,
                reincarnated: false,
                previous_incarnation: None,
            }
        }
        Some((_, incarnation)) => {
            let reincarnated = incarnation != host.incarnation;
            if reincarnated {
                info!(
                    host_id,
                    previous = incarnation,
                    current = host.incarnation,
                    "agent restarted"
                );
            }
            HostResolution {
                host_id,
                created: false,
                reincarnated,
                previous_incarnation: Some(incarnation),
            }
        }
    };

    Ok(resolution)
}
