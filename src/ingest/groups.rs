//! Service group reconciliation
//!
//! Group rows are found or created per (host, group name). Their membership
//! is replaced wholesale by what the current report says; groups the report
//! does not mention keep their last known members.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{debug, instrument};

use super::{MAX_BINDS, names};
use crate::id;
use crate::report::ServiceGroupDescriptor;
use crate::storage::StorageResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupReconciliation {
    /// Groups whose membership was rewritten
    pub groups: usize,
    /// Membership rows written
    pub members: usize,
    /// Members naming a service that is not part of the report
    pub skipped: usize,
}

/// Replace the memberships of every group in `groups`
///
/// `service_names` maps the service names of the current report to their
/// name ids; members outside of it are skipped.
#[instrument(skip(conn, groups, service_names), fields(count = groups.len()))]
pub async fn reconcile(
    conn: &mut SqliteConnection,
    host_id: i64,
    groups: &[ServiceGroupDescriptor],
    service_names: &HashMap<String, i64>,
) -> StorageResult<GroupReconciliation> {
    if groups.is_empty() {
        return Ok(GroupReconciliation::default());
    }

    let group_names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    let name_ids = names::resolve_batch(conn, &group_names).await?;

    // A group listed twice keeps the members of its last occurrence
    let mut memberships: HashMap<i64, BTreeSet<i64>> = HashMap::new();
    let mut skipped = 0;
    for group in groups {
        let group_name_id = names::id_of(&name_ids, &group.name)?;
        let mut members = BTreeSet::new();
        for member in &group.members {
            match service_names.get(member) {
                Some(name_id) => {
                    members.insert(*name_id);
                }
                None => {
                    debug!(group = %group.name, member = %member, "skipping unknown group member");
                    skipped += 1;
                }
            }
        }
        memberships.insert(group_name_id, members);
    }

    let group_ids = find_or_create(conn, host_id, memberships.keys().copied()).await?;

    let targets: Vec<i64> = group_ids.values().copied().collect();
    for chunk in targets.chunks(MAX_BINDS) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM servicegroup_service WHERE servicegroupid IN (");
        let mut list = builder.separated(", ");
        for group_id in chunk {
            list.push_bind(*group_id);
        }
        list.push_unseparated(")");
        builder.build().execute(&mut *conn).await?;
    }

    let rows: Vec<(i64, i64)> = memberships
        .iter()
        .filter_map(|(name_id, members)| group_ids.get(name_id).map(|id| (*id, members)))
        .flat_map(|(group_id, members)| members.iter().map(move |member| (group_id, *member)))
        .collect();

    for chunk in rows.chunks(MAX_BINDS / 2) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO servicegroup_service (servicegroupid, servicenameid) ");
        builder.push_values(chunk, |mut row, (group_id, member)| {
            row.push_bind(*group_id).push_bind(*member);
        });
        builder.build().execute(&mut *conn).await?;
    }

    Ok(GroupReconciliation {
        groups: group_ids.len(),
        members: rows.len(),
        skipped,
    })
}

/// Group ids keyed by group name id
async fn find_or_create(
    conn: &mut SqliteConnection,
    host_id: i64,
    name_ids: impl Iterator<Item = i64>,
) -> StorageResult<HashMap<i64, i64>> {
    let wanted: Vec<i64> = name_ids.collect();
    let rows: Vec<(i64, i64)> = id::next_ids(wanted.len())
        .into_iter()
        .zip(wanted.iter().copied())
        .collect();

    for chunk in rows.chunks(MAX_BINDS / 3) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO servicegroup (id, hostid, nameid) ");
        builder.push_values(chunk, |mut row, (id, name_id)| {
            row.push_bind(*id).push_bind(host_id).push_bind(*name_id);
        });
        builder.push(" ON CONFLICT (hostid, nameid) DO NOTHING");
        builder.build().execute(&mut *conn).await?;
    }

    let stored: Vec<(i64, i64)> =
        sqlx::query_as("SELECT nameid, id FROM servicegroup WHERE hostid = ?")
            .bind(host_id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(stored
        .into_iter()
        .filter(|(name_id, _)| wanted.contains(name_id))
        .collect())
}
