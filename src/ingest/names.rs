//! Name interning
//!
//! Host names, service names, group names and control file paths are stored
//! once in `name` and referenced by id everywhere else. Ids never change once
//! assigned.

use std::collections::{BTreeSet, HashMap};

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::{instrument, trace};

use super::MAX_BINDS;
use crate::id;
use crate::storage::{StorageError, StorageResult};

/// Id of a single name, creating it if needed
pub async fn resolve(conn: &mut SqliteConnection, text: &str) -> StorageResult<i64> {
    let ids = resolve_batch(conn, &[text]).await?;
    id_of(&ids, text)
}

/// Ids for a set of names, creating the missing ones
///
/// Duplicates in `texts` are collapsed. Names created by a concurrent writer
/// between the lookup and the insert are picked up by the final re-read, so
/// the id that won the race is the one returned.
#[instrument(skip_all, fields(count = texts.len()))]
pub async fn resolve_batch<S: AsRef<str>>(
    conn: &mut SqliteConnection,
    texts: &[S],
) -> StorageResult<HashMap<String, i64>> {
    let unique: Vec<&str> = texts
        .iter()
        .map(|text| text.as_ref())
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .collect();

    let mut ids = HashMap::with_capacity(unique.len());
    if unique.is_empty() {
        return Ok(ids);
    }

    lookup(conn, &unique, &mut ids).await?;

    let missing: Vec<&str> = unique
        .into_iter()
        .filter(|text| !ids.contains_key(*text))
        .collect();
    if missing.is_empty() {
        return Ok(ids);
    }

    trace!("interning {} new names", missing.len());

    let rows: Vec<(i64, &str)> = id::next_ids(missing.len())
        .into_iter()
        .zip(missing.iter().copied())
        .collect();

    for chunk in rows.chunks(MAX_BINDS / 2) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO name (id, name) ");
        builder.push_values(chunk, |mut row, (id, text)| {
            row.push_bind(*id).push_bind(*text);
        });
        builder.push(" ON CONFLICT (name) DO NOTHING");
        builder.build().execute(&mut *conn).await?;
    }

    lookup(conn, &missing, &mut ids).await?;

    match missing.iter().find(|text| !ids.contains_key(**text)) {
        Some(text) => Err(not_interned(text)),
        None => Ok(ids),
    }
}

/// Look up an id in a map returned by [`resolve_batch`]
pub fn id_of(ids: &HashMap<String, i64>, text: &str) -> StorageResult<i64> {
    ids.get(text).copied().ok_or_else(|| not_interned(text))
}

async fn lookup(
    conn: &mut SqliteConnection,
    texts: &[&str],
    ids: &mut HashMap<String, i64>,
) -> StorageResult<()> {
    for chunk in texts.chunks(MAX_BINDS) {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name FROM name WHERE name IN (");
        let mut list = builder.separated(", ");
        for text in chunk {
            list.push_bind(*text);
        }
        list.push_unseparated(")");

        let rows: Vec<(i64, String)> = builder.build_query_as().fetch_all(&mut *conn).await?;
        ids.extend(rows.into_iter().map(|(id, name)| (name, id)));
    }
    Ok(())
}

fn not_interned(text: &str) -> StorageError {
    StorageError::QueryFailed(format!("name {text:?} could not be interned"))
}
