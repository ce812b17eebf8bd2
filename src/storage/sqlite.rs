//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers keep working while a report is being committed
//! - **Connection pooling**: One connection per in-flight report
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Concurrency
//!
//! SQLite allows a single writer. Ingestion transactions start with
//! `BEGIN IMMEDIATE` so concurrent reports queue on the busy timeout instead
//! of failing on lock upgrade.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{EventQuery, HealthStatus, StatisticsQuery, StorageBackend, StorageStats};
use super::error::{StorageError, StorageResult};
use super::schema::{
    DashboardSummary, EventRow, GroupRow, HOST_STATUS_ACTIVE, HostRow, SERVICE_STATUS_OK,
    ServiceRow, StatisticPointRow, TABLES,
};
use crate::config::StorageConfig;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const HOST_COLUMNS: &str = r#"
    SELECT h.id, h.monitid, hn.name AS hostname, h.incarnation, h.status,
           h.description, h.ipaddrin, h.ipaddrout, h.portin, h.portout,
           h.sslin, h.sslout, h.uname, h.poll, h.startdelay,
           cn.name AS controlfile, h.statusmodified, h.statusheartbeat,
           h.version, h.platformname, h.platformrelease, h.platformversion,
           h.platformmachine, h.platformcpu, h.platformmemory, h.platformswap,
           h.platformuptime, h.serviceup, h.servicedown,
           h.serviceunmonitorauto, h.serviceunmonitormanual,
           h.created_at, h.updated_at
    FROM host h
    JOIN name hn ON hn.id = h.nameid
    JOIN name cn ON cn.id = h.controlfilenameid
"#;

/// SQLite storage backend
pub struct SqliteBackend {
    pool: SqlitePool,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database at `db_path` with default pool settings
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Configure SQLite (WAL, foreign keys, busy timeout)
    /// 3. Run migrations to create tables
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open(db_path, DEFAULT_MAX_CONNECTIONS, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Open the backend described by the configuration
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        match config {
            StorageConfig::Sqlite {
                path,
                max_connections,
                busy_timeout_secs,
            } => {
                Self::open(
                    path,
                    *max_connections,
                    Duration::from_secs(*busy_timeout_secs),
                )
                .await
            }
        }
    }

    #[instrument(skip_all)]
    async fn open(
        db_path: impl AsRef<Path>,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// The underlying pool; ingestion takes its transactions from here
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn list_hosts(&self) -> StorageResult<Vec<HostRow>> {
        let sql = format!("{HOST_COLUMNS} ORDER BY h.updated_at DESC, h.id");
        let hosts = sqlx::query_as::<_, HostRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!("query returned {} hosts", hosts.len());
        Ok(hosts)
    }

    #[instrument(skip(self))]
    async fn find_host(&self, host_id: i64) -> StorageResult<Option<HostRow>> {
        let sql = format!("{HOST_COLUMNS} WHERE h.id = ?");
        let host = sqlx::query_as::<_, HostRow>(&sql)
            .bind(host_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(host)
    }

    #[instrument(skip(self))]
    async fn host_services(&self, host_id: i64) -> StorageResult<Vec<ServiceRow>> {
        let services = sqlx::query_as::<_, ServiceRow>(
            r#"
            SELECT s.id, s.hostid, n.name, s.type, s.status, s.statushint,
                   s.monitoringstate, s.monitoringmode, s.onreboot,
                   s.statusmodified, s.created_at, s.updated_at
            FROM service s
            JOIN name n ON n.id = s.nameid
            WHERE s.hostid = ?
            ORDER BY n.name
            "#,
        )
        .bind(host_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(services)
    }

    #[instrument(skip(self, query))]
    async fn service_statistics(
        &self,
        service_id: i64,
        query: StatisticsQuery,
    ) -> StorageResult<Vec<StatisticPointRow>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT st.descriptor, d.collectedsec, d.value
            FROM statistics_double d
            JOIN statistics st ON st.id = d.statisticsid
            WHERE st.serviceid = "#,
        );
        builder.push_bind(service_id);

        if let Some(descriptor) = query.descriptor {
            builder.push(" AND st.descriptor = ").push_bind(descriptor);
        }
        if let Some(since) = query.since {
            builder.push(" AND d.collectedsec >= ").push_bind(since);
        }

        builder
            .push(" ORDER BY d.collectedsec DESC, st.descriptor LIMIT ")
            .push_bind(query.limit as i64);

        let points = builder
            .build_query_as::<StatisticPointRow>()
            .fetch_all(&self.pool)
            .await?;

        debug!("query returned {} points", points.len());
        Ok(points)
    }

    #[instrument(skip(self))]
    async fn list_events(&self, query: EventQuery) -> StorageResult<Vec<EventRow>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT e.id, e.hostid, hn.name AS hostname, e.serviceid, n.name AS service,
                   e.servicetype, e.eventtype, e.eventstate, e.eventaction, e.message,
                   e.collectedsec, e.collectedusec, e.active
            FROM event e
            JOIN host h ON h.id = e.hostid
            JOIN name hn ON hn.id = h.nameid
            JOIN name n ON n.id = e.service_nameid"#,
        );

        let mut clause = " WHERE ";
        if let Some(host_id) = query.host_id {
            builder.push(clause).push("e.hostid = ").push_bind(host_id);
            clause = " AND ";
        }
        if query.active_only {
            builder.push(clause).push("e.active = 1");
        }

        builder
            .push(" ORDER BY e.collectedsec DESC, e.collectedusec DESC, e.id DESC LIMIT ")
            .push_bind(query.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.offset as i64);

        let events = builder
            .build_query_as::<EventRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    #[instrument(skip(self))]
    async fn dashboard(&self) -> StorageResult<DashboardSummary> {
        let summary = sqlx::query_as::<_, DashboardSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM host) AS total_hosts,
                (SELECT COUNT(*) FROM host WHERE status = ?) AS hosts_ok,
                (SELECT COUNT(*) FROM service) AS total_services,
                (SELECT COUNT(*) FROM service WHERE status = ?) AS services_ok,
                (SELECT COALESCE(SUM(serviceup), 0) FROM host) AS services_up,
                (SELECT COALESCE(SUM(servicedown), 0) FROM host) AS services_down,
                (SELECT COALESCE(SUM(serviceunmonitorauto + serviceunmonitormanual), 0)
                 FROM host) AS services_unmonitored,
                (SELECT COUNT(*) FROM event WHERE active = 1) AS active_events
            "#,
        )
        .bind(HOST_STATUS_ACTIVE)
        .bind(SERVICE_STATUS_OK)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    #[instrument(skip(self))]
    async fn group_members(&self, host_id: i64) -> StorageResult<Vec<GroupRow>> {
        let rows: Vec<(i64, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT g.id, gn.name, mn.name
            FROM servicegroup g
            JOIN name gn ON gn.id = g.nameid
            LEFT JOIN servicegroup_service m ON m.servicegroupid = g.id
            LEFT JOIN name mn ON mn.id = m.servicenameid
            WHERE g.hostid = ?
            ORDER BY gn.name, mn.name
            "#,
        )
        .bind(host_id)
        .fetch_all(&self.pool)
        .await?;

        let mut groups: Vec<GroupRow> = Vec::new();
        for (id, name, member) in rows {
            match groups.last_mut() {
                Some(group) if group.id == id => group.members.extend(member),
                _ => groups.push(GroupRow {
                    id,
                    name,
                    members: member.into_iter().collect(),
                }),
            }
        }

        Ok(groups)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<StorageStats> {
        let mut stats = StorageStats::default();

        for table in TABLES {
            let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await?;
            stats.tables.insert(table.to_string(), count);
        }

        stats.file_size_bytes = tokio::fs::metadata(&self.db_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(stats)
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
