//! Helper functions for integration tests

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use monit_collector::ingest::Ingestor;
use monit_collector::storage::SqliteBackend;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Collection time stamped on every service of [`report`]
pub const COLLECTED_SEC: i64 = 1_706_634_789;

/// A fresh store in a temporary directory and an ingestor writing to it
pub struct TestCollector {
    pub dir: TempDir,
    pub backend: SqliteBackend,
    pub ingestor: Ingestor,
}

impl TestCollector {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::new(dir.path().join("collector.db"))
            .await
            .unwrap();
        let ingestor = Ingestor::new(backend.pool().clone(), Duration::from_secs(30));

        Self {
            dir,
            backend,
            ingestor,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.backend.pool()
    }

    pub async fn count(&self, table: &str) -> i64 {
        count(self.pool(), table).await
    }
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Names of the stored services of `monit_id`, sorted
pub async fn service_names(pool: &SqlitePool, monit_id: &str) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT n.name FROM service s \
         JOIN host h ON h.id = s.hostid \
         JOIN name n ON n.id = s.nameid \
         WHERE h.monitid = ? ORDER BY n.name",
    )
    .bind(monit_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

pub fn agent_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))
}

/// Build a report for `monit_id` with the given service and trailing elements
pub fn report(monit_id: &str, incarnation: i64, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<monit>
  <server>
    <id>{monit_id}</id>
    <incarnation>{incarnation}</incarnation>
    <version>5.33.0</version>
    <localhostname>host-{monit_id}</localhostname>
    <controlfile>/etc/monit/monitrc</controlfile>
    <poll>60</poll>
  </server>
  <platform><name>Linux</name><machine>x86_64</machine><cpu>4</cpu></platform>
  {body}
</monit>"#
    )
}

/// A system service with load averages and memory percent
pub fn system_service(avg01: f64) -> String {
    format!(
        "<service type=\"5\"><name>system</name><status>0</status><monitor>1</monitor>\
         <collected_sec>{COLLECTED_SEC}</collected_sec>\
         <system><load><avg01>{avg01}</avg01><avg05>1.10</avg05><avg15>0.95</avg15></load>\
         <memory><percent>45.8</percent></memory></system></service>"
    )
}

/// A process service with memory percent
pub fn process_service(name: &str, percent: f64) -> String {
    format!(
        "<service type=\"3\"><name>{name}</name><status>0</status><monitor>1</monitor>\
         <collected_sec>{COLLECTED_SEC}</collected_sec>\
         <process><pid>1234</pid><memory><percent>{percent}</percent></memory></process></service>"
    )
}

pub fn service_group(name: &str, members: &[&str]) -> String {
    let members: String = members
        .iter()
        .map(|m| format!("<service>{m}</service>"))
        .collect();
    format!("<servicegroups><servicegroup name=\"{name}\">{members}</servicegroup></servicegroups>")
}

pub fn event(service: &str, message: &str) -> String {
    format!(
        "<event><collected_sec>{COLLECTED_SEC}</collected_sec><collected_usec>42</collected_usec>\
         <service>{service}</service><type>3</type><id>512</id><state>1</state><action>1</action>\
         <message>{message}</message></event>"
    )
}
