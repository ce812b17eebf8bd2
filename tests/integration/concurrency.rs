//! Concurrency tests
//!
//! Reports run as independent tasks against one store; SQLite serializes the
//! writers and no row may be created twice.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use monit_collector::ingest::names;
use pretty_assertions::assert_eq;

use crate::helpers::{TestCollector, agent_addr, process_service, report, system_service};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_name_resolution_returns_one_id() {
    let collector = TestCollector::new().await;
    let pool = collector.pool().clone();

    let tasks = (0..16).map(|_| {
        let pool = pool.clone();
        tokio::spawn(async move {
            let mut conn = pool.acquire().await.unwrap();
            names::resolve(&mut conn, "shared-name").await.unwrap()
        })
    });

    let ids: HashSet<i64> = join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();

    assert_eq!(ids.len(), 1);
    assert_eq!(collector.count("name").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_from_many_hosts() {
    let collector = Arc::new(TestCollector::new().await);

    let tasks = (0..8).map(|i| {
        let collector = collector.clone();
        tokio::spawn(async move {
            let xml = report(
                &format!("host{i}"),
                1,
                &format!("{}{}", system_service(1.0), process_service("nginx", 2.5)),
            );
            collector
                .ingestor
                .submit(xml.as_bytes(), agent_addr())
                .await
                .unwrap()
        })
    });

    let host_ids: HashSet<i64> = join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap().host_id)
        .collect();

    assert_eq!(host_ids.len(), 8);
    assert_eq!(collector.count("host").await, 8);
    assert_eq!(collector.count("service").await, 16);
    assert_eq!(collector.count("statistics_double").await, 8 * 5);

    // "system", "nginx", the control file and one hostname per host
    assert_eq!(collector.count("name").await, 3 + 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reports_from_one_host() {
    let collector = Arc::new(TestCollector::new().await);

    let tasks = (0..6).map(|_| {
        let collector = collector.clone();
        tokio::spawn(async move {
            let xml = report("abc123", 1, &system_service(1.25));
            collector
                .ingestor
                .submit(xml.as_bytes(), agent_addr())
                .await
                .unwrap()
        })
    });

    let summaries: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|result| result.unwrap())
        .collect();

    let host_ids: HashSet<i64> = summaries.iter().map(|s| s.host_id).collect();
    assert_eq!(host_ids.len(), 1);
    assert_eq!(summaries.iter().filter(|s| s.new_host).count(), 1);

    assert_eq!(collector.count("host").await, 1);
    assert_eq!(collector.count("service").await, 1);
    assert_eq!(collector.count("statistics").await, 4);
    assert_eq!(collector.count("statistics_double").await, 6 * 4);
}
