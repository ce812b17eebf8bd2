//! Re-submission behavior: identity, reincarnation, append-only metrics and
//! group replacement

use monit_collector::storage::StorageBackend;
use pretty_assertions::assert_eq;

use crate::helpers::{
    TestCollector, agent_addr, event, process_service, report, service_group, service_names,
    system_service,
};

#[tokio::test]
async fn test_resubmission_keeps_host_and_service_rows() {
    let collector = TestCollector::new().await;
    let xml = report(
        "abc123",
        1,
        &format!("{}{}", system_service(1.25), process_service("nginx", 2.5)),
    );

    let first = collector
        .ingestor
        .submit(xml.as_bytes(), agent_addr())
        .await
        .unwrap();
    let names_after_first = collector.count("name").await;

    let second = collector
        .ingestor
        .submit(xml.as_bytes(), agent_addr())
        .await
        .unwrap();

    assert_eq!(first.host_id, second.host_id);
    assert!(first.new_host);
    assert!(!second.new_host);
    assert!(!second.reincarnated);
    assert_eq!(collector.count("host").await, 1);
    assert_eq!(collector.count("service").await, 2);
    assert_eq!(collector.count("name").await, names_after_first);
    assert_eq!(
        service_names(collector.pool(), "abc123").await,
        vec!["nginx".to_string(), "system".to_string()]
    );
}

#[tokio::test]
async fn test_reincarnation_updates_incarnation_in_place() {
    let collector = TestCollector::new().await;

    let first = collector
        .ingestor
        .submit(report("abc123", 1, &system_service(1.0)).as_bytes(), agent_addr())
        .await
        .unwrap();
    let second = collector
        .ingestor
        .submit(report("abc123", 2, &system_service(1.0)).as_bytes(), agent_addr())
        .await
        .unwrap();

    assert_eq!(first.host_id, second.host_id);
    assert!(second.reincarnated);
    assert_eq!(collector.count("host").await, 1);

    let host = collector
        .backend
        .find_host(first.host_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(host.incarnation, 2);
    assert_eq!(collector.ingestor.stats().reincarnations, 1);
}

#[tokio::test]
async fn test_same_timestamp_points_are_appended() {
    let collector = TestCollector::new().await;

    collector
        .ingestor
        .submit(report("abc123", 1, &system_service(1.25)).as_bytes(), agent_addr())
        .await
        .unwrap();
    collector
        .ingestor
        .submit(report("abc123", 1, &system_service(3.5)).as_bytes(), agent_addr())
        .await
        .unwrap();

    let values: Vec<f64> = sqlx::query_scalar(
        "SELECT d.value FROM statistics_double d \
         JOIN statistics s ON s.id = d.statisticsid \
         WHERE s.descriptor = 'load_avg01' ORDER BY d.value",
    )
    .fetch_all(collector.pool())
    .await
    .unwrap();

    assert_eq!(values, vec![1.25, 3.5]);
    assert_eq!(collector.count("statistics").await, 4);
    assert_eq!(collector.count("statistics_double").await, 8);
}

#[tokio::test]
async fn test_group_members_are_replaced() {
    let collector = TestCollector::new().await;
    let services = format!(
        "{}{}{}",
        process_service("a", 1.0),
        process_service("b", 1.0),
        process_service("c", 1.0)
    );

    let first = collector
        .ingestor
        .submit(
            report("abc123", 1, &format!("{services}{}", service_group("web", &["a", "b"])))
                .as_bytes(),
            agent_addr(),
        )
        .await
        .unwrap();
    collector
        .ingestor
        .submit(
            report("abc123", 1, &format!("{services}{}", service_group("web", &["b", "c"])))
                .as_bytes(),
            agent_addr(),
        )
        .await
        .unwrap();

    let groups = collector
        .backend
        .group_members(first.host_id)
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(collector.count("servicegroup").await, 1);
}

#[tokio::test]
async fn test_dangling_event_is_dropped() {
    let collector = TestCollector::new().await;
    let body = format!(
        "{}{}{}",
        process_service("nginx", 2.5),
        event("ghost", "never reported"),
        event("nginx", "connection failed")
    );

    let summary = collector
        .ingestor
        .submit(report("abc123", 1, &body).as_bytes(), agent_addr())
        .await
        .unwrap();

    assert_eq!(summary.event_count, 2);
    assert_eq!(summary.events_recorded, 1);
    assert_eq!(summary.events_dropped, 1);
    assert_eq!(collector.count("event").await, 1);
    assert_eq!(collector.count("service").await, 1);
    assert_eq!(collector.ingestor.stats().events_dropped, 1);
}

#[tokio::test]
async fn test_missing_service_is_kept() {
    let collector = TestCollector::new().await;

    collector
        .ingestor
        .submit(
            report(
                "abc123",
                1,
                &format!("{}{}", system_service(1.0), process_service("nginx", 2.5)),
            )
            .as_bytes(),
            agent_addr(),
        )
        .await
        .unwrap();
    collector
        .ingestor
        .submit(report("abc123", 1, &system_service(1.0)).as_bytes(), agent_addr())
        .await
        .unwrap();

    assert_eq!(
        service_names(collector.pool(), "abc123").await,
        vec!["nginx".to_string(), "system".to_string()]
    );
}

#[tokio::test]
async fn test_large_report_resubmission() {
    let collector = TestCollector::new().await;
    let names: Vec<String> = (0..600).map(|i| format!("svc{i:03}")).collect();
    let members: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut body: String = names.iter().map(|name| process_service(name, 1.5)).collect();
    for name in &names[..300] {
        body.push_str(&event(name, "restarted"));
    }
    body.push_str(&service_group("all", &members));
    let xml = report("bulk", 1, &body);

    for _ in 0..2 {
        let summary = collector
            .ingestor
            .submit(xml.as_bytes(), agent_addr())
            .await
            .unwrap();
        assert_eq!(summary.events_recorded, 300);
    }

    assert_eq!(collector.count("host").await, 1);
    assert_eq!(collector.count("service").await, 600);
    assert_eq!(collector.count("statistics").await, 600);
    assert_eq!(collector.count("statistics_double").await, 1200);
    assert_eq!(collector.count("event").await, 600);
    assert_eq!(collector.count("servicegroup").await, 1);
    assert_eq!(collector.count("servicegroup_service").await, 600);
    // services, group, hostname and control file
    assert_eq!(collector.count("name").await, 600 + 3);

    let host = &collector.backend.list_hosts().await.unwrap()[0];
    assert_eq!(host.serviceup, 600);
}
