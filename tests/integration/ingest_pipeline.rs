//! End-to-end ingestion of complete reports

use monit_collector::storage::{StatisticsQuery, StorageBackend};
use pretty_assertions::assert_eq;

use crate::helpers::{
    COLLECTED_SEC, TestCollector, agent_addr, event, process_service, report, service_group,
    service_names, system_service,
};

#[tokio::test]
async fn test_first_report_creates_host_services_and_points() {
    let collector = TestCollector::new().await;
    let xml = report(
        "abc123",
        1,
        &format!("{}{}", system_service(1.25), process_service("nginx", 2.5)),
    );

    let summary = collector
        .ingestor
        .submit(xml.as_bytes(), agent_addr())
        .await
        .unwrap();

    assert!(summary.new_host);
    assert!(!summary.reincarnated);
    assert_eq!(summary.service_count, 2);
    assert_eq!(summary.hostname, "host-abc123");

    assert_eq!(collector.count("host").await, 1);
    assert_eq!(
        service_names(collector.pool(), "abc123").await,
        vec!["nginx".to_string(), "system".to_string()]
    );
    assert_eq!(collector.count("statistics_double").await, 5);
    assert_eq!(collector.count("event").await, 0);

    let stamps: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT collectedsec FROM statistics_double")
        .fetch_all(collector.pool())
        .await
        .unwrap();
    assert_eq!(stamps, vec![COLLECTED_SEC]);

    let monit_id: String = sqlx::query_scalar("SELECT monitid FROM host")
        .fetch_one(collector.pool())
        .await
        .unwrap();
    assert_eq!(monit_id, "abc123");
}

#[tokio::test]
async fn test_points_are_readable_per_service() {
    let collector = TestCollector::new().await;
    let xml = report(
        "abc123",
        1,
        &format!("{}{}", system_service(1.25), process_service("nginx", 2.5)),
    );
    let summary = collector
        .ingestor
        .submit(xml.as_bytes(), agent_addr())
        .await
        .unwrap();

    let services = collector
        .backend
        .host_services(summary.host_id)
        .await
        .unwrap();
    let system = services.iter().find(|s| s.name == "system").unwrap();

    let points = collector
        .backend
        .service_statistics(
            system.id,
            StatisticsQuery {
                descriptor: Some("load_avg01".to_string()),
                since: None,
                limit: 10,
            },
        )
        .await
        .unwrap();

    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, 1.25);
    assert_eq!(points[0].collectedsec, COLLECTED_SEC);
}

#[tokio::test]
async fn test_host_fields_are_persisted() {
    let collector = TestCollector::new().await;
    let xml = report("abc123", 1706543210, &system_service(0.5));

    collector
        .ingestor
        .submit(xml.as_bytes(), agent_addr())
        .await
        .unwrap();

    let hosts = collector.backend.list_hosts().await.unwrap();
    assert_eq!(hosts.len(), 1);

    let host = &hosts[0];
    assert_eq!(host.hostname, "host-abc123");
    assert_eq!(host.incarnation, 1706543210);
    assert_eq!(host.version, "5.33.0");
    assert_eq!(host.controlfile, "/etc/monit/monitrc");
    assert_eq!(host.poll, 60);
    assert_eq!(host.platformmachine, "x86_64");
    assert_eq!(host.ipaddrout, "192.168.1.10");
    assert_eq!(host.serviceup, 1);
    assert_eq!(host.servicedown, 0);
}

#[tokio::test]
async fn test_events_and_groups_are_recorded() {
    let collector = TestCollector::new().await;
    let body = format!(
        "{}{}{}",
        process_service("nginx", 2.5),
        event("nginx", "connection failed"),
        service_group("web", &["nginx"])
    );
    let xml = report("abc123", 1, &body);

    let summary = collector
        .ingestor
        .submit(xml.as_bytes(), agent_addr())
        .await
        .unwrap();
    assert_eq!(summary.events_recorded, 1);
    assert_eq!(summary.events_dropped, 0);

    let events = collector
        .backend
        .host_events(summary.host_id, 10)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].service, "nginx");
    assert_eq!(events[0].message, "connection failed");
    assert_eq!(events[0].collectedusec, 42);
    assert!(events[0].active);

    let groups = collector
        .backend
        .group_members(summary.host_id)
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "web");
    assert_eq!(groups[0].members, vec!["nginx".to_string()]);
}

#[tokio::test]
async fn test_latin1_report_is_stored() {
    let collector = TestCollector::new().await;
    let xml = report(
        "abc123",
        1,
        &format!("{}{}", process_service("nginx", 2.5), event("nginx", "temp 45DEGC")),
    )
    .replace("encoding=\"UTF-8\"", "encoding=\"ISO-8859-1\"");
    // Swap the placeholder for a raw Latin-1 degree sign
    let (head, tail) = xml.split_once("DEG").unwrap();
    let payload = [head.as_bytes(), &[0xB0u8][..], tail.as_bytes()].concat();

    let summary = collector
        .ingestor
        .submit(&payload, agent_addr())
        .await
        .unwrap();

    let events = collector
        .backend
        .host_events(summary.host_id, 10)
        .await
        .unwrap();
    assert_eq!(events[0].message, "temp 45°C");
}
