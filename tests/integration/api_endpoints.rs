//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Agents can submit reports without the API token
//! - Read endpoints return the committed state, per host and fleet-wide
//! - Authentication middleware guards `/api/v1`
//! - Error handling maps to the right status codes

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use monit_collector::{
    api::{ApiConfig, ApiState, spawn_api_server},
    ingest::Ingestor,
    storage::{SqliteBackend, StorageBackend},
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::{TempDir, tempdir};

use crate::helpers::{event, process_service, report, service_group, system_service};

const TOKEN: &str = "test-token";

struct TestServer {
    _dir: TempDir,
    addr: SocketAddr,
    client: reqwest::Client,
}

impl TestServer {
    async fn spawn(auth_token: Option<&str>, max_payload_bytes: usize) -> Self {
        let dir = tempdir().unwrap();
        let backend = Arc::new(SqliteBackend::new(dir.path().join("api.db")).await.unwrap());
        let ingestor = Arc::new(Ingestor::new(
            backend.pool().clone(),
            Duration::from_secs(30),
        ));
        let storage: Arc<dyn StorageBackend> = backend;

        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
            auth_token: auth_token.map(str::to_string),
            enable_cors: true,
            max_payload_bytes,
        };
        let addr = spawn_api_server(config, ApiState::new(ingestor, storage))
            .await
            .unwrap();

        Self {
            _dir: dir,
            addr,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn submit(&self, body: String) -> reqwest::Response {
        self.client
            .post(self.url("/collector"))
            .header("Content-Type", "text/xml")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {TOKEN}"))
            .send()
            .await
            .unwrap()
    }

    async fn get_json(&self, path: &str) -> Value {
        let response = self.get(path).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        response.json().await.unwrap()
    }
}

fn sample_report() -> String {
    report(
        "abc123",
        1,
        &format!(
            "{}{}{}{}",
            system_service(1.25),
            process_service("nginx", 2.5),
            event("nginx", "connection failed"),
            service_group("web", &["nginx"])
        ),
    )
}

#[tokio::test]
async fn test_collector_accepts_report_without_token() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;

    let response = server.submit(sample_report()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_collector_rejects_malformed_report() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;

    let response = server.submit("<monit><server>".to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("unclosed"));
}

#[tokio::test]
async fn test_collector_rejects_oversized_report() {
    let server = TestServer::spawn(None, 64).await;

    let response = server.submit(sample_report()).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;

    let body = server.get_json("/api/v1/health").await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["healthy"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_api_requires_token() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;

    let missing = server
        .client
        .get(server.url("/api/v1/hosts"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let malformed = server
        .client
        .get(server.url("/api/v1/hosts"))
        .header("Authorization", TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);

    let wrong = server
        .client
        .get(server.url("/api/v1/hosts"))
        .header("Authorization", "Bearer wrong-token")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_api_is_open_without_token() {
    let server = TestServer::spawn(None, 1024 * 1024).await;

    let response = server
        .client
        .get(server.url("/api/v1/hosts"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_read_endpoints_reflect_submitted_report() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;
    assert_eq!(server.submit(sample_report()).await.status(), StatusCode::OK);

    let hosts = server.get_json("/api/v1/hosts").await;
    assert_eq!(hosts["count"], 1);
    let host = &hosts["hosts"][0];
    assert_eq!(host["monitid"], "abc123");
    assert_eq!(host["ipaddrout"], "127.0.0.1");
    let host_id = host["id"].as_i64().unwrap();

    let detail = server.get_json(&format!("/api/v1/hosts/{host_id}")).await;
    assert_eq!(detail["hostname"], "host-abc123");
    assert_eq!(detail["groups"][0]["name"], "web");
    assert_eq!(detail["groups"][0]["members"][0], "nginx");

    let services = server
        .get_json(&format!("/api/v1/hosts/{host_id}/services"))
        .await;
    assert_eq!(services["count"], 2);

    let events = server
        .get_json(&format!("/api/v1/hosts/{host_id}/events?limit=5"))
        .await;
    assert_eq!(events["count"], 1);
    assert_eq!(events["events"][0]["message"], "connection failed");

    let system = services["services"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "system")
        .unwrap();
    let service_id = system["id"].as_i64().unwrap();

    let statistics = server
        .get_json(&format!(
            "/api/v1/services/{service_id}/statistics?descriptor=memory_percent"
        ))
        .await;
    assert_eq!(statistics["count"], 1);
    assert_eq!(statistics["points"][0]["value"], 45.8);
}

#[tokio::test]
async fn test_unknown_host_returns_not_found() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;

    let response = server.get("/api/v1/hosts/42").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server.get("/api/v1/hosts/42/events").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_limit_is_rejected() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;

    let response = server.get("/api/v1/services/1/statistics?limit=0").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_include_ingest_counters() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;
    server.submit(sample_report()).await;
    server.submit("garbage".to_string()).await;

    let stats = server.get_json("/api/v1/stats").await;

    assert_eq!(stats["ingest"]["reports_ingested"], 1);
    assert_eq!(stats["ingest"]["reports_failed"], 1);
    assert_eq!(stats["storage"]["tables"]["host"], 1);
    assert_eq!(stats["storage"]["tables"]["service"], 2);
}

#[tokio::test]
async fn test_event_listing_across_hosts() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;
    assert_eq!(server.submit(sample_report()).await.status(), StatusCode::OK);
    let other = report(
        "def456",
        1,
        &format!(
            "{}{}",
            process_service("postgres", 12.0),
            event("postgres", "checksum changed")
        ),
    );
    assert_eq!(server.submit(other).await.status(), StatusCode::OK);

    let all = server.get_json("/api/v1/events").await;
    assert_eq!(all["count"], 2);
    assert_eq!(all["limit"], 100);
    assert_eq!(all["offset"], 0);
    let mut hostnames: Vec<&str> = all["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["hostname"].as_str().unwrap())
        .collect();
    hostnames.sort();
    assert_eq!(hostnames, vec!["host-abc123", "host-def456"]);

    let hosts = server.get_json("/api/v1/hosts").await;
    let def456 = hosts["hosts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|h| h["monitid"] == "def456")
        .unwrap();
    let host_id = def456["id"].as_i64().unwrap();

    let filtered = server
        .get_json(&format!("/api/v1/events?hostid={host_id}"))
        .await;
    assert_eq!(filtered["count"], 1);
    assert_eq!(filtered["events"][0]["service"], "postgres");
    assert_eq!(filtered["events"][0]["message"], "checksum changed");

    let first = server.get_json("/api/v1/events?limit=1").await;
    let second = server.get_json("/api/v1/events?limit=1&offset=1").await;
    assert_eq!(first["count"], 1);
    assert_eq!(second["count"], 1);
    assert_eq!(second["offset"], 1);
    assert_ne!(first["events"][0]["id"], second["events"][0]["id"]);

    let past_end = server.get_json("/api/v1/events?offset=2").await;
    assert_eq!(past_end["count"], 0);

    let unknown = server.get_json("/api/v1/events?hostid=424242").await;
    assert_eq!(unknown["count"], 0);

    let response = server.get("/api/v1/events?limit=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_summarizes_fleet() {
    let server = TestServer::spawn(Some(TOKEN), 1024 * 1024).await;

    let empty = server.get_json("/api/v1/dashboard").await;
    assert_eq!(empty["total_hosts"], 0);
    assert_eq!(empty["active_events"], 0);
    assert_eq!(empty["recent_events"].as_array().unwrap().len(), 0);

    server.submit(sample_report()).await;
    let other = report(
        "def456",
        1,
        &format!(
            "{}{}",
            system_service(0.5),
            event("system", "loadavg too high")
        ),
    );
    server.submit(other).await;

    let dashboard = server.get_json("/api/v1/dashboard").await;

    assert_eq!(dashboard["total_hosts"], 2);
    assert_eq!(dashboard["hosts_ok"], 2);
    assert_eq!(dashboard["total_services"], 3);
    assert_eq!(dashboard["services_ok"], 3);
    assert_eq!(dashboard["services_up"], 3);
    assert_eq!(dashboard["services_down"], 0);
    assert_eq!(dashboard["services_unmonitored"], 0);
    assert_eq!(dashboard["active_events"], 2);
    assert_eq!(dashboard["recent_events"].as_array().unwrap().len(), 2);
    assert!(dashboard["timestamp"].is_string());
}
