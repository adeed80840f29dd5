//! HTTP API integration tests
//!
//! Drives the router in-process with fake system backends.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::timeout;
use tower::ServiceExt;

use hm_core::config::ManagerConfig;
use hm_core::{ClientId, ClientRecord};
use hm_orchestrator::testing::{ControllerCall, FakeController, ScriptedRunner};
use hm_orchestrator::{api, ManagerState};

struct TestApp {
    _dir: TempDir,
    config: ManagerConfig,
    controller: Arc<FakeController>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = ManagerConfig {
            log_file: dir.path().join("monitor.log"),
            hysteria_dir: dir.path().join("hysteria"),
            unit_dir: dir.path().join("units"),
            clients_file: dir.path().join("clients.json"),
            server_file: dir.path().join("server.json"),
            public_ip_endpoints: Vec::new(),
            probe_timeout: Duration::from_millis(200),
            tail_poll_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let controller = Arc::new(FakeController::new());
        let state = ManagerState::with_backends(
            config.clone(),
            controller.clone(),
            Arc::new(ScriptedRunner::new()),
        );

        Self {
            router: api::router(Arc::new(state)),
            _dir: dir,
            config,
            controller,
        }
    }

    fn unit_file(&self, id: &str) -> PathBuf {
        self.config.unit_dir.join(format!("hysteria-{}.service", id))
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

#[tokio::test]
async fn test_add_then_remove_client() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/api/clients",
            Some(json!({ "server_ip": "203.0.113.50", "server_port": "8443" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["client_id"], "client3");
    assert_eq!(body["socks_port"], 1081);

    let config_file = app.config.hysteria_dir.join("client3.yaml");
    assert!(config_file.exists());
    assert!(app.unit_file("client3").exists());

    let (status, body) = app.send("DELETE", "/api/clients/client3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    assert!(!config_file.exists());
    assert!(!app.unit_file("client3").exists());
    let (_, listed) = app.send("GET", "/api/clients", None).await;
    let ids: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["client1", "client2"]);
}

#[tokio::test]
async fn test_remove_protected_client_is_forbidden() {
    let app = TestApp::new();
    let (_, before) = app.send("GET", "/api/clients", None).await;

    let (status, body) = app.send("DELETE", "/api/clients/client1", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("client1"));

    let (_, after) = app.send("GET", "/api/clients", None).await;
    assert_eq!(before, after);
    assert!(app.controller.calls().is_empty());
}

#[tokio::test]
async fn test_remove_unknown_client_is_not_found() {
    let app = TestApp::new();
    let (status, _) = app.send("DELETE", "/api/clients/client50", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_custom_port_conflict_is_rejected_before_writes() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/api/clients",
            Some(json!({ "server_ip": "203.0.113.51", "custom_port": 1080 })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Port already in use");
    assert!(!app.config.hysteria_dir.join("client3.yaml").exists());
    assert!(!app.unit_file("client3").exists());
}

#[tokio::test]
async fn test_add_client_validation() {
    let app = TestApp::new();

    let (status, body) = app.send("POST", "/api/clients", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Server IP is required");

    let (status, body) = app
        .send(
            "POST",
            "/api/clients",
            Some(json!({ "server_ip": "203.0.113.52", "server_port": "https" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid server port");
}

#[tokio::test]
async fn test_service_failure_hides_diagnostic() {
    let app = TestApp::new();
    app.controller.fail_on("enable");

    let (status, body) = app
        .send("POST", "/api/clients", Some(json!({ "server_ip": "203.0.113.53" })))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "systemctl failed");
    assert!(!app.unit_file("client3").exists());
}

#[tokio::test]
async fn test_exhausted_port_range_is_bad_request() {
    let app = TestApp::new();
    let mut clients = app.config.seed_clients.clone();
    for (port, n) in (1081..=1099u16).filter(|p| *p != 1090).zip(3u32..) {
        let id = ClientId::numbered(n);
        clients.insert(
            id.clone(),
            ClientRecord {
                display_name: format!("Client {}", id),
                remote_host: "198.51.100.1".to_string(),
                remote_port: 443,
                local_proxy_port: port,
                config_file: app.config.client_config_path(&id),
                password: "pass1234".to_string(),
            },
        );
    }
    std::fs::write(
        &app.config.clients_file,
        serde_json::to_string_pretty(&clients).unwrap(),
    )
    .unwrap();

    let (status, body) = app
        .send("POST", "/api/clients", Some(json!({ "server_ip": "203.0.113.54" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No free port left");
    assert!(!app.config.unit_dir.exists());
}

#[tokio::test]
async fn test_unreadable_store_blocks_changes() {
    let app = TestApp::new();
    std::fs::write(&app.config.clients_file, "{ \"client5\": ").unwrap();

    let (status, body) = app
        .send("POST", "/api/clients", Some(json!({ "server_ip": "203.0.113.55" })))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("unreadable"));
    assert_eq!(
        std::fs::read_to_string(&app.config.clients_file).unwrap(),
        "{ \"client5\": "
    );

    // Reads fall back to an empty collection
    let (status, listed) = app.send("GET", "/api/clients", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_reads_do_not_write_store_files() {
    let app = TestApp::new();
    app.send("GET", "/api/clients", None).await;
    app.send("GET", "/api/server/status", None).await;

    assert!(!app.config.clients_file.exists());
    assert!(!app.config.server_file.exists());
}

#[tokio::test]
async fn test_status_reports_offline_clients() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);

    let clients = body["clients"].as_array().unwrap();
    assert_eq!(clients.len(), 2);
    for client in clients {
        assert_eq!(client["status"], "offline");
    }
    assert!(body["system"]["uptime"].as_str().unwrap().starts_with("up "));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_restart_targets() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/api/restart/monitor", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], "hysteria-monitor restarted successfully");

    let (status, _) = app.send("GET", "/api/restart/client9", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.controller.fail_on("restart");
    let (status, _) = app.send("GET", "/api/restart/client2", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(
        app.controller.calls(),
        vec![
            ControllerCall::Restart("hysteria-monitor".to_string()),
            ControllerCall::Restart("hysteria-client2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_logs_snapshot() {
    let app = TestApp::new();

    let (status, body) = app.send("GET", "/api/logs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "error": "Log file not found", "logs": [] }));

    std::fs::write(
        &app.config.log_file,
        "2024-01-01 10:00:00 - 🟢 Client1 ONLINE\n\
         not structured\n\
         2024-01-01 10:00:05 - ⚠️ WARNING disk low\n",
    )
    .unwrap();

    let (status, body) = app.send("GET", "/api/logs?lines=10&filter=client1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_lines"], 3);
    assert_eq!(body["filtered_lines"], 1);
    assert_eq!(body["logs"][0]["type"], "success");
    assert_eq!(body["logs"][0]["timestamp"], "2024-01-01 10:00:00");
}

#[tokio::test]
async fn test_log_stream_missing_file() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/api/logs/stream")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = timeout(
        Duration::from_secs(5),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .unwrap()
    .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("data: {\"error\":\"Log file not found\"}"));
}

#[tokio::test]
async fn test_log_stream_pushes_appended_lines() {
    let app = TestApp::new();
    std::fs::write(&app.config.log_file, "2024-01-01 09:00:00 - old\n").unwrap();

    let request = Request::builder()
        .uri("/api/logs/stream")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&app.config.log_file)
            .unwrap();
        writeln!(file, "2024-01-01 10:00:00 - 🔴 Client2 OFFLINE").unwrap();
    }

    let mut frames = response.into_body().into_data_stream();
    let frame = timeout(Duration::from_secs(5), frames.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.starts_with("data: "));
    assert!(text.contains("\"type\":\"error\""));
    assert!(!text.contains("old"));
}

#[tokio::test]
async fn test_server_setup_and_status() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            "POST",
            "/api/server/setup",
            Some(json!({ "port": "8443", "domain": "vpn.example.org" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["server_info"]["port"], 8443);
    assert_eq!(body["server_info"]["password"].as_str().unwrap().len(), 16);

    let (status, body) = app.send("GET", "/api/server/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], true);
    assert_eq!(body["running"], true);
    assert_eq!(body["config"]["listen_port"], 8443);

    let (status, _) = app
        .send("POST", "/api/server/setup", Some(json!({ "port": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_server_install() {
    let app = TestApp::new();
    let (status, body) = app.send("POST", "/api/server/install", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}
