//! Request handlers

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, BoxStream, StreamExt};
use hm_core::config::serde_utils::lenient_int::{self, Lenient};
use hm_core::{ClientId, ClientSnapshot, ManagerError};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use crate::health::SystemInfo;
use crate::logs::LogError;
use crate::manage::{NewClient, ServerSetup, ServerStatus};
use crate::ManagerState;

type AppState = State<Arc<ManagerState>>;

/// Port used when a request omits one
const DEFAULT_PORT: i64 = 443;

pub async fn status(State(state): AppState) -> Json<Value> {
    let clients = state.health.status_of(&state.clients.clients()).await;
    Json(json!({
        "clients": clients,
        "system": SystemInfo::collect(),
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    lines: Option<String>,
    filter: Option<String>,
}

pub async fn logs(State(state): AppState, Query(query): Query<LogsQuery>) -> Json<Value> {
    let lines = query.lines.as_deref().and_then(|l| l.trim().parse().ok());
    match state.logs.snapshot(lines, query.filter.as_deref()).await {
        Ok(snapshot) => Json(json!(snapshot)),
        Err(LogError::NotFound(_)) => Json(json!({ "error": "Log file not found", "logs": [] })),
        Err(e) => {
            tracing::warn!("Log snapshot failed: {}", e);
            Json(json!({ "error": "Error reading logs", "logs": [] }))
        }
    }
}

pub async fn stream_logs(State(state): AppState) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let events = match state.logs.tail(state.shutdown.child_token()).await {
        Ok(tail) => stream::unfold(tail.entries, |mut entries| async move {
            let entry = entries.recv().await?;
            let data = serde_json::to_string(&entry).unwrap_or_default();
            Some((Ok(Event::default().data(data)), entries))
        })
        .boxed(),
        Err(e) => {
            let data = json!({ "error": e.to_string() }).to_string();
            stream::once(async move { Ok(Event::default().data(data)) }).boxed()
        }
    };

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

pub async fn restart(State(state): AppState, Path(target): Path<String>) -> Result<Json<Value>, ApiError> {
    let message = state.restart(&target).await?;
    Ok(Json(json!({ "success": message })))
}

pub async fn list_clients(State(state): AppState) -> Json<Vec<ClientSnapshot>> {
    Json(state.clients.list())
}

#[derive(Debug, Deserialize)]
pub struct AddClientRequest {
    #[serde(default)]
    server_ip: String,
    #[serde(default, deserialize_with = "lenient_int::deserialize")]
    server_port: Lenient,
    #[serde(default)]
    password: Option<String>,
    #[serde(default, deserialize_with = "lenient_int::deserialize")]
    custom_port: Lenient,
}

impl AddClientRequest {
    fn into_new_client(self) -> Result<NewClient, ManagerError> {
        let remote_port = self
            .server_port
            .into_option()
            .map_err(|_| ManagerError::Validation("Invalid server port".to_string()))?
            .unwrap_or(DEFAULT_PORT);
        let custom_port = self
            .custom_port
            .into_option()
            .map_err(|_| ManagerError::Validation("Custom port must be between 1024-65535".to_string()))?;

        Ok(NewClient {
            remote_host: self.server_ip,
            remote_port,
            password: self.password,
            custom_port,
        })
    }
}

pub async fn add_client(
    State(state): AppState,
    Json(request): Json<AddClientRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = state.clients.add(request.into_new_client()?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "client_id": created.client_id,
            "socks_port": created.socks_port,
            "message": created.message,
        })),
    ))
}

pub async fn remove_client(State(state): AppState, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let removed = state.clients.remove(&ClientId::new(id)).await?;
    Ok(Json(json!({ "success": true, "message": removed.message })))
}

pub async fn server_status(State(state): AppState) -> Json<ServerStatus> {
    Json(state.server.status().await)
}

#[derive(Debug, Deserialize)]
pub struct SetupServerRequest {
    #[serde(default, deserialize_with = "lenient_int::deserialize")]
    port: Lenient,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

pub async fn setup_server(
    State(state): AppState,
    Json(request): Json<SetupServerRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let port = request
        .port
        .into_option()
        .map_err(|_| ManagerError::Validation("Invalid port".to_string()))?
        .unwrap_or(DEFAULT_PORT);

    let outcome = state
        .server
        .setup(ServerSetup {
            port,
            password: request.password,
            domain: request.domain,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": outcome.message,
            "server_info": outcome.server_info,
        })),
    ))
}

pub async fn install_server(State(state): AppState) -> Result<Json<Value>, ApiError> {
    let message = state.server.install().await?;
    Ok(Json(json!({ "success": true, "message": message })))
}
