//! In-process mock Marathon for integration tests.
//!
//! Serves the REST endpoints the orchestrator calls plus `/v2/events`.
//! The events endpoint sends whatever is queued in `events` and closes,
//! so the subscriber reconnects and picks up later events.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use serde_json::{Value, json};

use bridge_core::BridgeConfig;

#[derive(Debug, Default)]
pub struct MarathonState {
    /// Group id (no slashes) → group document.
    pub groups: HashMap<String, Value>,
    /// App id (no leading slash) → app document.
    pub apps: HashMap<String, Value>,
    /// App id (no leading slash) → task list.
    pub tasks: HashMap<String, Vec<Value>>,
    pub deployments: Vec<Value>,
    pub posted_groups: Vec<Value>,
    pub deleted_groups: Vec<String>,
    pub app_updates: Vec<(String, Value)>,
    /// Resource ("groups", "deployments", "apps") → remaining 503 answers.
    pub failures: HashMap<&'static str, usize>,
    /// Raw `text/event-stream` body for the next events connection.
    pub events: String,
    pub event_connections: usize,
    next_deployment: u32,
}

impl MarathonState {
    fn next_deployment_id(&mut self) -> String {
        self.next_deployment += 1;
        format!("mdep-{}", self.next_deployment)
    }

    fn take_failure(&mut self, resource: &'static str) -> bool {
        match self.failures.get_mut(resource) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Seed a running group with one app per `(local id, tasks_unhealthy)`.
    pub fn seed_group(&mut self, group_id: &str, apps: &[(&str, u32)]) {
        let docs: Vec<Value> = apps
            .iter()
            .map(|(local, unhealthy)| {
                json!({
                    "id": format!("/{group_id}/{local}"),
                    "instances": 1,
                    "tasksUnhealthy": unhealthy,
                })
            })
            .collect();
        for doc in &docs {
            let id = doc["id"].as_str().unwrap_or_default().trim_start_matches('/').to_string();
            self.apps.insert(id, doc.clone());
        }
        self.groups.insert(
            group_id.to_string(),
            json!({ "id": format!("/{group_id}"), "apps": docs }),
        );
    }

    pub fn push_event(&mut self, name: &str, data: Value) {
        self.events.push_str(&format!("event: {name}\ndata: {data}\n\n"));
    }
}

pub type Shared = Arc<Mutex<MarathonState>>;

pub struct MockMarathon {
    pub url: String,
    state: Shared,
}

impl MockMarathon {
    pub async fn start() -> Self {
        let state = Shared::default();
        let router = Router::new()
            .route("/v2/groups", axum::routing::post(create_group))
            .route("/v2/groups/{*id}", get(get_group).delete(delete_group))
            .route("/v2/deployments", get(list_deployments))
            .route("/v2/apps/{*id}", get(get_app).put(update_app))
            .route("/v2/events", get(events))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MarathonState> {
        self.state.lock().unwrap()
    }

    /// Config with short timeouts and a fast reconnect.
    pub fn config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::new(&self.url, "");
        config.request_timeout_secs = 5;
        config.reconnect_initial_ms = 20;
        config.reconnect_max_ms = 100;
        config
    }
}

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("{what} does not exist") })),
    )
        .into_response()
}

fn unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "leader election in progress").into_response()
}

async fn create_group(State(state): State<Shared>, Json(group): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    let id = group["id"].as_str().unwrap_or_default().trim_matches('/').to_string();
    state.groups.insert(id, group.clone());
    state.posted_groups.push(group);
    let deployment = state.next_deployment_id();
    (
        StatusCode::CREATED,
        Json(json!({ "version": "2017-01-01T00:00:00.000Z", "deployments": [{ "id": deployment }] })),
    )
        .into_response()
}

async fn get_group(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if state.take_failure("groups") {
        return unavailable();
    }
    match state.groups.get(id.trim_matches('/')) {
        Some(group) => Json(group.clone()).into_response(),
        None => not_found("group"),
    }
}

async fn delete_group(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    let id = id.trim_matches('/').to_string();
    if state.groups.remove(&id).is_none() {
        return not_found("group");
    }
    state.deleted_groups.push(id);
    let deployment = state.next_deployment_id();
    Json(json!({ "version": "2017-01-01T00:00:01.000Z", "deploymentId": deployment })).into_response()
}

async fn list_deployments(State(state): State<Shared>) -> Response {
    let mut state = state.lock().unwrap();
    if state.take_failure("deployments") {
        return unavailable();
    }
    Json(Value::Array(state.deployments.clone())).into_response()
}

async fn get_app(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if state.take_failure("apps") {
        return unavailable();
    }
    let id = id.trim_matches('/');
    if let Some(app_id) = id.strip_suffix("/tasks") {
        if !state.apps.contains_key(app_id) {
            return not_found("app");
        }
        let tasks = state.tasks.get(app_id).cloned().unwrap_or_default();
        return Json(json!({ "tasks": tasks })).into_response();
    }
    match state.apps.get(id) {
        Some(app) => Json(json!({ "app": app })).into_response(),
        None => not_found("app"),
    }
}

async fn update_app(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(update): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let id = id.trim_matches('/').to_string();
    let Some(app) = state.apps.get_mut(&id) else {
        return not_found("app");
    };
    app["instances"] = update["instances"].clone();
    state.app_updates.push((id, update));
    let deployment = state.next_deployment_id();
    Json(json!({ "version": "2017-01-01T00:00:02.000Z", "deploymentId": deployment })).into_response()
}

async fn events(State(state): State<Shared>) -> Response {
    let mut state = state.lock().unwrap();
    state.event_connections += 1;
    let body = std::mem::take(&mut state.events);
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
