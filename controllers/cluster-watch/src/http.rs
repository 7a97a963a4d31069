//! HTTP shell over the mirrors' caches.

use crate::handlers::Metrics;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use informer::{ObjectKey, StopSignal, Store};
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Read handles shared with every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pod cache.
    pub pods: Store<Pod>,
    /// Node cache.
    pub nodes: Store<Node>,
    /// Metrics rendered at `/metrics`.
    pub metrics: Metrics,
}

#[derive(Debug, Serialize)]
struct Pong {
    message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PodKeys {
    pod_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PodDetail {
    pod_detail: Option<Pod>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeKeys {
    node_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeDetail {
    node_detail: Option<Node>,
}

/// Routes of the HTTP shell.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/pod", get(list_pods))
        .route("/pod/{namespace}/{name}", get(get_pod))
        .route("/node", get(list_nodes))
        .route("/node/{name}", get(get_node))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `stop` fires.
pub async fn serve(listener: TcpListener, state: AppState, mut stop: StopSignal) -> std::io::Result<()> {
    info!(addr = ?listener.local_addr().ok(), "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { stop.stopped().await })
        .await
}

async fn ping() -> Json<Pong> {
    Json(Pong { message: "pong" })
}

fn key_strings(keys: Vec<ObjectKey>) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

async fn list_pods(State(state): State<AppState>) -> Json<PodKeys> {
    let pod_keys = key_strings(state.pods.list_keys());
    info!(count = pod_keys.len(), "Listing pod keys");
    Json(PodKeys { pod_keys })
}

async fn get_pod(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> (StatusCode, Json<PodDetail>) {
    let key = ObjectKey::namespaced(namespace, name);
    let pod = state.pods.get_by_key(&key).map(|pod| (*pod).clone());
    info!(%key, found = pod.is_some(), "Pod lookup");
    let status = if pod.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(PodDetail { pod_detail: pod }))
}

async fn list_nodes(State(state): State<AppState>) -> Json<NodeKeys> {
    Json(NodeKeys {
        node_keys: key_strings(state.nodes.list_keys()),
    })
}

async fn get_node(State(state): State<AppState>, Path(name): Path<String>) -> (StatusCode, Json<NodeDetail>) {
    let node = state
        .nodes
        .get_by_key(&ObjectKey::cluster(name))
        .map(|node| (*node).clone());
    let status = if node.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(NodeDetail { node_detail: node }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
