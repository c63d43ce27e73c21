use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::criteria::Params;
use crate::error::{OlogError, StoreStatus};
use crate::interface::{QueryInterface, QueryOptions};
use crate::persist::Persistor;
use crate::store::{Log, RecordId};

type Shared = Arc<QueryInterface<Persistor>>;

#[derive(Serialize)]
pub struct LogsResponse {
    pub status: String,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<Log>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogsResponse {
    fn ok(logs: Vec<Log>, elapsed_ms: f64) -> Self {
        Self { status: "ok".into(), elapsed_ms, count: Some(logs.len()), logs: Some(logs), error: None }
    }
    fn error(message: String, elapsed_ms: f64) -> Self {
        Self { status: "error".into(), elapsed_ms, count: None, logs: None, error: Some(message) }
    }
}

pub fn status_for(error: &OlogError) -> StatusCode {
    match error {
        OlogError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        OlogError::BackingStore { status: StoreStatus::NotFound, .. } => StatusCode::NOT_FOUND,
        OlogError::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
        OlogError::BackingStore { .. } | OlogError::Config(_) | OlogError::Lock(_) | OlogError::Invariant(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Collects repeated query-string keys into one entry each, in first-seen order.
pub fn group_params(pairs: Vec<(String, String)>) -> Params {
    let mut params: Params = Vec::new();
    for (key, value) in pairs {
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => params.push((key, vec![value])),
        }
    }
    params
}

fn failure(error: OlogError, started: Instant) -> Response {
    let status = status_for(&error);
    let msg = format!("{error}");
    warn!(%msg, code = %status.as_u16(), "query error");
    (status, Json(LogsResponse::error(msg, elapsed_ms(started)))).into_response()
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

async fn blocking<T, F>(f: F) -> Result<T, OlogError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, OlogError> + Send + 'static,
{
    // the search core is synchronous, so keep it off the async workers
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| OlogError::Invariant(format!("search worker failed: {e}")))?
}

pub async fn list_logs(State(interface): State<Shared>, Query(pairs): Query<Vec<(String, String)>>) -> Response {
    let started = Instant::now();
    let params = group_params(pairs);
    match blocking(move || interface.run_sync(params, QueryOptions::default())).await {
        Ok(logs) => {
            info!(ms = elapsed_ms(started), rows = logs.len(), "logs listed");
            (StatusCode::OK, Json(LogsResponse::ok(logs, elapsed_ms(started)))).into_response()
        }
        Err(e) => failure(e, started),
    }
}

pub async fn get_log(State(interface): State<Shared>, Path(id): Path<RecordId>) -> Response {
    let started = Instant::now();
    match blocking(move || interface.find_by_id(id)).await {
        Ok(Some(log)) => (StatusCode::OK, Json(log)).into_response(),
        Ok(None) => failure(OlogError::not_found(format!("Log {id} does not exist")), started),
        Err(e) => failure(e, started),
    }
}

pub fn router(interface: Shared) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);
    Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/:id", get(get_log))
        .layer(cors)
        .with_state(interface)
}
