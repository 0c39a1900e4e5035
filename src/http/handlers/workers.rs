use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::validate_id;
use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::query::WorkerSnapshot;

/// Query flags for GET worker detail; both default to true.
#[derive(Debug, Deserialize)]
pub struct WorkerDetailQuery {
    #[serde(default = "default_true")]
    pub include_thinking: bool,
    #[serde(default = "default_true")]
    pub include_messages: bool,
}

fn default_true() -> bool {
    true
}

/// GET /api/swarms/{id}/workers - List workers in a swarm
pub async fn list_workers(
    State(state): State<Arc<AppState>>,
    Path(swarm_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    validate_id("swarm id", &swarm_id)?;
    let workers = state.query.list_workers(&swarm_id)?;
    let count = workers.len();
    Ok(Json(json!({
        "swarm_id": swarm_id,
        "workers": workers,
        "count": count
    })))
}

/// GET /api/swarms/{id}/workers/{worker_id} - Full worker detail
pub async fn get_worker(
    State(state): State<Arc<AppState>>,
    Path((swarm_id, worker_id)): Path<(String, String)>,
    Query(query): Query<WorkerDetailQuery>,
) -> Result<Json<WorkerSnapshot>, ApiError> {
    validate_id("swarm id", &swarm_id)?;
    validate_id("worker id", &worker_id)?;
    let snapshot = state.query.get_worker_detail(
        &swarm_id,
        &worker_id,
        query.include_thinking,
        query.include_messages,
    )?;
    Ok(Json(snapshot))
}
