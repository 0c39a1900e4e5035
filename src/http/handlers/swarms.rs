use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::validate_id;
use crate::http::error::ApiError;
use crate::http::state::AppState;
use crate::query::SwarmSnapshot;

/// GET /api/swarms - List all tracked swarms
pub async fn list_swarms(State(state): State<Arc<AppState>>) -> Json<Value> {
    let swarms = state.query.list_swarms();
    let count = swarms.len();
    Json(json!({
        "swarms": swarms,
        "count": count
    }))
}

/// GET /api/swarms/{id} - Full swarm snapshot with worker summaries
pub async fn get_swarm(
    State(state): State<Arc<AppState>>,
    Path(swarm_id): Path<String>,
) -> Result<Json<SwarmSnapshot>, ApiError> {
    validate_id("swarm id", &swarm_id)?;
    let snapshot = state.query.get_swarm_status(&swarm_id)?;
    Ok(Json(snapshot))
}
