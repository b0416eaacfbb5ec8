//! Health endpoint handler.
//!
//! `GET /` reports whether the server is up and whether the dataset is loaded.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::state::AppState;

/// Identifies this process across restarts.
static SERVER_ID: once_cell::sync::Lazy<String> =
    once_cell::sync::Lazy::new(|| Uuid::new_v4().to_string());

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub data_loaded: bool,
    pub server_id: String,
    pub uptime_seconds: u64,
}

/// Handle GET / requests
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(health(&state))
}

fn health(state: &AppState) -> HealthResponse {
    HealthResponse {
        status: "running".to_string(),
        data_loaded: state.is_loaded(),
        server_id: SERVER_ID.clone(),
        uptime_seconds: state.uptime_seconds(),
    }
}
