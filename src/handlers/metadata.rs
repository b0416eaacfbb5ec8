//! Metadata endpoint handler.
//!
//! `GET /metadata` describes the loaded dataset: variables with their units,
//! axis bounds, the time step and the current chunk cache statistics.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{run_blocking, ApiError};
use crate::dataset::DatasetSummary;
use crate::logging::generate_request_id;
use crate::state::AppState;
use crate::store::CacheStats;

#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub dataset: DatasetSummary,
    pub cache: CacheStats,
}

/// Handle GET /metadata requests
pub async fn metadata_handler(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<MetadataResponse>, ApiError> {
    let request_id = generate_request_id();
    let start = Instant::now();
    debug!(endpoint = "/metadata", request_id = %request_id, "Processing metadata request");

    let response = run_blocking(move || {
        let engine = state.engine()?;
        Ok(MetadataResponse {
            dataset: engine.dataset().summary(),
            cache: engine.cache_stats(),
        })
    })
    .await
    .map_err(|e| ApiError::logged(e, "/metadata", &request_id, None))?;

    info!(
        endpoint = "/metadata",
        request_id = %request_id,
        duration_us = start.elapsed().as_micros() as u64,
        variable_count = response.dataset.variables.len(),
        "Metadata request successful"
    );

    Ok(Json(response))
}
