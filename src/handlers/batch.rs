//! Multi-location endpoint.
//!
//! `POST /weather/batch` queries several variables at many locations over one
//! shared time window.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{default_hours, default_interval, json_body, positive, run_blocking, ApiError};
use crate::batch::{BatchCoordinator, BatchQuery, BatchResult, LocationInput};
use crate::error::Result;
use crate::logging::generate_request_id;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub locations: Vec<LocationInput>,
    pub time: String,
    pub vars: Vec<String>,
    #[serde(default = "default_hours")]
    pub hours: i64,
    #[serde(default = "default_interval")]
    pub interval: i64,
}

/// Handle POST /weather/batch requests
pub async fn batch_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> std::result::Result<Json<BatchResult>, ApiError> {
    let request_id = generate_request_id();
    let start = Instant::now();

    let request = json_body(payload)
        .map_err(|e| ApiError::logged(e, "/weather/batch", &request_id, None))?;
    let params = format!(
        "locations={}, vars={}, time={}, hours={}, interval={}",
        request.locations.len(),
        request.vars.join(","),
        request.time,
        request.hours,
        request.interval
    );
    debug!(endpoint = "/weather/batch", request_id = %request_id, params = %params, "Processing batch query");

    let result = run_batch(state, request)
        .await
        .map_err(|e| ApiError::logged(e, "/weather/batch", &request_id, Some(&params)))?;

    let failed = result.locations.iter().filter(|l| l.error.is_some()).count();
    info!(
        endpoint = "/weather/batch",
        request_id = %request_id,
        locations = result.locations.len(),
        failed_locations = failed,
        time_steps = result.time_steps.len(),
        duration_us = start.elapsed().as_micros() as u64,
        "Batch query successful"
    );

    Ok(Json(result))
}

async fn run_batch(state: Arc<AppState>, request: BatchRequest) -> Result<BatchResult> {
    let query = BatchQuery {
        hours: positive("hours", request.hours)?,
        interval: positive("interval", request.interval)?,
        locations: request.locations,
        variables: request.vars,
        start_time: request.time,
    };

    run_blocking(move || {
        let engine = state.engine()?;
        let settings = &state.config.engine;
        BatchCoordinator::new(&engine)
            .with_parallelism(settings.batch_parallelism)
            .with_max_locations(settings.max_batch_locations)
            .query_batch(&query)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::IsobarError;
    use crate::testing::sample_engine;

    fn request(interval: i64) -> BatchRequest {
        serde_json::from_value(serde_json::json!({
            "locations": [{"lat": 31.0, "lon": 120.0, "id": "A"}, {"lat": 30.0, "lon": 121.0}],
            "time": "2025-06-01T00:00:00Z",
            "vars": ["t2m"],
            "hours": 12,
            "interval": interval,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_run_batch() {
        let state = Arc::new(AppState::with_engine(Config::default(), sample_engine()));
        let result = run_batch(state, request(3)).await.unwrap();

        assert_eq!(result.time_steps.len(), 4);
        assert_eq!(result.locations[0].id, "A");
        assert_eq!(result.locations[1].id, "30_121");
    }

    #[tokio::test]
    async fn test_rejects_zero_interval() {
        let state = Arc::new(AppState::with_engine(Config::default(), sample_engine()));
        assert!(matches!(
            run_batch(state, request(0)).await,
            Err(IsobarError::InvalidParameter { .. })
        ));
    }

    #[tokio::test]
    async fn test_location_limit_from_config() {
        let mut config = Config::default();
        config.engine.max_batch_locations = 1;
        let state = Arc::new(AppState::with_engine(config, sample_engine()));
        assert!(matches!(
            run_batch(state, request(1)).await,
            Err(IsobarError::InvalidParameter { .. })
        ));
    }
}
