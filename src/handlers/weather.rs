//! Single-point time series endpoint.
//!
//! `POST /weather` returns `hours` consecutive values of one variable at the
//! grid point nearest to `(lat, lon)`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::{default_hours, json_body, positive, run_blocking, ApiError};
use crate::engine::{Query, TimeValue};
use crate::error::Result;
use crate::logging::generate_request_id;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherRequest {
    pub lat: f64,
    pub lon: f64,
    pub time: String,
    pub var: String,
    #[serde(default = "default_hours")]
    pub hours: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherResponse {
    pub lat: f64,
    pub lon: f64,
    pub var: String,
    pub unit: String,
    pub start_time: String,
    pub values: Vec<TimeValue>,
}

/// Handle POST /weather requests
pub async fn weather_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<WeatherRequest>, JsonRejection>,
) -> std::result::Result<Json<WeatherResponse>, ApiError> {
    let request_id = generate_request_id();
    let start = Instant::now();

    let request = json_body(payload)
        .map_err(|e| ApiError::logged(e, "/weather", &request_id, None))?;
    let params = format!(
        "lat={}, lon={}, var={}, time={}, hours={}",
        request.lat, request.lon, request.var, request.time, request.hours
    );
    debug!(endpoint = "/weather", request_id = %request_id, params = %params, "Processing weather query");

    let response = run_query(state, request)
        .await
        .map_err(|e| ApiError::logged(e, "/weather", &request_id, Some(&params)))?;

    info!(
        endpoint = "/weather",
        request_id = %request_id,
        var = %response.var,
        values = response.values.len(),
        duration_us = start.elapsed().as_micros() as u64,
        "Weather query successful"
    );

    Ok(Json(response))
}

async fn run_query(state: Arc<AppState>, request: WeatherRequest) -> Result<WeatherResponse> {
    let hours = positive("hours", request.hours)?;

    run_blocking(move || {
        let engine = state.engine()?;
        let result = engine.query(
            &Query::new(request.lat, request.lon, request.var.as_str(), request.time.as_str())
                .hours(hours),
        )?;

        Ok(WeatherResponse {
            lat: request.lat,
            lon: request.lon,
            var: result.variable,
            unit: result.unit,
            start_time: result.start_time,
            values: result.values,
        })
    })
    .await
}
