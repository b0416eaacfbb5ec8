//! HTTP request handlers for the isobar API.

use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{IsobarError, Result};
use crate::logging::{create_http_trace_layer, log_request_error};
use crate::state::AppState;

pub mod batch;
pub mod health;
pub mod metadata;
pub mod weather;

pub use batch::batch_handler;
pub use health::health_handler;
pub use metadata::metadata_handler;
pub use weather::weather_handler;

/// Build the application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/metadata", get(metadata_handler))
        .route("/weather", post(weather_handler))
        .route("/weather/batch", post(batch_handler))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(create_http_trace_layer())
        .with_state(state)
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub request_id: String,
}

/// An [`IsobarError`] tagged with the request it belongs to.
#[derive(Debug)]
pub struct ApiError {
    pub error: IsobarError,
    pub request_id: String,
}

impl ApiError {
    /// Log the failure and wrap it for the response.
    pub fn logged(error: IsobarError, endpoint: &str, request_id: &str, params: Option<&str>) -> Self {
        log_request_error(&error, endpoint, request_id, params);
        Self {
            error,
            request_id: request_id.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorBody {
            detail: self.error.to_string(),
            request_id: self.request_id,
        };
        (status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body, turning extractor rejections into `InvalidParameter`.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| IsobarError::InvalidParameter {
            param: "body".to_string(),
            message: rejection.body_text(),
        })
}

/// Reject counts below 1 and convert to `usize`.
pub(crate) fn positive(param: &str, value: i64) -> Result<usize> {
    if value < 1 {
        return Err(IsobarError::InvalidParameter {
            param: param.to_string(),
            message: format!("{} must be at least 1, got {}", param, value),
        });
    }
    usize::try_from(value).map_err(|_| IsobarError::InvalidParameter {
        param: param.to_string(),
        message: format!("{} is too large: {}", param, value),
    })
}

/// Run an engine call on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IsobarError::Server {
            message: format!("Query task failed: {}", e),
        })?
}

pub(crate) fn default_hours() -> i64 {
    24
}

pub(crate) fn default_interval() -> i64 {
    1
}
