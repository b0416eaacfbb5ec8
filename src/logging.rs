//! Logging utilities for the isobar server.
//!
//! Structured `tracing` helpers shared by the binary, the state layer and the
//! HTTP handlers.

use std::time::Instant;
use tracing::{debug, error, info, warn, Level};

use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::error::{ErrorClass, IsobarError};

/// Creates the tracing layer for HTTP request/response logging
pub fn create_http_trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    DefaultMakeSpan,
    DefaultOnRequest,
    DefaultOnResponse,
> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::DEBUG)
                .latency_unit(LatencyUnit::Micros),
        )
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(log_level: &str) {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();
}

/// Log the start of a named operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    match details {
        Some(details) => info!(operation = operation, details = details, "Starting operation"),
        None => info!(operation = operation, "Starting operation"),
    }
}

/// Log the end of an operation started at `start_time`
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if success {
        info!(operation = operation, duration_ms = duration_ms, "Operation completed");
    } else {
        warn!(operation = operation, duration_ms = duration_ms, "Operation failed");
    }
}

/// Run `f`, logging its duration under `operation`.
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    debug!(operation = operation, "Starting operation");

    let result = f();

    debug!(
        operation = operation,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation completed"
    );
    result
}

/// Summarize a freshly opened dataset.
pub fn log_dataset_load_stats(dataset: &Dataset, elapsed_ms: f64) {
    let grid = dataset.grid();
    let variables: Vec<String> = dataset.catalog().list_variables().into_iter().collect();

    info!(
        operation = "dataset_load",
        file_path = %dataset.path().map(|p| p.display().to_string()).unwrap_or_default(),
        var_count = variables.len(),
        vars = %variables.join(", "),
        time_steps = grid.time.len(),
        time_start = %crate::time::format_iso(grid.time.start()),
        time_end = %crate::time::format_iso(grid.time.end()),
        lat_size = grid.latitude.len(),
        lon_size = grid.longitude.len(),
        duration_ms = elapsed_ms,
        "Dataset opened"
    );
}

/// Log a failed request: caller errors at `warn`, infrastructure errors at `error`.
pub fn log_request_error(
    error: &IsobarError,
    endpoint: &str,
    request_id: &str,
    params: Option<&str>,
) {
    let params = params.unwrap_or("none");
    match error.class() {
        ErrorClass::Client => warn!(
            error = %error,
            endpoint = endpoint,
            request_id = request_id,
            params = params,
            "Request rejected"
        ),
        ErrorClass::Server => error!(
            error = %error,
            endpoint = endpoint,
            request_id = request_id,
            params = params,
            "Request processing error"
        ),
    }
}

/// Generate a unique request id
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
