//! Error types for the isobar query engine.
//!
//! Every failure is classified as either a caller-input problem or an
//! infrastructure problem, and that classification is carried all the way to
//! the HTTP status code.

use axum::http::StatusCode;
use thiserror::Error;

/// Whether an error was caused by the caller or by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; never retried.
    Client,
    /// Storage, configuration or initialization failure.
    Server,
}

/// The main error type for isobar operations.
#[derive(Error, Debug)]
pub enum IsobarError {
    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// Malformed timestamp string
    #[error("Invalid time format: '{value}'. Use ISO 8601, e.g. 2025-06-01T12:00:00")]
    InvalidTimeFormat { value: String },

    /// One or more requested variables are not in the dataset
    #[error("Unknown variable(s): {}. Available variables: {}", requested.join(", "), available.join(", "))]
    UnknownVariable {
        requested: Vec<String>,
        available: Vec<String>,
    },

    /// Requested time window is outside the dataset's time coverage
    #[error("Requested time window {start} to {end} is out of range. Dataset covers {dataset_start} to {dataset_end}")]
    OutOfRange {
        start: String,
        end: String,
        dataset_start: String,
        dataset_end: String,
    },

    /// No grid point lies within the nearest-match tolerance
    #[error("Location out of bounds: ({lat}, {lon}) - {message}")]
    LocationOutOfBounds { lat: f64, lon: f64, message: String },

    /// Reading from the underlying storage failed
    #[error("Storage I/O error: {message}")]
    StorageIo { message: String },

    /// The dataset file could not be located
    #[error("Dataset not found: {path}")]
    DatasetNotFound { path: String },

    /// A query arrived and the dataset could not be loaded
    #[error("Dataset not initialized: {message}")]
    NotInitialized { message: String },

    /// The dataset exists but its structure is unusable
    #[error("Invalid dataset: {message}")]
    InvalidDataset { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// NetCDF library errors
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// Server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

impl IsobarError {
    /// Classify the error as caller-input or infrastructure.
    pub fn class(&self) -> ErrorClass {
        match self {
            IsobarError::InvalidParameter { .. }
            | IsobarError::InvalidTimeFormat { .. }
            | IsobarError::UnknownVariable { .. }
            | IsobarError::OutOfRange { .. }
            | IsobarError::LocationOutOfBounds { .. } => ErrorClass::Client,
            _ => ErrorClass::Server,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match (self, self.class()) {
            (IsobarError::NotInitialized { .. }, _) => StatusCode::SERVICE_UNAVAILABLE,
            (_, ErrorClass::Client) => StatusCode::BAD_REQUEST,
            (_, ErrorClass::Server) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenience type alias for Results with IsobarError
pub type Result<T> = std::result::Result<T, IsobarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_bad_request() {
        let errors = vec![
            IsobarError::InvalidParameter {
                param: "interval".to_string(),
                message: "must be >= 1".to_string(),
            },
            IsobarError::InvalidTimeFormat {
                value: "yesterday".to_string(),
            },
            IsobarError::UnknownVariable {
                requested: vec!["foo".to_string()],
                available: vec!["t2m".to_string()],
            },
            IsobarError::LocationOutOfBounds {
                lat: 0.0,
                lon: 0.0,
                message: "no grid point within 0.5".to_string(),
            },
        ];

        for error in errors {
            assert_eq!(error.class(), ErrorClass::Client);
            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_infrastructure_errors_map_to_server_error() {
        let storage = IsobarError::StorageIo {
            message: "disk gone".to_string(),
        };
        assert_eq!(storage.class(), ErrorClass::Server);
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let init = IsobarError::NotInitialized {
            message: "loading".to_string(),
        };
        assert_eq!(init.class(), ErrorClass::Server);
        assert_eq!(init.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_unknown_variable_message_lists_every_name() {
        let error = IsobarError::UnknownVariable {
            requested: vec!["foo".to_string(), "bar".to_string()],
            available: vec!["t2m".to_string(), "u10".to_string()],
        };
        let message = error.to_string();
        assert!(message.contains("foo, bar"));
        assert!(message.contains("t2m, u10"));
    }
}
