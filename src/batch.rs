//! Multi-location, multi-variable queries.
//!
//! The variable list and time window are validated once for the whole batch.
//! Caller errors tied to a single location are reported inline for that
//! location. Storage failures abort the whole batch.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::{QueryEngine, TimeWindow};
use crate::error::{ErrorClass, IsobarError, Result};
use crate::time::format_iso_utc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub id: Option<String>,
}

impl LocationInput {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, id: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Caller-supplied id, or `"{lat}_{lon}"`.
    pub fn resolved_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.lat, self.lon))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuery {
    pub locations: Vec<LocationInput>,
    pub variables: Vec<String>,
    pub start_time: String,
    pub hours: usize,
    pub interval: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSeries {
    pub var: String,
    pub unit: String,
    pub values: Vec<Option<f64>>,
}

/// Either `data` or `error` is set, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationResult {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<VariableSeries>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub start_time: String,
    pub time_steps: Vec<String>,
    pub locations: Vec<LocationResult>,
}

pub struct BatchCoordinator<'a> {
    engine: &'a QueryEngine,
    parallelism: usize,
    max_locations: Option<usize>,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(engine: &'a QueryEngine) -> Self {
        Self {
            engine,
            parallelism: 1,
            max_locations: None,
        }
    }

    /// Split locations into at most this many concurrent runs.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn with_max_locations(mut self, max_locations: usize) -> Self {
        self.max_locations = Some(max_locations);
        self
    }

    pub fn query_batch(&self, query: &BatchQuery) -> Result<BatchResult> {
        if query.locations.is_empty() {
            return Err(IsobarError::InvalidParameter {
                param: "locations".to_string(),
                message: "At least one location is required".to_string(),
            });
        }
        if let Some(max) = self.max_locations {
            if query.locations.len() > max {
                return Err(IsobarError::InvalidParameter {
                    param: "locations".to_string(),
                    message: format!(
                        "Batch has {} locations, the limit is {}",
                        query.locations.len(),
                        max
                    ),
                });
            }
        }
        if query.variables.is_empty() {
            return Err(IsobarError::InvalidParameter {
                param: "vars".to_string(),
                message: "At least one variable is required".to_string(),
            });
        }

        self.engine.dataset().catalog().require_all(&query.variables)?;
        let window = self
            .engine
            .resolve_window(&query.start_time, query.hours, query.interval)?;

        let locations = if self.parallelism > 1 && query.locations.len() > 1 {
            self.run_parallel(&query.locations, &query.variables, &window)?
        } else {
            query
                .locations
                .iter()
                .map(|location| self.query_location(location, &query.variables, &window))
                .collect::<Result<Vec<_>>>()?
        };

        debug!(
            locations = query.locations.len(),
            variables = query.variables.len(),
            steps = window.offsets.len(),
            "Batch query resolved"
        );

        Ok(BatchResult {
            start_time: format_iso_utc(window.start),
            time_steps: window.timestamps.iter().map(|ts| format_iso_utc(*ts)).collect(),
            locations,
        })
    }

    /// Fan locations out over the rayon pool in at most `parallelism` runs.
    /// Results come back in input order.
    fn run_parallel(
        &self,
        locations: &[LocationInput],
        variables: &[String],
        window: &TimeWindow,
    ) -> Result<Vec<LocationResult>> {
        let per_run = locations.len().div_ceil(self.parallelism);

        locations
            .par_iter()
            .with_min_len(per_run)
            .map(|location| self.query_location(location, variables, window))
            .collect()
    }

    /// Only caller errors become an inline `error` entry.
    fn query_location(
        &self,
        location: &LocationInput,
        variables: &[String],
        window: &TimeWindow,
    ) -> Result<LocationResult> {
        let id = location.resolved_id();

        match self.location_series(location, variables, window) {
            Ok(data) => Ok(LocationResult {
                id,
                lat: location.lat,
                lon: location.lon,
                data: Some(data),
                error: None,
            }),
            Err(e) if e.class() == ErrorClass::Client => {
                warn!(id = %id, lat = location.lat, lon = location.lon, error = %e, "Batch location failed");
                Ok(LocationResult {
                    id,
                    lat: location.lat,
                    lon: location.lon,
                    data: None,
                    error: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn location_series(
        &self,
        location: &LocationInput,
        variables: &[String],
        window: &TimeWindow,
    ) -> Result<Vec<VariableSeries>> {
        let point = self.engine.resolve_point(location.lat, location.lon)?;
        let catalog = self.engine.dataset().catalog();
        let precision = self.engine.settings().batch_precision;

        variables
            .iter()
            .map(|var| {
                Ok(VariableSeries {
                    var: var.clone(),
                    unit: catalog.unit_of(var).to_string(),
                    values: self.engine.extract(var, window, &point, precision)?,
                })
            })
            .collect()
    }
}
