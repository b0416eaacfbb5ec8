//! Single-point query engine.
//!
//! A query is answered in a fixed order: variable lookup, time parsing, time
//! window resolution, spatial resolution, chunk fetch, decoding. The first
//! failing step determines the error.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::{IsobarError, Result};
use crate::grid::GridPoint;
use crate::store::{CacheStats, ChunkStore, DEFAULT_CHUNK_STEPS};
use crate::time::{format_iso, parse_timestamp};

/// Default nearest-match tolerance, in coordinate units.
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Largest decimal count a [`Precision`] may round to. Beyond this `f64`
/// carries no further digits and the scale factor overflows.
pub const MAX_DECIMALS: u32 = 15;

/// Rounding applied to output values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Full,
    Decimals(u32),
}

impl Precision {
    pub fn from_decimals(decimals: Option<u32>) -> Self {
        decimals.map_or(Precision::Full, Precision::Decimals)
    }

    pub fn apply(self, value: f64) -> f64 {
        match self {
            Precision::Full => value,
            Precision::Decimals(d) => {
                let factor = 10f64.powi(d as i32);
                (value * factor).round() / factor
            }
        }
    }
}

/// Tunables for a [`QueryEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub chunk_steps: usize,
    pub cache_bytes: usize,
    pub tolerance: f64,
    pub single_precision: Precision,
    pub batch_precision: Precision,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_steps: DEFAULT_CHUNK_STEPS,
            cache_bytes: 256 * 1024 * 1024,
            tolerance: DEFAULT_TOLERANCE,
            single_precision: Precision::Full,
            batch_precision: Precision::Decimals(2),
        }
    }
}

/// One point, one variable, one time window.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub lat: f64,
    pub lon: f64,
    pub variable: String,
    pub start_time: String,
    pub hours: usize,
    pub interval: usize,
}

impl Query {
    pub fn new(lat: f64, lon: f64, variable: impl Into<String>, start_time: impl Into<String>) -> Self {
        Self {
            lat,
            lon,
            variable: variable.into(),
            start_time: start_time.into(),
            hours: 24,
            interval: 1,
        }
    }

    pub fn hours(mut self, hours: usize) -> Self {
        self.hours = hours;
        self
    }

    pub fn interval(mut self, interval: usize) -> Self {
        self.interval = interval;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeValue {
    pub time: String,
    /// `None` where the dataset holds its fill marker.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub variable: String,
    pub unit: String,
    /// The requested start, canonicalized.
    pub start_time: String,
    pub grid_point: GridPoint,
    pub values: Vec<TimeValue>,
}

/// A resolved, stride-sampled time window.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub first: usize,
    pub last: usize,
    pub offsets: Vec<usize>,
    pub timestamps: Vec<NaiveDateTime>,
}

pub struct QueryEngine {
    dataset: Arc<Dataset>,
    store: ChunkStore,
    settings: EngineSettings,
}

impl QueryEngine {
    pub fn new(dataset: Arc<Dataset>, settings: EngineSettings) -> Result<Self> {
        if !(settings.tolerance.is_finite() && settings.tolerance >= 0.0) {
            return Err(IsobarError::Config {
                message: format!("Invalid tolerance: {}", settings.tolerance),
            });
        }
        for precision in [settings.single_precision, settings.batch_precision] {
            if let Precision::Decimals(d) = precision {
                if d > MAX_DECIMALS {
                    return Err(IsobarError::Config {
                        message: format!("Precision of {} decimals exceeds {}", d, MAX_DECIMALS),
                    });
                }
            }
        }

        let store = ChunkStore::new(
            dataset.source(),
            dataset.grid().time.len(),
            settings.chunk_steps,
            settings.cache_bytes,
        )?;

        Ok(Self {
            dataset,
            store,
            settings,
        })
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.store.cache_stats()
    }

    /// Answer a single-point query, rounding per `single_precision`.
    pub fn query(&self, query: &Query) -> Result<QueryResult> {
        let catalog = self.dataset.catalog();
        if !catalog.exists(&query.variable) {
            return Err(IsobarError::UnknownVariable {
                requested: vec![query.variable.clone()],
                available: catalog.list_variables().into_iter().collect(),
            });
        }

        let window = self.resolve_window(&query.start_time, query.hours, query.interval)?;
        let point = self.resolve_point(query.lat, query.lon)?;
        let values = self.extract(&query.variable, &window, &point, self.settings.single_precision)?;

        debug!(
            variable = %query.variable,
            lat_index = point.lat_index,
            lon_index = point.lon_index,
            first = window.first,
            last = window.last,
            count = values.len(),
            "Point query resolved"
        );

        Ok(QueryResult {
            variable: query.variable.clone(),
            unit: catalog.unit_of(&query.variable).to_string(),
            start_time: format_iso(window.start),
            grid_point: point,
            values: window
                .timestamps
                .iter()
                .zip(values)
                .map(|(ts, value)| TimeValue {
                    time: format_iso(*ts),
                    value,
                })
                .collect(),
        })
    }

    /// Parse `start_time` and resolve `hours` grid steps from it, sampled every
    /// `interval` steps.
    pub fn resolve_window(&self, start_time: &str, hours: usize, interval: usize) -> Result<TimeWindow> {
        if hours < 1 {
            return Err(IsobarError::InvalidParameter {
                param: "hours".to_string(),
                message: "Hours must be at least 1".to_string(),
            });
        }
        if interval < 1 {
            return Err(IsobarError::InvalidParameter {
                param: "interval".to_string(),
                message: "Interval must be at least 1".to_string(),
            });
        }

        let start = parse_timestamp(start_time)?;
        let axis = &self.dataset.grid().time;

        let end = i32::try_from(hours - 1)
            .ok()
            .and_then(|steps| axis.step().checked_mul(steps))
            .and_then(|span| start.checked_add_signed(span))
            .ok_or_else(|| IsobarError::InvalidParameter {
                param: "hours".to_string(),
                message: format!("Hours value {} is too large", hours),
            })?;

        let grid = self.dataset.grid();
        let (first, last) = grid.resolve_time_range(start, end)?;
        let offsets = grid.resolve_time(first, last - first + 1, interval)?;
        let timestamps = offsets.iter().map(|&o| axis.timestamp(o)).collect();

        Ok(TimeWindow {
            start,
            first,
            last,
            offsets,
            timestamps,
        })
    }

    /// Snap a coordinate to the nearest grid point within tolerance.
    pub fn resolve_point(&self, lat: f64, lon: f64) -> Result<GridPoint> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(IsobarError::InvalidParameter {
                param: "lat/lon".to_string(),
                message: format!("Coordinates must be finite, got ({}, {})", lat, lon),
            });
        }

        self.dataset
            .grid()
            .resolve_nearest_spatial(lat, lon, self.settings.tolerance)
            .into_result(lat, lon)
    }

    /// Fetch and decode `variable` at `point` for every offset in `window`.
    pub fn extract(
        &self,
        variable: &str,
        window: &TimeWindow,
        point: &GridPoint,
        precision: Precision,
    ) -> Result<Vec<Option<f64>>> {
        let info = self
            .dataset
            .catalog()
            .get(variable)
            .ok_or_else(|| IsobarError::UnknownVariable {
                requested: vec![variable.to_string()],
                available: self.dataset.catalog().list_variables().into_iter().collect(),
            })?;

        let raw = self
            .store
            .fetch(variable, window.first..=window.last, point.lat_index, point.lon_index)?;

        Ok(window
            .offsets
            .iter()
            .map(|&offset| {
                info.decode(raw[offset - window.first])
                    .map(|value| precision.apply(value))
            })
            .collect())
    }
}
