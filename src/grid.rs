//! Grid index: maps coordinates onto integer offsets along each axis.
//!
//! The time axis is regular, so offsets are computed arithmetically. Spatial
//! axes only need to be strictly monotonic (ascending or descending) and are
//! searched with a binary search.
//!
//! ## Nearest-match tie-break
//!
//! When a coordinate sits exactly halfway between two grid values, the value
//! with the lower index on that axis wins. For a descending latitude axis this
//! is the larger latitude.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::error::{IsobarError, Result};
use crate::time::format_iso;

/// Regular, strictly increasing time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    start: NaiveDateTime,
    step: Duration,
    len: usize,
}

impl TimeAxis {
    /// Create an axis from its first timestamp, step and length.
    pub fn new(start: NaiveDateTime, step: Duration, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(IsobarError::InvalidDataset {
                message: "Time axis is empty".to_string(),
            });
        }
        if step <= Duration::zero() {
            return Err(IsobarError::InvalidDataset {
                message: format!("Time step must be positive, got {}", step),
            });
        }
        Ok(Self { start, step, len })
    }

    /// Build an axis from decoded timestamps, checking that they are evenly spaced.
    ///
    /// A single timestamp gets a nominal one-hour step.
    pub fn from_timestamps(timestamps: &[NaiveDateTime]) -> Result<Self> {
        let first = *timestamps.first().ok_or_else(|| IsobarError::InvalidDataset {
            message: "Time axis is empty".to_string(),
        })?;

        if timestamps.len() == 1 {
            return Self::new(first, Duration::hours(1), 1);
        }

        let step = timestamps[1] - timestamps[0];
        for (i, pair) in timestamps.windows(2).enumerate() {
            if pair[1] - pair[0] != step {
                return Err(IsobarError::InvalidDataset {
                    message: format!(
                        "Time axis is not regular: step between offsets {} and {} is {}, expected {}",
                        i,
                        i + 1,
                        pair[1] - pair[0],
                        step
                    ),
                });
            }
        }

        Self::new(first, step, timestamps.len())
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.timestamp(self.len - 1)
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Timestamp at `offset`. Offsets past the end extrapolate along the step.
    pub fn timestamp(&self, offset: usize) -> NaiveDateTime {
        self.start + self.step * offset as i32
    }

    /// Resolve the inclusive window `[start, end]` to the first and last grid
    /// offsets falling inside it.
    pub fn resolve_range(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<(usize, usize)> {
        if end < start {
            return Err(IsobarError::InvalidParameter {
                param: "hours".to_string(),
                message: format!(
                    "Window end {} precedes start {}",
                    format_iso(end),
                    format_iso(start)
                ),
            });
        }

        if start < self.start || end > self.end() {
            return Err(IsobarError::OutOfRange {
                start: format_iso(start),
                end: format_iso(end),
                dataset_start: format_iso(self.start),
                dataset_end: format_iso(self.end()),
            });
        }

        let step_ms = self.step.num_milliseconds();
        let from_ms = (start - self.start).num_milliseconds();
        let to_ms = (end - self.start).num_milliseconds();

        // First grid point at or after `start`, last at or before `end`.
        let first = ((from_ms + step_ms - 1) / step_ms) as usize;
        let last = (to_ms / step_ms) as usize;

        if first > last {
            return Err(IsobarError::InvalidParameter {
                param: "time".to_string(),
                message: format!(
                    "No time steps between {} and {}",
                    format_iso(start),
                    format_iso(end)
                ),
            });
        }

        Ok((first, last))
    }

    /// Offsets `first, first + stride, ...` within the `count` steps starting at `first`.
    pub fn resolve_offsets(&self, first: usize, count: usize, stride: usize) -> Result<Vec<usize>> {
        if stride < 1 {
            return Err(IsobarError::InvalidParameter {
                param: "interval".to_string(),
                message: "Interval must be at least 1".to_string(),
            });
        }
        if count == 0 || first + count > self.len {
            return Err(IsobarError::InvalidParameter {
                param: "hours".to_string(),
                message: format!(
                    "Cannot take {} steps from offset {} of a {}-step axis",
                    count, first, self.len
                ),
            });
        }

        Ok((first..first + count).step_by(stride).collect())
    }
}

/// Strictly monotonic coordinate axis (latitude or longitude).
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialAxis {
    name: String,
    values: Vec<f64>,
    descending: bool,
}

impl SpatialAxis {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();

        if values.is_empty() {
            return Err(IsobarError::InvalidDataset {
                message: format!("Axis {} is empty", name),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(IsobarError::InvalidDataset {
                message: format!("Axis {} contains non-finite values", name),
            });
        }

        let descending = values.len() > 1 && values[1] < values[0];
        let monotonic = values.windows(2).all(|pair| {
            if descending {
                pair[1] < pair[0]
            } else {
                pair[1] > pair[0]
            }
        });
        if !monotonic {
            return Err(IsobarError::InvalidDataset {
                message: format!("Axis {} is not strictly monotonic", name),
            });
        }

        Ok(Self {
            name,
            values,
            descending,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest and largest coordinate, regardless of axis direction.
    pub fn bounds(&self) -> (f64, f64) {
        let first = self.values[0];
        let last = self.values[self.values.len() - 1];
        (first.min(last), first.max(last))
    }

    /// Index of the nearest coordinate and its absolute distance to `value`.
    pub fn nearest(&self, value: f64) -> (usize, f64) {
        let split = if self.descending {
            self.values.partition_point(|v| *v > value)
        } else {
            self.values.partition_point(|v| *v < value)
        };

        let lower = split.checked_sub(1);
        let upper = (split < self.values.len()).then_some(split);

        let distance = |i: usize| (self.values[i] - value).abs();
        let index = match (lower, upper) {
            (Some(l), Some(u)) if distance(u) < distance(l) => u,
            (Some(l), _) => l,
            (None, Some(u)) => u,
            (None, None) => unreachable!("axis is never empty"),
        };

        (index, distance(index))
    }
}

/// A resolved grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPoint {
    pub lat_index: usize,
    pub lon_index: usize,
    pub latitude: f64,
    pub longitude: f64,
}

/// Outcome of a nearest-neighbor lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialResolution {
    /// Both axes had a coordinate within tolerance.
    Matched(GridPoint),
    /// The nearest coordinate on `axis` is farther than the tolerance.
    OutOfTolerance {
        axis: String,
        nearest: f64,
        distance: f64,
        tolerance: f64,
    },
}

impl SpatialResolution {
    /// Convert into a result, attaching the queried coordinates to the failure.
    pub fn into_result(self, lat: f64, lon: f64) -> Result<GridPoint> {
        match self {
            SpatialResolution::Matched(point) => Ok(point),
            SpatialResolution::OutOfTolerance {
                axis,
                nearest,
                distance,
                tolerance,
            } => Err(IsobarError::LocationOutOfBounds {
                lat,
                lon,
                message: format!(
                    "nearest {} grid value {} is {:.4} away (tolerance {})",
                    axis, nearest, distance, tolerance
                ),
            }),
        }
    }
}

/// The three axes of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct GridIndex {
    pub time: TimeAxis,
    pub latitude: SpatialAxis,
    pub longitude: SpatialAxis,
}

impl GridIndex {
    pub fn new(time: TimeAxis, latitude: SpatialAxis, longitude: SpatialAxis) -> Self {
        Self {
            time,
            latitude,
            longitude,
        }
    }

    /// See [`TimeAxis::resolve_offsets`].
    pub fn resolve_time(&self, first: usize, count: usize, stride: usize) -> Result<Vec<usize>> {
        self.time.resolve_offsets(first, count, stride)
    }

    /// See [`TimeAxis::resolve_range`].
    pub fn resolve_time_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(usize, usize)> {
        self.time.resolve_range(start, end)
    }

    /// Snap `(lat, lon)` to the nearest grid point. Tolerance is checked per axis.
    pub fn resolve_nearest_spatial(&self, lat: f64, lon: f64, tolerance: f64) -> SpatialResolution {
        let (lat_index, lat_distance) = self.latitude.nearest(lat);
        if lat_distance > tolerance {
            return SpatialResolution::OutOfTolerance {
                axis: self.latitude.name().to_string(),
                nearest: self.latitude.values()[lat_index],
                distance: lat_distance,
                tolerance,
            };
        }

        let (lon_index, lon_distance) = self.longitude.nearest(lon);
        if lon_distance > tolerance {
            return SpatialResolution::OutOfTolerance {
                axis: self.longitude.name().to_string(),
                nearest: self.longitude.values()[lon_index],
                distance: lon_distance,
                tolerance,
            };
        }

        SpatialResolution::Matched(GridPoint {
            lat_index,
            lon_index,
            latitude: self.latitude.values()[lat_index],
            longitude: self.longitude.values()[lon_index],
        })
    }
}
