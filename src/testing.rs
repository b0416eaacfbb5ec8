//! Shared in-memory fixtures for unit tests.

use chrono::{Duration, NaiveDate};
use ndarray::Array3;
use std::sync::Arc;

use crate::catalog::{VariableCatalog, VariableInfo};
use crate::dataset::Dataset;
use crate::engine::{EngineSettings, QueryEngine};
use crate::grid::{GridIndex, SpatialAxis, TimeAxis};
use crate::store::{ChunkSource, MemorySource};

pub const SAMPLE_STEPS: usize = 217;
pub const SAMPLE_FILL: f32 = -9999.0;

/// `t2m` at `(offset, lat, lon)`: `280 + offset / 2 + 10 * lat + lon`.
pub fn sample_t2m(offset: usize, lat_index: usize, lon_index: usize) -> f64 {
    280.0 + offset as f64 * 0.5 + 10.0 * lat_index as f64 + lon_index as f64
}

/// Hourly 2025-06-01T00 .. 2025-06-10T00 over a 3x3 grid with a descending
/// latitude axis. Variables: `t2m` (K), `tp6h` (mm, fill at offset 0 of the
/// first cell) and `u10` (no units).
pub fn sample_dataset() -> Arc<Dataset> {
    let shape = (SAMPLE_STEPS, 3, 3);
    let t2m = Array3::from_shape_fn(shape, |(t, y, x)| sample_t2m(t, y, x) as f32);
    let mut tp6h = Array3::from_shape_fn(shape, |(t, _, _)| (t % 6) as f32);
    tp6h[[0, 0, 0]] = SAMPLE_FILL;
    let u10 = Array3::from_shape_fn(shape, |(t, y, x)| (t + y + x) as f32 - 5.0);

    let source = MemorySource::new()
        .with_variable("t2m", t2m)
        .with_variable("tp6h", tp6h)
        .with_variable("u10", u10);

    let catalog = VariableCatalog::new([
        VariableInfo::new("t2m")
            .with_units("K")
            .with_long_name("2 metre temperature"),
        VariableInfo::new("tp6h")
            .with_units("mm")
            .with_fill_value(SAMPLE_FILL as f64),
        VariableInfo::new("u10"),
    ]);

    Arc::new(Dataset::from_parts(sample_grid(), catalog, Arc::new(source)))
}

/// The sample axes without any data.
pub fn sample_grid() -> GridIndex {
    let start = NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    let time = TimeAxis::new(start, Duration::hours(1), SAMPLE_STEPS).unwrap();
    let latitude = SpatialAxis::new("latitude", vec![31.0, 30.5, 30.0]).unwrap();
    let longitude = SpatialAxis::new("longitude", vec![120.0, 120.5, 121.0]).unwrap();
    GridIndex::new(time, latitude, longitude)
}

/// An engine over the sample grid backed by `source`, with default settings.
pub fn engine_over(source: Arc<dyn ChunkSource>, catalog: VariableCatalog) -> QueryEngine {
    let dataset = Dataset::from_parts(sample_grid(), catalog, source);
    QueryEngine::new(Arc::new(dataset), EngineSettings::default()).unwrap()
}

pub fn sample_engine() -> QueryEngine {
    QueryEngine::new(sample_dataset(), EngineSettings::default()).unwrap()
}
