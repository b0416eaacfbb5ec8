//! The immutable dataset handle.
//!
//! A `Dataset` is built once, shared behind an `Arc`, and never mutated.
//! Reloading means building a new one.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{VariableCatalog, VariableInfo};
use crate::error::Result;
use crate::grid::GridIndex;
use crate::store::ChunkSource;
use crate::time::format_iso;

pub struct Dataset {
    path: Option<PathBuf>,
    grid: GridIndex,
    catalog: VariableCatalog,
    source: Arc<dyn ChunkSource>,
}

/// Serializable description of a loaded dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub file_path: Option<String>,
    pub variables: Vec<VariableInfo>,
    pub time_start: String,
    pub time_end: String,
    pub time_step_seconds: i64,
    pub time_steps: usize,
    pub latitude: AxisSummary,
    pub longitude: AxisSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisSummary {
    pub name: String,
    pub size: usize,
    pub min: f64,
    pub max: f64,
}

impl Dataset {
    pub fn from_parts(
        grid: GridIndex,
        catalog: VariableCatalog,
        source: Arc<dyn ChunkSource>,
    ) -> Self {
        Self {
            path: None,
            grid,
            catalog,
            source,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Open a NetCDF file lazily: only axes and metadata are read here.
    #[cfg(feature = "netcdf")]
    pub fn open(path: &Path) -> Result<Self> {
        crate::data_loader::load_dataset(path)
    }

    #[cfg(not(feature = "netcdf"))]
    pub fn open(path: &Path) -> Result<Self> {
        Err(crate::error::IsobarError::Config {
            message: format!(
                "Cannot open {}: isobar was built without the netcdf feature",
                path.display()
            ),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn grid(&self) -> &GridIndex {
        &self.grid
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.catalog
    }

    pub fn source(&self) -> Arc<dyn ChunkSource> {
        Arc::clone(&self.source)
    }

    pub fn summary(&self) -> DatasetSummary {
        let axis = |axis: &crate::grid::SpatialAxis| {
            let (min, max) = axis.bounds();
            AxisSummary {
                name: axis.name().to_string(),
                size: axis.len(),
                min,
                max,
            }
        };

        DatasetSummary {
            file_path: self.path.as_ref().map(|p| p.display().to_string()),
            variables: self.catalog.iter().cloned().collect(),
            time_start: format_iso(self.grid.time.start()),
            time_end: format_iso(self.grid.time.end()),
            time_step_seconds: self.grid.time.step().num_seconds(),
            time_steps: self.grid.time.len(),
            latitude: axis(&self.grid.latitude),
            longitude: axis(&self.grid.longitude),
        }
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path)
            .field("grid", &self.grid)
            .field("catalog", &self.catalog)
            .field("source", &self.source.describe())
            .finish()
    }
}
