//! NetCDF-backed chunk source.
//!
//! Reads hyperslabs of shape `[n, 1, 1]` straight from disk. The netCDF C
//! library is not thread-safe, so every read goes through one lock.

use netcdf::Extent;
use parking_lot::Mutex;
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::ChunkSource;
use crate::error::{IsobarError, Result};

pub struct NetCdfSource {
    path: PathBuf,
    file: Mutex<netcdf::File>,
}

impl NetCdfSource {
    /// Wrap an already opened file.
    pub fn new(path: &Path, file: netcdf::File) -> Self {
        Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkSource for NetCdfSource {
    fn read(
        &self,
        variable: &str,
        time: Range<usize>,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Vec<f32>> {
        let file = self.file.lock();
        let var = file
            .variable(variable)
            .ok_or_else(|| IsobarError::StorageIo {
                message: format!("Variable {} missing from {}", variable, self.path.display()),
            })?;

        let extents: [Extent; 3] = [time.clone().into(), lat_index.into(), lon_index.into()];
        var.get_values::<f32, _>(&extents[..])
            .map_err(|e| IsobarError::StorageIo {
                message: format!(
                    "Failed to read {}[{:?}, {}, {}] from {}: {}",
                    variable,
                    time,
                    lat_index,
                    lon_index,
                    self.path.display(),
                    e
                ),
            })
    }

    fn describe(&self) -> String {
        format!("netcdf {}", self.path.display())
    }
}
