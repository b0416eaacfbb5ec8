//! In-memory chunk source backed by `ndarray`.
//!
//! Useful for embedding small datasets and for tests. Arrays are indexed
//! `[time, latitude, longitude]`.

use ndarray::{s, Array3};
use std::collections::HashMap;
use std::ops::Range;

use super::ChunkSource;
use crate::error::{IsobarError, Result};

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    variables: HashMap<String, Array3<f32>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Array3<f32>) {
        self.variables.insert(name.into(), data);
    }

    pub fn with_variable(mut self, name: impl Into<String>, data: Array3<f32>) -> Self {
        self.insert(name, data);
        self
    }
}

impl ChunkSource for MemorySource {
    fn read(
        &self,
        variable: &str,
        time: Range<usize>,
        lat_index: usize,
        lon_index: usize,
    ) -> Result<Vec<f32>> {
        let array = self
            .variables
            .get(variable)
            .ok_or_else(|| IsobarError::StorageIo {
                message: format!("Variable {} is not stored", variable),
            })?;

        let (nt, ny, nx) = array.dim();
        if time.end > nt || time.start > time.end || lat_index >= ny || lon_index >= nx {
            return Err(IsobarError::StorageIo {
                message: format!(
                    "Read of {}[{:?}, {}, {}] is outside shape ({}, {}, {})",
                    variable, time, lat_index, lon_index, nt, ny, nx
                ),
            });
        }

        Ok(array.slice(s![time, lat_index, lon_index]).to_vec())
    }

    fn describe(&self) -> String {
        format!("memory ({} variables)", self.variables.len())
    }
}
