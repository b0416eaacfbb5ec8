//! Variable catalog: names and per-variable decoding metadata.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{IsobarError, Result};

/// Unit reported for variables without a `units` attribute.
pub const UNKNOWN_UNIT: &str = "unknown";

/// Metadata attached to one data variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    pub units: Option<String>,
    pub long_name: Option<String>,
    /// `_FillValue` or `missing_value` marker in raw (packed) units.
    pub fill_value: Option<f64>,
    pub scale_factor: Option<f64>,
    pub add_offset: Option<f64>,
}

impl VariableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: None,
            long_name: None,
            fill_value: None,
            scale_factor: None,
            add_offset: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    pub fn with_fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    pub fn with_packing(mut self, scale_factor: f64, add_offset: f64) -> Self {
        self.scale_factor = Some(scale_factor);
        self.add_offset = Some(add_offset);
        self
    }

    /// Decode a raw stored value. Fill markers and NaN become `None`.
    pub fn decode(&self, raw: f32) -> Option<f64> {
        let raw = raw as f64;
        if raw.is_nan() {
            return None;
        }
        if let Some(fill) = self.fill_value {
            // Fill values are compared at f32 precision, the width of the stored data.
            if (fill as f32) == (raw as f32) {
                return None;
            }
        }
        Some(raw * self.scale_factor.unwrap_or(1.0) + self.add_offset.unwrap_or(0.0))
    }
}

/// Enumerates the data variables of a dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableCatalog {
    variables: BTreeMap<String, VariableInfo>,
}

impl VariableCatalog {
    pub fn new(variables: impl IntoIterator<Item = VariableInfo>) -> Self {
        Self {
            variables: variables
                .into_iter()
                .map(|info| (info.name.clone(), info))
                .collect(),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.get(name)
    }

    /// Physical unit, or `"unknown"` if the variable carries none.
    pub fn unit_of(&self, name: &str) -> &str {
        self.variables
            .get(name)
            .and_then(|info| info.units.as_deref())
            .unwrap_or(UNKNOWN_UNIT)
    }

    pub fn list_variables(&self) -> BTreeSet<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableInfo> {
        self.variables.values()
    }

    /// Fail with every unknown name in `names`, in request order.
    pub fn require_all<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let missing: Vec<String> = names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !self.exists(name))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IsobarError::UnknownVariable {
                requested: missing,
                available: self.list_variables().into_iter().collect(),
            })
        }
    }
}
