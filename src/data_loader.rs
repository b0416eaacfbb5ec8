//! NetCDF dataset loading.
//!
//! Only coordinate axes and variable attributes are read at load time. Data
//! values stay on disk and are pulled chunk by chunk through a
//! [`NetCdfSource`].

use chrono::NaiveDateTime;
use netcdf::{Attribute, AttributeValue as NcAttributeValue, Variable as NetCDFVariable};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{VariableCatalog, VariableInfo};
use crate::dataset::Dataset;
use crate::error::{IsobarError, Result};
use crate::grid::{GridIndex, SpatialAxis, TimeAxis};
use crate::store::NetCdfSource;
use crate::time::{decode_cf_time, parse_cf_time_units};

const TIME_NAMES: &[&str] = &["time", "valid_time"];
const LATITUDE_NAMES: &[&str] = &["latitude", "lat"];
const LONGITUDE_NAMES: &[&str] = &["longitude", "lon"];

/// Open a NetCDF file and build a dataset handle over it.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    if !path.exists() {
        return Err(IsobarError::DatasetNotFound {
            path: path.display().to_string(),
        });
    }

    let file = netcdf::open(path)?;
    info!("Opened NetCDF file: {}", path.display());

    let time_name = find_dimension(&file, TIME_NAMES)?;
    let lat_name = find_dimension(&file, LATITUDE_NAMES)?;
    let lon_name = find_dimension(&file, LONGITUDE_NAMES)?;
    debug!(
        time = %time_name,
        latitude = %lat_name,
        longitude = %lon_name,
        "Resolved grid dimensions"
    );

    let time = read_time_axis(&file, &time_name)?;
    let latitude = SpatialAxis::new(lat_name.clone(), read_coordinate(&file, &lat_name)?)?;
    let longitude = SpatialAxis::new(lon_name.clone(), read_coordinate(&file, &lon_name)?)?;

    let catalog = extract_catalog(&file, [time_name.as_str(), lat_name.as_str(), lon_name.as_str()])?;
    if catalog.is_empty() {
        return Err(IsobarError::InvalidDataset {
            message: format!(
                "No variables with dimensions ({}, {}, {}) in {}",
                time_name,
                lat_name,
                lon_name,
                path.display()
            ),
        });
    }

    let grid = GridIndex::new(time, latitude, longitude);
    let source = NetCdfSource::new(path, file);

    Ok(Dataset::from_parts(grid, catalog, Arc::new(source)).with_path(path))
}

/// First dimension name from `aliases` present in the file.
fn find_dimension(file: &netcdf::File, aliases: &[&str]) -> Result<String> {
    aliases
        .iter()
        .find(|name| file.dimension(name).is_some())
        .map(|name| name.to_string())
        .ok_or_else(|| IsobarError::InvalidDataset {
            message: format!("None of the dimensions {:?} found", aliases),
        })
}

fn read_coordinate(file: &netcdf::File, name: &str) -> Result<Vec<f64>> {
    match file.variable(name) {
        Some(var) => Ok(var.get_values::<f64, _>(&[] as &[netcdf::Extent])?),
        None => Err(IsobarError::InvalidDataset {
            message: format!("Coordinate variable {} is missing", name),
        }),
    }
}

fn read_time_axis(file: &netcdf::File, name: &str) -> Result<TimeAxis> {
    let var = file
        .variable(name)
        .ok_or_else(|| IsobarError::InvalidDataset {
            message: format!("Time coordinate variable {} is missing", name),
        })?;

    let units = match var.attribute("units").map(|attr| attr.value()) {
        Some(Ok(NcAttributeValue::Str(units))) => units,
        _ => {
            return Err(IsobarError::InvalidDataset {
                message: format!("Time variable {} has no textual 'units' attribute", name),
            })
        }
    };
    let (unit, epoch) = parse_cf_time_units(&units)?;

    let raw = var.get_values::<f64, _>(&[] as &[netcdf::Extent])?;
    let timestamps = raw
        .iter()
        .map(|&value| decode_cf_time(value, unit, epoch))
        .collect::<Result<Vec<NaiveDateTime>>>()?;

    TimeAxis::from_timestamps(&timestamps)
}

/// Collect every variable laid out exactly as `(time, latitude, longitude)`.
fn extract_catalog(file: &netcdf::File, grid_dims: [&str; 3]) -> Result<VariableCatalog> {
    let mut variables = Vec::new();

    for var in file.variables() {
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
        if dims.iter().map(String::as_str).ne(grid_dims.iter().copied()) {
            debug!(variable = %var.name(), dims = ?dims, "Skipping non-grid variable");
            continue;
        }

        variables.push(variable_info(&var)?);
    }

    Ok(VariableCatalog::new(variables))
}

fn variable_info(var: &NetCDFVariable) -> Result<VariableInfo> {
    let mut info = VariableInfo::new(var.name());

    info.units = text_attribute(var, "units")?;
    info.long_name = text_attribute(var, "long_name")?;
    info.fill_value = match numeric_attribute(var, "_FillValue")? {
        Some(fill) => Some(fill),
        None => numeric_attribute(var, "missing_value")?,
    };
    info.scale_factor = numeric_attribute(var, "scale_factor")?;
    info.add_offset = numeric_attribute(var, "add_offset")?;

    Ok(info)
}

fn text_attribute(var: &NetCDFVariable, name: &str) -> Result<Option<String>> {
    Ok(match var.attribute(name) {
        Some(attr) => match attr.value()? {
            NcAttributeValue::Str(s) => Some(s),
            other => {
                warn!(variable = %var.name(), attribute = name, value = ?other, "Ignoring non-text attribute");
                None
            }
        },
        None => None,
    })
}

fn numeric_attribute(var: &NetCDFVariable, name: &str) -> Result<Option<f64>> {
    match var.attribute(name) {
        Some(attr) => convert_number(&attr),
        None => Ok(None),
    }
}

/// Convert a scalar (or first element of a vector) numeric attribute to f64.
fn convert_number(attr: &Attribute) -> Result<Option<f64>> {
    let value = match attr.value()? {
        NcAttributeValue::Uchar(v) => v as f64,
        NcAttributeValue::Schar(v) => v as f64,
        NcAttributeValue::Short(v) => v as f64,
        NcAttributeValue::Ushort(v) => v as f64,
        NcAttributeValue::Int(v) => v as f64,
        NcAttributeValue::Uint(v) => v as f64,
        NcAttributeValue::Float(v) => v as f64,
        NcAttributeValue::Double(v) => v,
        NcAttributeValue::Shorts(v) => match v.first() {
            Some(x) => *x as f64,
            None => return Ok(None),
        },
        NcAttributeValue::Floats(v) => match v.first() {
            Some(x) => *x as f64,
            None => return Ok(None),
        },
        NcAttributeValue::Doubles(v) => match v.first() {
            Some(x) => *x,
            None => return Ok(None),
        },
        other => {
            warn!(attribute = %attr.name(), value = ?other, "Ignoring non-numeric attribute");
            return Ok(None);
        }
    };
    Ok(Some(value))
}

/// Create a test NetCDF file with an hourly 2025-06-01..2025-06-03 axis.
#[cfg(test)]
pub(crate) fn create_test_netcdf_file(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_dimension("time", 49)?;
    file.add_dimension("latitude", 3)?;
    file.add_dimension("longitude", 4)?;
    file.add_attribute("title", "isobar test file")?;

    {
        let mut var = file.add_variable::<f64>("latitude", &["latitude"])?;
        var.put_attribute("units", "degrees_north")?;
        var.put_values(&[31.0, 30.5, 30.0], &[..])?;
    }
    {
        let mut var = file.add_variable::<f64>("longitude", &["longitude"])?;
        var.put_attribute("units", "degrees_east")?;
        var.put_values(&[120.0, 120.5, 121.0, 121.5], &[..])?;
    }
    {
        let hours: Vec<f64> = (0..49).map(|h| h as f64).collect();
        let mut var = file.add_variable::<f64>("time", &["time"])?;
        var.put_attribute("units", "hours since 2025-06-01 00:00:00")?;
        var.put_values(&hours, &[..])?;
    }
    {
        let data: Vec<f32> = (0..49 * 3 * 4).map(|i| 250.0 + i as f32 * 0.01).collect();
        let mut var = file.add_variable::<f32>("t2m", &["time", "latitude", "longitude"])?;
        var.put_attribute("units", "K")?;
        var.put_attribute("long_name", "2 metre temperature")?;
        var.put_values(&data, &[.., .., ..])?;
    }
    {
        let mut data = vec![1i16; 49 * 3 * 4];
        data[0] = -32767;
        let mut var = file.add_variable::<i16>("tp6h", &["time", "latitude", "longitude"])?;
        var.put_attribute("_FillValue", -32767i16)?;
        var.put_attribute("scale_factor", 0.5f64)?;
        var.put_attribute("add_offset", 1.0f64)?;
        var.put_values(&data, &[.., .., ..])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_file_not_found() {
        match load_dataset(Path::new("/nonexistent/file.nc")) {
            Err(IsobarError::DatasetNotFound { path }) => assert_eq!(path, "/nonexistent/file.nc"),
            other => panic!("Expected DatasetNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_axes_and_catalog() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.nc");
        create_test_netcdf_file(&file_path)?;

        let dataset = load_dataset(&file_path)?;
        let grid = dataset.grid();

        assert_eq!(grid.time.len(), 49);
        assert_eq!(grid.time.step(), Duration::hours(1));
        assert_eq!(
            crate::time::format_iso(grid.time.end()),
            "2025-06-03T00:00:00"
        );
        assert_eq!(grid.latitude.values(), &[31.0, 30.5, 30.0]);
        assert_eq!(grid.longitude.len(), 4);

        let catalog = dataset.catalog();
        assert_eq!(
            catalog.list_variables().into_iter().collect::<Vec<_>>(),
            vec!["t2m".to_string(), "tp6h".to_string()]
        );
        assert_eq!(catalog.unit_of("t2m"), "K");
        assert_eq!(catalog.unit_of("tp6h"), "unknown");

        let tp = catalog.get("tp6h").unwrap();
        assert_eq!(tp.fill_value, Some(-32767.0));
        assert_eq!(tp.scale_factor, Some(0.5));
        assert_eq!(tp.add_offset, Some(1.0));

        Ok(())
    }

    #[test]
    fn test_source_reads_time_series() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.nc");
        create_test_netcdf_file(&file_path)?;

        let dataset = load_dataset(&file_path)?;
        let values = dataset.source().read("t2m", 0..3, 1, 2)?;

        // flat index = t * 12 + lat * 4 + lon
        let expected: Vec<f32> = (0..3).map(|t| 250.0 + (t * 12 + 6) as f32 * 0.01).collect();
        assert_eq!(values, expected);

        let packed = dataset.source().read("tp6h", 0..2, 0, 0)?;
        assert_eq!(packed, vec![-32767.0, 1.0]);

        Ok(())
    }

    #[test]
    fn test_fill_valued_time_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("bad_time.nc");
        {
            let mut file = netcdf::create(&file_path)?;
            file.add_dimension("time", 3)?;
            file.add_dimension("latitude", 1)?;
            file.add_dimension("longitude", 1)?;
            file.add_variable::<f64>("latitude", &["latitude"])?
                .put_values(&[30.0], &[..])?;
            file.add_variable::<f64>("longitude", &["longitude"])?
                .put_values(&[120.0], &[..])?;
            let mut time = file.add_variable::<f64>("time", &["time"])?;
            time.put_attribute("units", "hours since 2025-06-01 00:00:00")?;
            time.put_values(&[0.0, 1.0, 9.96921e36], &[..])?;
        }

        match load_dataset(&file_path) {
            Err(IsobarError::InvalidDataset { message }) => {
                assert!(message.contains("not a representable instant"), "{}", message)
            }
            other => panic!("Expected InvalidDataset, got {:?}", other.map(|_| ())),
        }

        Ok(())
    }
}
