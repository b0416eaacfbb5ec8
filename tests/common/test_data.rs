//! Test data generation utilities.
//!
//! Writes small NetCDF files laid out like the ERA5-style datasets isobar
//! serves: `(time, latitude, longitude)` variables on an hourly axis with a
//! descending latitude coordinate.

use std::path::Path;

use netcdf::Error;
type Result<T> = std::result::Result<T, Error>;

pub const TIME_STEPS: usize = 217;
pub const LATITUDES: [f64; 3] = [31.0, 30.5, 30.0];
pub const LONGITUDES: [f64; 3] = [120.0, 120.5, 121.0];
pub const PACKED_FILL: i16 = -32767;

/// Expected `t2m` (K) at a grid cell.
pub fn t2m_value(t: usize, lat_index: usize, lon_index: usize) -> f64 {
    280.0 + 0.1 * t as f64 + lat_index as f64 + 0.01 * lon_index as f64
}

/// Expected decoded `tp6h` (mm) at a grid cell; `None` at the fill marker.
pub fn tp6h_value(t: usize, lat_index: usize, lon_index: usize) -> Option<f64> {
    if t == 0 && lat_index == 0 && lon_index == 0 {
        None
    } else {
        Some((t % 6) as f64 * 0.5)
    }
}

/// Expected `u10` at a grid cell. Odd steps carry three decimals, and every
/// value is exact in `f32`.
pub fn u10_value(t: usize, lat_index: usize, lon_index: usize) -> f64 {
    0.125 * t as f64 + (lat_index + lon_index) as f64
}

/// Creates an hourly 2025-06-01T00 .. 2025-06-10T00 weather file.
///
/// Variables:
/// - `t2m` (f32, units K)
/// - `u10` (f32, no units attribute)
/// - `tp6h` (i16 packed with scale 0.1, `_FillValue` at the first cell, units mm)
/// - `orography` (latitude, longitude), not a time series
pub fn create_test_weather_nc(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_dimension("time", TIME_STEPS)?;
    file.add_dimension("latitude", LATITUDES.len())?;
    file.add_dimension("longitude", LONGITUDES.len())?;
    file.add_attribute("title", "isobar integration test data")?;

    {
        let mut var = file.add_variable::<f64>("latitude", &["latitude"])?;
        var.put_attribute("units", "degrees_north")?;
        var.put_values(&LATITUDES[..], &[..])?;
    }
    {
        let mut var = file.add_variable::<f64>("longitude", &["longitude"])?;
        var.put_attribute("units", "degrees_east")?;
        var.put_values(&LONGITUDES[..], &[..])?;
    }
    {
        let hours: Vec<i32> = (0..TIME_STEPS as i32).collect();
        let mut var = file.add_variable::<i32>("time", &["time"])?;
        var.put_attribute("units", "hours since 2025-06-01 00:00:00")?;
        var.put_attribute("calendar", "gregorian")?;
        var.put_values(&hours, &[..])?;
    }

    let cells = |f: &dyn Fn(usize, usize, usize) -> f64| -> Vec<f64> {
        let mut values = Vec::with_capacity(TIME_STEPS * 9);
        for t in 0..TIME_STEPS {
            for y in 0..LATITUDES.len() {
                for x in 0..LONGITUDES.len() {
                    values.push(f(t, y, x));
                }
            }
        }
        values
    };

    {
        let data: Vec<f32> = cells(&t2m_value).into_iter().map(|v| v as f32).collect();
        let mut var = file.add_variable::<f32>("t2m", &["time", "latitude", "longitude"])?;
        var.put_attribute("units", "K")?;
        var.put_attribute("long_name", "2 metre temperature")?;
        var.put_values(&data, &[.., .., ..])?;
    }
    {
        let data: Vec<f32> = cells(&u10_value).into_iter().map(|v| v as f32).collect();
        let mut var = file.add_variable::<f32>("u10", &["time", "latitude", "longitude"])?;
        var.put_values(&data, &[.., .., ..])?;
    }
    {
        let data: Vec<i16> = cells(&|t, y, x| match tp6h_value(t, y, x) {
            Some(mm) => (mm * 10.0).round(),
            None => PACKED_FILL as f64,
        })
        .into_iter()
        .map(|v| v as i16)
        .collect();
        let mut var = file.add_variable::<i16>("tp6h", &["time", "latitude", "longitude"])?;
        var.put_attribute("units", "mm")?;
        var.put_attribute("_FillValue", PACKED_FILL)?;
        var.put_attribute("scale_factor", 0.1f32)?;
        var.put_attribute("add_offset", 0.0f32)?;
        var.put_values(&data, &[.., .., ..])?;
    }
    {
        let data = vec![5.0f32; LATITUDES.len() * LONGITUDES.len()];
        let mut var = file.add_variable::<f32>("orography", &["latitude", "longitude"])?;
        var.put_attribute("units", "m")?;
        var.put_values(&data, &[.., ..])?;
    }

    Ok(())
}
