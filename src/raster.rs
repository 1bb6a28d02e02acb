//! Monthly global rasters sampled at swath coordinates
//!
//! Used by computed fields such as the off-nadir surface albedo: a raster is
//! selected by year and month and sampled at nearest-pixel resolution.

use crate::error::{Error, RasterError, Result};
use std::collections::BTreeMap;

/// Samples a monthly raster at geographic coordinates
pub trait RasterSampler {
    /// Value at each `(lon, lat)` pair; longitudes in `[-180, 180]`
    fn sample(&self, year: i32, month: u32, lons: &[f64], lats: &[f64])
        -> std::result::Result<Vec<f64>, RasterError>;
}

/// Equirectangular global grid, row 0 at 90°N, column 0 at 180°W
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl Grid {
    /// Grid from row-major values
    pub fn new(width: usize, height: usize, values: Vec<f64>) -> Result<Self> {
        if width == 0 || height == 0 || values.len() != width * height {
            return Err(Error::Shape(format!(
                "{} values do not fill a {}x{} grid",
                values.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, values })
    }

    /// Grid filled with one value
    pub fn constant(width: usize, height: usize, value: f64) -> Result<Self> {
        Self::new(width, height, vec![value; width * height])
    }

    /// Nearest-pixel value; NaN coordinates yield NaN
    pub fn at(&self, lon: f64, lat: f64) -> f64 {
        if !lon.is_finite() || !lat.is_finite() {
            return f64::NAN;
        }
        let res_x = 360.0 / self.width as f64;
        let res_y = -180.0 / self.height as f64;
        let px = ((lon + 180.0) / res_x).round().clamp(0.0, (self.width - 1) as f64) as usize;
        let py = ((lat - 90.0) / res_y).round().clamp(0.0, (self.height - 1) as f64) as usize;
        self.values[py * self.width + px]
    }
}

/// In-memory set of monthly grids
#[derive(Debug, Clone, Default)]
pub struct GridRaster {
    grids: BTreeMap<(i32, u32), Grid>,
}

impl GridRaster {
    /// Empty raster set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the grid for one month
    pub fn with_month(mut self, year: i32, month: u32, grid: Grid) -> Self {
        self.grids.insert((year, month), grid);
        self
    }
}

impl RasterSampler for GridRaster {
    fn sample(
        &self,
        year: i32,
        month: u32,
        lons: &[f64],
        lats: &[f64],
    ) -> std::result::Result<Vec<f64>, RasterError> {
        if lons.len() != lats.len() {
            return Err(RasterError::CoordinateMismatch {
                lons: lons.len(),
                lats: lats.len(),
            });
        }
        let grid = self
            .grids
            .get(&(year, month))
            .ok_or(RasterError::NoCalibration { year, month })?;
        Ok(lons.iter().zip(lats).map(|(&lon, &lat)| grid.at(lon, lat)).collect())
    }
}
