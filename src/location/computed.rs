//! Computed field locations
//!
//! Each computed location is a small struct naming the fields it reads.

use super::{ComputedField, Resolver};
use crate::array::Array;
use crate::error::{Error, Result};
use crate::store::StorePath;
use chrono::Datelike;

/// Element-wise sum of several fields (e.g. two detector channels)
#[derive(Debug, Clone)]
pub struct ChannelSum {
    fields: Vec<String>,
}

impl ChannelSum {
    /// Sum of `fields`
    pub fn of(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl ComputedField for ChannelSum {
    fn describe(&self) -> String {
        format!("sum({})", self.fields.join(", "))
    }

    fn compute(&self, resolver: &Resolver<'_>) -> Result<Array> {
        let (first, rest) = self
            .fields
            .split_first()
            .ok_or_else(|| Error::Catalog("channel sum without inputs".to_string()))?;
        let mut total = resolver.resolve_field(first)?.map_f64(&|x| x);
        for name in rest {
            total = total.zip_with(&resolver.resolve_field(name)?, &|a, b| a + b)?;
        }
        Ok(total)
    }
}

/// Per record, the value referenced by the first non-zero 1-based index
///
/// Used to place profiles by the geolocation of their first wind result.
/// Records without any reference get NaN.
#[derive(Debug, Clone)]
pub struct FirstReferenced {
    index_field: String,
    value_field: String,
}

impl FirstReferenced {
    /// Look up `value_field` through the indices in `index_field`
    pub fn new(index_field: &str, value_field: &str) -> Self {
        Self {
            index_field: index_field.to_string(),
            value_field: value_field.to_string(),
        }
    }
}

impl ComputedField for FirstReferenced {
    fn describe(&self) -> String {
        format!("{}[first({})]", self.value_field, self.index_field)
    }

    fn compute(&self, resolver: &Resolver<'_>) -> Result<Array> {
        let ids = resolver.resolve_field(&self.index_field)?;
        let values = resolver.resolve_field(&self.value_field)?.to_f64_vec()?;

        let pick = |refs: Vec<i64>| {
            refs.into_iter()
                .find(|&id| id > 0)
                .and_then(|id| values.get(id as usize - 1).copied())
                .unwrap_or(f64::NAN)
        };

        let out = match &ids {
            Array::Nested(rows) => rows.iter().map(|row| pick(row.leaf_values_i64())).collect(),
            flat => flat.leaf_values_i64().into_iter().map(|id| pick(vec![id])).collect(),
        };
        Ok(Array::Float(out))
    }
}

/// Which quantity [`HorizontalWind`] derives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindComponent {
    /// `sqrt(u² + v²)`
    Speed,
    /// Meteorological direction in degrees, `atan2(u, v)` shifted to [0, 360]
    Direction,
}

/// Wind speed or direction from horizontal components
#[derive(Debug, Clone)]
pub struct HorizontalWind {
    u: String,
    v: String,
    component: WindComponent,
}

impl HorizontalWind {
    /// Derive `component` from the `u` and `v` fields
    pub fn new(u: &str, v: &str, component: WindComponent) -> Self {
        Self {
            u: u.to_string(),
            v: v.to_string(),
            component,
        }
    }
}

impl ComputedField for HorizontalWind {
    fn describe(&self) -> String {
        format!("{:?}({}, {})", self.component, self.u, self.v)
    }

    fn compute(&self, resolver: &Resolver<'_>) -> Result<Array> {
        let u = resolver.resolve_field(&self.u)?;
        let v = resolver.resolve_field(&self.v)?;
        match self.component {
            WindComponent::Speed => u.zip_with(&v, &|u, v| (u * u + v * v).sqrt()),
            WindComponent::Direction => u.zip_with(&v, &|u, v| u.atan2(v).to_degrees() + 180.0),
        }
    }
}

/// Surface albedo sampled from the monthly raster at each record's position
///
/// The raster month is taken from the middle of the product's sensing
/// period. Longitudes above 180° are wrapped into [-180, 180].
#[derive(Debug, Clone)]
pub struct AlbedoSample {
    lon_field: String,
    lat_field: String,
    sensing_start: StorePath,
    sensing_stop: StorePath,
}

impl AlbedoSample {
    /// Sample at (`lon_field`, `lat_field`) for the period between two scalar times
    pub fn new(
        lon_field: &str,
        lat_field: &str,
        sensing_start: impl Into<StorePath>,
        sensing_stop: impl Into<StorePath>,
    ) -> Self {
        Self {
            lon_field: lon_field.to_string(),
            lat_field: lat_field.to_string(),
            sensing_start: sensing_start.into(),
            sensing_stop: sensing_stop.into(),
        }
    }
}

impl ComputedField for AlbedoSample {
    fn describe(&self) -> String {
        format!("albedo({}, {})", self.lon_field, self.lat_field)
    }

    fn compute(&self, resolver: &Resolver<'_>) -> Result<Array> {
        let timestamp = |path: &StorePath| {
            resolver
                .store()
                .fetch_as_timestamp(path)
                .map_err(|e| match e {
                    crate::error::StoreError::NoSuchPath(p) => Error::NoSuchField {
                        field: self.describe(),
                        path: p,
                    },
                    other => Error::Store(other),
                })
        };
        let start = timestamp(&self.sensing_start)?;
        let stop = timestamp(&self.sensing_stop)?;
        let mean = start + (stop - start) / 2;

        let lons = resolver.resolve_field(&self.lon_field)?;
        let lats = resolver.resolve_field(&self.lat_field)?;
        let lon_values: Vec<f64> = lons
            .leaf_values_f64()
            .into_iter()
            .map(|lon| if lon > 180.0 { lon - 360.0 } else { lon })
            .collect();
        let lat_values = lats.leaf_values_f64();

        let sampled = resolver
            .raster()?
            .sample(mean.year(), mean.month(), &lon_values, &lat_values)?;
        lons.with_leaf_values(&mut sampled.into_iter())
    }
}
