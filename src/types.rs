//! Core filter types and store time conversion

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filters keyed by catalog field name
pub type Filters = BTreeMap<String, Filter>;

/// Requested output fields keyed by level name
pub type FieldSelection = BTreeMap<String, Vec<String>>;

// =============================================================================
// Store time
// =============================================================================

/// Epoch of the store's internal time scale (2000-01-01T00:00:00Z)
pub fn store_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Convert a UTC datetime to seconds since the store epoch
pub fn to_store_time(t: &DateTime<Utc>) -> f64 {
    let delta = t.signed_duration_since(store_epoch());
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Convert seconds since the store epoch to a UTC datetime
///
/// Returns `None` for non-finite or out-of-range values.
pub fn from_store_time(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let micros = (seconds * 1e6).round();
    if micros.abs() > i64::MAX as f64 {
        return None;
    }
    store_epoch().checked_add_signed(Duration::microseconds(micros as i64))
}

// =============================================================================
// Filters
// =============================================================================

/// One side of a range filter
///
/// Deserializes from a JSON/TOML number or an RFC 3339 timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    /// Plain numeric bound in the field's unit
    Value(f64),
    /// Time bound, compared in store time
    Time(DateTime<Utc>),
}

impl Bound {
    /// Bound on the store's numeric scale
    pub fn normalized(&self) -> f64 {
        match self {
            Bound::Value(v) => *v,
            Bound::Time(t) => to_store_time(t),
        }
    }
}

impl From<f64> for Bound {
    fn from(v: f64) -> Self {
        Bound::Value(v)
    }
}

impl From<DateTime<Utc>> for Bound {
    fn from(t: DateTime<Utc>) -> Self {
        Bound::Time(t)
    }
}

/// Inclusive range filter on one field
///
/// `min == max` selects exact matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Bound>,

    /// Upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Bound>,

    /// Treat `min` as exclusive (set when attributing overlap boundaries)
    #[serde(skip)]
    pub min_exclusive: bool,
}

impl Filter {
    /// Filter with both bounds
    pub fn range(min: impl Into<Bound>, max: impl Into<Bound>) -> Self {
        Self {
            min: Some(min.into()),
            max: Some(max.into()),
            min_exclusive: false,
        }
    }

    /// Filter with a lower bound only
    pub fn at_least(min: impl Into<Bound>) -> Self {
        Self {
            min: Some(min.into()),
            ..Self::default()
        }
    }

    /// Filter with an upper bound only
    pub fn at_most(max: impl Into<Bound>) -> Self {
        Self {
            max: Some(max.into()),
            ..Self::default()
        }
    }

    /// Exact-match filter
    pub fn equal(value: impl Into<Bound>) -> Self {
        let value = value.into();
        Self::range(value, value)
    }

    /// Reject filters without any bound
    pub fn validate(&self, field: &str) -> Result<()> {
        if self.min.is_none() && self.max.is_none() {
            return Err(Error::InvalidFilterSpec {
                field: field.to_string(),
            });
        }
        Ok(())
    }

    /// Lower the upper bound to `stop`, inserting it if absent
    pub fn tighten_max(&mut self, stop: Bound) {
        self.max = match self.max {
            Some(existing) if existing.normalized() <= stop.normalized() => Some(existing),
            _ => Some(stop),
        };
    }

    /// Raise the lower bound to an exclusive `floor`
    ///
    /// An existing lower bound above `floor` is kept as it is.
    pub fn raise_floor_exclusive(&mut self, floor: Bound) {
        match self.min {
            Some(existing) if existing.normalized() > floor.normalized() => {},
            _ => {
                self.min = Some(floor);
                self.min_exclusive = true;
            },
        }
    }
}
