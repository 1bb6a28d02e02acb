//! Mask algebra
//!
//! Masks are boolean vectors aligned with one level's record axis. They are
//! built from range filters and combined with logical AND; the final mask of
//! a level becomes a [`Selection`] of record indices.

use crate::array::Array;
use crate::error::{Error, Result};
use crate::types::Filter;
use serde::{Deserialize, Serialize};

/// Boolean record selection for one level
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Mask(Vec<bool>);

impl Mask {
    /// Mask from explicit flags
    pub fn new(flags: Vec<bool>) -> Self {
        Self(flags)
    }

    /// Mask selecting every record
    pub fn all(len: usize) -> Self {
        Self(vec![true; len])
    }

    /// Mask selecting no record
    pub fn none(len: usize) -> Self {
        Self(vec![false; len])
    }

    /// Number of records covered
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the mask covers no records
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flag of record `i`
    pub fn get(&self, i: usize) -> bool {
        self.0.get(i).copied().unwrap_or(false)
    }

    /// Number of selected records
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    /// Indices of selected records, ascending
    pub fn selected_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| b.then_some(i))
            .collect()
    }

    /// Raw flags
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

/// Evaluate a range filter over one level's data
///
/// With `is_array`, every record holds several samples and is selected
/// when any of them matches. NaN samples never match.
pub fn make_mask(data: &Array, filter: &Filter, is_array: bool) -> Result<Mask> {
    if filter.min.is_none() && filter.max.is_none() {
        return Err(Error::InvalidFilterSpec {
            field: "<unnamed>".to_string(),
        });
    }

    let min = filter.min.map(|b| b.normalized());
    let max = filter.max.map(|b| b.normalized());
    let exclusive = filter.min_exclusive;

    let matches = move |x: f64| -> bool {
        match (min, max) {
            (Some(lo), Some(hi)) if lo == hi && !exclusive => x == lo,
            _ => {
                let above = match min {
                    Some(lo) if exclusive => x > lo,
                    Some(lo) => x >= lo,
                    None => !x.is_nan(),
                };
                let below = match max {
                    Some(hi) => x <= hi,
                    None => !x.is_nan(),
                };
                above && below
            },
        }
    };

    if is_array {
        let flags = match data {
            Array::Nested(records) => records
                .iter()
                .map(|record| record.leaf_values_f64().into_iter().any(matches))
                .collect(),
            flat => flat.to_f64_vec()?.into_iter().map(matches).collect(),
        };
        return Ok(Mask(flags));
    }

    Ok(Mask(data.to_f64_vec()?.into_iter().map(matches).collect()))
}

/// AND of two masks; a missing second mask leaves the first unchanged
pub fn combine_mask(mask: Mask, other: Option<Mask>) -> Result<Mask> {
    let Some(other) = other else {
        return Ok(mask);
    };
    if mask.len() != other.len() {
        return Err(Error::Shape(format!(
            "cannot combine masks of {} and {} records",
            mask.len(),
            other.len()
        )));
    }
    Ok(Mask(mask.0.iter().zip(&other.0).map(|(&a, &b)| a && b).collect()))
}

/// Records chosen on one level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// No filter applied, keep every record
    All,
    /// Keep these records, in this order
    Indices(Vec<usize>),
}

impl Selection {
    /// Selection from an optional level mask
    pub fn from_mask(mask: Option<&Mask>) -> Self {
        match mask {
            None => Selection::All,
            Some(mask) => Selection::Indices(mask.selected_indices()),
        }
    }

    /// Subset the outer axis of `data`
    pub fn apply(&self, data: Array) -> Result<Array> {
        match self {
            Selection::All => Ok(data),
            Selection::Indices(indices) => data.take(indices),
        }
    }
}
