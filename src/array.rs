//! Numeric arrays returned by product stores
//!
//! An [`Array`] is either a flat run of integers or floats, or a nested list
//! with one child per record. Children may be ragged (variable-length axes
//! the way hierarchical products store them) and may nest further.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Element type of stored values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 64-bit signed integer
    I64,
    /// 64-bit IEEE float
    F64,
}

impl DType {
    /// Size of one element in bytes
    pub fn item_size(&self) -> usize {
        8
    }
}

/// Possibly nested numeric data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Array {
    /// Flat integers
    Int(Vec<i64>),
    /// Flat floats
    Float(Vec<f64>),
    /// One child array per record
    Nested(Vec<Array>),
}

impl Default for Array {
    fn default() -> Self {
        Array::Float(Vec::new())
    }
}

impl Array {
    /// Number of records on the outer axis
    pub fn len(&self) -> usize {
        match self {
            Array::Int(v) => v.len(),
            Array::Float(v) => v.len(),
            Array::Nested(v) => v.len(),
        }
    }

    /// True if the outer axis is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if every record holds a child array
    pub fn is_nested(&self) -> bool {
        matches!(self, Array::Nested(_))
    }

    /// Number of nesting levels (1 for flat data)
    pub fn depth(&self) -> usize {
        match self {
            Array::Nested(children) => 1 + children.iter().map(Array::depth).max().unwrap_or(1),
            _ => 1,
        }
    }

    /// Element type of the leaves, if any leaf exists
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Array::Int(_) => Some(DType::I64),
            Array::Float(_) => Some(DType::F64),
            Array::Nested(children) => children.iter().find_map(Array::dtype),
        }
    }

    /// Value at `index` of a flat array, as a float
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Array::Int(v) => v.get(index).map(|&x| x as f64),
            Array::Float(v) => v.get(index).copied(),
            Array::Nested(_) => None,
        }
    }

    /// First leaf value, used for scalar reads
    pub fn first_f64(&self) -> Option<f64> {
        match self {
            Array::Nested(children) => children.iter().find_map(Array::first_f64),
            flat => flat.get_f64(0),
        }
    }

    /// Child array of record `index` of a nested array
    pub fn child(&self, index: usize) -> Option<&Array> {
        match self {
            Array::Nested(children) => children.get(index),
            _ => None,
        }
    }

    /// Values of a flat array as floats
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        match self {
            Array::Int(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            Array::Float(v) => Ok(v.clone()),
            Array::Nested(_) => Err(Error::Shape(
                "expected one scalar per record, found nested records".to_string(),
            )),
        }
    }

    /// Every leaf value in record order, as floats
    pub fn leaf_values_f64(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.collect_f64(&mut out);
        out
    }

    fn collect_f64(&self, out: &mut Vec<f64>) {
        match self {
            Array::Int(v) => out.extend(v.iter().map(|&x| x as f64)),
            Array::Float(v) => out.extend_from_slice(v),
            Array::Nested(children) => children.iter().for_each(|c| c.collect_f64(out)),
        }
    }

    /// Every leaf value in record order, as integers (floats truncate)
    pub fn leaf_values_i64(&self) -> Vec<i64> {
        let mut out = Vec::new();
        self.collect_i64(&mut out);
        out
    }

    fn collect_i64(&self, out: &mut Vec<i64>) {
        match self {
            Array::Int(v) => out.extend_from_slice(v),
            Array::Float(v) => out.extend(v.iter().map(|&x| x as i64)),
            Array::Nested(children) => children.iter().for_each(|c| c.collect_i64(out)),
        }
    }

    /// Records at `indices`, in the given order
    ///
    /// An index past the last record is a shape error.
    pub fn take(&self, indices: &[usize]) -> Result<Array> {
        let len = self.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(Error::Shape(format!(
                "record {} selected from an array of {} records",
                bad, len
            )));
        }
        Ok(match self {
            Array::Int(v) => Array::Int(indices.iter().map(|&i| v[i]).collect()),
            Array::Float(v) => Array::Float(indices.iter().map(|&i| v[i]).collect()),
            Array::Nested(v) => Array::Nested(indices.iter().map(|&i| v[i].clone()).collect()),
        })
    }

    /// Flatten `(record, child)` pairs of a nested array into one array
    ///
    /// Scalar children collapse into a flat array; array children stay nested.
    pub fn take_pairs(&self, pairs: &[(usize, usize)]) -> Result<Array> {
        let Array::Nested(records) = self else {
            return Err(Error::Shape(
                "per-record selection requires nested records".to_string(),
            ));
        };

        let mut ints = Vec::new();
        let mut floats = Vec::new();
        let mut nested = Vec::new();
        for &(record, child) in pairs {
            let Some(children) = records.get(record) else {
                continue;
            };
            match children {
                Array::Int(v) => {
                    if let Some(&x) = v.get(child) {
                        ints.push(x);
                    }
                },
                Array::Float(v) => {
                    if let Some(&x) = v.get(child) {
                        floats.push(x);
                    }
                },
                Array::Nested(v) => {
                    if let Some(c) = v.get(child) {
                        nested.push(c.clone());
                    }
                },
            }
        }

        Ok(if !nested.is_empty() {
            Array::Nested(nested)
        } else if !floats.is_empty() {
            floats.extend(ints.into_iter().map(|x| x as f64));
            Array::Float(floats)
        } else if !ints.is_empty() {
            Array::Int(ints)
        } else {
            Array::empty_like(self)
        })
    }

    fn empty_like(template: &Array) -> Array {
        match template.dtype() {
            Some(DType::I64) => Array::Int(Vec::new()),
            _ => Array::Float(Vec::new()),
        }
    }

    /// Append the records of `other`
    ///
    /// Integer data is promoted to floats when the two sides disagree.
    pub fn append(&mut self, other: Array) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        match (&mut *self, other) {
            (Array::Int(a), Array::Int(b)) => a.extend(b),
            (Array::Float(a), Array::Float(b)) => a.extend(b),
            (Array::Float(a), Array::Int(b)) => a.extend(b.into_iter().map(|x| x as f64)),
            (Array::Int(a), Array::Float(b)) => {
                let mut promoted: Vec<f64> = a.iter().map(|&x| x as f64).collect();
                promoted.extend(b);
                *self = Array::Float(promoted);
            },
            (Array::Nested(a), Array::Nested(b)) => a.extend(b),
            _ => {
                return Err(Error::Shape(
                    "cannot append nested and flat records".to_string(),
                ))
            },
        }
        Ok(())
    }

    /// Element-wise combination of two identically shaped arrays
    pub fn zip_with(&self, other: &Array, f: &dyn Fn(f64, f64) -> f64) -> Result<Array> {
        if self.len() != other.len() {
            return Err(Error::Shape(format!(
                "element-wise operands have {} and {} records",
                self.len(),
                other.len()
            )));
        }
        match (self, other) {
            (Array::Nested(a), Array::Nested(b)) => Ok(Array::Nested(
                a.iter()
                    .zip(b)
                    .map(|(x, y)| x.zip_with(y, f))
                    .collect::<Result<Vec<_>>>()?,
            )),
            (Array::Nested(_), _) | (_, Array::Nested(_)) => Err(Error::Shape(
                "element-wise operands differ in nesting".to_string(),
            )),
            (a, b) => {
                let (a, b) = (a.to_f64_vec()?, b.to_f64_vec()?);
                Ok(Array::Float(a.iter().zip(&b).map(|(&x, &y)| f(x, y)).collect()))
            },
        }
    }

    /// Apply `f` to every leaf, producing floats with the same structure
    pub fn map_f64(&self, f: &dyn Fn(f64) -> f64) -> Array {
        match self {
            Array::Int(v) => Array::Float(v.iter().map(|&x| f(x as f64)).collect()),
            Array::Float(v) => Array::Float(v.iter().map(|&x| f(x)).collect()),
            Array::Nested(children) => Array::Nested(children.iter().map(|c| c.map_f64(f)).collect()),
        }
    }

    /// Rebuild this array's structure from a flat run of values
    ///
    /// Consumes exactly as many values as there are leaves.
    pub fn with_leaf_values(&self, values: &mut impl Iterator<Item = f64>) -> Result<Array> {
        match self {
            Array::Nested(children) => Ok(Array::Nested(
                children
                    .iter()
                    .map(|c| c.with_leaf_values(values))
                    .collect::<Result<Vec<_>>>()?,
            )),
            flat => {
                let n = flat.len();
                let out: Vec<f64> = values.take(n).collect();
                if out.len() != n {
                    return Err(Error::Shape(format!(
                        "expected {} values to rebuild array, got {}",
                        n,
                        out.len()
                    )));
                }
                Ok(Array::Float(out))
            },
        }
    }

    /// Shape of a rectangular array, `None` when any axis is ragged
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            Array::Nested(children) => {
                let mut inner: Option<Vec<usize>> = None;
                for child in children {
                    let shape = child.shape()?;
                    match &inner {
                        Some(existing) if *existing != shape => return None,
                        Some(_) => {},
                        None => inner = Some(shape),
                    }
                }
                let mut shape = vec![children.len()];
                // an empty nested array has no inner axes to report
                shape.extend(inner.unwrap_or_default());
                Some(shape)
            },
            flat => Some(vec![flat.len()]),
        }
    }

    /// Rebuild a rectangular array from record-major leaf values
    pub fn from_shape_f64(shape: &[usize], values: &[f64]) -> Result<Array> {
        Self::build_shaped(shape, values, &|v: &[f64]| Array::Float(v.to_vec()))
    }

    /// Rebuild a rectangular integer array from record-major leaf values
    pub fn from_shape_i64(shape: &[usize], values: &[i64]) -> Result<Array> {
        Self::build_shaped(shape, values, &|v: &[i64]| Array::Int(v.to_vec()))
    }

    fn build_shaped<T>(shape: &[usize], values: &[T], leaf: &dyn Fn(&[T]) -> Array) -> Result<Array> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != values.len() {
            return Err(Error::Shape(format!(
                "{} values do not fill shape {:?}",
                values.len(),
                shape
            )));
        }
        if shape.len() == 1 {
            return Ok(leaf(values));
        }
        let stride: usize = shape[1..].iter().product();
        let mut children = Vec::with_capacity(shape[0]);
        for i in 0..shape[0] {
            children.push(Self::build_shaped(
                &shape[1..],
                &values[i * stride..(i + 1) * stride],
                leaf,
            )?);
        }
        Ok(Array::Nested(children))
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::Float(v)
    }
}

impl From<Vec<i64>> for Array {
    fn from(v: Vec<i64>) -> Self {
        Array::Int(v)
    }
}
