//! Per-file, per-level extraction results

use crate::array::Array;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One record value in plain (list based) encoding
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlainValue {
    /// Integer scalar
    Int(i64),
    /// Float scalar
    Float(f64),
    /// Array-valued record
    List(Vec<PlainValue>),
}

impl PlainValue {
    /// One plain value per record of `array`
    pub fn records(array: Array) -> Vec<PlainValue> {
        match array {
            Array::Int(v) => v.into_iter().map(PlainValue::Int).collect(),
            Array::Float(v) => v.into_iter().map(PlainValue::Float).collect(),
            Array::Nested(children) => children
                .into_iter()
                .map(|c| PlainValue::List(PlainValue::records(c)))
                .collect(),
        }
    }
}

/// Data of one output field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldData {
    /// Typed, possibly nested array
    Native(Array),
    /// Plain per-record values
    Plain(Vec<PlainValue>),
}

impl FieldData {
    /// Encode `array` natively or as plain values
    pub fn encode(array: Array, plain: bool) -> Self {
        if plain {
            FieldData::Plain(PlainValue::records(array))
        } else {
            FieldData::Native(array)
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            FieldData::Native(a) => a.len(),
            FieldData::Plain(v) => v.len(),
        }
    }

    /// True if no record was selected
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native array, if natively encoded
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            FieldData::Native(a) => Some(a),
            FieldData::Plain(_) => None,
        }
    }

    /// Append the records of `other`, which must use the same encoding
    pub fn append(&mut self, other: FieldData) -> Result<()> {
        match (self, other) {
            (FieldData::Native(a), FieldData::Native(b)) => a.append(b),
            (FieldData::Plain(a), FieldData::Plain(b)) => {
                a.extend(b);
                Ok(())
            },
            _ => Err(Error::Shape("cannot merge native and plain field data".to_string())),
        }
    }
}

/// Selected data of one entity level in one file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelResult {
    /// Level name
    pub level: String,
    /// Requested fields
    pub fields: BTreeMap<String, FieldData>,
}

impl LevelResult {
    /// Empty result for `level`
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Field data by name
    pub fn get(&self, field: &str) -> Option<&FieldData> {
        self.fields.get(field)
    }

    /// Native array of a field
    pub fn array(&self, field: &str) -> Option<&Array> {
        self.get(field).and_then(FieldData::as_array)
    }

    /// Records selected, taken from the first field
    pub fn record_count(&self) -> usize {
        self.fields.values().next().map(FieldData::len).unwrap_or(0)
    }

    /// Append another file's records for the same level
    pub fn merge(&mut self, other: LevelResult) -> Result<()> {
        for (name, data) in other.fields {
            match self.fields.get_mut(&name) {
                Some(existing) => existing.append(data)?,
                None => {
                    self.fields.insert(name, data);
                },
            }
        }
        Ok(())
    }
}

/// Everything extracted from one product file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    /// Product file
    pub file: PathBuf,
    /// Product type of the file
    pub product_type: String,
    /// Results per requested level
    pub levels: BTreeMap<String, LevelResult>,
}

impl FileResult {
    /// Result of one level
    pub fn level(&self, name: &str) -> Option<&LevelResult> {
        self.levels.get(name)
    }
}

/// Concatenate per-file results level by level
pub fn merge_results<I>(results: I) -> Result<BTreeMap<String, LevelResult>>
where
    I: IntoIterator<Item = FileResult>,
{
    let mut merged: BTreeMap<String, LevelResult> = BTreeMap::new();
    for result in results {
        for (name, level) in result.levels {
            match merged.get_mut(&name) {
                Some(existing) => existing.merge(level)?,
                None => {
                    merged.insert(name, level);
                },
            }
        }
    }
    Ok(merged)
}
