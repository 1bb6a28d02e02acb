//! In-memory product store
//!
//! Holds a product as a tree of records, lists and numbers. Products are
//! read from JSON documents of the form
//! `{"product_type": "ALD_U_N_1B", "data": {...}}` by [`JsonStoreOpener`].

use super::{ProductStore, Segment, StoreOpener, StorePath};
use crate::array::Array;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Node of a product tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    /// Integer leaf
    Int(i64),
    /// Float leaf
    Float(f64),
    /// Array axis
    List(Vec<Node>),
    /// Named members
    Record(BTreeMap<String, Node>),
}

impl Node {
    /// Record from `(name, node)` pairs
    pub fn record<I, K>(members: I) -> Node
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
    {
        Node::Record(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// List of float leaves
    pub fn floats(values: &[f64]) -> Node {
        Node::List(values.iter().map(|&v| Node::Float(v)).collect())
    }

    /// List of integer leaves
    pub fn ints(values: &[i64]) -> Node {
        Node::List(values.iter().map(|&v| Node::Int(v)).collect())
    }
}

/// On-disk layout of a JSON product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDocument {
    /// Product type identifier
    pub product_type: String,
    /// Root record
    pub data: Node,
}

enum Fetched {
    Int(i64),
    Float(f64),
    Array(Array),
}

/// Product held entirely in memory
#[derive(Debug, Clone)]
pub struct MemoryStore {
    product_type: String,
    root: Node,
    closed: bool,
}

impl MemoryStore {
    /// Store over an existing tree
    pub fn new(product_type: impl Into<String>, root: Node) -> Self {
        Self {
            product_type: product_type.into(),
            root,
            closed: false,
        }
    }

    /// Store from a parsed document
    pub fn from_document(doc: ProductDocument) -> Self {
        Self::new(doc.product_type, doc.data)
    }

    /// Write the product as a JSON document
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let doc = ProductDocument {
            product_type: self.product_type.clone(),
            data: self.root.clone(),
        };
        let json = serde_json::to_vec(&doc).map_err(|e| StoreError::Layout {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn walk(node: &Node, segments: &[Segment], path: &StorePath) -> Result<Fetched, StoreError> {
        let missing = || StoreError::NoSuchPath(path.to_string());
        let Some((head, rest)) = segments.split_first() else {
            return Self::value_of(node, path);
        };
        match (head, node) {
            (Segment::Name(name), Node::Record(members)) => {
                Self::walk(members.get(name).ok_or_else(missing)?, rest, path)
            },
            (Segment::Index(i), Node::List(items)) => {
                Self::walk(items.get(*i).ok_or_else(missing)?, rest, path)
            },
            (Segment::All, Node::List(items)) => {
                let parts = items
                    .iter()
                    .map(|item| Self::walk(item, rest, path))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::combine(parts, path)
            },
            _ => Err(missing()),
        }
    }

    fn value_of(node: &Node, path: &StorePath) -> Result<Fetched, StoreError> {
        match node {
            Node::Int(v) => Ok(Fetched::Int(*v)),
            Node::Float(v) => Ok(Fetched::Float(*v)),
            Node::List(items) => {
                let parts = items
                    .iter()
                    .map(|item| Self::value_of(item, path))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::combine(parts, path)
            },
            Node::Record(_) => Err(StoreError::Layout {
                path: path.to_string(),
                reason: "path ends at a record, not at data".to_string(),
            }),
        }
    }

    fn combine(parts: Vec<Fetched>, path: &StorePath) -> Result<Fetched, StoreError> {
        if parts.iter().all(|p| matches!(p, Fetched::Int(_))) {
            let ints = parts
                .into_iter()
                .filter_map(|p| match p {
                    Fetched::Int(v) => Some(v),
                    _ => None,
                })
                .collect();
            return Ok(Fetched::Array(Array::Int(ints)));
        }
        if parts.iter().all(|p| !matches!(p, Fetched::Array(_))) {
            let floats = parts
                .into_iter()
                .filter_map(|p| match p {
                    Fetched::Int(v) => Some(v as f64),
                    Fetched::Float(v) => Some(v),
                    Fetched::Array(_) => None,
                })
                .collect();
            return Ok(Fetched::Array(Array::Float(floats)));
        }
        if parts.iter().all(|p| matches!(p, Fetched::Array(_))) {
            let children = parts
                .into_iter()
                .filter_map(|p| match p {
                    Fetched::Array(a) => Some(a),
                    _ => None,
                })
                .collect();
            return Ok(Fetched::Array(Array::Nested(children)));
        }
        Err(StoreError::Layout {
            path: path.to_string(),
            reason: "axis mixes scalars and arrays".to_string(),
        })
    }

    fn locate<'a>(node: &'a Node, segments: &[Segment], path: &StorePath) -> Result<&'a Node, StoreError> {
        let missing = || StoreError::NoSuchPath(path.to_string());
        let Some((head, rest)) = segments.split_first() else {
            return Ok(node);
        };
        let next = match (head, node) {
            (Segment::Name(name), Node::Record(members)) => members.get(name).ok_or_else(missing)?,
            (Segment::Index(i), Node::List(items)) => items.get(*i).ok_or_else(missing)?,
            (Segment::All, _) => {
                return Err(StoreError::Layout {
                    path: path.to_string(),
                    reason: "axis size queries take concrete paths".to_string(),
                })
            },
            _ => return Err(missing()),
        };
        Self::locate(next, rest, path)
    }

    fn dims(node: &Node) -> Vec<usize> {
        let Node::List(items) = node else {
            return Vec::new();
        };
        let mut dims = vec![items.len()];
        if let Some(first) = items.first() {
            let inner = Self::dims(first);
            if !inner.is_empty() && items.iter().all(|item| Self::dims(item) == inner) {
                dims.extend(inner);
            }
        }
        dims
    }
}

impl ProductStore for MemoryStore {
    fn product_type_name(&self) -> &str {
        &self.product_type
    }

    fn fetch(&self, path: &StorePath) -> Result<Array, StoreError> {
        self.ensure_open()?;
        Ok(match Self::walk(&self.root, path.segments(), path)? {
            Fetched::Int(v) => Array::Int(vec![v]),
            Fetched::Float(v) => Array::Float(vec![v]),
            Fetched::Array(a) => a,
        })
    }

    fn axis_size(&self, path: &StorePath) -> Result<Vec<usize>, StoreError> {
        self.ensure_open()?;
        let node = Self::locate(&self.root, path.segments(), path)?;
        Ok(Self::dims(node))
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Opens JSON product documents from disk
#[derive(Debug, Clone, Default)]
pub struct JsonStoreOpener;

impl StoreOpener for JsonStoreOpener {
    type Store = MemoryStore;

    fn open(&self, path: &Path) -> Result<MemoryStore, StoreError> {
        let open_error = |reason: String| StoreError::Open {
            path: PathBuf::from(path),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| open_error(e.to_string()))?;
        let doc: ProductDocument =
            serde_json::from_slice(&bytes).map_err(|e| open_error(e.to_string()))?;
        Ok(MemoryStore::from_document(doc))
    }
}
