//! Product store abstraction
//!
//! Products are opaque hierarchical containers addressed by [`StorePath`]s.
//! This module defines the seam between extraction and whatever reads the
//! container format:
//!
//! - [`ProductStore`]: an opened product handle
//! - [`StoreOpener`]: opens handles for product files
//! - [`StoreGuard`]: closes a handle on every exit path
//!
//! [`memory::MemoryStore`] is an in-memory implementation backed by a JSON
//! document tree.

pub mod memory;

use crate::array::Array;
use crate::error::StoreError;
use crate::types::from_store_time;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

pub use memory::{JsonStoreOpener, MemoryStore, Node};

// =============================================================================
// Paths
// =============================================================================

/// One step of a store path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named record member
    Name(String),
    /// Single element of an array axis
    Index(usize),
    /// Every element of an array axis
    All,
}

/// Structural address inside a product
///
/// Parsed from `/`-separated strings: `*` is a wildcard axis and an
/// all-digit segment is an index, e.g. `geolocation/*/observation_aocs/time`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePath {
    segments: Vec<Segment>,
}

impl StorePath {
    /// Path from explicit segments
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Segments in traversal order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of wildcard axes
    pub fn wildcard_count(&self) -> usize {
        self.segments.iter().filter(|s| **s == Segment::All).count()
    }

    /// Path truncated to its first `len` segments
    pub fn prefix(&self, len: usize) -> StorePath {
        StorePath::new(self.segments[..len.min(self.segments.len())].to_vec())
    }

    /// Copy with the segment at `position` replaced
    pub fn with_segment(&self, position: usize, segment: Segment) -> StorePath {
        let mut segments = self.segments.clone();
        if let Some(slot) = segments.get_mut(position) {
            *slot = segment;
        }
        StorePath::new(segments)
    }
}

impl From<&str> for StorePath {
    fn from(s: &str) -> Self {
        let segments = s
            .split('/')
            .filter(|part| !part.is_empty())
            .map(|part| {
                if part == "*" {
                    Segment::All
                } else if part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse().map(Segment::Index).unwrap_or_else(|_| Segment::Name(part.to_string()))
                } else {
                    Segment::Name(part.to_string())
                }
            })
            .collect();
        Self { segments }
    }
}

impl FromStr for StorePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StorePath::from(s))
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Name(n) => n.clone(),
                Segment::Index(i) => i.to_string(),
                Segment::All => "*".to_string(),
            })
            .collect();
        write!(f, "/{}", parts.join("/"))
    }
}

// =============================================================================
// Store traits
// =============================================================================

/// An opened product
pub trait ProductStore {
    /// Product type identifier, e.g. `ALD_U_N_1B`
    fn product_type_name(&self) -> &str;

    /// Read the data at `path`
    ///
    /// Every wildcard adds one nesting level to the result. Scalar leaves
    /// come back as one-element arrays.
    fn fetch(&self, path: &StorePath) -> Result<Array, StoreError>;

    /// Dimensions of the array at `path` (empty for scalars)
    fn axis_size(&self, path: &StorePath) -> Result<Vec<usize>, StoreError>;

    /// Read a scalar store time at `path` as a UTC datetime
    fn fetch_as_timestamp(&self, path: &StorePath) -> Result<DateTime<Utc>, StoreError> {
        let value = self.fetch(path)?.first_f64().ok_or_else(|| StoreError::Layout {
            path: path.to_string(),
            reason: "expected a scalar time".to_string(),
        })?;
        from_store_time(value).ok_or_else(|| StoreError::Layout {
            path: path.to_string(),
            reason: format!("time value {} out of range", value),
        })
    }

    /// Release the handle; calling it again is a no-op
    fn close(&mut self) -> Result<(), StoreError>;

    /// Whether [`ProductStore::close`] has been called
    fn is_closed(&self) -> bool;
}

/// Opens product files
pub trait StoreOpener {
    /// Handle type produced by this opener
    type Store: ProductStore;

    /// Open the product at `path`
    fn open(&self, path: &Path) -> Result<Self::Store, StoreError>;
}

// =============================================================================
// Scoped release
// =============================================================================

/// Closes the wrapped store when dropped
pub struct StoreGuard<S: ProductStore> {
    store: Option<S>,
    path: PathBuf,
}

impl<S: ProductStore> StoreGuard<S> {
    /// Take ownership of an opened store
    pub fn new(store: S, path: impl Into<PathBuf>) -> Self {
        Self {
            store: Some(store),
            path: path.into(),
        }
    }

    /// The guarded store, `None` once released
    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    /// File the store was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the store back without closing it
    pub fn into_inner(mut self) -> Option<S> {
        self.store.take()
    }

    /// Close now and report the outcome
    pub fn release(&mut self) -> Result<(), StoreError> {
        match self.store.take() {
            Some(mut store) => {
                debug!(path = %self.path.display(), "Closing product");
                store.close()
            },
            None => Ok(()),
        }
    }
}

impl<S: ProductStore> Drop for StoreGuard<S> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "Failed to close product");
        }
    }
}
