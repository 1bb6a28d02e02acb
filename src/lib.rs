//! Swath Extract - filtered extraction from multi-level satellite products
//!
//! This library reads hierarchical wind-lidar products and returns the
//! records that pass user filters:
//! - Field catalogs mapping names to ordered candidate locations
//! - Range masks over scalar and per-record array fields
//! - Mask propagation between levels through index maps
//! - Lazy stitching of time-ordered files with overlap removal
//! - Optimized on-disk caches with checksummed variables

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod error;
pub mod mask;
pub mod raster;
pub mod store;
pub mod types;

/// Field catalogs and the built-in product catalogs
pub mod catalog;

/// Location addressing and computed fields
pub mod location;

/// Filtered extraction, joins and multi-file stitching
pub mod extract;

/// Optimized caches and the optimizer pass
pub mod cache;

/// Configuration management with TOML support
pub mod config;

// Re-export main types
pub use array::{Array, DType};
pub use cache::{optimize, CacheMode, OptimizeEvent, OptimizeOptions, OptimizedCache, Optimizer};
pub use catalog::{FieldCatalog, FieldDef, LevelDef};
pub use error::{Error, Result};
pub use extract::{ExtractRequest, Extraction, Extractor, FieldData, FileResult, LevelResult};
pub use mask::{combine_mask, make_mask, Mask};
pub use store::{JsonStoreOpener, MemoryStore, ProductStore, StoreOpener, StorePath};
pub use types::{Bound, Filter, Filters};
