//! Error types for extraction, stores, rasters and the optimized cache

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// A location could not be resolved in the opened product
    #[error("No such field '{field}' ({path})")]
    NoSuchField {
        /// Catalog field name
        field: String,
        /// Location that was tried last
        path: String,
    },

    /// A filter carries neither a lower nor an upper bound
    #[error("Invalid filter for '{field}': at least one of min and max is required")]
    InvalidFilterSpec {
        /// Filtered field name
        field: String,
    },

    /// Names that are not part of the product's field catalog
    #[error("Unknown {kind} field(s): {}", fields.join(", "))]
    UnknownField {
        /// What the names were used for (filter, requested, ...)
        kind: String,
        /// All offending names, sorted
        fields: Vec<String>,
    },

    /// Requested level is not part of the product's catalog
    #[error("Unknown level '{0}'")]
    UnknownLevel(String),

    /// A cache variable already exists and the pass is not allowed to touch it
    #[error("Variable '{group}/{field}' already exists in {}", path.display())]
    OptimizationConflict {
        /// Cache group (level name)
        group: String,
        /// Variable (field name)
        field: String,
        /// Cache location
        path: PathBuf,
    },

    /// Create mode was requested for an output that already exists
    #[error("Optimized cache already exists at {}", .0.display())]
    CacheExists(PathBuf),

    /// The product type has no catalog or does not match the catalog in use
    #[error("Product type '{0}' not supported")]
    UnsupportedProduct(String),

    /// A field requested for output could not be produced
    #[error("Field '{field}' of level '{level}': {source}")]
    Field {
        /// Level the field belongs to
        level: String,
        /// Requested field
        field: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Index map required for propagating a selection is unavailable
    #[error("Index map '{mapping_field}' unavailable: {source}")]
    MissingIndexMap {
        /// Mapping field of the join
        mapping_field: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Failure while processing one product file
    #[error("{}: {source}", file.display())]
    InFile {
        /// Product file
        file: PathBuf,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Array shapes do not line up
    #[error("Shape mismatch: {0}")]
    Shape(String),

    /// Invalid catalog definition
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Raster error
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Data the product (or an auxiliary collaborator) simply does not carry
    ///
    /// Missing data is skipped with a warning where a field is only used for
    /// filtering or speculatively materialized.
    pub fn is_missing_data(&self) -> bool {
        match self {
            Error::NoSuchField { .. } => true,
            Error::Raster(RasterError::NoCalibration { .. }) => true,
            Error::Raster(RasterError::NoSampler) => true,
            Error::Field { source, .. } | Error::InFile { source, .. } => source.is_missing_data(),
            _ => false,
        }
    }

    /// Whether iteration over further product files must stop
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::InFile { source, .. } => source.is_fatal(),
            Error::Field { source, .. } => source.is_fatal(),
            Error::MissingIndexMap { .. } => true,
            other => !other.is_missing_data(),
        }
    }
}

/// Errors raised by product stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Path does not exist in the product
    #[error("No such path: {0}")]
    NoSuchPath(String),

    /// Operation on a closed handle
    #[error("Store handle is closed")]
    Closed,

    /// The product could not be opened
    #[error("Failed to open {}: {reason}", path.display())]
    Open {
        /// Product file
        path: PathBuf,
        /// Reason reported by the backend
        reason: String,
    },

    /// Value at a path has an unexpected layout
    #[error("Invalid layout at {path}: {reason}")]
    Layout {
        /// Offending path
        path: String,
        /// What was wrong
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the optimized cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest is missing or unreadable
    #[error("Invalid manifest: {0}")]
    Manifest(String),

    /// Variable does not exist in the cache
    #[error("No variable '{group}/{name}'")]
    NoSuchVariable {
        /// Group (level) name
        group: String,
        /// Variable name
        name: String,
    },

    /// Stored bytes do not match the manifest checksum
    #[error("Checksum mismatch for '{variable}': expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Variable path
        variable: String,
        /// Checksum recorded in the manifest
        expected: u32,
        /// Checksum of the bytes on disk
        actual: u32,
    },

    /// Appended data does not match the stored variable layout
    #[error("Layout mismatch for '{variable}': {reason}")]
    LayoutMismatch {
        /// Variable path
        variable: String,
        /// What differs
        reason: String,
    },

    /// Another pass holds the cache
    #[error("Cache is locked: {}", .0.display())]
    Locked(PathBuf),
}

/// Errors raised by raster samplers
#[derive(Error, Debug)]
pub enum RasterError {
    /// No raster exists for the requested month
    #[error("No raster for {year}-{month:02}")]
    NoCalibration {
        /// Calendar year
        year: i32,
        /// Calendar month (1-12)
        month: u32,
    },

    /// A computed field needs a raster but none was configured
    #[error("No raster sampler configured")]
    NoSampler,

    /// Longitude and latitude inputs differ in length
    #[error("Coordinate length mismatch: {lons} longitudes, {lats} latitudes")]
    CoordinateMismatch {
        /// Number of longitudes
        lons: usize,
        /// Number of latitudes
        lats: usize,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
