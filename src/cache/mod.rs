//! Optimized product cache
//!
//! A flat, pre-extracted copy of a product's catalog fields for fast repeat
//! access. Layout on disk:
//!
//! ```text
//! <cache>/manifest.json          dimensions, groups, variables, checksums
//! <cache>/<level>/<field>.bin    little-endian, record-major values
//! ```
//!
//! Every level is a group with one unlimited record dimension
//! (`<level>_records`). Inner axes share fixed dimensions named after
//! their size (`arr_<n>`). The manifest is rewritten atomically after every
//! variable write.

pub mod optimizer;

use crate::array::{Array, DType};
use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use optimizer::{optimize, CacheMode, OptimizeAction, OptimizeEvent, OptimizeOptions, Optimizer, SkipReason};

/// Manifest file name inside a cache directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// Current manifest format
pub const FORMAT_VERSION: u32 = 1;

const LOCK_FILE: &str = ".optimize.lock";

// =============================================================================
// Manifest
// =============================================================================

/// Named axis length
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    /// Current length
    pub size: usize,
    /// Whether appends may grow the axis
    pub unlimited: bool,
}

/// Stored variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableManifest {
    /// Element type
    pub dtype: DType,
    /// Dimension names, record dimension first
    pub dimensions: Vec<String>,
    /// Records written
    pub records: usize,
    /// CRC32 of the data file
    pub checksum: u32,
}

/// One level's variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupManifest {
    /// Unlimited record dimension of the group
    pub record_dimension: String,
    /// Variables by field name
    pub variables: BTreeMap<String, VariableManifest>,
}

/// Cache metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Manifest format
    pub format_version: u32,
    /// Product type the cache was built from
    pub product_type: String,
    /// Product files merged into the cache, in order
    pub source_files: Vec<String>,
    /// Dimensions by name
    pub dimensions: BTreeMap<String, Dimension>,
    /// Groups by level name
    pub groups: BTreeMap<String, GroupManifest>,
}

impl CacheManifest {
    fn new(product_type: &str) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            product_type: product_type.to_string(),
            source_files: Vec::new(),
            dimensions: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Load a manifest from disk
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let contents = fs::read(path)?;
        let manifest: Self =
            serde_json::from_slice(&contents).map_err(|e| CacheError::Manifest(e.to_string()))?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(CacheError::Manifest(format!(
                "unsupported format version {}",
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    /// Save the manifest atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| CacheError::Manifest(e.to_string()))?;

        let temp_name = format!(
            ".manifest.{}.{}.tmp",
            std::process::id(),
            rand::random::<u32>()
        );
        let temp_path = path.with_file_name(temp_name);
        fs::write(&temp_path, json)?;

        let renamed = fs::rename(&temp_path, path);
        if renamed.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        renamed?;
        Ok(())
    }
}

// =============================================================================
// Cache
// =============================================================================

/// What a variable write did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableWrite {
    /// Fill records written before the data
    pub padded: usize,
    /// Data records written
    pub written: usize,
}

/// Opened cache directory
#[derive(Debug)]
pub struct OptimizedCache {
    root: PathBuf,
    manifest: CacheManifest,
    verify_checksums: bool,
}

impl OptimizedCache {
    /// Open an existing cache
    pub fn open(root: impl AsRef<Path>) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        let manifest = CacheManifest::load(&root.join(MANIFEST_FILE))?;
        Ok(Self {
            root,
            manifest,
            verify_checksums: true,
        })
    }

    /// Toggle CRC32 verification on reads (on by default)
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Create an empty cache; `root` must not exist yet
    pub fn create(root: impl AsRef<Path>, product_type: &str) -> Result<Self, CacheError> {
        let root = root.as_ref().to_path_buf();
        if let Some(parent) = root.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(&root)?;
        let cache = Self {
            manifest: CacheManifest::new(product_type),
            root,
            verify_checksums: true,
        };
        cache.save_manifest()?;
        Ok(cache)
    }

    /// Cache directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current manifest
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Product type the cache holds
    pub fn product_type(&self) -> &str {
        &self.manifest.product_type
    }

    /// Whether `group/name` has been materialized
    pub fn has_variable(&self, group: &str, name: &str) -> bool {
        self.variable(group, name).is_some()
    }

    /// Manifest entry of `group/name`
    pub fn variable(&self, group: &str, name: &str) -> Option<&VariableManifest> {
        self.manifest.groups.get(group)?.variables.get(name)
    }

    /// Length of a group's record dimension (0 for unknown groups)
    pub fn record_count(&self, group: &str) -> usize {
        self.manifest
            .groups
            .get(group)
            .and_then(|g| self.manifest.dimensions.get(&g.record_dimension))
            .map(|d| d.size)
            .unwrap_or(0)
    }

    fn data_path(&self, group: &str, name: &str) -> PathBuf {
        self.root.join(group).join(format!("{}.bin", name))
    }

    fn save_manifest(&self) -> Result<(), CacheError> {
        self.manifest.save(&self.root.join(MANIFEST_FILE))
    }

    fn inner_shape(&self, variable: &VariableManifest) -> Result<Vec<usize>, CacheError> {
        variable.dimensions[1.min(variable.dimensions.len())..]
            .iter()
            .map(|d| {
                self.manifest
                    .dimensions
                    .get(d)
                    .map(|dim| dim.size)
                    .ok_or_else(|| CacheError::Manifest(format!("unknown dimension '{}'", d)))
            })
            .collect()
    }

    /// Read a whole variable, verifying length and checksum
    pub fn read_variable(&self, group: &str, name: &str) -> Result<Array, CacheError> {
        let variable = self
            .variable(group, name)
            .ok_or_else(|| CacheError::NoSuchVariable {
                group: group.to_string(),
                name: name.to_string(),
            })?;
        let label = format!("{}/{}", group, name);

        let bytes = fs::read(self.data_path(group, name))?;
        let actual = crc32fast::hash(&bytes);
        if self.verify_checksums && actual != variable.checksum {
            return Err(CacheError::ChecksumMismatch {
                variable: label,
                expected: variable.checksum,
                actual,
            });
        }

        let mut shape = vec![variable.records];
        shape.extend(self.inner_shape(variable)?);
        let count: usize = shape.iter().product();
        if bytes.len() != count * variable.dtype.item_size() {
            return Err(CacheError::LayoutMismatch {
                variable: label,
                reason: format!("{} bytes on disk, {} values expected", bytes.len(), count),
            });
        }

        let decoded = match variable.dtype {
            DType::F64 => {
                let values: Vec<f64> = bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect();
                Array::from_shape_f64(&shape, &values)
            },
            DType::I64 => {
                let values: Vec<i64> = bytes
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect();
                Array::from_shape_i64(&shape, &values)
            },
        };
        decoded.map_err(|e| CacheError::LayoutMismatch {
            variable: format!("{}/{}", group, name),
            reason: e.to_string(),
        })
    }

    fn ensure_group(&mut self, group: &str) -> String {
        let record_dimension = format!("{}_records", group);
        self.manifest
            .dimensions
            .entry(record_dimension.clone())
            .or_insert(Dimension {
                size: 0,
                unlimited: true,
            });
        self.manifest
            .groups
            .entry(group.to_string())
            .or_insert_with(|| GroupManifest {
                record_dimension: record_dimension.clone(),
                variables: BTreeMap::new(),
            });
        record_dimension
    }

    /// Name of the fixed dimension of length `size`, created on first use
    fn ensure_dimension(&mut self, size: usize) -> String {
        let name = format!("arr_{}", size);
        self.manifest.dimensions.entry(name.clone()).or_insert(Dimension {
            size,
            unlimited: false,
        });
        name
    }

    /// Write `data` at records `[offset, offset + n)` of `group/name`
    ///
    /// New variables take their dtype and inner shape from `data`. Records
    /// between the variable's end and `offset` are filled with NaN (floats)
    /// or `i64::MIN` (integers).
    pub fn write_variable(
        &mut self,
        group: &str,
        name: &str,
        data: &Array,
        offset: usize,
    ) -> Result<VariableWrite, CacheError> {
        let label = format!("{}/{}", group, name);
        let mismatch = |reason: String| CacheError::LayoutMismatch {
            variable: label.clone(),
            reason,
        };

        let shape = data
            .shape()
            .ok_or_else(|| mismatch("ragged data cannot be stored".to_string()))?;
        let inner = shape[1..].to_vec();

        let existing = self.variable(group, name).cloned();
        let mut variable = match existing {
            Some(variable) => {
                if self.inner_shape(&variable)? != inner {
                    return Err(mismatch(format!(
                        "inner shape {:?} differs from stored {:?}",
                        inner,
                        self.inner_shape(&variable)?
                    )));
                }
                if variable.dtype == DType::I64 && data.dtype() == Some(DType::F64) {
                    return Err(mismatch("float data for an integer variable".to_string()));
                }
                variable
            },
            None => {
                let record_dimension = self.ensure_group(group);
                let mut dimensions = vec![record_dimension];
                for size in &inner {
                    dimensions.push(self.ensure_dimension(*size));
                }
                VariableManifest {
                    dtype: data.dtype().unwrap_or(DType::F64),
                    dimensions,
                    records: 0,
                    checksum: 0,
                }
            },
        };

        if variable.records > offset {
            return Err(mismatch(format!(
                "{} records stored, cannot write at offset {}",
                variable.records, offset
            )));
        }

        let record_len: usize = inner.iter().product();
        let padded = offset - variable.records;
        let mut bytes = Vec::with_capacity((padded + data.len()) * record_len * 8);
        for _ in 0..padded * record_len {
            match variable.dtype {
                DType::F64 => bytes.extend_from_slice(&f64::NAN.to_le_bytes()),
                DType::I64 => bytes.extend_from_slice(&i64::MIN.to_le_bytes()),
            }
        }
        match variable.dtype {
            DType::F64 => {
                for v in data.leaf_values_f64() {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
            },
            DType::I64 => {
                for v in data.leaf_values_i64() {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
            },
        }

        let path = self.data_path(group, name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        // bytes past the recorded records belong to a write whose manifest
        // save never landed
        let expected = (variable.records * record_len * 8) as u64;
        let actual = file.metadata()?.len();
        if actual < expected {
            return Err(mismatch(format!(
                "data file holds {} bytes, {} records need {}",
                actual, variable.records, expected
            )));
        }
        if actual > expected {
            warn!(
                variable = %label,
                expected = expected,
                actual = actual,
                "Truncating unrecorded trailing bytes"
            );
            file.set_len(expected)?;
        }
        file.write_all(&bytes)?;
        file.sync_data()?;

        let mut hasher = crc32fast::Hasher::new_with_initial(variable.checksum);
        hasher.update(&bytes);
        variable.checksum = hasher.finalize();
        variable.records = offset + data.len();

        let record_dimension = variable.dimensions[0].clone();
        if let Some(dim) = self.manifest.dimensions.get_mut(&record_dimension) {
            dim.size = dim.size.max(variable.records);
        }
        self.manifest
            .groups
            .get_mut(group)
            .ok_or_else(|| CacheError::Manifest(format!("group '{}' vanished", group)))?
            .variables
            .insert(name.to_string(), variable);
        self.save_manifest()?;

        debug!(variable = %label, padded = padded, written = data.len(), "Variable written");
        Ok(VariableWrite {
            padded,
            written: data.len(),
        })
    }

    /// Record a product file as merged into the cache
    pub fn add_source(&mut self, source: &str) -> Result<(), CacheError> {
        self.manifest.source_files.push(source.to_string());
        self.save_manifest()
    }
}

// =============================================================================
// Exclusive ownership
// =============================================================================

/// Lock file giving one optimizer pass exclusive use of a cache
///
/// Created with `create_new`, so a second pass fails instead of racing.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
}

impl CacheLock {
    /// Acquire the lock of the cache at `root`
    pub fn acquire(root: &Path) -> Result<Self, CacheError> {
        let path = root.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            },
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(CacheError::Locked(path)),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove cache lock");
            }
        }
    }
}
