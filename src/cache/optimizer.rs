//! Cache optimizer
//!
//! Materializes every catalog field of one product into an
//! [`OptimizedCache`]. The pass is lazy: each iteration step handles one
//! `(level, field)` pair and yields what it did.
//!
//! # Modes
//!
//! - [`CacheMode::Create`]: the output must not exist. Any failure, or
//!   dropping the pass before it completes, removes the output again.
//! - [`CacheMode::Update`]: new fields are added; existing fields are
//!   appended only when named in the allow-list. Appends start at the
//!   record count the level had when the pass began. A new field of a
//!   product the cache already lists starts at record zero, alongside the
//!   fields written from that product earlier. A failure leaves the writes
//!   of a pre-existing cache in place.

use super::{CacheLock, OptimizedCache};
use crate::catalog::FieldCatalog;
use crate::error::{Error, Result};
use crate::location::Resolver;
use crate::raster::RasterSampler;
use crate::store::{ProductStore, StoreGuard, StoreOpener};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Deepest nesting the cache stores (records, arrays, arrays of arrays)
const MAX_DIMENSIONALITY: usize = 3;

/// How to treat an existing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Build a new cache
    #[default]
    Create,
    /// Extend an existing cache, creating it when missing
    Update,
}

/// Optimizer settings
#[derive(Debug, Clone, Default)]
pub struct OptimizeOptions {
    /// Create or update
    pub mode: CacheMode,
    /// Existing fields that may be appended in update mode
    pub allowlist: BTreeSet<String>,
}

impl OptimizeOptions {
    /// Options for creating a new cache
    pub fn create() -> Self {
        Self::default()
    }

    /// Options for updating, appending the named existing fields
    pub fn update<I, S>(allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: CacheMode::Update,
            allowlist: allowlist.into_iter().map(Into::into).collect(),
        }
    }
}

/// Why a field was not written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already cached and not allow-listed
    Exists,
    /// The product does not carry the field
    Unavailable,
    /// Variable-length axes cannot be stored
    Ragged,
}

/// Outcome for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeAction {
    /// New variable written
    Created,
    /// Records appended to an existing variable
    Appended,
    /// Nothing written
    Skipped(SkipReason),
}

/// Progress event of an optimizer pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeEvent {
    /// Level (cache group)
    pub level: String,
    /// Field (cache variable)
    pub field: String,
    /// What happened
    pub action: OptimizeAction,
}

/// Start an optimizer pass materializing `file` into `output`
///
/// Setup (opening the product, creating or opening the cache, taking the
/// lock) happens eagerly; fields are processed as the returned iterator is
/// driven.
pub fn optimize<'a, O: StoreOpener>(
    opener: &O,
    file: &Path,
    catalog: &'a FieldCatalog,
    output: &Path,
    options: OptimizeOptions,
) -> Result<Optimizer<'a, O>> {
    if options.mode == CacheMode::Create && output.exists() {
        return Err(Error::CacheExists(output.to_path_buf()));
    }

    let store = StoreGuard::new(opener.open(file)?, file);
    let product_type = store
        .store()
        .map(|s| s.product_type_name().to_string())
        .unwrap_or_default();
    if product_type != catalog.product_type() {
        return Err(Error::UnsupportedProduct(product_type));
    }

    let (cache, created_here) = if output.exists() {
        let cache = OptimizedCache::open(output)?;
        if cache.product_type() != catalog.product_type() {
            return Err(Error::UnsupportedProduct(cache.product_type().to_string()));
        }
        (cache, false)
    } else {
        (OptimizedCache::create(output, catalog.product_type())?, true)
    };

    let lock = match CacheLock::acquire(output) {
        Ok(lock) => lock,
        Err(e) => {
            if created_here {
                remove_output(output);
            }
            return Err(e.into());
        },
    };

    let source = source_name(file);
    let source_known = cache.manifest().source_files.contains(&source);
    let offsets = catalog
        .levels()
        .iter()
        .map(|l| (l.name().to_string(), cache.record_count(l.name())))
        .collect();
    let queue = catalog
        .levels()
        .iter()
        .flat_map(|l| l.fields().iter().map(move |f| (l.name().to_string(), f.name().to_string())))
        .collect();

    info!(
        file = %file.display(),
        output = %output.display(),
        mode = ?options.mode,
        created = created_here,
        known_source = source_known,
        "Optimizer pass started"
    );

    Ok(Optimizer {
        catalog,
        raster: None,
        store: Some(store),
        cache: Some(cache),
        lock: Some(lock),
        source,
        source_known,
        output: output.to_path_buf(),
        options,
        created_here,
        offsets,
        queue,
        finished: false,
    })
}

fn source_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn remove_output(output: &Path) {
    match fs::remove_dir_all(output) {
        Ok(()) => error!(output = %output.display(), "Removed incomplete optimized cache"),
        Err(e) => error!(output = %output.display(), error = %e, "Failed to remove incomplete optimized cache"),
    }
}

/// Lazy optimizer pass, see [`optimize`]
pub struct Optimizer<'a, O: StoreOpener> {
    catalog: &'a FieldCatalog,
    raster: Option<&'a dyn RasterSampler>,
    store: Option<StoreGuard<O::Store>>,
    cache: Option<OptimizedCache>,
    lock: Option<CacheLock>,
    source: String,
    source_known: bool,
    output: PathBuf,
    options: OptimizeOptions,
    created_here: bool,
    offsets: BTreeMap<String, usize>,
    queue: VecDeque<(String, String)>,
    finished: bool,
}

impl<'a, O: StoreOpener> Optimizer<'a, O> {
    /// Raster used by computed fields that sample one
    pub fn with_raster(mut self, raster: &'a dyn RasterSampler) -> Self {
        self.raster = Some(raster);
        self
    }

    /// Drive the pass to completion
    pub fn run(mut self) -> Result<Vec<OptimizeEvent>> {
        let mut events = Vec::new();
        for event in &mut self {
            events.push(event?);
        }
        Ok(events)
    }

    fn process(&mut self, level: &str, field: &str) -> Result<OptimizeAction> {
        let (Some(guard), Some(cache)) = (self.store.as_ref(), self.cache.as_mut()) else {
            return Err(Error::Configuration("optimizer pass already finished".to_string()));
        };
        let Some(store) = guard.store() else {
            return Err(Error::Configuration("product already closed".to_string()));
        };

        let exists = cache.has_variable(level, field);
        if exists {
            match self.options.mode {
                CacheMode::Create => {
                    return Err(Error::OptimizationConflict {
                        group: level.to_string(),
                        field: field.to_string(),
                        path: self.output.clone(),
                    })
                },
                CacheMode::Update if !self.options.allowlist.contains(field) => {
                    debug!(level = level, field = field, "Field already cached, skipping");
                    return Ok(OptimizeAction::Skipped(SkipReason::Exists));
                },
                CacheMode::Update => {},
            }
        }

        let resolver = Resolver::new(store, self.catalog).with_raster(self.raster);
        let data = match resolver.resolve_field(field) {
            Ok(data) => data,
            Err(e) if e.is_missing_data() => {
                warn!(level = level, field = field, error = %e, "Field unavailable, not cached");
                return Ok(OptimizeAction::Skipped(SkipReason::Unavailable));
            },
            Err(e) => return Err(e),
        };

        if data.depth() > MAX_DIMENSIONALITY {
            return Err(Error::Shape(format!(
                "field '{}' nests {} levels deep, at most {} can be cached",
                field,
                data.depth(),
                MAX_DIMENSIONALITY
            )));
        }
        if data.shape().is_none() {
            warn!(level = level, field = field, "Field has variable-length axes, not cached");
            return Ok(OptimizeAction::Skipped(SkipReason::Ragged));
        }

        // the source's records already sit at the head of the level
        let offset = if !exists && self.source_known {
            0
        } else {
            self.offsets.get(level).copied().unwrap_or(0)
        };
        let write = cache.write_variable(level, field, &data, offset)?;
        debug!(
            level = level,
            field = field,
            offset = offset,
            padded = write.padded,
            records = write.written,
            "Field cached"
        );
        Ok(if exists {
            OptimizeAction::Appended
        } else {
            OptimizeAction::Created
        })
    }

    fn complete(&mut self) -> Result<()> {
        self.finished = true;
        if let Some(cache) = self.cache.as_mut() {
            if !self.source_known {
                cache.add_source(&self.source)?;
            }
        }
        self.store = None;
        self.lock = None;
        info!(output = %self.output.display(), source = %self.source, "Optimizer pass finished");
        Ok(())
    }

    fn abort(&mut self) {
        self.finished = true;
        self.store = None;
        self.cache = None;
        if self.created_here {
            remove_output(&self.output);
        }
        self.lock = None;
    }
}

impl<O: StoreOpener> Iterator for Optimizer<'_, O> {
    type Item = Result<OptimizeEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some((level, field)) = self.queue.pop_front() else {
            return match self.complete() {
                Ok(()) => None,
                Err(e) => {
                    self.abort();
                    Some(Err(e))
                },
            };
        };

        match self.process(&level, &field) {
            Ok(action) => Some(Ok(OptimizeEvent { level, field, action })),
            Err(e) => {
                error!(level = %level, field = %field, error = %e, "Optimizer pass failed");
                self.abort();
                Some(Err(e))
            },
        }
    }
}

impl<O: StoreOpener> Drop for Optimizer<'_, O> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(output = %self.output.display(), "Optimizer pass abandoned before completion");
            self.abort();
        }
    }
}
