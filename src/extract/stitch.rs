//! Multi-file stitching
//!
//! Consecutive products of one orbit stream overlap in time: the tail of
//! file *i* repeats the head of file *i+1*. Before extracting file *i*, the
//! first timestamp of file *i+1* is compared with the last timestamp of
//! file *i*. On overlap, the overlap-sensitive filters of file *i* are
//! clipped to end at that timestamp and file *i+1* receives an exclusive
//! lower bound at the same instant, so every record is emitted exactly once.
//!
//! Only the immediately following file is consulted; files must be passed
//! in time order.

use super::{extract_file, ExtractRequest, FileResult};
use crate::cache::OptimizedCache;
use crate::catalog::{FieldCatalog, OverlapPolicy};
use crate::error::{Error, Result, StoreError};
use crate::location::Resolver;
use crate::raster::RasterSampler;
use crate::store::{ProductStore, Segment, StoreGuard, StoreOpener, StorePath};
use crate::types::Bound;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
enum Boundary {
    First,
    Last,
}

/// Timestamp of the first or last record along every wildcard axis
///
/// Returns `None` when an axis is empty or the product lacks the path.
fn boundary_time(
    store: &dyn ProductStore,
    path: &StorePath,
    boundary: Boundary,
) -> Result<Option<DateTime<Utc>>> {
    let mut concrete = path.clone();
    for (position, segment) in path.segments().iter().enumerate() {
        if *segment != Segment::All {
            continue;
        }
        let dims = match store.axis_size(&concrete.prefix(position)) {
            Ok(dims) => dims,
            Err(StoreError::NoSuchPath(missing)) => {
                warn!(path = %missing, "Overlap time path missing, skipping overlap check");
                return Ok(None);
            },
            Err(e) => return Err(e.into()),
        };
        let len = dims.first().copied().unwrap_or(0);
        if len == 0 {
            return Ok(None);
        }
        let index = match boundary {
            Boundary::First => 0,
            Boundary::Last => len - 1,
        };
        concrete = concrete.with_segment(position, Segment::Index(index));
    }

    match store.fetch_as_timestamp(&concrete) {
        Ok(t) => Ok(Some(t)),
        Err(StoreError::NoSuchPath(missing)) => {
            warn!(path = %missing, "Overlap time path missing, skipping overlap check");
            Ok(None)
        },
        Err(e) => Err(e.into()),
    }
}

/// Start of `next` if it begins before `current` ends
pub(crate) fn overlap_stop(
    current: &dyn ProductStore,
    next: &dyn ProductStore,
    policy: &OverlapPolicy,
) -> Result<Option<DateTime<Utc>>> {
    let end = boundary_time(current, &policy.time_path, Boundary::Last)?;
    let begin = boundary_time(next, &policy.time_path, Boundary::First)?;
    Ok(match (begin, end) {
        (Some(begin), Some(end)) if begin < end => Some(begin),
        _ => None,
    })
}

/// Lazy per-file extraction
///
/// Yields one item per file, in order. Errors are wrapped in
/// [`Error::InFile`]; after a fatal error iteration ends. Dropping the
/// iterator closes every handle it still holds.
pub struct Extraction<'a, O: StoreOpener> {
    opener: &'a O,
    catalog: &'a FieldCatalog,
    raster: Option<&'a dyn RasterSampler>,
    request: ExtractRequest,
    position: usize,
    lookahead: Option<StoreGuard<O::Store>>,
    floor: Option<Bound>,
    finished: bool,
}

impl<'a, O: StoreOpener> Extraction<'a, O> {
    pub(crate) fn new(
        opener: &'a O,
        catalog: &'a FieldCatalog,
        raster: Option<&'a dyn RasterSampler>,
        request: ExtractRequest,
    ) -> Self {
        Self {
            opener,
            catalog,
            raster,
            request,
            position: 0,
            lookahead: None,
            floor: None,
            finished: false,
        }
    }

    /// Files still to be processed
    pub fn remaining(&self) -> usize {
        self.request.files.len().saturating_sub(self.position)
    }

    fn open(&self, path: &Path) -> Result<StoreGuard<O::Store>> {
        let store = self.opener.open(path)?;
        if store.product_type_name() != self.catalog.product_type() {
            let found = store.product_type_name().to_string();
            // closes the handle before reporting
            drop(StoreGuard::new(store, path));
            return Err(Error::UnsupportedProduct(found));
        }
        debug!(path = %path.display(), state = "opened", "Product opened");
        Ok(StoreGuard::new(store, path))
    }

    fn open_cache(&self, path: &Path) -> Option<OptimizedCache> {
        let cache_path = self.request.caches.get(path)?;
        match OptimizedCache::open(cache_path) {
            Ok(cache) => {
                // a cache merged from several products cannot stand in for one of them
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                let sources = &cache.manifest().source_files;
                if sources.len() != 1 || Some(&sources[0]) != name.as_ref() {
                    warn!(
                        path = %path.display(),
                        cache = %cache_path.display(),
                        sources = ?sources,
                        "Optimized cache built from other products, reading product directly"
                    );
                    return None;
                }
                Some(cache.verify_checksums(self.request.verify_checksums))
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    cache = %cache_path.display(),
                    error = %e,
                    "Optimized cache unusable, reading product directly"
                );
                None
            },
        }
    }

    fn step(&mut self, index: usize) -> Result<FileResult> {
        let path = self.request.files[index].clone();
        let mut current = match self.lookahead.take() {
            Some(guard) => guard,
            None => self.open(&path)?,
        };

        let mut filters = self.request.filters.clone();
        if let (Some(floor), Some(policy)) = (self.floor.take(), self.catalog.overlap()) {
            for field in &policy.fields {
                filters.entry(field.clone()).or_default().raise_floor_exclusive(floor);
            }
        }

        if let (Some(policy), Some(next_path)) =
            (self.catalog.overlap(), self.request.files.get(index + 1).cloned())
        {
            match self.open(&next_path) {
                Ok(next) => {
                    let stop = match (current.store(), next.store()) {
                        (Some(cur), Some(nxt)) => overlap_stop(cur, nxt, policy)?,
                        _ => None,
                    };
                    if let Some(stop) = stop {
                        info!(
                            file = %path.display(),
                            next = %next_path.display(),
                            stop = %stop,
                            "Consecutive products overlap, clipping"
                        );
                        for field in &policy.fields {
                            filters.entry(field.clone()).or_default().tighten_max(Bound::Time(stop));
                        }
                        self.floor = Some(Bound::Time(stop));
                    }
                    self.lookahead = Some(next);
                },
                // reported when the next file's own step opens it
                Err(e) => warn!(
                    file = %path.display(),
                    next = %next_path.display(),
                    error = %e,
                    "Next product unavailable, skipping overlap check"
                ),
            }
        }
        debug!(path = %path.display(), state = "overlap_checked", "Overlap checked");

        let store = current.store().ok_or(Error::Store(StoreError::Closed))?;
        let product_type = store.product_type_name().to_string();
        let cache = self.open_cache(&path);
        let resolver = Resolver::new(store, self.catalog)
            .with_raster(self.raster)
            .with_cache(cache.as_ref());
        let levels = extract_file(
            &resolver,
            self.catalog,
            &filters,
            &self.request.fields,
            self.request.plain_arrays,
        )?;
        debug!(path = %path.display(), state = "extracted", levels = levels.len(), "Product extracted");

        if let Err(e) = current.release() {
            warn!(path = %path.display(), error = %e, "Failed to close product");
        }
        debug!(path = %path.display(), state = "closed", "Product closed");

        Ok(FileResult {
            file: path,
            product_type,
            levels,
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        self.lookahead = None;
    }
}

impl<O: StoreOpener> Iterator for Extraction<'_, O> {
    type Item = Result<FileResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.position >= self.request.files.len() {
            self.finish();
            return None;
        }

        let index = self.position;
        self.position += 1;
        match self.step(index) {
            Ok(result) => Some(Ok(result)),
            Err(e) => {
                let file: PathBuf = self.request.files[index].clone();
                if e.is_fatal() {
                    warn!(file = %file.display(), error = %e, "Fatal extraction error, stopping");
                    self.finish();
                } else {
                    warn!(file = %file.display(), error = %e, "File skipped");
                }
                Some(Err(Error::InFile {
                    file,
                    source: Box::new(e),
                }))
            },
        }
    }
}
