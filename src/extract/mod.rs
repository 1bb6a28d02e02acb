//! Filtered extraction over sequences of product files
//!
//! # Flow
//!
//! 1. [`Extractor::extract`] validates the request against the catalog
//!    before any file is touched
//! 2. The returned [`Extraction`] opens files lazily, one step per file
//! 3. Per file, every level's filters become a mask, joins propagate masks
//!    across levels, and requested fields are subset by the final masks
//! 4. Each step yields one [`FileResult`] holding a [`LevelResult`] per
//!    requested level
//!
//! Consecutive files that overlap in time are clipped so the overlapping
//! records are emitted once, by the earlier file.

pub mod join;
pub mod level;
pub mod result;
pub mod stitch;

use crate::catalog::FieldCatalog;
use crate::error::{Error, Result};
use crate::location::Resolver;
use crate::mask::{Mask, Selection};
use crate::raster::RasterSampler;
use crate::store::StoreOpener;
use crate::types::{FieldSelection, Filter, Filters};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

pub use join::join_mask;
pub use result::{merge_results, FieldData, FileResult, LevelResult, PlainValue};
pub use stitch::Extraction;

/// What to extract from which files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractRequest {
    /// Product files, in time order
    pub files: Vec<PathBuf>,

    /// Range filters keyed by field name
    #[serde(default)]
    pub filters: Filters,

    /// Output fields keyed by level name
    #[serde(default)]
    pub fields: FieldSelection,

    /// Emit plain per-record values instead of typed arrays
    #[serde(default)]
    pub plain_arrays: bool,

    /// Optimized caches to read before the product, keyed by product file
    #[serde(default)]
    pub caches: BTreeMap<PathBuf, PathBuf>,

    /// Verify cache checksums on read
    #[serde(default = "default_verify_checksums")]
    pub verify_checksums: bool,
}

fn default_verify_checksums() -> bool {
    true
}

impl Default for ExtractRequest {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            filters: Filters::new(),
            fields: FieldSelection::new(),
            plain_arrays: false,
            caches: BTreeMap::new(),
            verify_checksums: default_verify_checksums(),
        }
    }
}

impl ExtractRequest {
    /// Request over `files` with no filters and no fields
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add a filter
    pub fn filter(mut self, field: &str, filter: Filter) -> Self {
        self.filters.insert(field.to_string(), filter);
        self
    }

    /// Request fields of a level
    pub fn fields(mut self, level: &str, fields: &[&str]) -> Self {
        self.fields
            .entry(level.to_string())
            .or_default()
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Switch to plain output encoding
    pub fn plain_arrays(mut self, plain: bool) -> Self {
        self.plain_arrays = plain;
        self
    }

    /// Read `file`'s fields from the optimized cache at `cache` when present
    pub fn with_cache(mut self, file: impl Into<PathBuf>, cache: impl Into<PathBuf>) -> Self {
        self.caches.insert(file.into(), cache.into());
        self
    }

    /// Toggle checksum verification of cache reads
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    /// Check names and filter bounds against `catalog`
    pub fn validate(&self, catalog: &FieldCatalog) -> Result<()> {
        catalog.check_fields(self.filters.keys().map(String::as_str), "filter")?;
        for (name, filter) in &self.filters {
            filter.validate(name)?;
        }

        let mut unknown = BTreeSet::new();
        for (level_name, fields) in &self.fields {
            let level = catalog
                .level(level_name)
                .ok_or_else(|| Error::UnknownLevel(level_name.clone()))?;
            unknown.extend(fields.iter().filter(|f| !level.contains(f)).cloned());
        }
        if !unknown.is_empty() {
            return Err(Error::UnknownField {
                kind: "requested".to_string(),
                fields: unknown.into_iter().collect(),
            });
        }
        Ok(())
    }
}

/// Entry point binding a store opener, a catalog and optional collaborators
pub struct Extractor<'a, O: StoreOpener> {
    opener: &'a O,
    catalog: &'a FieldCatalog,
    raster: Option<&'a dyn RasterSampler>,
}

impl<'a, O: StoreOpener> Extractor<'a, O> {
    /// Extractor reading products through `opener`
    pub fn new(opener: &'a O, catalog: &'a FieldCatalog) -> Self {
        Self {
            opener,
            catalog,
            raster: None,
        }
    }

    /// Raster used by computed fields that sample one
    pub fn with_raster(mut self, raster: &'a dyn RasterSampler) -> Self {
        self.raster = Some(raster);
        self
    }

    /// Validate `request` and return the lazy per-file extraction
    pub fn extract(&self, request: ExtractRequest) -> Result<Extraction<'a, O>> {
        request.validate(self.catalog)?;
        Ok(Extraction::new(self.opener, self.catalog, self.raster, request))
    }
}

/// Extract every requested level from one opened product
pub(crate) fn extract_file(
    resolver: &Resolver<'_>,
    catalog: &FieldCatalog,
    filters: &Filters,
    fields: &FieldSelection,
    plain: bool,
) -> Result<BTreeMap<String, LevelResult>> {
    let mut masks: BTreeMap<String, Option<Mask>> = BTreeMap::new();
    for level in catalog.top_levels() {
        masks.insert(level.name().to_string(), level::level_mask(resolver, level, filters)?);
    }

    join::apply_joins(resolver, catalog, &mut masks)?;

    let requested = |name: &str| fields.get(name).filter(|f| !f.is_empty());
    let mut levels = BTreeMap::new();
    for top in catalog.top_levels() {
        let selection = Selection::from_mask(masks.get(top.name()).and_then(Option::as_ref));

        if let Some(names) = requested(top.name()) {
            let result = level::fetch_fields(resolver, top, names, &selection, plain)?;
            levels.insert(top.name().to_string(), result);
        }

        for sub in catalog.sublevels_of(top.name()) {
            if let Some(names) = requested(sub.name()) {
                let result = level::extract_sublevel(resolver, sub, filters, names, &selection, plain)?;
                levels.insert(sub.name().to_string(), result);
            }
        }
    }
    Ok(levels)
}
