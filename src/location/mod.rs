//! Location addressing
//!
//! Every catalog field maps to an ordered list of candidate [`Location`]s.
//! A location is either a structural [`StorePath`] or a [`ComputedField`]
//! deriving its value from other fields. The [`Resolver`] tries candidates
//! in order and the first one that resolves wins; only a missing path moves
//! on to the next candidate.

pub mod computed;

use crate::array::Array;
use crate::cache::OptimizedCache;
use crate::catalog::FieldCatalog;
use crate::error::{Error, RasterError, Result, StoreError};
use crate::raster::RasterSampler;
use crate::store::{ProductStore, StorePath};
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

pub use computed::{AlbedoSample, ChannelSum, FirstReferenced, HorizontalWind, WindComponent};

/// Nesting limit for computed fields referring to other computed fields
const MAX_RESOLVE_DEPTH: usize = 16;

/// Field value derived from other fields of the same catalog
pub trait ComputedField: fmt::Debug + Send + Sync {
    /// Short description used in error messages
    fn describe(&self) -> String;

    /// Produce the field's data for the product behind `resolver`
    fn compute(&self, resolver: &Resolver<'_>) -> Result<Array>;
}

/// Where a field's data comes from
#[derive(Debug, Clone)]
pub enum Location {
    /// Structural path inside the product
    Path(StorePath),
    /// Derived from other fields
    Computed(Arc<dyn ComputedField>),
}

impl Location {
    /// Human readable form for logs and errors
    pub fn describe(&self) -> String {
        match self {
            Location::Path(path) => path.to_string(),
            Location::Computed(c) => c.describe(),
        }
    }
}

impl From<&str> for Location {
    fn from(path: &str) -> Self {
        Location::Path(StorePath::from(path))
    }
}

impl From<StorePath> for Location {
    fn from(path: StorePath) -> Self {
        Location::Path(path)
    }
}

/// Resolves locations against one opened product
pub struct Resolver<'a> {
    store: &'a dyn ProductStore,
    catalog: &'a FieldCatalog,
    raster: Option<&'a dyn RasterSampler>,
    cache: Option<&'a OptimizedCache>,
    depth: Cell<usize>,
}

impl<'a> Resolver<'a> {
    /// Resolver over `store` using `catalog` for field lookups
    pub fn new(store: &'a dyn ProductStore, catalog: &'a FieldCatalog) -> Self {
        Self {
            store,
            catalog,
            raster: None,
            cache: None,
            depth: Cell::new(0),
        }
    }

    /// Attach a raster sampler for computed fields that need one
    pub fn with_raster(mut self, raster: Option<&'a dyn RasterSampler>) -> Self {
        self.raster = raster;
        self
    }

    /// Consult an optimized cache before the store
    pub fn with_cache(mut self, cache: Option<&'a OptimizedCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The product being read
    pub fn store(&self) -> &'a dyn ProductStore {
        self.store
    }

    /// Catalog used for field lookups
    pub fn catalog(&self) -> &'a FieldCatalog {
        self.catalog
    }

    /// Configured raster sampler
    pub fn raster(&self) -> Result<&'a dyn RasterSampler> {
        self.raster.ok_or(Error::Raster(RasterError::NoSampler))
    }

    /// Read a structural path, reporting a missing path as `field`
    pub fn fetch_path(&self, field: &str, path: &StorePath) -> Result<Array> {
        self.store.fetch(path).map_err(|e| missing_as_field(field, e))
    }

    /// Resolve a single location on behalf of `field`
    pub fn resolve(&self, field: &str, location: &Location) -> Result<Array> {
        match location {
            Location::Path(path) => self.fetch_path(field, path),
            Location::Computed(computed) => {
                let depth = self.depth.get();
                if depth >= MAX_RESOLVE_DEPTH {
                    return Err(Error::Catalog(format!(
                        "computed field '{}' nests deeper than {} levels",
                        field, MAX_RESOLVE_DEPTH
                    )));
                }
                self.depth.set(depth + 1);
                let result = computed.compute(self);
                self.depth.set(depth);
                result
            },
        }
    }

    /// Resolve a catalog field, first resolvable candidate wins
    pub fn resolve_field(&self, name: &str) -> Result<Array> {
        let (level, def) = self.catalog.field(name).ok_or_else(|| Error::UnknownField {
            kind: self.catalog.product_type().to_string(),
            fields: vec![name.to_string()],
        })?;

        if let Some(cache) = self.cache {
            if let Some(variable) = cache.variable(level.name(), name) {
                let level_records = cache.record_count(level.name());
                if variable.records == level_records {
                    trace!(field = name, level = level.name(), "Reading field from optimized cache");
                    return Ok(cache.read_variable(level.name(), name)?);
                }
                // padded or lagging variables do not line up with the product's records
                warn!(
                    field = name,
                    level = level.name(),
                    records = variable.records,
                    level_records = level_records,
                    "Cached field misaligned with its level, reading product"
                );
            }
        }

        let mut last_missing = None;
        for candidate in def.candidates() {
            match self.resolve(name, candidate) {
                Ok(data) => return Ok(data),
                Err(e @ Error::NoSuchField { .. }) => {
                    trace!(field = name, location = %candidate.describe(), "Candidate location unresolved");
                    last_missing = Some(e);
                },
                Err(e) => return Err(e),
            }
        }
        Err(last_missing.unwrap_or_else(|| Error::NoSuchField {
            field: name.to_string(),
            path: "no candidate locations".to_string(),
        }))
    }
}

fn missing_as_field(field: &str, e: StoreError) -> Error {
    match e {
        StoreError::NoSuchPath(path) => Error::NoSuchField {
            field: field.to_string(),
            path,
        },
        other => Error::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, LevelDef};
    use crate::store::{MemoryStore, Node};

    #[derive(Debug)]
    struct Recursive;

    impl ComputedField for Recursive {
        fn describe(&self) -> String {
            "recursive".to_string()
        }

        fn compute(&self, resolver: &Resolver<'_>) -> Result<Array> {
            resolver.resolve_field("loop")
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(
            "TEST",
            Node::record([("new_layout", Node::record([("time", Node::floats(&[1.0, 2.0]))]))]),
        )
    }

    #[test]
    fn test_first_resolvable_candidate_wins() {
        let catalog = FieldCatalog::builder("TEST")
            .level(
                LevelDef::new("obs").field(
                    FieldDef::new("time", "old_layout/time")
                        .or("new_layout/time")
                        .or("never/reached"),
                ),
            )
            .build()
            .unwrap();
        let store = store();
        let resolver = Resolver::new(&store, &catalog);
        assert_eq!(resolver.resolve_field("time").unwrap(), Array::Float(vec![1.0, 2.0]));
    }

    #[test]
    fn test_all_candidates_missing() {
        let catalog = FieldCatalog::builder("TEST")
            .level(LevelDef::new("obs").field(FieldDef::new("pressure", "a/b").or("c/d")))
            .build()
            .unwrap();
        let store = store();
        let resolver = Resolver::new(&store, &catalog);
        match resolver.resolve_field("pressure") {
            Err(Error::NoSuchField { field, path }) => {
                assert_eq!(field, "pressure");
                assert_eq!(path, "/c/d");
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_recursive_computed_field_is_bounded() {
        let catalog = FieldCatalog::builder("TEST")
            .level(LevelDef::new("obs").field(FieldDef::computed("loop", Recursive)))
            .build()
            .unwrap();
        let store = store();
        let resolver = Resolver::new(&store, &catalog);
        assert!(matches!(resolver.resolve_field("loop"), Err(Error::Catalog(_))));
    }
}
