//! Field catalogs
//!
//! A [`FieldCatalog`] describes one product family: its entity levels, the
//! ordered candidate locations of every field, the index-map joins between
//! levels and the overlap policy for stitching consecutive files.
//!
//! Catalogs are immutable once built and are passed explicitly to the
//! extractor and the optimizer.

pub mod products;

use crate::error::{Error, Result};
use crate::location::{ComputedField, Location};
use crate::store::StorePath;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

// =============================================================================
// Fields and levels
// =============================================================================

/// One named field and where to find it
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    candidates: Vec<Location>,
    is_array: bool,
}

impl FieldDef {
    /// Field stored at `location`
    pub fn new(name: impl Into<String>, location: impl Into<Location>) -> Self {
        Self {
            name: name.into(),
            candidates: vec![location.into()],
            is_array: false,
        }
    }

    /// Field derived from other fields
    pub fn computed(name: impl Into<String>, computed: impl ComputedField + 'static) -> Self {
        Self::new(name, Location::Computed(Arc::new(computed)))
    }

    /// Mark every record as holding an array of samples
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Add a fallback location, tried after the existing ones
    pub fn or(mut self, location: impl Into<Location>) -> Self {
        self.candidates.push(location.into());
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidate locations in resolution order
    pub fn candidates(&self) -> &[Location] {
        &self.candidates
    }

    /// Whether each record holds an array of samples
    pub fn is_array(&self) -> bool {
        self.is_array
    }
}

/// An entity level of a product (observation, measurement, wind result, ...)
#[derive(Debug, Clone)]
pub struct LevelDef {
    name: String,
    parent: Option<String>,
    record_path: Option<StorePath>,
    count_path: Option<StorePath>,
    fields: Vec<FieldDef>,
}

impl LevelDef {
    /// Empty level
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            record_path: None,
            count_path: None,
            fields: Vec::new(),
        }
    }

    /// Nest this level inside each record of `parent`
    pub fn nested_in(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Array whose outer axis enumerates this level's records
    pub fn records_at(mut self, path: impl Into<StorePath>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    /// Scalar holding this level's record count
    pub fn count_at(mut self, path: impl Into<StorePath>) -> Self {
        self.count_path = Some(path.into());
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Level name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enclosing level of a nested sublevel
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Record array path, if declared
    pub fn record_path(&self) -> Option<&StorePath> {
        self.record_path.as_ref()
    }

    /// Record count path, if declared
    pub fn count_path(&self) -> Option<&StorePath> {
        self.count_path.as_ref()
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Field by name
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// True if `name` belongs to this level
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Selection propagation from one level to another through an index map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinDef {
    /// Level whose mask is propagated
    pub source: String,
    /// Level receiving the propagated mask
    pub target: String,
    /// Source-level field holding 1-based target indices
    pub mapping_field: String,
}

/// How consecutive files of this product overlap in time
#[derive(Debug, Clone)]
pub struct OverlapPolicy {
    /// Per-record timestamps, wildcards over every record axis
    pub time_path: StorePath,
    /// Top-level fields whose filters are clipped at the next file's start
    ///
    /// Nested levels follow the clipped parent selection.
    pub fields: Vec<String>,
}

// =============================================================================
// Catalog
// =============================================================================

/// Immutable description of one product family
#[derive(Debug, Clone)]
pub struct FieldCatalog {
    product_type: String,
    levels: Vec<LevelDef>,
    joins: Vec<JoinDef>,
    overlap: Option<OverlapPolicy>,
    index: HashMap<String, usize>,
}

impl FieldCatalog {
    /// Start building a catalog for `product_type`
    pub fn builder(product_type: impl Into<String>) -> CatalogBuilder {
        CatalogBuilder {
            product_type: product_type.into(),
            levels: Vec::new(),
            joins: Vec::new(),
            overlap: None,
        }
    }

    /// Product type identifier
    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    /// All levels in declaration order
    pub fn levels(&self) -> &[LevelDef] {
        &self.levels
    }

    /// Levels that are not nested in another level
    pub fn top_levels(&self) -> impl Iterator<Item = &LevelDef> {
        self.levels.iter().filter(|l| l.parent.is_none())
    }

    /// Levels nested in `parent`
    pub fn sublevels_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a LevelDef> {
        self.levels.iter().filter(move |l| l.parent.as_deref() == Some(parent))
    }

    /// Level by name
    pub fn level(&self, name: &str) -> Option<&LevelDef> {
        self.levels.iter().find(|l| l.name == name)
    }

    /// Field and its level
    pub fn field(&self, name: &str) -> Option<(&LevelDef, &FieldDef)> {
        let level = &self.levels[*self.index.get(name)?];
        level.get(name).map(|f| (level, f))
    }

    /// Name of the level `field` belongs to
    pub fn level_of(&self, field: &str) -> Option<&str> {
        self.field(field).map(|(l, _)| l.name())
    }

    /// Joins in application order
    pub fn joins(&self) -> &[JoinDef] {
        &self.joins
    }

    /// Overlap policy for stitching, if the product has one
    pub fn overlap(&self) -> Option<&OverlapPolicy> {
        self.overlap.as_ref()
    }

    /// Reject every name the catalog does not know
    ///
    /// All offending names are reported together, sorted.
    pub fn check_fields<'a, I>(&self, names: I, kind: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unknown: BTreeSet<&str> = names
            .into_iter()
            .filter(|n| !self.index.contains_key(*n))
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }
        Err(Error::UnknownField {
            kind: kind.to_string(),
            fields: unknown.into_iter().map(str::to_string).collect(),
        })
    }
}

/// Builder validating catalog structure
#[derive(Debug)]
pub struct CatalogBuilder {
    product_type: String,
    levels: Vec<LevelDef>,
    joins: Vec<JoinDef>,
    overlap: Option<OverlapPolicy>,
}

impl CatalogBuilder {
    /// Add a level
    pub fn level(mut self, level: LevelDef) -> Self {
        self.levels.push(level);
        self
    }

    /// Propagate `source` selections to `target` through `mapping_field`
    pub fn join(mut self, source: &str, target: &str, mapping_field: &str) -> Self {
        self.joins.push(JoinDef {
            source: source.to_string(),
            target: target.to_string(),
            mapping_field: mapping_field.to_string(),
        });
        self
    }

    /// Declare the overlap policy
    pub fn overlap(mut self, time_path: impl Into<StorePath>, fields: &[&str]) -> Self {
        self.overlap = Some(OverlapPolicy {
            time_path: time_path.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    /// Validate and freeze the catalog
    pub fn build(self) -> Result<FieldCatalog> {
        let mut index = HashMap::new();
        let mut level_names = BTreeSet::new();

        for (i, level) in self.levels.iter().enumerate() {
            if !level_names.insert(level.name.as_str()) {
                return Err(Error::Catalog(format!("duplicate level '{}'", level.name)));
            }
            for field in &level.fields {
                if field.candidates.is_empty() {
                    return Err(Error::Catalog(format!("field '{}' has no location", field.name)));
                }
                if index.insert(field.name.clone(), i).is_some() {
                    return Err(Error::Catalog(format!(
                        "field '{}' belongs to more than one level",
                        field.name
                    )));
                }
            }
        }

        let top_level = |name: &str| {
            self.levels
                .iter()
                .any(|l| l.name == name && l.parent.is_none())
        };

        for level in &self.levels {
            if let Some(parent) = &level.parent {
                if !top_level(parent) {
                    return Err(Error::Catalog(format!(
                        "level '{}' nests in '{}', which is not a top-level level",
                        level.name, parent
                    )));
                }
            }
        }

        for join in &self.joins {
            if !top_level(&join.source) || !top_level(&join.target) {
                return Err(Error::Catalog(format!(
                    "join {} -> {} must connect top-level levels",
                    join.source, join.target
                )));
            }
            let source_index = self.levels.iter().position(|l| l.name == join.source);
            if index.get(&join.mapping_field).copied() != source_index {
                return Err(Error::Catalog(format!(
                    "mapping field '{}' is not a field of level '{}'",
                    join.mapping_field, join.source
                )));
            }
        }

        if let Some(policy) = &self.overlap {
            for field in &policy.fields {
                let level = index
                    .get(field)
                    .map(|&i| &self.levels[i])
                    .ok_or_else(|| Error::Catalog(format!("overlap field '{}' is not in the catalog", field)))?;
                if level.parent.is_some() {
                    return Err(Error::Catalog(format!(
                        "overlap field '{}' belongs to nested level '{}'",
                        field, level.name
                    )));
                }
            }
        }

        Ok(FieldCatalog {
            product_type: self.product_type,
            levels: self.levels,
            joins: self.joins,
            overlap: self.overlap,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_levels() -> CatalogBuilder {
        FieldCatalog::builder("TEST")
            .level(
                LevelDef::new("profile")
                    .field(FieldDef::new("profile_time", "profiles/*/time"))
                    .field(FieldDef::new("wind_ids", "profiles/*/wind_ids").array()),
            )
            .level(LevelDef::new("wind").field(FieldDef::new("wind_speed", "winds/*/speed")))
    }

    #[test]
    fn test_lookup() {
        let catalog = two_levels().join("profile", "wind", "wind_ids").build().unwrap();
        assert_eq!(catalog.level_of("wind_speed"), Some("wind"));
        assert!(catalog.field("wind_ids").unwrap().1.is_array());
        assert_eq!(catalog.top_levels().count(), 2);
        assert_eq!(catalog.joins().len(), 1);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = two_levels()
            .level(LevelDef::new("other").field(FieldDef::new("wind_speed", "x")))
            .build();
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_join_mapping_must_live_in_source() {
        let result = two_levels().join("profile", "wind", "wind_speed").build();
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_overlap_fields_must_be_top_level() {
        let result = two_levels()
            .level(
                LevelDef::new("sample")
                    .nested_in("profile")
                    .field(FieldDef::new("sample_time", "profiles/*/samples/*/time")),
            )
            .overlap("profiles/*/samples/*/time", &["sample_time"])
            .build();
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_check_fields_reports_all_unknown() {
        let catalog = two_levels().build().unwrap();
        let err = catalog
            .check_fields(["zeta", "profile_time", "alpha"], "filter")
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown filter field(s): alpha, zeta");
    }
}
