//! Hierarchical mask propagation
//!
//! Entity levels reference each other through index maps: for every record
//! of a source level, a field lists 1-based indices into a target level,
//! 0 meaning "no reference". A selection on the source level selects exactly
//! the referenced target records.

use crate::array::Array;
use crate::catalog::{FieldCatalog, LevelDef};
use crate::error::{Error, Result};
use crate::location::Resolver;
use crate::mask::{combine_mask, Mask};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Project a source-level mask onto a target level through an index map
///
/// The projected mask is AND-combined with `existing`, the target level's
/// own filter mask.
pub fn join_mask(
    index_map: &Array,
    target_size: usize,
    parent_mask: &Mask,
    existing: Option<Mask>,
) -> Result<Mask> {
    if index_map.len() != parent_mask.len() {
        return Err(Error::Shape(format!(
            "index map has {} rows, parent mask covers {} records",
            index_map.len(),
            parent_mask.len()
        )));
    }

    let mut flags = vec![false; target_size];
    let mut out_of_range = 0usize;
    for row in parent_mask.selected_indices() {
        let references = match index_map {
            Array::Nested(rows) => rows[row].leaf_values_i64(),
            flat => flat.take(&[row])?.leaf_values_i64(),
        };
        for id in references.into_iter().filter(|&id| id > 0) {
            match flags.get_mut(id as usize - 1) {
                Some(flag) => *flag = true,
                None => out_of_range += 1,
            }
        }
    }
    if out_of_range > 0 {
        warn!(
            out_of_range = out_of_range,
            target_size = target_size,
            "Index map references records beyond the target level"
        );
    }

    combine_mask(Mask::new(flags), existing)
}

/// Number of records on `level`
pub(crate) fn level_size(resolver: &Resolver<'_>, level: &LevelDef) -> Result<usize> {
    if let Some(path) = level.count_path() {
        let count = resolver.fetch_path(level.name(), path)?;
        return count
            .first_f64()
            .filter(|c| *c >= 0.0)
            .map(|c| c as usize)
            .ok_or_else(|| Error::Shape(format!("invalid record count at {}", path)));
    }
    if let Some(path) = level.record_path() {
        let dims = resolver.store().axis_size(path)?;
        return Ok(dims.first().copied().unwrap_or(0));
    }
    Err(Error::Catalog(format!(
        "level '{}' declares neither a record count nor a record path",
        level.name()
    )))
}

/// Apply every catalog join to the per-level masks, in declaration order
///
/// Joins only fire when the source level carries a mask.
pub(crate) fn apply_joins(
    resolver: &Resolver<'_>,
    catalog: &FieldCatalog,
    masks: &mut BTreeMap<String, Option<Mask>>,
) -> Result<()> {
    for join in catalog.joins() {
        let Some(Some(parent)) = masks.get(&join.source).cloned() else {
            continue;
        };

        let as_index_error = |e: Error| Error::MissingIndexMap {
            mapping_field: join.mapping_field.clone(),
            source: Box::new(e),
        };
        let index_map = resolver
            .resolve_field(&join.mapping_field)
            .map_err(as_index_error)?;
        let target = catalog
            .level(&join.target)
            .ok_or_else(|| Error::UnknownLevel(join.target.clone()))?;
        let size = level_size(resolver, target).map_err(as_index_error)?;

        let existing = masks.remove(&join.target).flatten();
        let joined = join_mask(&index_map, size, &parent, existing)?;
        debug!(
            source = %join.source,
            target = %join.target,
            selected = joined.count(),
            of = size,
            "Propagated selection"
        );
        masks.insert(join.target.clone(), Some(joined));
    }
    Ok(())
}
