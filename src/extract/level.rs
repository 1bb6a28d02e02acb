//! Level extraction
//!
//! Turns one level's filters into a mask, the mask into a selection, and
//! the selection into subset field data. Nested sublevels (measurements
//! inside observations) are restricted to the selected parent records and
//! then filtered per parent record.

use super::result::{FieldData, LevelResult};
use crate::array::Array;
use crate::catalog::LevelDef;
use crate::error::{Error, Result};
use crate::location::Resolver;
use crate::mask::{combine_mask, make_mask, Mask, Selection};
use crate::types::Filters;
use tracing::{debug, warn};

/// AND of every filter on `level`'s own fields
///
/// Returns `None` when no filter applies to the level. Filter fields the
/// product does not carry are skipped with a warning.
pub(crate) fn level_mask(resolver: &Resolver<'_>, level: &LevelDef, filters: &Filters) -> Result<Option<Mask>> {
    let mut mask = None;
    for (name, filter) in filters {
        let Some(field) = level.get(name) else {
            continue;
        };
        let data = match resolver.resolve_field(name) {
            Ok(data) => data,
            Err(e) if e.is_missing_data() => {
                warn!(level = level.name(), field = %name, error = %e, "Filter field unavailable, skipping filter");
                continue;
            },
            Err(e) => return Err(e),
        };
        let field_mask = make_mask(&data, filter, field.is_array())?;
        mask = Some(combine_mask(field_mask, mask)?);
    }
    if let Some(mask) = &mask {
        debug!(level = level.name(), selected = mask.count(), of = mask.len(), "Level mask built");
    }
    Ok(mask)
}

fn resolve_requested(resolver: &Resolver<'_>, level: &LevelDef, name: &str) -> Result<Array> {
    resolver.resolve_field(name).map_err(|e| Error::Field {
        level: level.name().to_string(),
        field: name.to_string(),
        source: Box::new(e),
    })
}

/// Requested fields of a top-level level, subset by `selection`
pub(crate) fn fetch_fields(
    resolver: &Resolver<'_>,
    level: &LevelDef,
    fields: &[String],
    selection: &Selection,
    plain: bool,
) -> Result<LevelResult> {
    let mut result = LevelResult::new(level.name());
    for name in fields {
        let data = selection.apply(resolve_requested(resolver, level, name)?)?;
        result.fields.insert(name.clone(), FieldData::encode(data, plain));
    }
    Ok(result)
}

/// Per-parent masks from the sublevel's own filters
fn sublevel_masks(
    resolver: &Resolver<'_>,
    level: &LevelDef,
    filters: &Filters,
    parent: &Selection,
) -> Result<Option<Vec<Mask>>> {
    let mut masks: Option<Vec<Mask>> = None;
    for (name, filter) in filters {
        let Some(field) = level.get(name) else {
            continue;
        };
        let data = match resolver.resolve_field(name) {
            Ok(data) => parent.apply(data)?,
            Err(e) if e.is_missing_data() => {
                warn!(level = level.name(), field = %name, error = %e, "Filter field unavailable, skipping filter");
                continue;
            },
            Err(e) => return Err(e),
        };
        let Array::Nested(records) = data else {
            return Err(Error::Shape(format!(
                "sublevel field '{}' is not nested per parent record",
                name
            )));
        };

        let per_parent = records
            .iter()
            .map(|children| make_mask(children, filter, field.is_array()))
            .collect::<Result<Vec<_>>>()?;

        masks = Some(match masks {
            None => per_parent,
            Some(existing) => existing
                .into_iter()
                .zip(per_parent)
                .map(|(a, b)| combine_mask(a, Some(b)))
                .collect::<Result<Vec<_>>>()?,
        });
    }
    Ok(masks)
}

/// Requested fields of a nested sublevel
///
/// Data is first restricted to the selected parent records. With sublevel
/// filters, the selected `(parent, child)` records are flattened into one
/// axis; without, the per-parent nesting is kept.
pub(crate) fn extract_sublevel(
    resolver: &Resolver<'_>,
    level: &LevelDef,
    filters: &Filters,
    fields: &[String],
    parent: &Selection,
    plain: bool,
) -> Result<LevelResult> {
    let pairs = sublevel_masks(resolver, level, filters, parent)?.map(|masks| {
        masks
            .iter()
            .enumerate()
            .flat_map(|(p, mask)| mask.selected_indices().into_iter().map(move |c| (p, c)))
            .collect::<Vec<_>>()
    });
    if let Some(pairs) = &pairs {
        debug!(level = level.name(), selected = pairs.len(), "Sublevel mask built");
    }

    let mut result = LevelResult::new(level.name());
    for name in fields {
        let data = parent.apply(resolve_requested(resolver, level, name)?)?;
        let data = match &pairs {
            Some(pairs) => data.take_pairs(pairs).map_err(|e| Error::Field {
                level: level.name().to_string(),
                field: name.clone(),
                source: Box::new(e),
            })?,
            None => data,
        };
        result.fields.insert(name.clone(), FieldData::encode(data, plain));
    }
    Ok(result)
}
