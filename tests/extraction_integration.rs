//! Filtered extraction tests: masks, sublevels, joins and request validation

mod common;

use common::*;
use swath_extract::array::Array;
use swath_extract::catalog::products;
use swath_extract::error::Error;
use swath_extract::extract::{ExtractRequest, Extractor, FieldData, FileResult, PlainValue};
use swath_extract::raster::{Grid, GridRaster};
use swath_extract::store::JsonStoreOpener;
use swath_extract::types::Filter;
use tempfile::TempDir;

fn extract_one(opener: &TrackingOpener, catalog_kind: &str, request: ExtractRequest) -> FileResult {
    let catalog = match catalog_kind {
        "linked" => linked_catalog(),
        _ => observation_catalog(),
    };
    let mut results: Vec<_> = Extractor::new(opener, &catalog)
        .extract(request)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(results.len(), 1);
    results.remove(0)
}

fn single_observation_file() -> TrackingOpener {
    TrackingOpener::new().with("a", observation_range(0, 10))
}

fn level_floats(result: &FileResult, level: &str, field: &str) -> Vec<f64> {
    floats(result.level(level).unwrap().array(field).unwrap())
}

// =============================================================================
// Masks
// =============================================================================

#[test]
fn test_scalar_range_filter() {
    let request = ExtractRequest::new(["a"])
        .filter("time", Filter::range(3.0, 5.0))
        .fields("obs", &["time"]);
    let result = extract_one(&single_observation_file(), "obs", request);
    assert_eq!(level_floats(&result, "obs", "time"), vec![3.0, 4.0, 5.0]);
}

#[test]
fn test_array_filter_selects_record_when_any_sample_matches() {
    // altitude profile is [t, t + 100]
    let request = ExtractRequest::new(["a"])
        .filter("altitude", Filter::range(105.0, 106.0))
        .fields("obs", &["time", "altitude"]);
    let result = extract_one(&single_observation_file(), "obs", request);

    assert_eq!(level_floats(&result, "obs", "time"), vec![5.0, 6.0]);
    assert_eq!(
        result.level("obs").unwrap().array("altitude").unwrap(),
        &Array::Nested(vec![Array::Float(vec![5.0, 105.0]), Array::Float(vec![6.0, 106.0])])
    );
}

#[test]
fn test_filters_on_one_level_are_anded() {
    let request = ExtractRequest::new(["a"])
        .filter("time", Filter::at_least(4.0))
        .filter("quality", Filter::equal(0.0))
        .fields("obs", &["time"]);
    let result = extract_one(&single_observation_file(), "obs", request);
    assert_eq!(level_floats(&result, "obs", "time"), vec![4.0, 6.0, 8.0, 10.0]);
}

#[test]
fn test_unavailable_filter_field_is_skipped() {
    let request = ExtractRequest::new(["a"])
        .filter("missing", Filter::at_least(0.0))
        .fields("obs", &["time"]);
    let result = extract_one(&single_observation_file(), "obs", request);
    assert_eq!(level_floats(&result, "obs", "time").len(), 11);
}

// =============================================================================
// Sublevels
// =============================================================================

#[test]
fn test_sublevel_without_filters_keeps_nesting() {
    let request = ExtractRequest::new(["a"])
        .filter("time", Filter::range(1.0, 2.0))
        .fields("meas", &["meas_time"]);
    let result = extract_one(&single_observation_file(), "obs", request);

    assert_eq!(
        result.level("meas").unwrap().array("meas_time").unwrap(),
        &Array::Nested(vec![Array::Float(vec![1.25, 1.5]), Array::Float(vec![2.25, 2.5])])
    );
    assert!(result.level("obs").is_none());
}

#[test]
fn test_sublevel_filter_flattens_selected_pairs() {
    // speeds per observation: 10t and 10t + 5
    let request = ExtractRequest::new(["a"])
        .filter("meas_speed", Filter::at_least(95.0))
        .fields("meas", &["meas_speed", "meas_time"]);
    let result = extract_one(&single_observation_file(), "obs", request);
    assert_eq!(level_floats(&result, "meas", "meas_speed"), vec![95.0, 100.0, 105.0]);
    assert_eq!(level_floats(&result, "meas", "meas_time"), vec![9.5, 10.25, 10.5]);

    let request = ExtractRequest::new(["a"])
        .filter("time", Filter::at_most(9.0))
        .filter("meas_speed", Filter::at_least(95.0))
        .fields("meas", &["meas_speed"]);
    let result = extract_one(&single_observation_file(), "obs", request);
    assert_eq!(level_floats(&result, "meas", "meas_speed"), vec![95.0]);
}

// =============================================================================
// Joins
// =============================================================================

fn linked_file() -> TrackingOpener {
    TrackingOpener::new().with("l2", linked_product())
}

#[test]
fn test_profile_selection_propagates_to_winds() {
    let request = ExtractRequest::new(["l2"])
        .filter("profile_time", Filter::equal(10.0))
        .fields("wind", &["wind_velocity", "wind_altitude"]);
    let result = extract_one(&linked_file(), "linked", request);
    assert_eq!(level_floats(&result, "wind", "wind_velocity"), vec![1.5, -2.0]);
    assert_eq!(level_floats(&result, "wind", "wind_altitude"), vec![1000.0, 2000.0]);
}

#[test]
fn test_join_is_anded_with_target_filters() {
    let request = ExtractRequest::new(["l2"])
        .filter("profile_time", Filter::equal(10.0))
        .filter("wind_velocity", Filter::at_least(0.0))
        .fields("wind", &["wind_velocity"]);
    let result = extract_one(&linked_file(), "linked", request);
    assert_eq!(level_floats(&result, "wind", "wind_velocity"), vec![1.5]);
}

#[test]
fn test_every_join_restricts_the_target() {
    // profile 0 selects winds 1-2, measurement 0 selects wind 3
    let request = ExtractRequest::new(["l2"])
        .filter("profile_time", Filter::equal(10.0))
        .filter("measurement_time", Filter::equal(11.0))
        .fields("wind", &["wind_velocity"]);
    let result = extract_one(&linked_file(), "linked", request);
    assert!(level_floats(&result, "wind", "wind_velocity").is_empty());
}

#[test]
fn test_empty_parent_selection_selects_no_targets() {
    let request = ExtractRequest::new(["l2"])
        .filter("profile_time", Filter::equal(99.0))
        .fields("wind", &["wind_velocity"])
        .fields("profile", &["profile_time"]);
    let result = extract_one(&linked_file(), "linked", request);
    assert!(level_floats(&result, "wind", "wind_velocity").is_empty());
    assert!(level_floats(&result, "profile", "profile_time").is_empty());
}

#[test]
fn test_unfiltered_source_does_not_restrict() {
    let request = ExtractRequest::new(["l2"]).fields("wind", &["wind_velocity"]);
    let result = extract_one(&linked_file(), "linked", request);
    assert_eq!(level_floats(&result, "wind", "wind_velocity").len(), 4);
}

// =============================================================================
// Validation and encoding
// =============================================================================

#[test]
fn test_validation_happens_before_any_open() {
    let opener = TrackingOpener::new();
    let catalog = observation_catalog();
    let request = ExtractRequest::new(["a", "b"])
        .filter("zulu", Filter::at_least(0.0))
        .filter("alpha", Filter::at_least(0.0))
        .fields("obs", &["time"]);

    match Extractor::new(&opener, &catalog).extract(request) {
        Err(Error::UnknownField { kind, fields }) => {
            assert_eq!(kind, "filter");
            assert_eq!(fields, vec!["alpha", "zulu"]);
        },
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("request should be rejected"),
    }
    assert!(opener.events().is_empty());
}

#[test]
fn test_plain_encoding_lists_records() {
    let request = ExtractRequest::new(["a"])
        .filter("time", Filter::range(1.0, 2.0))
        .fields("obs", &["altitude", "quality"])
        .plain_arrays(true);
    let result = extract_one(&single_observation_file(), "obs", request);
    let obs = result.level("obs").unwrap();

    assert_eq!(
        obs.get("altitude").unwrap(),
        &FieldData::Plain(vec![
            PlainValue::List(vec![PlainValue::Float(1.0), PlainValue::Float(101.0)]),
            PlainValue::List(vec![PlainValue::Float(2.0), PlainValue::Float(102.0)]),
        ])
    );
    assert_eq!(
        serde_json::to_string(obs.get("quality").unwrap()).unwrap(),
        "[1,0]"
    );
}

// =============================================================================
// Built-in catalog over a JSON product
// =============================================================================

fn write_level_1b(dir: &TempDir) -> std::path::PathBuf {
    let observation = |t: f64, lon: f64| {
        serde_json::json!({
            "observation_aocs": { "observation_centroid_time": t },
            "observation_geolocation": {
                "geolocation_of_dem_intersection": {
                    "longitude_of_dem_intersection": lon,
                    "latitude_of_dem_intersection": 45.0,
                    "altitude_of_dem_intersection": 12.0
                }
            },
            "measurement_aocs": [
                { "measurement_centroid_time": t - 0.5 },
                { "measurement_centroid_time": t + 0.5 }
            ]
        })
    };
    let doc = serde_json::json!({
        "product_type": "ALD_U_N_1B",
        "data": {
            "mph": { "sensing_start": 591_712_200.0, "sensing_stop": 591_715_800.0 },
            "geolocation": [
                observation(591_712_210.0, 10.0),
                observation(591_712_222.0, 350.0)
            ]
        }
    });
    let path = dir.path().join("AE_OPER_ALD_U_N_1B.json");
    std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();
    path
}

#[test]
fn test_level_1b_catalog_with_albedo() {
    let dir = TempDir::new().unwrap();
    let path = write_level_1b(&dir);
    let catalog = products::level_1b().unwrap();
    let raster = GridRaster::new().with_month(2018, 10, Grid::constant(36, 18, 0.3).unwrap());
    let opener = JsonStoreOpener;

    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .with_raster(&raster)
        .extract(
            ExtractRequest::new([path])
                .filter("time", Filter::at_least(591_712_215.0))
                .fields("observation", &["time", "albedo_off_nadir", "longitude_of_DEM_intersection"])
                .fields("measurement", &["measurement_time"]),
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let observation = results[0].level("observation").unwrap();
    assert_eq!(floats(observation.array("time").unwrap()), vec![591_712_222.0]);
    assert_eq!(floats(observation.array("albedo_off_nadir").unwrap()), vec![0.3]);
    assert_eq!(floats(observation.array("longitude_of_DEM_intersection").unwrap()), vec![350.0]);
    assert_eq!(
        floats(results[0].level("measurement").unwrap().array("measurement_time").unwrap()),
        vec![591_712_221.5, 591_712_222.5]
    );
}

#[test]
fn test_missing_raster_month_skips_file() {
    let dir = TempDir::new().unwrap();
    let path = write_level_1b(&dir);
    let catalog = products::level_1b().unwrap();
    let raster = GridRaster::new();
    let opener = JsonStoreOpener;

    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .with_raster(&raster)
        .extract(ExtractRequest::new([path]).fields("observation", &["albedo_off_nadir"]))
        .unwrap()
        .collect();
    assert_eq!(results.len(), 1);
    let err = results[0].as_ref().unwrap_err();
    assert!(err.is_missing_data());
    assert!(!err.is_fatal());
}
