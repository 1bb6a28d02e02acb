//! Optimized cache tests: create, update, cleanup and reading through caches

mod common;

use common::*;
use swath_extract::array::{Array, DType};
use swath_extract::cache::{
    optimize, CacheLock, OptimizeAction, OptimizeEvent, OptimizeOptions, OptimizedCache, SkipReason,
};
use swath_extract::catalog::{FieldCatalog, FieldDef, LevelDef};
use swath_extract::error::{CacheError, Error};
use swath_extract::extract::{ExtractRequest, Extractor};
use swath_extract::store::{MemoryStore, Node};
use swath_extract::types::Filter;
use tempfile::TempDir;

fn action_of(events: &[OptimizeEvent], field: &str) -> OptimizeAction {
    events
        .iter()
        .find(|e| e.field == field)
        .map(|e| e.action)
        .unwrap()
}

#[test]
fn test_create_materializes_every_available_field() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("a.cache");
    let opener = TrackingOpener::new().with("a", observation_range(0, 4));
    let catalog = observation_catalog();

    let events = optimize(&opener, "a".as_ref(), &catalog, &output, OptimizeOptions::create())
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(events.len(), 6);
    assert_eq!(action_of(&events, "time"), OptimizeAction::Created);
    assert_eq!(action_of(&events, "meas_speed"), OptimizeAction::Created);
    assert_eq!(action_of(&events, "missing"), OptimizeAction::Skipped(SkipReason::Unavailable));
    assert!(opener.all_closed());

    let cache = OptimizedCache::open(&output).unwrap();
    assert_eq!(cache.product_type(), PRODUCT);
    assert_eq!(cache.manifest().source_files, vec!["a".to_string()]);
    assert_eq!(cache.record_count("obs"), 5);
    assert_eq!(cache.record_count("meas"), 5);
    assert_eq!(cache.variable("obs", "quality").unwrap().dtype, DType::I64);
    assert_eq!(
        cache.read_variable("obs", "altitude").unwrap(),
        Array::Nested((0..5).map(|t| Array::Float(vec![t as f64, t as f64 + 100.0])).collect())
    );
    assert!(!output.join(".optimize.lock").exists());
}

#[test]
fn test_create_refuses_existing_output() {
    let dir = TempDir::new().unwrap();
    let opener = TrackingOpener::new().with("a", observation_range(0, 4));
    let catalog = observation_catalog();

    let result = optimize(&opener, "a".as_ref(), &catalog, dir.path(), OptimizeOptions::create());
    assert!(matches!(result, Err(Error::CacheExists(_))));
    assert!(opener.events().is_empty());
}

#[test]
fn test_update_appends_allowed_fields_and_pads() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("orbit.cache");
    let opener = TrackingOpener::new()
        .with("a", observation_range(0, 4))
        .with("b", observation_range(5, 9))
        .with("c", observation_range(10, 12));
    let catalog = observation_catalog();

    optimize(&opener, "a".as_ref(), &catalog, &output, OptimizeOptions::create())
        .unwrap()
        .run()
        .unwrap();

    let events = optimize(&opener, "b".as_ref(), &catalog, &output, OptimizeOptions::update(["time"]))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(action_of(&events, "time"), OptimizeAction::Appended);
    assert_eq!(action_of(&events, "altitude"), OptimizeAction::Skipped(SkipReason::Exists));

    let cache = OptimizedCache::open(&output).unwrap();
    assert_eq!(cache.record_count("obs"), 10);
    assert_eq!(
        cache.read_variable("obs", "time").unwrap(),
        Array::Float((0..10).map(|t| t as f64).collect())
    );
    assert_eq!(cache.variable("obs", "altitude").unwrap().records, 5);

    // quality lags behind time by five records and is padded before appending
    let events = optimize(&opener, "c".as_ref(), &catalog, &output, OptimizeOptions::update(["quality"]))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(action_of(&events, "quality"), OptimizeAction::Appended);

    let cache = OptimizedCache::open(&output).unwrap();
    let quality = cache.read_variable("obs", "quality").unwrap().leaf_values_i64();
    assert_eq!(quality.len(), 13);
    assert_eq!(&quality[..5], &[0, 1, 0, 1, 0]);
    assert!(quality[5..10].iter().all(|&q| q == i64::MIN));
    assert_eq!(&quality[10..], &[0, 1, 0]);
    assert_eq!(
        cache.manifest().source_files,
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
}

#[test]
fn test_update_adds_new_fields_of_same_product_at_record_zero() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("a.cache");
    let opener = TrackingOpener::new().with("a", observation_range(0, 4));

    let subset = FieldCatalog::builder(PRODUCT)
        .level(LevelDef::new("obs").records_at("obs").field(FieldDef::new("time", "obs/*/time")))
        .build()
        .unwrap();
    optimize(&opener, "a".as_ref(), &subset, &output, OptimizeOptions::create())
        .unwrap()
        .run()
        .unwrap();

    let catalog = observation_catalog();
    let events = optimize(&opener, "a".as_ref(), &catalog, &output, OptimizeOptions::update(Vec::<String>::new()))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(action_of(&events, "time"), OptimizeAction::Skipped(SkipReason::Exists));
    assert_eq!(action_of(&events, "quality"), OptimizeAction::Created);

    let cache = OptimizedCache::open(&output).unwrap();
    assert_eq!(cache.record_count("obs"), 5);
    assert_eq!(cache.variable("obs", "time").unwrap().records, 5);
    assert_eq!(cache.variable("obs", "quality").unwrap().records, 5);
    assert_eq!(
        cache.read_variable("obs", "quality").unwrap().leaf_values_i64(),
        vec![0, 1, 0, 1, 0]
    );
    assert_eq!(cache.manifest().source_files, vec!["a".to_string()]);

    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .extract(
            ExtractRequest::new(["a"])
                .fields("obs", &["time", "quality"])
                .with_cache("a", &output),
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let obs = results[0].level("obs").unwrap();
    assert_eq!(floats(obs.array("time").unwrap()), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(obs.array("quality").unwrap().len(), 5);
}

#[test]
fn test_update_creates_missing_output() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("new.cache");
    let opener = TrackingOpener::new().with("a", observation_range(0, 2));
    let catalog = observation_catalog();

    let events = optimize(&opener, "a".as_ref(), &catalog, &output, OptimizeOptions::update(Vec::<String>::new()))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(action_of(&events, "time"), OptimizeAction::Created);
    assert!(output.join("manifest.json").exists());
}

fn deep_catalog() -> FieldCatalog {
    FieldCatalog::builder(PRODUCT)
        .level(
            LevelDef::new("obs")
                .records_at("obs")
                .field(FieldDef::new("time", "obs/*/time"))
                .field(FieldDef::new("ragged", "obs/*/ragged").array())
                .field(FieldDef::new("deep", "obs/*/deep")),
        )
        .build()
        .unwrap()
}

fn deep_product() -> MemoryStore {
    let record = |t: f64, ragged: &[f64]| {
        Node::record([
            ("time", Node::Float(t)),
            ("ragged", Node::floats(ragged)),
            (
                "deep",
                Node::List(vec![Node::List(vec![Node::floats(&[t, t])])]),
            ),
        ])
    };
    MemoryStore::new(
        PRODUCT,
        Node::record([("obs", Node::List(vec![record(0.0, &[1.0]), record(1.0, &[1.0, 2.0])]))]),
    )
}

#[test]
fn test_failure_removes_created_output() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deep.cache");
    let opener = TrackingOpener::new().with("d", deep_product());
    let catalog = deep_catalog();

    let mut optimizer = optimize(&opener, "d".as_ref(), &catalog, &output, OptimizeOptions::create()).unwrap();
    assert_eq!(optimizer.next().unwrap().unwrap().action, OptimizeAction::Created);
    assert_eq!(
        optimizer.next().unwrap().unwrap().action,
        OptimizeAction::Skipped(SkipReason::Ragged)
    );
    assert!(matches!(optimizer.next(), Some(Err(Error::Shape(_)))));
    assert!(optimizer.next().is_none());

    assert!(!output.exists());
    assert!(opener.all_closed());
}

#[test]
fn test_failure_keeps_preexisting_cache() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("deep.cache");
    let opener = TrackingOpener::new().with("d", deep_product());

    let shallow = FieldCatalog::builder(PRODUCT)
        .level(LevelDef::new("obs").records_at("obs").field(FieldDef::new("time", "obs/*/time")))
        .build()
        .unwrap();
    optimize(&opener, "d".as_ref(), &shallow, &output, OptimizeOptions::create())
        .unwrap()
        .run()
        .unwrap();

    let result = optimize(&opener, "d".as_ref(), &deep_catalog(), &output, OptimizeOptions::update(["time"]))
        .unwrap()
        .run();
    assert!(matches!(result, Err(Error::Shape(_))));

    let cache = OptimizedCache::open(&output).unwrap();
    assert_eq!(cache.variable("obs", "time").unwrap().records, 4);
    assert!(!output.join(".optimize.lock").exists());
}

#[test]
fn test_abandoned_pass_removes_created_output() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("a.cache");
    let opener = TrackingOpener::new().with("a", observation_range(0, 4));
    let catalog = observation_catalog();

    let mut optimizer = optimize(&opener, "a".as_ref(), &catalog, &output, OptimizeOptions::create()).unwrap();
    assert!(optimizer.next().unwrap().is_ok());
    drop(optimizer);

    assert!(!output.exists());
    assert!(opener.all_closed());
}

#[test]
fn test_locked_cache_rejected() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("a.cache");
    let opener = TrackingOpener::new().with("a", observation_range(0, 4));
    let catalog = observation_catalog();
    optimize(&opener, "a".as_ref(), &catalog, &output, OptimizeOptions::create())
        .unwrap()
        .run()
        .unwrap();

    let _held = CacheLock::acquire(&output).unwrap();
    let result = optimize(&opener, "a".as_ref(), &catalog, &output, OptimizeOptions::update(["time"]));
    assert!(matches!(result, Err(Error::Cache(CacheError::Locked(_)))));
    assert!(output.join("manifest.json").exists());
}

#[test]
fn test_extraction_reads_cached_fields() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("a.cache");
    let catalog = observation_catalog();

    // the cache holds different times than the product it is attached to
    let source = TrackingOpener::new().with("a", observation_range(100, 110));
    optimize(&source, "a".as_ref(), &catalog, &output, OptimizeOptions::create())
        .unwrap()
        .run()
        .unwrap();

    let opener = TrackingOpener::new().with("a", observation_range(0, 10));
    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .extract(
            ExtractRequest::new(["a"])
                .filter("time", Filter::at_least(105.0))
                .fields("obs", &["time"])
                .with_cache("a", &output),
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        floats(results[0].level("obs").unwrap().array("time").unwrap()),
        vec![105.0, 106.0, 107.0, 108.0, 109.0, 110.0]
    );
}

#[test]
fn test_extraction_ignores_cache_merged_from_other_products() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("orbit.cache");
    let catalog = observation_catalog();

    let source = TrackingOpener::new()
        .with("a", observation_range(100, 104))
        .with("b", observation_range(105, 109));
    optimize(&source, "a".as_ref(), &catalog, &output, OptimizeOptions::create())
        .unwrap()
        .run()
        .unwrap();
    optimize(&source, "b".as_ref(), &catalog, &output, OptimizeOptions::update(["time"]))
        .unwrap()
        .run()
        .unwrap();

    let opener = TrackingOpener::new().with("a", observation_range(0, 4));
    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .extract(
            ExtractRequest::new(["a"])
                .fields("obs", &["time", "quality"])
                .with_cache("a", &output),
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let obs = results[0].level("obs").unwrap();
    assert_eq!(floats(obs.array("time").unwrap()), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(obs.array("quality").unwrap().len(), 5);
}

#[test]
fn test_extraction_reads_lagging_cached_field_from_product() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("a.cache");
    let catalog = observation_catalog();

    let mut cache = OptimizedCache::create(&output, PRODUCT).unwrap();
    cache
        .write_variable("obs", "time", &Array::Float(vec![50.0, 51.0, 52.0, 53.0, 54.0]), 0)
        .unwrap();
    cache.write_variable("obs", "altitude", &Array::Float(vec![-1.0, -1.0]), 0).unwrap();
    cache.add_source("a").unwrap();
    drop(cache);

    let opener = TrackingOpener::new().with("a", observation_range(0, 4));
    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .extract(
            ExtractRequest::new(["a"])
                .fields("obs", &["time", "altitude"])
                .with_cache("a", &output),
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let obs = results[0].level("obs").unwrap();
    assert_eq!(floats(obs.array("time").unwrap()), vec![50.0, 51.0, 52.0, 53.0, 54.0]);
    assert_eq!(
        obs.array("altitude").unwrap(),
        &Array::Nested((0..5).map(|t| Array::Float(vec![t as f64, t as f64 + 100.0])).collect())
    );
}
