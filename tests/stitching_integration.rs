//! Multi-file stitching tests
//!
//! Consecutive products overlap; every record must be emitted exactly once
//! and every product handle must be closed however iteration ends.

mod common;

use common::*;
use std::path::PathBuf;
use swath_extract::error::{Error, StoreError};
use swath_extract::extract::{merge_results, ExtractRequest, Extractor, FileResult};
use swath_extract::types::Filter;

fn times_of(result: &FileResult) -> Vec<f64> {
    floats(result.level("obs").unwrap().array("time").unwrap())
}

fn overlapping_pair() -> TrackingOpener {
    TrackingOpener::new()
        .with("a", observation_range(0, 10))
        .with("b", observation_range(8, 20))
}

fn run(opener: &TrackingOpener, request: ExtractRequest) -> Vec<FileResult> {
    let catalog = observation_catalog();
    Extractor::new(opener, &catalog)
        .extract(request)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_overlap_emitted_once() {
    let opener = overlapping_pair();
    let results = run(&opener, ExtractRequest::new(["a", "b"]).fields("obs", &["time"]));

    assert_eq!(results.len(), 2);
    let a = times_of(&results[0]);
    let b = times_of(&results[1]);
    assert_eq!(a, (0..=8).map(|t| t as f64).collect::<Vec<_>>());
    assert_eq!(b, (9..=20).map(|t| t as f64).collect::<Vec<_>>());

    let mut all: Vec<f64> = a.into_iter().chain(b).collect();
    all.dedup();
    assert_eq!(all.len(), 21);
}

#[test]
fn test_nested_level_follows_clipped_parents() {
    let opener = overlapping_pair();
    let request = ExtractRequest::new(["a", "b"])
        .fields("obs", &["time"])
        .fields("meas", &["meas_time"]);
    let results = run(&opener, request);

    let merged = merge_results(results).unwrap();
    let meas = floats(merged["meas"].array("meas_time").unwrap());
    // two measurements per observation, none lost or repeated at the seam
    assert_eq!(meas.len(), 42);
    assert!(meas.windows(2).all(|w| w[0] < w[1]));
    assert!(meas.contains(&8.5));
}

#[test]
fn test_no_overlap_leaves_files_untouched() {
    let opener = TrackingOpener::new()
        .with("a", observation_range(0, 5))
        .with("b", observation_range(6, 10));
    let results = run(&opener, ExtractRequest::new(["a", "b"]).fields("obs", &["time"]));

    assert_eq!(times_of(&results[0]).len(), 6);
    assert_eq!(times_of(&results[1]).len(), 5);
}

#[test]
fn test_user_filters_combine_with_clipping() {
    let opener = overlapping_pair();
    let request = ExtractRequest::new(["a", "b"])
        .filter("time", Filter::at_least(5.0))
        .fields("obs", &["time"]);
    let results = run(&opener, request);

    assert_eq!(times_of(&results[0]), vec![5.0, 6.0, 7.0, 8.0]);
    assert_eq!(times_of(&results[1]).first(), Some(&9.0));
    assert_eq!(times_of(&results[1]).len(), 12);

    let request = ExtractRequest::new(["a", "b"])
        .filter("time", Filter::at_most(3.0))
        .fields("obs", &["time"]);
    let results = run(&opener, request);
    assert_eq!(times_of(&results[0]), vec![0.0, 1.0, 2.0, 3.0]);
    assert!(times_of(&results[1]).is_empty());
}

#[test]
fn test_extraction_is_repeatable() {
    let opener = overlapping_pair();
    let request = ExtractRequest::new(["a", "b"])
        .filter("quality", Filter::equal(0.0))
        .fields("obs", &["time", "altitude"]);
    let first = run(&opener, request.clone());
    let second = run(&opener, request);
    assert_eq!(first, second);
}

#[test]
fn test_handles_opened_with_lookahead_and_closed() {
    let opener = overlapping_pair();
    run(&opener, ExtractRequest::new(["a", "b"]).fields("obs", &["time"]));

    assert_eq!(
        opener.events(),
        vec![
            HandleEvent::Opened(PathBuf::from("a")),
            HandleEvent::Opened(PathBuf::from("b")),
            HandleEvent::Closed(PathBuf::from("a")),
            HandleEvent::Closed(PathBuf::from("b")),
        ]
    );
}

#[test]
fn test_early_drop_closes_lookahead() {
    let opener = TrackingOpener::new()
        .with("a", observation_range(0, 10))
        .with("b", observation_range(8, 20))
        .with("c", observation_range(18, 30));
    let catalog = observation_catalog();

    let mut extraction = Extractor::new(&opener, &catalog)
        .extract(ExtractRequest::new(["a", "b", "c"]).fields("obs", &["time"]))
        .unwrap();
    assert!(extraction.next().unwrap().is_ok());
    assert_eq!(extraction.remaining(), 2);
    drop(extraction);

    assert_eq!(opener.opened(), vec![PathBuf::from("a"), PathBuf::from("b")]);
    assert!(opener.all_closed());
}

#[test]
fn test_missing_field_skips_file_and_continues() {
    let opener = overlapping_pair();
    let catalog = observation_catalog();
    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .extract(ExtractRequest::new(["a", "b"]).fields("obs", &["missing"]))
        .unwrap()
        .collect();

    assert_eq!(results.len(), 2);
    for result in &results {
        match result {
            Err(e @ Error::InFile { .. }) => assert!(e.is_missing_data() && !e.is_fatal()),
            other => panic!("expected a per-file error, got {:?}", other),
        }
    }
    assert!(opener.all_closed());
}

#[test]
fn test_open_failure_stops_iteration() {
    let opener = TrackingOpener::new()
        .with("a", observation_range(0, 10))
        .with("c", observation_range(20, 30));
    let catalog = observation_catalog();
    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .extract(ExtractRequest::new(["a", "missing.json", "c"]).fields("obs", &["time"]))
        .unwrap()
        .collect();

    assert_eq!(results.len(), 2);
    assert_eq!(times_of(results[0].as_ref().unwrap()).len(), 11);
    match &results[1] {
        Err(Error::InFile { file, source }) => {
            assert_eq!(file, &PathBuf::from("missing.json"));
            assert!(matches!(**source, Error::Store(StoreError::Open { .. })));
        },
        other => panic!("expected an open failure, got {:?}", other),
    }
    assert_eq!(opener.opened(), vec![PathBuf::from("a")]);
    assert!(opener.all_closed());
}

#[test]
fn test_other_product_type_rejected() {
    let other = swath_extract::store::MemoryStore::new(
        "SOMETHING_ELSE",
        swath_extract::store::Node::record([("obs", swath_extract::store::Node::List(vec![]))]),
    );
    let opener = TrackingOpener::new().with("x", other);
    let catalog = observation_catalog();
    let results: Vec<_> = Extractor::new(&opener, &catalog)
        .extract(ExtractRequest::new(["x"]).fields("obs", &["time"]))
        .unwrap()
        .collect();

    assert_eq!(results.len(), 1);
    match &results[0] {
        Err(Error::InFile { source, .. }) => {
            assert!(matches!(**source, Error::UnsupportedProduct(ref p) if p == "SOMETHING_ELSE"))
        },
        other => panic!("expected unsupported product, got {:?}", other),
    }
    assert!(opener.all_closed());
}
