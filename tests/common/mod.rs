//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use swath_extract::array::Array;
use swath_extract::catalog::{FieldCatalog, FieldDef, LevelDef};
use swath_extract::error::StoreError;
use swath_extract::store::{MemoryStore, Node, ProductStore, StoreOpener, StorePath};

pub const PRODUCT: &str = "TEST_PRODUCT";

// =============================================================================
// Tracking store
// =============================================================================

/// Open or close of a product handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    Opened(PathBuf),
    Closed(PathBuf),
}

/// Memory store that reports when it is closed
pub struct TrackedStore {
    inner: MemoryStore,
    path: PathBuf,
    log: Arc<Mutex<Vec<HandleEvent>>>,
}

impl ProductStore for TrackedStore {
    fn product_type_name(&self) -> &str {
        self.inner.product_type_name()
    }

    fn fetch(&self, path: &StorePath) -> Result<Array, StoreError> {
        self.inner.fetch(path)
    }

    fn axis_size(&self, path: &StorePath) -> Result<Vec<usize>, StoreError> {
        self.inner.axis_size(path)
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if !self.inner.is_closed() {
            self.log
                .lock()
                .unwrap()
                .push(HandleEvent::Closed(self.path.clone()));
        }
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// Opener serving in-memory products and recording handle events
#[derive(Default)]
pub struct TrackingOpener {
    products: BTreeMap<PathBuf, MemoryStore>,
    log: Arc<Mutex<Vec<HandleEvent>>>,
}

impl TrackingOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &str, store: MemoryStore) -> Self {
        self.products.insert(PathBuf::from(path), store);
        self
    }

    pub fn events(&self) -> Vec<HandleEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HandleEvent::Opened(p) => Some(p),
                HandleEvent::Closed(_) => None,
            })
            .collect()
    }

    pub fn closed(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HandleEvent::Closed(p) => Some(p),
                HandleEvent::Opened(_) => None,
            })
            .collect()
    }

    /// Every opened handle has been closed exactly once
    pub fn all_closed(&self) -> bool {
        let mut opened = self.opened();
        let mut closed = self.closed();
        opened.sort();
        closed.sort();
        opened == closed
    }
}

impl StoreOpener for TrackingOpener {
    type Store = TrackedStore;

    fn open(&self, path: &Path) -> Result<TrackedStore, StoreError> {
        let inner = self
            .products
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::Open {
                path: path.to_path_buf(),
                reason: "no such product".to_string(),
            })?;
        self.log
            .lock()
            .unwrap()
            .push(HandleEvent::Opened(path.to_path_buf()));
        Ok(TrackedStore {
            inner,
            path: path.to_path_buf(),
            log: Arc::clone(&self.log),
        })
    }
}

// =============================================================================
// Products
// =============================================================================

/// Observation product: one record per time, each with two measurements
/// at `t + 0.25` and `t + 0.5` and an altitude profile `[t, t + 100]`
pub fn observation_product(times: &[f64]) -> MemoryStore {
    let records = times
        .iter()
        .map(|&t| {
            Node::record([
                ("time", Node::Float(t)),
                ("altitude", Node::floats(&[t, t + 100.0])),
                ("quality", Node::Int(if t as i64 % 2 == 0 { 0 } else { 1 })),
                (
                    "meas",
                    Node::List(vec![
                        Node::record([("time", Node::Float(t + 0.25)), ("speed", Node::Float(t * 10.0))]),
                        Node::record([("time", Node::Float(t + 0.5)), ("speed", Node::Float(t * 10.0 + 5.0))]),
                    ]),
                ),
            ])
        })
        .collect();
    MemoryStore::new(
        PRODUCT,
        Node::record([("mph", sensing()), ("obs", Node::List(records))]),
    )
}

fn sensing() -> Node {
    Node::record([
        ("sensing_start", Node::Float(591_712_200.0)),
        ("sensing_stop", Node::Float(591_715_800.0)),
    ])
}

/// Observation product spanning `start..=end` whole seconds
pub fn observation_range(start: i64, end: i64) -> MemoryStore {
    let times: Vec<f64> = (start..=end).map(|t| t as f64).collect();
    observation_product(&times)
}

/// Catalog over [`observation_product`]
pub fn observation_catalog() -> FieldCatalog {
    FieldCatalog::builder(PRODUCT)
        .level(
            LevelDef::new("obs")
                .records_at("obs")
                .field(FieldDef::new("time", "obs/*/time"))
                .field(FieldDef::new("altitude", "obs/*/altitude").array())
                .field(FieldDef::new("quality", "obs/*/quality"))
                .field(FieldDef::new("missing", "obs/*/not_there")),
        )
        .level(
            LevelDef::new("meas")
                .nested_in("obs")
                .field(FieldDef::new("meas_time", "obs/*/meas/*/time"))
                .field(FieldDef::new("meas_speed", "obs/*/meas/*/speed")),
        )
        .overlap("obs/*/meas/*/time", &["time"])
        .build()
        .unwrap()
}

/// Profile/wind/measurement product linked through 1-based index maps
///
/// - profile 0 references winds 1 and 2, profile 1 references wind 4
/// - measurement 0 references wind 3, measurement 1 references nothing
pub fn linked_product() -> MemoryStore {
    let profiles = Node::List(vec![
        Node::record([("time", Node::Float(10.0)), ("wind_ids", Node::ints(&[1, 2, 0]))]),
        Node::record([("time", Node::Float(20.0)), ("wind_ids", Node::ints(&[4, 0, 0]))]),
    ]);
    let winds = Node::List(
        [1.5, -2.0, 3.25, 8.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                Node::record([
                    ("velocity", Node::Float(v)),
                    ("altitude", Node::Float(1000.0 * (i + 1) as f64)),
                ])
            })
            .collect(),
    );
    let measurements = Node::List(vec![
        Node::record([("time", Node::Float(11.0)), ("wind_ids", Node::ints(&[3]))]),
        Node::record([("time", Node::Float(21.0)), ("wind_ids", Node::ints(&[0]))]),
    ]);
    MemoryStore::new(
        PRODUCT,
        Node::record([
            ("header", Node::record([("num_winds", Node::Int(4))])),
            ("profiles", profiles),
            ("winds", winds),
            ("meas", measurements),
        ]),
    )
}

/// Catalog over [`linked_product`]
pub fn linked_catalog() -> FieldCatalog {
    FieldCatalog::builder(PRODUCT)
        .level(
            LevelDef::new("profile")
                .records_at("profiles")
                .field(FieldDef::new("profile_time", "profiles/*/time"))
                .field(FieldDef::new("profile_wind_ids", "profiles/*/wind_ids").array()),
        )
        .level(
            LevelDef::new("wind")
                .count_at("header/num_winds")
                .field(FieldDef::new("wind_velocity", "winds/*/velocity"))
                .field(FieldDef::new("wind_altitude", "winds/*/altitude")),
        )
        .level(
            LevelDef::new("measurement")
                .records_at("meas")
                .field(FieldDef::new("measurement_time", "meas/*/time"))
                .field(FieldDef::new("measurement_wind_ids", "meas/*/wind_ids").array()),
        )
        .join("profile", "wind", "profile_wind_ids")
        .join("measurement", "wind", "measurement_wind_ids")
        .build()
        .unwrap()
}

pub fn floats(array: &Array) -> Vec<f64> {
    array.leaf_values_f64()
}
