//! In-memory [`LayerApi`] used by the unit tests in this crate.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use geojson::{Feature, FeatureCollection, Geometry, Value};
use haripur_map_api::{LayerApi, MapApiError};
use haripur_map_layer_models::ApiLayer;
use tokio::sync::Semaphore;

/// Fake map API that records calls and can hold responses until released.
pub struct FakeApi {
    catalog: Mutex<Option<Vec<ApiLayer>>>,
    data: Mutex<BTreeMap<String, FeatureCollection>>,
    failing: Mutex<BTreeSet<String>>,
    calls: Mutex<BTreeMap<String, usize>>,
    catalog_calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl FakeApi {
    /// Responds immediately.
    pub fn new(layers: Vec<ApiLayer>) -> Self {
        Self {
            catalog: Mutex::new(Some(layers)),
            data: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(BTreeSet::new()),
            calls: Mutex::new(BTreeMap::new()),
            catalog_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Holds every layer data response until [`Self::release`] is called.
    pub fn gated(layers: Vec<ApiLayer>) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new(layers)
        }
    }

    pub fn with_points(self, layer_name: &str, count: usize) -> Self {
        self.data
            .lock()
            .unwrap()
            .insert(layer_name.to_string(), points(count));
        self
    }

    /// Lets `count` held layer data responses complete.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn fail_layer(&self, layer_name: &str) {
        self.failing.lock().unwrap().insert(layer_name.to_string());
    }

    pub fn recover_layer(&self, layer_name: &str) {
        self.failing.lock().unwrap().remove(layer_name);
    }

    pub fn fail_catalog(&self) {
        *self.catalog.lock().unwrap() = None;
    }

    pub fn set_catalog(&self, layers: Vec<ApiLayer>) {
        *self.catalog.lock().unwrap() = Some(layers);
    }

    /// Number of `get_layer_data` calls made for `layer_name`.
    pub fn calls(&self, layer_name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(layer_name)
            .copied()
            .unwrap_or_default()
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LayerApi for FakeApi {
    async fn get_layers(&self) -> Result<Vec<ApiLayer>, MapApiError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.catalog
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| MapApiError::Status {
                status: 503,
                url: "/map/layers/".to_string(),
            })
    }

    async fn get_layer_data(&self, layer_name: &str) -> Result<FeatureCollection, MapApiError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(layer_name.to_string())
            .or_default() += 1;

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        if self.failing.lock().unwrap().contains(layer_name) {
            return Err(MapApiError::Status {
                status: 503,
                url: format!("/map/data/{layer_name}/"),
            });
        }

        Ok(self
            .data
            .lock()
            .unwrap()
            .get(layer_name)
            .cloned()
            .unwrap_or_else(|| points(0)))
    }
}

pub fn layer(id: i64, name: &str) -> ApiLayer {
    ApiLayer {
        id,
        name: name.to_string(),
        description: String::new(),
        is_active: false,
    }
}

/// A collection of `count` point features.
pub fn points(count: usize) -> FeatureCollection {
    #[allow(clippy::cast_precision_loss)]
    let features = (0..count)
        .map(|i| Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![
                85.57 + i as f64 * 0.001,
                27.02,
            ]))),
            id: None,
            properties: None,
            foreign_members: None,
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
