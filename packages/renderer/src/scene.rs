//! In-memory [`MapEngine`] that records what it was asked to do.
//!
//! Used headless (by the CLI, to export a rendered scene) and by tests to
//! assert on the exact sequence of engine operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use geojson::{Feature, FeatureCollection, JsonObject};

use crate::{
    ControlPosition, FitOptions, LatLng, LayerKey, MapEngine, RenderError, RenderGroup,
    TileLayerConfig,
};

/// One call made on a [`SceneEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOp {
    SetView { center: LatLng, zoom: u8 },
    AddTileLayer { url_template: String },
    AddZoomControl(ControlPosition),
    AddLayer(LayerKey),
    /// Only recorded when a layer was actually removed.
    RemoveLayer(LayerKey),
    FitBounds { bounds: geo::Rect<f64>, max_zoom: u8 },
    Remove,
}

/// Headless map engine.
#[derive(Debug, Default)]
pub struct SceneEngine {
    ops: Vec<EngineOp>,
    layers: BTreeMap<LayerKey, Arc<RenderGroup>>,
    view: Option<(LatLng, u8)>,
    fitted: Option<geo::Rect<f64>>,
    removed: bool,
}

impl SceneEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn ops(&self) -> &[EngineOp] {
        &self.ops
    }

    /// The group drawn under `key`.
    #[must_use]
    pub fn layer(&self, key: &LayerKey) -> Option<&Arc<RenderGroup>> {
        self.layers.get(key)
    }

    /// Keys of the drawn layers, wards first.
    pub fn layer_keys(&self) -> impl Iterator<Item = &LayerKey> {
        self.layers.keys()
    }

    /// Last `set_view` center and zoom.
    #[must_use]
    pub const fn view(&self) -> Option<(LatLng, u8)> {
        self.view
    }

    /// Last fitted bounds.
    #[must_use]
    pub const fn fitted_bounds(&self) -> Option<geo::Rect<f64>> {
        self.fitted
    }

    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.removed
    }

    /// Exports every drawn feature as GeoJSON.
    ///
    /// Each feature carries `layer` (the layer key), `style` (the
    /// serialized symbol) and, where present, `popup` and `tooltip`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Json`] if a symbol fails to serialize.
    pub fn to_feature_collection(&self) -> Result<FeatureCollection, RenderError> {
        let mut features = Vec::new();

        for (key, group) in &self.layers {
            for feature in &group.features {
                let mut properties = JsonObject::new();
                properties.insert("layer".to_string(), key.to_string().into());
                properties.insert("style".to_string(), serde_json::to_value(&feature.symbol)?);
                if let Some(popup) = &feature.popup {
                    properties.insert("popup".to_string(), serde_json::to_value(popup)?);
                }
                if let Some(tooltip) = &feature.tooltip {
                    properties.insert("tooltip".to_string(), serde_json::to_value(tooltip)?);
                }

                features.push(Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(
                        &feature.geometry,
                    ))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                });
            }
        }

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }
}

impl MapEngine for SceneEngine {
    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.view = Some((center, zoom));
        self.ops.push(EngineOp::SetView { center, zoom });
    }

    fn add_tile_layer(&mut self, tiles: &TileLayerConfig) {
        self.ops.push(EngineOp::AddTileLayer {
            url_template: tiles.url_template.clone(),
        });
    }

    fn add_zoom_control(&mut self, position: ControlPosition) {
        self.ops.push(EngineOp::AddZoomControl(position));
    }

    fn add_layer(&mut self, key: LayerKey, group: Arc<RenderGroup>) {
        self.ops.push(EngineOp::AddLayer(key.clone()));
        self.layers.insert(key, group);
    }

    fn remove_layer(&mut self, key: &LayerKey) -> bool {
        if self.layers.remove(key).is_none() {
            return false;
        }
        self.ops.push(EngineOp::RemoveLayer(key.clone()));
        true
    }

    fn has_layer(&self, key: &LayerKey) -> bool {
        self.layers.contains_key(key)
    }

    fn fit_bounds(&mut self, bounds: geo::Rect<f64>, options: &FitOptions) {
        self.fitted = Some(bounds);
        self.ops.push(EngineOp::FitBounds {
            bounds,
            max_zoom: options.max_zoom,
        });
    }

    fn remove(&mut self) {
        self.layers.clear();
        self.removed = true;
        self.ops.push(EngineOp::Remove);
    }
}
