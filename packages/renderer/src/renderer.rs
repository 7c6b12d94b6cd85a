//! Reconciles declared map state against a live [`MapEngine`].
//!
//! Three independent concerns, each with its own diff:
//!
//! * ward rebuild, when the ward load state or layout changes: rebuild both
//!   ward groups from the cache and fit the viewport once;
//! * ward visibility: add or remove the already-built ward groups;
//! * thematic layers: remove drawn layers that are no longer active and
//!   draw active layers whose data is ready.

use std::collections::BTreeSet;
use std::sync::Arc;

use haripur_map_layer_models::{LayerDataSource, LayerUiState, WARD_LAYER_NAME};

use crate::thematic::build_thematic_layer;
use crate::ward::{build_ward_boundaries, build_ward_labels};
use crate::{LayerKey, MapEngine, MapViewConfig, RenderError, RenderGroup};

/// Inputs of one render pass.
#[derive(Clone, Copy)]
pub struct MapProps<'a> {
    /// Layers in the active set, including ones still loading.
    pub active_layers: &'a [LayerUiState],
    /// Read access to cached layer data.
    pub layer_data: &'a dyn LayerDataSource,
    pub ward_boundaries_loaded: bool,
}

#[derive(Debug)]
struct WardGroups {
    boundaries: Arc<RenderGroup>,
    labels: Arc<RenderGroup>,
}

/// Owner of one map engine instance.
#[derive(Debug)]
pub struct MapRenderer<E: MapEngine> {
    engine: Option<E>,
    view: MapViewConfig,
    show_ward_boundaries: bool,
    wards: Option<WardGroups>,
    drawn: BTreeSet<String>,
    last_ward_input: Option<(bool, bool)>,
    last_layer_input: Option<Vec<(String, bool)>>,
}

impl<E: MapEngine> MapRenderer<E> {
    /// Creates a renderer with no engine yet. Ward boundaries start
    /// visible.
    #[must_use]
    pub const fn new(view: MapViewConfig) -> Self {
        Self {
            engine: None,
            view,
            show_ward_boundaries: true,
            wards: None,
            drawn: BTreeSet::new(),
            last_ward_input: None,
            last_layer_input: None,
        }
    }

    /// Creates the engine, centers it, and adds the zoom control and base
    /// tiles.
    ///
    /// Returns `false` without calling `create` if an engine already
    /// exists.
    pub fn initialize(&mut self, create: impl FnOnce() -> E) -> bool {
        if self.engine.is_some() {
            log::debug!("Map already initialized");
            return false;
        }
        let mut engine = create();
        engine.set_view(self.view.center, self.view.zoom);
        engine.add_zoom_control(self.view.zoom_control);
        engine.add_tile_layer(&self.view.tiles);
        self.engine = Some(engine);
        log::info!(
            "Map initialized at {:?}, zoom {}",
            self.view.center,
            self.view.zoom
        );
        true
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    #[must_use]
    pub const fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    #[must_use]
    pub const fn view(&self) -> &MapViewConfig {
        &self.view
    }

    /// Switches layout for a new viewport width. Ward groups are rebuilt
    /// on the next [`Self::update`] if compact mode changed.
    pub fn set_viewport_width(&mut self, width_px: u32) {
        let next = MapViewConfig::for_viewport_width(width_px);
        self.view.compact = next.compact;
    }

    /// Runs every concern whose input changed since the last pass.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] before
    /// [`Self::initialize`].
    pub fn update(&mut self, props: &MapProps<'_>) -> Result<(), RenderError> {
        if self.engine.is_none() {
            return Err(RenderError::NotInitialized);
        }

        let ward_input = (props.ward_boundaries_loaded, self.view.compact);
        if self.last_ward_input != Some(ward_input) {
            self.reconcile_wards(props.layer_data, props.ward_boundaries_loaded)?;
            self.last_ward_input = Some(ward_input);
        }

        let layer_input: Vec<(String, bool)> = props
            .active_layers
            .iter()
            .map(|layer| (layer.name.clone(), is_ready(layer, props.layer_data)))
            .collect();
        if self.last_layer_input.as_ref() != Some(&layer_input) {
            self.reconcile_layers(props.active_layers, props.layer_data)?;
            self.last_layer_input = Some(layer_input);
        }

        Ok(())
    }

    /// Rebuilds the ward groups from cached data.
    ///
    /// Always drops any previous ward groups. If wards are loaded, builds
    /// new ones and, when boundaries are visible, adds them and fits the
    /// viewport to their bounds.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] before
    /// [`Self::initialize`].
    pub fn reconcile_wards(
        &mut self,
        layer_data: &dyn LayerDataSource,
        ward_boundaries_loaded: bool,
    ) -> Result<(), RenderError> {
        let engine = self.engine.as_mut().ok_or(RenderError::NotInitialized)?;
        engine.remove_layer(&LayerKey::WardBoundaries);
        engine.remove_layer(&LayerKey::WardLabels);
        self.wards = None;

        if !ward_boundaries_loaded {
            return Ok(());
        }

        let data = match layer_data.get_layer_data(WARD_LAYER_NAME) {
            Some(data) if !data.features.is_empty() => data,
            _ => {
                log::warn!("No ward features found in data");
                return Ok(());
            }
        };
        log::info!(
            "Building ward boundaries with {} wards",
            data.features.len()
        );

        let wards = WardGroups {
            boundaries: Arc::new(build_ward_boundaries(&data, &self.view)),
            labels: Arc::new(build_ward_labels(&data)),
        };

        if self.show_ward_boundaries {
            engine.add_layer(LayerKey::WardBoundaries, wards.boundaries.clone());
            engine.add_layer(LayerKey::WardLabels, wards.labels.clone());
            match wards.boundaries.bounds() {
                Some(bounds) => engine.fit_bounds(bounds, &self.view.ward_fit_options()),
                None => log::warn!("Could not fit ward bounds: no extent"),
            }
        }

        self.wards = Some(wards);
        Ok(())
    }

    /// Whether ward boundaries are shown.
    #[must_use]
    pub const fn show_ward_boundaries(&self) -> bool {
        self.show_ward_boundaries
    }

    /// Shows or hides the ward groups without rebuilding them or moving
    /// the viewport.
    pub fn set_ward_visibility(&mut self, show: bool) {
        self.show_ward_boundaries = show;

        let (Some(engine), Some(wards)) = (self.engine.as_mut(), self.wards.as_ref()) else {
            return;
        };
        for (key, group) in [
            (LayerKey::WardBoundaries, &wards.boundaries),
            (LayerKey::WardLabels, &wards.labels),
        ] {
            match (show, engine.has_layer(&key)) {
                (true, false) => engine.add_layer(key, group.clone()),
                (false, true) => {
                    engine.remove_layer(&key);
                }
                _ => {}
            }
        }
    }

    /// Flips ward visibility and returns the new value.
    pub fn toggle_ward_boundaries(&mut self) -> bool {
        self.set_ward_visibility(!self.show_ward_boundaries);
        self.show_ward_boundaries
    }

    /// Brings the drawn thematic layers in line with `active_layers`.
    ///
    /// Layers that are still loading, or have no cached data, are left
    /// for a later pass.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::NotInitialized`] before
    /// [`Self::initialize`].
    pub fn reconcile_layers(
        &mut self,
        active_layers: &[LayerUiState],
        layer_data: &dyn LayerDataSource,
    ) -> Result<(), RenderError> {
        let engine = self.engine.as_mut().ok_or(RenderError::NotInitialized)?;

        let active: BTreeSet<&str> = active_layers.iter().map(|l| l.name.as_str()).collect();
        self.drawn.retain(|name| {
            if active.contains(name.as_str()) {
                return true;
            }
            engine.remove_layer(&LayerKey::Thematic(name.clone()));
            log::debug!("Removed layer {name}");
            false
        });

        for layer in active_layers {
            if self.drawn.contains(&layer.name) {
                continue;
            }
            if layer.loading {
                log::debug!("Layer {} still loading, drawing later", layer.name);
                continue;
            }
            let Some(data) = layer_data.get_layer_data(&layer.name) else {
                log::debug!("No data for layer {} yet", layer.name);
                continue;
            };
            let group = build_thematic_layer(layer, &data);
            engine.add_layer(LayerKey::Thematic(layer.name.clone()), Arc::new(group));
            self.drawn.insert(layer.name.clone());
        }

        Ok(())
    }

    /// Names of the drawn thematic layers.
    #[must_use]
    pub const fn drawn_layers(&self) -> &BTreeSet<String> {
        &self.drawn
    }

    /// Tears down the engine. A later [`Self::initialize`] starts fresh.
    pub fn destroy(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.remove();
            log::info!("Map destroyed");
        }
        self.wards = None;
        self.drawn.clear();
        self.last_ward_input = None;
        self.last_layer_input = None;
    }
}

fn is_ready(layer: &LayerUiState, layer_data: &dyn LayerDataSource) -> bool {
    !layer.loading && layer_data.get_layer_data(&layer.name).is_some()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geojson::{Feature, FeatureCollection, Geometry, Value};
    use haripur_map_layer_models::{ApiLayer, LayerPresentation};

    use super::*;
    use crate::{EngineOp, SceneEngine};

    type Data = BTreeMap<String, Arc<FeatureCollection>>;

    fn square(x: f64, ward: i64) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Polygon(vec![vec![
                vec![x, 27.0],
                vec![x + 0.1, 27.0],
                vec![x + 0.1, 27.1],
                vec![x, 27.1],
                vec![x, 27.0],
            ]]))),
            id: None,
            properties: serde_json::json!({ "WNO": ward }).as_object().cloned(),
            foreign_members: None,
        }
    }

    fn point() -> Feature {
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::Point(vec![85.55, 27.05]))),
            id: None,
            properties: None,
            foreign_members: None,
        }
    }

    fn collection(features: Vec<Feature>) -> Arc<FeatureCollection> {
        Arc::new(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }

    fn data_with_wards() -> Data {
        let mut data = Data::new();
        data.insert(
            WARD_LAYER_NAME.to_string(),
            collection(vec![square(85.5, 1), square(85.6, 2)]),
        );
        data
    }

    fn layer(id: i64, name: &str, loading: bool) -> LayerUiState {
        let mut state = LayerUiState::new(
            ApiLayer {
                id,
                name: name.to_string(),
                description: String::new(),
                is_active: false,
            },
            LayerPresentation::fallback(name),
        );
        state.active = true;
        state.loading = loading;
        state
    }

    fn layers_only<'a>(active_layers: &'a [LayerUiState], data: &'a Data) -> MapProps<'a> {
        MapProps {
            active_layers,
            layer_data: data,
            ward_boundaries_loaded: false,
        }
    }

    fn renderer() -> MapRenderer<SceneEngine> {
        let mut renderer = MapRenderer::new(MapViewConfig::default());
        assert!(renderer.initialize(SceneEngine::new));
        renderer
    }

    fn ops(renderer: &MapRenderer<SceneEngine>) -> &[EngineOp] {
        renderer.engine().unwrap().ops()
    }

    fn count(ops: &[EngineOp], pred: impl Fn(&EngineOp) -> bool) -> usize {
        ops.iter().filter(|op| pred(op)).count()
    }

    #[test]
    fn initializes_once() {
        let mut renderer = renderer();
        assert_eq!(
            ops(&renderer),
            [
                EngineOp::SetView {
                    center: crate::config::DEFAULT_CENTER,
                    zoom: 14
                },
                EngineOp::AddZoomControl(crate::ControlPosition::BottomRight),
                EngineOp::AddTileLayer {
                    url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
                },
            ]
        );

        let mut created = false;
        assert!(!renderer.initialize(|| {
            created = true;
            SceneEngine::new()
        }));
        assert!(!created);
        assert_eq!(ops(&renderer).len(), 3);
    }

    #[test]
    fn update_requires_engine() {
        let mut renderer = MapRenderer::<SceneEngine>::new(MapViewConfig::default());
        let data = Data::new();
        let props = MapProps {
            active_layers: &[],
            layer_data: &data,
            ward_boundaries_loaded: false,
        };
        assert!(matches!(
            renderer.update(&props),
            Err(RenderError::NotInitialized)
        ));
    }

    #[test]
    fn wards_drawn_and_fitted_once_loaded() {
        let mut renderer = renderer();
        let data = data_with_wards();

        let mut props = MapProps {
            active_layers: &[],
            layer_data: &data,
            ward_boundaries_loaded: false,
        };
        renderer.update(&props).unwrap();
        assert!(!renderer.engine().unwrap().has_layer(&LayerKey::WardBoundaries));

        props.ward_boundaries_loaded = true;
        renderer.update(&props).unwrap();
        let engine = renderer.engine().unwrap();
        assert!(engine.has_layer(&LayerKey::WardBoundaries));
        assert_eq!(engine.layer(&LayerKey::WardLabels).unwrap().len(), 2);
        assert_eq!(
            count(engine.ops(), |op| matches!(op, EngineOp::FitBounds { .. })),
            1
        );

        // Same inputs: nothing to do.
        let before = engine.ops().len();
        renderer.update(&props).unwrap();
        assert_eq!(ops(&renderer).len(), before);
    }

    #[test]
    fn wards_removed_when_no_longer_loaded() {
        let mut renderer = renderer();
        let data = data_with_wards();

        let mut props = MapProps {
            active_layers: &[],
            layer_data: &data,
            ward_boundaries_loaded: true,
        };
        renderer.update(&props).unwrap();
        assert!(renderer.engine().unwrap().has_layer(&LayerKey::WardLabels));

        props.ward_boundaries_loaded = false;
        renderer.update(&props).unwrap();
        let engine = renderer.engine().unwrap();
        assert!(!engine.has_layer(&LayerKey::WardBoundaries));
        assert!(!engine.has_layer(&LayerKey::WardLabels));
        assert_eq!(
            count(engine.ops(), |op| matches!(op, EngineOp::RemoveLayer(_))),
            2
        );

        // Nothing left to show.
        renderer.set_ward_visibility(false);
        renderer.set_ward_visibility(true);
        assert!(!renderer.engine().unwrap().has_layer(&LayerKey::WardBoundaries));
    }

    #[test]
    fn visibility_toggles_without_rebuild_or_refit() {
        let mut renderer = renderer();
        let data = data_with_wards();
        let props = MapProps {
            active_layers: &[],
            layer_data: &data,
            ward_boundaries_loaded: true,
        };
        renderer.update(&props).unwrap();
        let drawn = renderer
            .engine()
            .unwrap()
            .layer(&LayerKey::WardBoundaries)
            .unwrap()
            .clone();

        for _ in 0..3 {
            assert!(!renderer.toggle_ward_boundaries());
            assert!(!renderer.engine().unwrap().has_layer(&LayerKey::WardBoundaries));
            assert!(!renderer.engine().unwrap().has_layer(&LayerKey::WardLabels));
            renderer.update(&props).unwrap();
            assert!(renderer.toggle_ward_boundaries());
            renderer.update(&props).unwrap();
        }

        let engine = renderer.engine().unwrap();
        assert!(Arc::ptr_eq(
            &drawn,
            engine.layer(&LayerKey::WardBoundaries).unwrap()
        ));
        assert_eq!(
            count(engine.ops(), |op| matches!(op, EngineOp::FitBounds { .. })),
            1
        );
        assert_eq!(
            count(engine.ops(), |op| matches!(
                op,
                EngineOp::RemoveLayer(LayerKey::WardBoundaries)
            )),
            3
        );
    }

    #[test]
    fn hidden_wards_are_built_but_not_drawn() {
        let mut renderer = renderer();
        renderer.set_ward_visibility(false);
        let data = data_with_wards();
        renderer
            .update(&MapProps {
                active_layers: &[],
                layer_data: &data,
                ward_boundaries_loaded: true,
            })
            .unwrap();
        let engine = renderer.engine().unwrap();
        assert!(!engine.has_layer(&LayerKey::WardBoundaries));
        assert_eq!(
            count(engine.ops(), |op| matches!(op, EngineOp::FitBounds { .. })),
            0
        );

        renderer.set_ward_visibility(true);
        let engine = renderer.engine().unwrap();
        assert!(engine.has_layer(&LayerKey::WardBoundaries));
        assert!(engine.has_layer(&LayerKey::WardLabels));
        assert_eq!(
            count(engine.ops(), |op| matches!(op, EngineOp::FitBounds { .. })),
            0
        );
    }

    #[test]
    fn layout_change_rebuilds_wards() {
        let mut renderer = renderer();
        let data = data_with_wards();
        let props = MapProps {
            active_layers: &[],
            layer_data: &data,
            ward_boundaries_loaded: true,
        };
        renderer.update(&props).unwrap();
        renderer.set_viewport_width(600);
        renderer.update(&props).unwrap();

        let engine = renderer.engine().unwrap();
        let fits: Vec<_> = engine
            .ops()
            .iter()
            .filter_map(|op| match op {
                EngineOp::FitBounds { max_zoom, .. } => Some(*max_zoom),
                _ => None,
            })
            .collect();
        assert_eq!(fits, [17, 16]);
        let ward = &engine.layer(&LayerKey::WardBoundaries).unwrap().features[0];
        assert_eq!(ward.popup.as_ref().unwrap().max_width, 300);
    }

    #[test]
    fn pending_layers_are_drawn_once_ready() {
        let mut renderer = renderer();
        let mut data = Data::new();

        let pending = [layer(2, "bdpt_v2", true)];
        renderer
            .update(&MapProps {
                active_layers: &pending,
                layer_data: &data,
                ward_boundaries_loaded: false,
            })
            .unwrap();
        assert!(renderer.drawn_layers().is_empty());

        data.insert("bdpt_v2".to_string(), collection(vec![point(), point()]));
        let ready = [layer(2, "bdpt_v2", false)];
        renderer
            .update(&MapProps {
                active_layers: &ready,
                layer_data: &data,
                ward_boundaries_loaded: false,
            })
            .unwrap();

        let key = LayerKey::Thematic("bdpt_v2".to_string());
        assert_eq!(renderer.engine().unwrap().layer(&key).unwrap().len(), 2);
        assert!(renderer.drawn_layers().contains("bdpt_v2"));
    }

    #[test]
    fn deactivated_layers_are_removed() {
        let mut renderer = renderer();
        let mut data = Data::new();
        data.insert("Villages".to_string(), collection(vec![point()]));
        data.insert("bdpt_v2".to_string(), collection(vec![point()]));

        let both = [layer(2, "bdpt_v2", false), layer(3, "Villages", false)];
        renderer.reconcile_layers(&both, &data).unwrap();
        assert_eq!(renderer.drawn_layers().len(), 2);

        let one = [layer(3, "Villages", false)];
        renderer.reconcile_layers(&one, &data).unwrap();
        let engine = renderer.engine().unwrap();
        assert!(!engine.has_layer(&LayerKey::Thematic("bdpt_v2".to_string())));
        assert!(engine.has_layer(&LayerKey::Thematic("Villages".to_string())));

        // Re-running with the same set adds nothing.
        let before = engine.ops().len();
        renderer.reconcile_layers(&one, &data).unwrap();
        assert_eq!(ops(&renderer).len(), before);
    }

    #[test]
    fn reactivation_redraws_layer() {
        let mut renderer = renderer();
        let mut data = Data::new();
        data.insert("Villages".to_string(), collection(vec![point()]));
        let active = [layer(3, "Villages", false)];

        renderer.update(&layers_only(&active, &data)).unwrap();
        renderer.update(&layers_only(&[], &data)).unwrap();
        renderer.update(&layers_only(&active, &data)).unwrap();

        let key = LayerKey::Thematic("Villages".to_string());
        let engine = renderer.engine().unwrap();
        assert!(engine.has_layer(&key));
        assert_eq!(
            count(engine.ops(), |op| *op == EngineOp::AddLayer(key.clone())),
            2
        );
    }

    #[test]
    fn malformed_features_do_not_abort_pass() {
        let mut renderer = renderer();
        let mut data = Data::new();
        let broken = Feature {
            geometry: Some(Geometry::new(Value::Point(vec![85.5]))),
            ..point()
        };
        data.insert("Villages".to_string(), collection(vec![broken, point()]));
        data.insert("bdpt_v2".to_string(), collection(vec![point()]));

        let active = [layer(2, "bdpt_v2", false), layer(3, "Villages", false)];
        renderer.reconcile_layers(&active, &data).unwrap();

        let engine = renderer.engine().unwrap();
        let villages = engine
            .layer(&LayerKey::Thematic("Villages".to_string()))
            .unwrap();
        assert_eq!(villages.len(), 1);
        assert_eq!(villages.skipped, 1);
        assert!(engine.has_layer(&LayerKey::Thematic("bdpt_v2".to_string())));
    }

    #[test]
    fn destroy_removes_engine() {
        let mut renderer = renderer();
        renderer.destroy();
        assert!(!renderer.is_initialized());
        assert!(renderer.initialize(SceneEngine::new));
    }
}
