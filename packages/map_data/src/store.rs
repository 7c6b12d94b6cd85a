//! Layer activation state.
//!
//! [`MapData`] owns the layer list, the active-layer set, and the ward
//! status behind one lock. Every mutation goes through a single update
//! path that is skipped after [`MapData::unmount`] and bumps a revision
//! counter observers can wait on via [`MapData::subscribe`].
//!
//! Layer toggles are two-phase. The state flip happens synchronously when
//! [`MapData::toggle_layer`] is called; the returned future performs the
//! fetch and applies its outcome. Each toggle takes a ticket carrying a
//! per-layer epoch, and a completion whose epoch is no longer current is
//! discarded, so a fetch that resolves after the user switched the layer
//! off (or after a refresh) cannot turn it back on.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use geojson::FeatureCollection;
use haripur_map_api::LayerApi;
use haripur_map_layer_models::{LayerDataSource, LayerUiState, WARD_LAYER_NAME};
use serde::Serialize;
use tokio::sync::watch;

use crate::catalog::split_catalog;
use crate::ward::{WardStatus, load_ward_boundaries};
use crate::{LayerDataCache, MapDataError, PresentationRegistry};

#[derive(Debug)]
struct State {
    layers: Vec<LayerUiState>,
    active: BTreeSet<String>,
    ward_status: WardStatus,
    loading: bool,
    error: Option<String>,
    catalog_epoch: u64,
    toggle_epochs: BTreeMap<String, u64>,
}

impl State {
    fn layer_mut(&mut self, id: i64) -> Option<&mut LayerUiState> {
        self.layers.iter_mut().find(|layer| layer.id == id)
    }

    fn bump_toggle_epoch(&mut self, layer_name: &str) -> u64 {
        let epoch = self.toggle_epochs.entry(layer_name.to_string()).or_default();
        *epoch += 1;
        *epoch
    }

    fn is_current(&self, ticket: &ToggleTicket) -> bool {
        self.catalog_epoch == ticket.catalog_epoch
            && self.toggle_epochs.get(&ticket.layer_name) == Some(&ticket.epoch)
    }
}

/// A pending activation waiting on the data cache.
#[derive(Debug)]
struct ToggleTicket {
    id: i64,
    layer_name: String,
    catalog_epoch: u64,
    epoch: u64,
}

struct Inner {
    api: Arc<dyn LayerApi>,
    cache: LayerDataCache,
    registry: PresentationRegistry,
    state: Mutex<State>,
    mounted: AtomicBool,
    revision: watch::Sender<u64>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `f` and notifies subscribers. Returns `None` without
    /// touching the state once unmounted.
    fn update<T>(&self, f: impl FnOnce(&mut State) -> T) -> Option<T> {
        if !self.mounted.load(Ordering::Acquire) {
            log::debug!("Ignoring map state update after unmount");
            return None;
        }
        let result = f(&mut self.state());
        self.revision.send_modify(|revision| *revision += 1);
        Some(result)
    }

    fn finish_toggle(
        &self,
        ticket: &ToggleTicket,
        result: Result<Arc<FeatureCollection>, MapDataError>,
    ) {
        self.update(|state| {
            if !state.is_current(ticket) {
                log::debug!(
                    "Discarding stale load result for {} (toggled since)",
                    ticket.layer_name
                );
                return;
            }
            let is_ok = result.is_ok();
            if let Some(layer) = state.layer_mut(ticket.id) {
                layer.loading = false;
                match &result {
                    Ok(data) => {
                        layer.feature_count = data.features.len();
                        log::info!(
                            "Layer {} active with {} features",
                            layer.name,
                            layer.feature_count
                        );
                    }
                    Err(e) => {
                        layer.active = false;
                        layer.error = Some(e.to_string());
                    }
                }
            }
            if !is_ok {
                state.active.remove(&ticket.layer_name);
            }
        });
    }
}

/// Counts shown in the layer panel header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerPanelSummary {
    /// Layers the user has switched on.
    pub active: usize,
    /// Toggleable layers in the catalog.
    pub total: usize,
    /// Ward boundary status.
    pub ward_status: WardStatus,
}

/// Owner of the map layer state.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MapData {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MapData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapData")
            .field("state", &*self.inner.state())
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

impl MapData {
    /// Creates a store using the embedded presentation registry.
    ///
    /// The store reports `is_loading() == true` until the first
    /// [`Self::load_layers`] call finishes.
    #[must_use]
    pub fn new(api: Arc<dyn LayerApi>) -> Self {
        Self::with_registry(api, PresentationRegistry::embedded())
    }

    #[must_use]
    pub fn with_registry(api: Arc<dyn LayerApi>, registry: PresentationRegistry) -> Self {
        let cache = LayerDataCache::new(api.clone());
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                api,
                cache,
                registry,
                state: Mutex::new(State {
                    layers: Vec::new(),
                    active: BTreeSet::new(),
                    ward_status: WardStatus::Unavailable,
                    loading: true,
                    error: None,
                    catalog_epoch: 0,
                    toggle_epochs: BTreeMap::new(),
                }),
                mounted: AtomicBool::new(true),
                revision,
            }),
        }
    }

    /// Loads the layer catalog, then the ward boundaries.
    ///
    /// On success the layer list is rebuilt with every layer inactive.
    /// On failure the error message is recorded and the previous list is
    /// kept (empty if nothing loaded before). A ward fetch failure is
    /// logged and does not fail the load. Wards already in the cache stay
    /// loaded even if the new catalog no longer lists them.
    pub async fn load_layers(&self) {
        self.inner.update(|state| {
            state.loading = true;
            state.error = None;
        });
        log::info!("Loading layers from map API...");

        match self.inner.api.get_layers().await {
            Ok(catalog) => {
                let split = split_catalog(catalog, &self.inner.registry);
                let has_wards = split.ward_layer.is_some();
                let wards_cached = self.inner.cache.contains(WARD_LAYER_NAME);
                log::info!("Received {} toggleable layers", split.layers.len());

                self.inner.update(|state| {
                    state.layers = split.layers;
                    state.active.clear();
                    state.catalog_epoch += 1;
                    state.ward_status = match (has_wards, wards_cached) {
                        (_, true) => WardStatus::Loaded,
                        (true, false) => WardStatus::Loading,
                        (false, false) => WardStatus::Unavailable,
                    };
                });

                if has_wards {
                    self.load_wards().await;
                } else {
                    log::warn!("No ward layer found in catalog");
                }
            }
            Err(e) => {
                let error = MapDataError::Catalog(Arc::new(e));
                log::error!("{error}");
                self.inner.update(|state| state.error = Some(error.to_string()));
            }
        }

        self.inner.update(|state| state.loading = false);
    }

    /// Re-runs [`Self::load_layers`].
    pub async fn refresh_layers(&self) {
        self.load_layers().await;
    }

    async fn load_wards(&self) {
        let result = load_ward_boundaries(&self.inner.cache).await;
        self.inner.update(|state| match result {
            Ok(_) => {
                if state.ward_status != WardStatus::Loaded {
                    log::info!("Ward boundaries available");
                    state.ward_status = WardStatus::Loaded;
                }
            }
            Err(e) => {
                log::warn!("Could not load ward boundaries: {e}");
                state.ward_status = WardStatus::Failed;
            }
        });
    }

    /// Flips the layer with `id` and returns a future that completes the
    /// activation.
    ///
    /// The flip is applied before this returns: an active layer becomes
    /// inactive, an inactive one becomes active, and `loading` is set if
    /// its data is not cached yet. The returned future fetches the data
    /// (joining any fetch already in flight) and records the feature count,
    /// or reverts the layer with an error on failure. Dropping the future
    /// leaves the layer pending until it is toggled again. Unknown ids are
    /// a no-op.
    pub fn toggle_layer(&self, id: i64) -> impl Future<Output = ()> + Send + 'static {
        let ticket = self.begin_toggle(id);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let cache = self.inner.cache.clone();

        async move {
            let Some(ticket) = ticket else {
                return;
            };
            let result = cache.get_or_fetch(&ticket.layer_name).await;
            if let Some(inner) = weak.upgrade() {
                inner.finish_toggle(&ticket, result);
            }
        }
    }

    fn begin_toggle(&self, id: i64) -> Option<ToggleTicket> {
        let cache = &self.inner.cache;
        self.inner
            .update(|state| {
                let catalog_epoch = state.catalog_epoch;
                let (name, was_active) = match state.layers.iter().find(|layer| layer.id == id) {
                    Some(layer) => (layer.name.clone(), layer.active),
                    None => {
                        log::debug!("Toggle for unknown layer id {id}");
                        return None;
                    }
                };
                let epoch = state.bump_toggle_epoch(&name);

                if was_active {
                    state.active.remove(&name);
                    if let Some(layer) = state.layer_mut(id) {
                        layer.active = false;
                        layer.loading = false;
                    }
                    log::debug!("Deactivated layer {name}");
                    return None;
                }

                state.active.insert(name.clone());
                let cached = cache.get(&name);
                let layer = state.layer_mut(id)?;
                layer.active = true;
                layer.error = None;
                if let Some(data) = cached {
                    layer.loading = false;
                    layer.feature_count = data.features.len();
                    log::debug!("Activated layer {name} from cache");
                    return None;
                }
                layer.loading = true;
                log::debug!("Activating layer {name}, loading data");
                Some(ToggleTicket {
                    id,
                    layer_name: name,
                    catalog_epoch,
                    epoch,
                })
            })
            .flatten()
    }

    /// Snapshot of the toggleable layers in catalog order.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerUiState> {
        self.inner.state().layers.clone()
    }

    /// Snapshot of one layer by id.
    #[must_use]
    pub fn layer(&self, id: i64) -> Option<LayerUiState> {
        self.inner
            .state()
            .layers
            .iter()
            .find(|layer| layer.id == id)
            .cloned()
    }

    /// Layers in the active set, in catalog order. Includes layers whose
    /// data is still loading.
    #[must_use]
    pub fn get_active_layers(&self) -> Vec<LayerUiState> {
        let state = self.inner.state();
        state
            .layers
            .iter()
            .filter(|layer| state.active.contains(&layer.name))
            .cloned()
            .collect()
    }

    /// Names in the active set.
    #[must_use]
    pub fn active_layer_names(&self) -> BTreeSet<String> {
        self.inner.state().active.clone()
    }

    /// Whether ward boundary data is cached and ready to draw.
    #[must_use]
    pub fn ward_boundaries_loaded(&self) -> bool {
        self.ward_status() == WardStatus::Loaded
    }

    #[must_use]
    pub fn ward_status(&self) -> WardStatus {
        self.inner.state().ward_status
    }

    /// Whether a catalog load is in progress.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state().loading
    }

    /// Message from the last failed catalog load.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.state().error.clone()
    }

    /// Cached data for `layer_name`, or `None` if not loaded yet.
    #[must_use]
    pub fn get_layer_data(&self, layer_name: &str) -> Option<Arc<FeatureCollection>> {
        self.inner.cache.get(layer_name)
    }

    /// The shared layer data cache.
    #[must_use]
    pub fn cache(&self) -> &LayerDataCache {
        &self.inner.cache
    }

    /// Receiver whose value changes after every state update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Stops all further state updates, including those of fetches still
    /// in flight.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::Release);
        log::debug!("Map data unmounted");
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn panel_summary(&self) -> LayerPanelSummary {
        let state = self.inner.state();
        LayerPanelSummary {
            active: state.active.len(),
            total: state.layers.len(),
            ward_status: state.ward_status,
        }
    }
}

impl LayerDataSource for MapData {
    fn get_layer_data(&self, layer_name: &str) -> Option<Arc<FeatureCollection>> {
        Self::get_layer_data(self, layer_name)
    }
}
