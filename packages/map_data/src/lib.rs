#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Layer catalog loading, feature data caching, and layer activation
//! state for the municipal map.
//!
//! [`MapData`] is the single owner of the mutable map state: the
//! [`LayerDataCache`], the per-layer [`LayerUiState`] list, the
//! active-layer set, and the ward boundary status. Renderers only read it
//! through accessors ([`MapData::get_active_layers`],
//! [`MapData::get_layer_data`], [`MapData::ward_boundaries_loaded`]) and
//! learn about changes through [`MapData::subscribe`].
//!
//! [`LayerUiState`]: haripur_map_layer_models::LayerUiState

pub mod cache;
pub mod catalog;
pub mod presentation;
pub mod store;
pub mod ward;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use haripur_map_api::MapApiError;
use thiserror::Error;

pub use cache::LayerDataCache;
pub use presentation::PresentationRegistry;
pub use store::{LayerPanelSummary, MapData};
pub use ward::WardStatus;

/// Errors surfaced by map data operations.
///
/// Cloneable so one failed fetch can be reported to every caller that was
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum MapDataError {
    /// The layer catalog could not be loaded.
    #[error("Failed to load map layers: {0}")]
    Catalog(#[source] Arc<MapApiError>),

    /// A layer's feature data could not be loaded.
    #[error("Failed to load {layer} data: {source}")]
    LayerData {
        /// Layer name.
        layer: String,
        /// Underlying API error.
        source: Arc<MapApiError>,
    },
}
