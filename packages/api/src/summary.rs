//! Catalog-level helpers: a quick feature summary and a connectivity probe.

use serde::Serialize;

use crate::LayerApi;

/// Number of server-active layers whose features are counted by
/// [`map_summary`].
const SUMMARY_LAYER_LIMIT: usize = 3;

/// Aggregate counts over the layer catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapSummary {
    /// Layers in the catalog.
    pub total_layers: usize,
    /// Features across the first few server-active layers.
    pub total_features: usize,
    /// Layers flagged `is_active` by the server.
    pub active_layers: usize,
}

/// Summarizes the catalog.
///
/// Only the first [`SUMMARY_LAYER_LIMIT`] server-active layers are
/// downloaded for feature counts. Individual layer failures are skipped;
/// a catalog failure yields an all-zero summary.
pub async fn map_summary(api: &dyn LayerApi) -> MapSummary {
    let layers = match api.get_layers().await {
        Ok(layers) => layers,
        Err(e) => {
            log::error!("Failed to get map summary: {e}");
            return MapSummary::default();
        }
    };

    let active: Vec<_> = layers.iter().filter(|layer| layer.is_active).collect();

    let mut total_features = 0;
    for layer in active.iter().take(SUMMARY_LAYER_LIMIT) {
        match api.get_layer_data(&layer.name).await {
            Ok(data) => total_features += data.features.len(),
            Err(e) => log::warn!("Could not get feature count for {}: {e}", layer.name),
        }
    }

    MapSummary {
        total_layers: layers.len(),
        total_features,
        active_layers: active.len(),
    }
}

/// Returns `true` if the layer catalog can be fetched.
pub async fn test_connection(api: &dyn LayerApi) -> bool {
    match api.get_layers().await {
        Ok(_) => true,
        Err(e) => {
            log::error!("Map API connection test failed: {e}");
            false
        }
    }
}
