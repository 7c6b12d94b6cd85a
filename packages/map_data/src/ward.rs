//! Ward boundary loading.

use std::sync::Arc;

use geojson::FeatureCollection;
use haripur_map_layer_models::WARD_LAYER_NAME;
use serde::Serialize;
use strum_macros::Display;

use crate::{LayerDataCache, MapDataError};

/// Load state of the ward boundary layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum WardStatus {
    /// No ward data cached and the catalog has no ward layer.
    #[default]
    Unavailable,
    /// Ward data is being fetched.
    Loading,
    /// Ward data is in the cache.
    Loaded,
    /// The ward fetch failed. The map works without boundaries.
    Failed,
}

/// Fetches the ward boundary collection through `cache`.
///
/// # Errors
///
/// Returns [`MapDataError::LayerData`] if the fetch fails.
pub async fn load_ward_boundaries(
    cache: &LayerDataCache,
) -> Result<Arc<FeatureCollection>, MapDataError> {
    log::info!("Loading ward boundaries");
    let data = cache.get_or_fetch(WARD_LAYER_NAME).await?;
    log::info!("Ward boundaries loaded: {} wards", data.features.len());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, layer};

    #[tokio::test]
    async fn loads_through_cache() {
        let api = Arc::new(FakeApi::new(vec![layer(1, "Wards")]).with_points("Wards", 9));
        let cache = LayerDataCache::new(api.clone());

        let data = load_ward_boundaries(&cache).await.unwrap();
        assert_eq!(data.features.len(), 9);
        assert!(cache.contains(WARD_LAYER_NAME));

        load_ward_boundaries(&cache).await.unwrap();
        assert_eq!(api.calls(WARD_LAYER_NAME), 1);
    }

    #[tokio::test]
    async fn reports_failure() {
        let api = Arc::new(FakeApi::new(vec![layer(1, "Wards")]));
        api.fail_layer("Wards");
        let cache = LayerDataCache::new(api);

        assert!(load_ward_boundaries(&cache).await.is_err());
        assert!(!cache.contains(WARD_LAYER_NAME));
    }
}
