//! Per-layer feature data cache with in-flight request sharing.
//!
//! Successful fetches are stored for the lifetime of the cache and never
//! expire. Failed fetches are not stored, so the next request retries.
//! Concurrent requests for the same layer share a single network call.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use geojson::FeatureCollection;
use haripur_map_api::LayerApi;

use crate::MapDataError;

type FetchResult = Result<Arc<FeatureCollection>, MapDataError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

enum Slot {
    Ready(Arc<FeatureCollection>),
    Pending { token: u64, fetch: SharedFetch },
}

struct CacheInner {
    api: Arc<dyn LayerApi>,
    slots: Mutex<BTreeMap<String, Slot>>,
    next_token: AtomicU64,
}

impl CacheInner {
    fn slots(&self) -> MutexGuard<'_, BTreeMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores or drops the outcome of fetch `token`, unless the slot was
    /// invalidated or replaced in the meantime.
    fn complete(&self, layer_name: &str, token: u64, result: &FetchResult) {
        let mut slots = self.slots();
        let current = matches!(
            slots.get(layer_name),
            Some(Slot::Pending { token: t, .. }) if *t == token
        );
        if !current {
            log::debug!("Discarding superseded fetch of {layer_name}");
            return;
        }
        match result {
            Ok(data) => {
                slots.insert(layer_name.to_string(), Slot::Ready(data.clone()));
            }
            Err(_) => {
                slots.remove(layer_name);
            }
        }
    }
}

/// Layer name to feature collection cache.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct LayerDataCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for LayerDataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerDataCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl LayerDataCache {
    #[must_use]
    pub fn new(api: Arc<dyn LayerApi>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                api,
                slots: Mutex::new(BTreeMap::new()),
                next_token: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cached collection for `layer_name`, fetching it on a
    /// miss. A request already in flight for the same name is joined
    /// instead of issuing another.
    ///
    /// # Errors
    ///
    /// Returns [`MapDataError::LayerData`] if the fetch fails. Nothing is
    /// cached in that case.
    pub async fn get_or_fetch(&self, layer_name: &str) -> FetchResult {
        let fetch = {
            let mut slots = self.inner.slots();
            match slots.get(layer_name) {
                Some(Slot::Ready(data)) => {
                    log::debug!("Using cached data for {layer_name}");
                    return Ok(data.clone());
                }
                Some(Slot::Pending { fetch, .. }) => {
                    log::debug!("Joining in-flight fetch of {layer_name}");
                    fetch.clone()
                }
                None => {
                    let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.start_fetch(layer_name, token);
                    slots.insert(
                        layer_name.to_string(),
                        Slot::Pending {
                            token,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };
        fetch.await
    }

    fn start_fetch(&self, layer_name: &str, token: u64) -> SharedFetch {
        let api = self.inner.api.clone();
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let layer_name = layer_name.to_string();

        async move {
            let result = api
                .get_layer_data(&layer_name)
                .await
                .map(Arc::new)
                .map_err(|e| MapDataError::LayerData {
                    layer: layer_name.clone(),
                    source: Arc::new(e),
                });
            if let Err(e) = &result {
                log::error!("{e}");
            }
            if let Some(inner) = weak.upgrade() {
                inner.complete(&layer_name, token, &result);
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Returns the collection for `layer_name` if it has finished loading.
    #[must_use]
    pub fn get(&self, layer_name: &str) -> Option<Arc<FeatureCollection>> {
        match self.inner.slots().get(layer_name) {
            Some(Slot::Ready(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Whether `layer_name` has finished loading.
    #[must_use]
    pub fn contains(&self, layer_name: &str) -> bool {
        matches!(self.inner.slots().get(layer_name), Some(Slot::Ready(_)))
    }

    /// Whether a fetch for `layer_name` is in flight.
    #[must_use]
    pub fn is_pending(&self, layer_name: &str) -> bool {
        matches!(
            self.inner.slots().get(layer_name),
            Some(Slot::Pending { .. })
        )
    }

    /// Drops the entry for `layer_name`. An in-flight fetch still resolves
    /// for its callers but is not stored.
    pub fn invalidate(&self, layer_name: &str) {
        if self.inner.slots().remove(layer_name).is_some() {
            log::debug!("Invalidated cached data for {layer_name}");
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.slots().clear();
    }

    /// Number of loaded layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .slots()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Whether no layer has finished loading.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeApi, layer};

    fn cache(api: &Arc<FakeApi>) -> LayerDataCache {
        LayerDataCache::new(api.clone())
    }

    #[tokio::test]
    async fn fetches_once_then_serves_from_cache() {
        let api = Arc::new(FakeApi::new(vec![layer(1, "Villages")]).with_points("Villages", 3));
        let cache = cache(&api);

        assert!(cache.get("Villages").is_none());
        let first = cache.get_or_fetch("Villages").await.unwrap();
        let second = cache.get_or_fetch("Villages").await.unwrap();

        assert_eq!(first.features.len(), 3);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(api.calls("Villages"), 1);
        assert!(cache.contains("Villages"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let api = Arc::new(FakeApi::gated(vec![layer(1, "bdpt_v2")]).with_points("bdpt_v2", 2));
        let cache = cache(&api);

        let (a, b, ()) = tokio::join!(
            cache.get_or_fetch("bdpt_v2"),
            cache.get_or_fetch("bdpt_v2"),
            async {
                tokio::task::yield_now().await;
                assert!(cache.is_pending("bdpt_v2"));
                api.release(1);
            }
        );

        assert_eq!(a.unwrap().features.len(), 2);
        assert_eq!(b.unwrap().features.len(), 2);
        assert_eq!(api.calls("bdpt_v2"), 1);
        assert!(!cache.is_pending("bdpt_v2"));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let api = Arc::new(FakeApi::new(vec![layer(1, "Hydro Area")]).with_points("Hydro Area", 1));
        api.fail_layer("Hydro Area");
        let cache = cache(&api);

        let err = cache.get_or_fetch("Hydro Area").await.unwrap_err();
        assert!(matches!(&err, MapDataError::LayerData { layer, .. } if layer == "Hydro Area"));
        assert!(!cache.contains("Hydro Area"));
        assert!(!cache.is_pending("Hydro Area"));

        api.recover_layer("Hydro Area");
        let data = cache.get_or_fetch("Hydro Area").await.unwrap();
        assert_eq!(data.features.len(), 1);
        assert_eq!(api.calls("Hydro Area"), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let api = Arc::new(FakeApi::new(vec![layer(1, "Villages")]));
        let cache = cache(&api);

        cache.get_or_fetch("Villages").await.unwrap();
        cache.invalidate("Villages");
        assert!(cache.get("Villages").is_none());

        cache.get_or_fetch("Villages").await.unwrap();
        assert_eq!(api.calls("Villages"), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn invalidated_in_flight_fetch_is_not_stored() {
        let api = Arc::new(FakeApi::gated(vec![layer(1, "Villages")]));
        let cache = cache(&api);

        let (result, ()) = tokio::join!(cache.get_or_fetch("Villages"), async {
            tokio::task::yield_now().await;
            cache.invalidate("Villages");
            api.release(1);
        });

        assert!(result.is_ok());
        assert!(!cache.contains("Villages"));
    }
}
