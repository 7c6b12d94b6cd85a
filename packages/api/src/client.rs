//! `reqwest` implementation of [`LayerApi`].

use std::sync::Arc;

use async_trait::async_trait;
use geojson::{Feature, FeatureCollection};
use haripur_map_layer_models::{ApiLayer, LayerCatalogResponse};
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::config::{MapApiConfig, StaticToken, TokenProvider};
use crate::{LayerApi, MapApiError, retry};

/// Client for the map layer API.
#[derive(Clone)]
pub struct MapApiClient {
    client: reqwest::Client,
    config: MapApiConfig,
    token: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for MapApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapApiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MapApiClient {
    /// Creates an unauthenticated client.
    ///
    /// # Errors
    ///
    /// Returns [`MapApiError::Http`] if the HTTP client cannot be built.
    pub fn new(config: MapApiConfig) -> Result<Self, MapApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            token: Arc::new(StaticToken::default()),
        })
    }

    /// Creates a client from `MAP_API_*` environment variables, with the
    /// bearer token from `MAP_API_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`MapApiError::Http`] if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, MapApiError> {
        Ok(Self::new(MapApiConfig::from_env())?.with_token_provider(Arc::new(StaticToken::from_env())))
    }

    /// Replaces the token provider.
    #[must_use]
    pub fn with_token_provider(mut self, token: Arc<dyn TokenProvider>) -> Self {
        self.token = token;
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &MapApiConfig {
        &self.config
    }

    /// Builds `{base}/{segments...}/`, percent-encoding each segment.
    ///
    /// # Errors
    ///
    /// Returns [`MapApiError::InvalidUrl`] if the base URL does not parse
    /// or cannot carry a path.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, MapApiError> {
        let base = &self.config.base_url;
        let mut url = Url::parse(base).map_err(|e| MapApiError::InvalidUrl {
            url: base.clone(),
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|()| MapApiError::InvalidUrl {
                url: base.clone(),
                message: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }

    fn request(&self, url: &Url) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        match self.token.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json(&self, url: &Url) -> Result<serde_json::Value, MapApiError> {
        log::debug!("Making map API request to: {url}");
        retry::send_json(|| self.request(url), &self.config.retry).await
    }
}

#[async_trait]
impl LayerApi for MapApiClient {
    async fn get_layers(&self) -> Result<Vec<ApiLayer>, MapApiError> {
        log::info!("Fetching layers from map API...");
        let url = self.endpoint(&["layers"])?;
        let body = self.get_json(&url).await?;
        let layers = serde_json::from_value::<LayerCatalogResponse>(body)?.into_layers();
        log::info!("Layers fetched successfully: {} layers", layers.len());
        Ok(layers)
    }

    async fn get_layer_data(&self, layer_name: &str) -> Result<FeatureCollection, MapApiError> {
        log::info!("Fetching data for layer: {layer_name}");
        let url = self.endpoint(&["data", layer_name])?;
        let body = self.get_json(&url).await?;
        let collection = parse_feature_collection(layer_name, body)?;
        log::info!(
            "Layer {layer_name} data fetched: {} features",
            collection.features.len()
        );
        Ok(collection)
    }
}

/// Decodes a layer data response into a [`FeatureCollection`].
///
/// A missing or `null` `features` member yields an empty collection.
/// Individual features that do not decode are skipped with a warning so
/// one bad record does not hide the rest of the layer.
///
/// # Errors
///
/// Returns [`MapApiError::InvalidResponse`] if the body is not an object
/// or `features` is not an array.
pub fn parse_feature_collection(
    layer_name: &str,
    body: serde_json::Value,
) -> Result<FeatureCollection, MapApiError> {
    let serde_json::Value::Object(mut object) = body else {
        return Err(MapApiError::InvalidResponse {
            message: format!("{layer_name} data is not a JSON object"),
        });
    };

    let items = match object.remove("features") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items,
        Some(other) => {
            return Err(MapApiError::InvalidResponse {
                message: format!("{layer_name} features is not an array: {other}"),
            });
        }
    };

    let mut features = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match Feature::try_from(item) {
            Ok(feature) => features.push(feature),
            Err(e) => log::warn!("Skipping malformed feature #{index} in {layer_name}: {e}"),
        }
    }

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
