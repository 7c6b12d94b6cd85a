#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client for the municipal map layer API.
//!
//! Two endpoints are consumed:
//!
//! - `GET {base}/layers/`: the layer catalog.
//! - `GET {base}/data/{layerName}/`: a layer's `GeoJSON`
//!   `FeatureCollection`.
//!
//! [`MapApiClient`] is the `reqwest` implementation of the [`LayerApi`]
//! trait. Every request goes through [`retry::send_json`], which applies a
//! bounded exponential backoff to transient failures. Consumers depend on
//! the trait so they can be exercised without a network.

pub mod client;
pub mod config;
pub mod retry;
pub mod summary;

use async_trait::async_trait;
use geojson::FeatureCollection;
use haripur_map_layer_models::ApiLayer;
use thiserror::Error;

pub use client::MapApiClient;
pub use config::{MapApiConfig, StaticToken, TokenProvider};
pub use summary::{MapSummary, map_summary, test_connection};

/// Errors from map API requests.
#[derive(Debug, Error)]
pub enum MapApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON or did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Numeric HTTP status.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// The configured base URL cannot be used to build request URLs.
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Why it was rejected.
        message: String,
    },

    /// Response JSON parsed but is not usable.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of what went wrong.
        message: String,
    },
}

/// Read access to the map layer API.
#[async_trait]
pub trait LayerApi: Send + Sync {
    /// Fetches the layer catalog.
    ///
    /// # Errors
    ///
    /// Returns [`MapApiError`] if the request fails after retries or the
    /// response cannot be parsed.
    async fn get_layers(&self) -> Result<Vec<ApiLayer>, MapApiError>;

    /// Fetches one layer's features.
    ///
    /// # Errors
    ///
    /// Returns [`MapApiError`] if the request fails after retries or the
    /// response is not a feature collection.
    async fn get_layer_data(&self, layer_name: &str) -> Result<FeatureCollection, MapApiError>;
}
