#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map rendering: an abstract [`MapEngine`], builders that turn layer
//! feature collections into styled [`RenderGroup`]s, and [`MapRenderer`],
//! which keeps one long-lived engine in sync with the declared map state.
//!
//! The renderer only reads layer state and cached data. It never fetches
//! and never mutates activation state.

pub mod config;
pub mod engine;
pub mod group;
pub mod renderer;
pub mod scene;
pub mod thematic;
pub mod ward;

use thiserror::Error;

pub use config::MapViewConfig;
pub use engine::{ControlPosition, FitOptions, LatLng, LayerKey, MapEngine, TileLayerConfig};
pub use group::{MarkerIcon, PathStyle, Popup, RenderFeature, RenderGroup, Symbol, Tooltip};
pub use renderer::{MapProps, MapRenderer};
pub use scene::{EngineOp, SceneEngine};

/// Errors raised while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A reconciliation pass ran before [`MapRenderer::initialize`].
    #[error("Map engine is not initialized")]
    NotInitialized,

    /// The feature's geometry type cannot be drawn by this layer.
    #[error("Unsupported {geometry_type} geometry in feature {feature}")]
    UnsupportedGeometry {
        /// Feature id, or its index in the collection.
        feature: String,
        /// GeoJSON geometry type name.
        geometry_type: String,
    },

    /// The feature has no geometry or its coordinates are malformed.
    #[error("Invalid geometry in feature {feature}: {message}")]
    Geometry {
        /// Feature id, or its index in the collection.
        feature: String,
        /// What is wrong with it.
        message: String,
    },

    /// A drawn scene could not be exported.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
