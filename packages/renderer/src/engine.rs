//! The imperative map engine seam.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::RenderGroup;

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Stable identifier of a drawn layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKey {
    /// Ward boundary outlines.
    WardBoundaries,
    /// Ward number badges.
    WardLabels,
    /// A toggleable layer, by catalog name.
    Thematic(String),
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WardBoundaries => f.write_str("ward-boundaries"),
            Self::WardLabels => f.write_str("ward-labels"),
            Self::Thematic(name) => f.write_str(name),
        }
    }
}

/// Raster base layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileLayerConfig {
    /// `{s}`/`{z}`/`{x}`/`{y}` URL template.
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

/// Corner a map control is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Options for [`MapEngine::fit_bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitOptions {
    /// Pixel padding, `[x, y]`.
    pub padding: [u32; 2],
    pub max_zoom: u8,
    pub animate: bool,
    /// Animation duration in seconds.
    pub duration: f64,
}

/// A long-lived interactive map.
///
/// Implementations own their drawn layers; callers identify them by
/// [`LayerKey`] and never hold references into the engine.
pub trait MapEngine {
    /// Centers the map.
    fn set_view(&mut self, center: LatLng, zoom: u8);

    /// Adds the base tile layer.
    fn add_tile_layer(&mut self, tiles: &TileLayerConfig);

    /// Adds the zoom buttons.
    fn add_zoom_control(&mut self, position: ControlPosition);

    /// Draws `group` under `key`, replacing anything drawn under the same
    /// key.
    fn add_layer(&mut self, key: LayerKey, group: Arc<RenderGroup>);

    /// Removes the layer drawn under `key`. Returns `false` if nothing was
    /// drawn there.
    fn remove_layer(&mut self, key: &LayerKey) -> bool;

    /// Whether a layer is drawn under `key`.
    fn has_layer(&self, key: &LayerKey) -> bool;

    /// Moves the viewport to show `bounds` (x = longitude, y = latitude).
    fn fit_bounds(&mut self, bounds: geo::Rect<f64>, options: &FitOptions);

    /// Tears the map down. No other method is called afterwards.
    fn remove(&mut self);
}
