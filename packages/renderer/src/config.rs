//! Viewport-dependent map settings.

use serde::Serialize;

use crate::{ControlPosition, FitOptions, LatLng, TileLayerConfig};

/// Initial map center (Haripur municipality).
pub const DEFAULT_CENTER: LatLng = LatLng::new(27.02, 85.57);

/// Viewports narrower than this start one zoom level further out.
pub const NARROW_VIEWPORT_PX: u32 = 768;

/// Viewports narrower than this use compact popups and a looser ward fit.
pub const COMPACT_VIEWPORT_PX: u32 = 1024;

/// Default viewport width when none is known.
pub const DEFAULT_VIEWPORT_PX: u32 = 1280;

const OSM_TILE_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
const OSM_ATTRIBUTION: &str = "© OpenStreetMap contributors";
const OSM_MAX_ZOOM: u8 = 19;

/// Popup width for toggleable layer features.
pub const THEMATIC_POPUP_MAX_WIDTH: u32 = 250;

/// Map settings derived from the viewport width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapViewConfig {
    pub center: LatLng,
    pub zoom: u8,
    /// Narrow (tablet / phone) layout.
    pub compact: bool,
    pub tiles: TileLayerConfig,
    pub zoom_control: ControlPosition,
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self::for_viewport_width(DEFAULT_VIEWPORT_PX)
    }
}

impl MapViewConfig {
    #[must_use]
    pub fn for_viewport_width(width_px: u32) -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: if width_px < NARROW_VIEWPORT_PX { 13 } else { 14 },
            compact: width_px < COMPACT_VIEWPORT_PX,
            tiles: TileLayerConfig {
                url_template: OSM_TILE_TEMPLATE.to_string(),
                attribution: OSM_ATTRIBUTION.to_string(),
                max_zoom: OSM_MAX_ZOOM,
            },
            zoom_control: ControlPosition::BottomRight,
        }
    }

    /// Max width of ward popups.
    #[must_use]
    pub const fn ward_popup_max_width(&self) -> u32 {
        if self.compact { 300 } else { 350 }
    }

    /// How the viewport is fitted to the ward boundaries.
    #[must_use]
    pub const fn ward_fit_options(&self) -> FitOptions {
        FitOptions {
            padding: [10, 10],
            max_zoom: if self.compact { 16 } else { 17 },
            animate: true,
            duration: 1.0,
        }
    }
}
