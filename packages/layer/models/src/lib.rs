#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map layer catalog, presentation, and per-layer state types.
//!
//! The municipal map API publishes a catalog of named layers. Each layer
//! name is resolved once, at the catalog boundary, into a [`LayerKind`]
//! and a [`LayerPresentation`]. Downstream code (activation state,
//! rendering) works with those typed values instead of branching on raw
//! layer name strings.

pub mod ward;

use std::collections::BTreeMap;
use std::sync::Arc;

use geojson::FeatureCollection;
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Server-side name of the ward boundary layer.
///
/// This layer is auto-loaded and drawn separately from the toggleable
/// layer list.
pub const WARD_LAYER_NAME: &str = "Wards";

/// Color used for layers without a registered presentation.
pub const FALLBACK_COLOR: &str = "#6b7280";

/// Marker diameter (pixels) for point features of unregistered layers.
pub const DEFAULT_POINT_SIZE: u32 = 6;

/// A layer catalog entry as returned by `GET /map/layers/`.
///
/// Identity is the `name`, not the `id`: feature data is fetched and
/// cached by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLayer {
    /// Numeric identifier used by the layer toggle list.
    pub id: i64,
    /// Unique, stable layer name (e.g. `"bdpt_v2"`).
    pub name: String,
    /// Free-form description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Server-side default flag. Not UI state.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
}

/// Body of the layer catalog endpoint.
///
/// The API has been observed returning both `{ "layers": [...] }` and a
/// bare array, so both are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LayerCatalogResponse {
    /// A bare JSON array of layers.
    Bare(Vec<ApiLayer>),
    /// An object wrapping the array under `layers`.
    Wrapped {
        /// The layers. Missing or `null` means no layers.
        #[serde(default, deserialize_with = "null_as_default")]
        layers: Vec<ApiLayer>,
    },
}

impl LayerCatalogResponse {
    /// Unwraps the response into its list of layers.
    #[must_use]
    pub fn into_layers(self) -> Vec<ApiLayer> {
        match self {
            Self::Bare(layers) | Self::Wrapped { layers } => layers,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Known map layers, keyed by their server-side name.
///
/// `Display`/`EnumString` use the exact API layer name; serde uses
/// `snake_case` (the form used in the presentation registry).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Building footprint points.
    #[strum(serialize = "bdpt_v2")]
    BuildingPoints,
    /// Water body polygons.
    #[strum(serialize = "Hydro Area")]
    HydroArea,
    /// Rivers and streams.
    #[strum(serialize = "Hydro Line")]
    HydroLine,
    /// Land cover polygons.
    #[strum(serialize = "Land Area")]
    LandArea,
    /// Contour / topology lines.
    #[strum(serialize = "Topology Line")]
    TopologyLine,
    /// Roads and tracks.
    #[strum(serialize = "Transportation Line")]
    TransportationLine,
    /// Village name points.
    #[strum(serialize = "Villages")]
    Villages,
    /// Ward boundary polygons.
    #[strum(serialize = "Wards")]
    Wards,
}

impl LayerKind {
    /// Resolves a server-side layer name. Returns `None` for layers this
    /// build has no presentation for.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Returns the server-side layer name.
    #[must_use]
    pub fn api_name(&self) -> &str {
        self.as_ref()
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::BuildingPoints,
            Self::HydroArea,
            Self::HydroLine,
            Self::LandArea,
            Self::TopologyLine,
            Self::TransportationLine,
            Self::Villages,
            Self::Wards,
        ]
    }
}

/// Icon shown next to a layer in the layer toggle list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LayerIcon {
    /// Building outline.
    Building,
    /// Water droplets.
    Droplets,
    /// Waves.
    Waves,
    /// Mountain.
    Mountain,
    /// Road.
    Route,
    /// Map pin.
    MapPin,
    /// Plain circle.
    #[default]
    Circle,
}

/// Static presentation metadata for a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPresentation {
    /// Localized (Nepali) display name.
    pub display_name: String,
    /// CSS color string.
    pub color: String,
    /// Toggle list icon.
    #[serde(default)]
    pub icon: LayerIcon,
    /// Point marker diameter in pixels.
    #[serde(default = "default_point_size")]
    pub point_size: u32,
}

const fn default_point_size() -> u32 {
    DEFAULT_POINT_SIZE
}

impl LayerPresentation {
    /// Presentation for a layer name with no registry entry: the raw name
    /// in neutral gray.
    #[must_use]
    pub fn fallback(layer_name: &str) -> Self {
        Self {
            display_name: layer_name.to_string(),
            color: FALLBACK_COLOR.to_string(),
            icon: LayerIcon::Circle,
            point_size: DEFAULT_POINT_SIZE,
        }
    }
}

/// Activation status derived from a [`LayerUiState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LayerStatus {
    /// Not shown.
    Inactive,
    /// Activated, data still loading. Renderers draw nothing yet.
    Pending,
    /// Activated with data available.
    Active,
    /// Last activation failed; the layer was reverted to inactive.
    Error,
}

/// UI state for one toggleable layer.
///
/// Built from the catalog on every full load and mutated only by layer
/// toggles. The ward layer never has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerUiState {
    /// Catalog id.
    pub id: i64,
    /// Catalog name (cache key).
    pub name: String,
    /// Catalog description.
    pub description: String,
    /// Server-side default flag.
    pub is_active: bool,
    /// Resolved layer kind, if the name is known.
    pub kind: Option<LayerKind>,
    /// Display name from the presentation registry.
    pub display_name: String,
    /// Layer color from the presentation registry.
    pub color: String,
    /// Toggle list icon.
    pub icon: LayerIcon,
    /// Point marker diameter in pixels.
    pub point_size: u32,
    /// Whether the user has switched this layer on.
    pub active: bool,
    /// Number of features in the loaded data (0 until loaded).
    pub feature_count: usize,
    /// Whether the layer's data is being fetched.
    pub loading: bool,
    /// Message from the last failed activation.
    pub error: Option<String>,
}

impl LayerUiState {
    /// Creates an inactive state for a catalog entry.
    #[must_use]
    pub fn new(layer: ApiLayer, presentation: LayerPresentation) -> Self {
        let kind = LayerKind::from_name(&layer.name);
        Self {
            id: layer.id,
            name: layer.name,
            description: layer.description,
            is_active: layer.is_active,
            kind,
            display_name: presentation.display_name,
            color: presentation.color,
            icon: presentation.icon,
            point_size: presentation.point_size,
            active: false,
            feature_count: 0,
            loading: false,
            error: None,
        }
    }

    /// Returns the activation status.
    #[must_use]
    pub const fn status(&self) -> LayerStatus {
        match (self.active, self.loading) {
            (true, true) => LayerStatus::Pending,
            (true, false) => LayerStatus::Active,
            (false, _) if self.error.is_some() => LayerStatus::Error,
            (false, _) => LayerStatus::Inactive,
        }
    }
}

/// Synchronous read access to loaded layer feature collections.
///
/// `None` means "not loaded yet", never an error.
pub trait LayerDataSource {
    /// Returns the cached feature collection for `layer_name`.
    fn get_layer_data(&self, layer_name: &str) -> Option<Arc<FeatureCollection>>;
}

impl LayerDataSource for BTreeMap<String, Arc<FeatureCollection>> {
    fn get_layer_data(&self, layer_name: &str) -> Option<Arc<FeatureCollection>> {
        self.get(layer_name).cloned()
    }
}
