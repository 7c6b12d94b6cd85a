//! Render groups for toggleable layers.

use geojson::FeatureCollection;
use haripur_map_layer_models::LayerUiState;
use haripur_map_layer_models::ward::property_text;

use crate::config::THEMATIC_POPUP_MAX_WIDTH;
use crate::group::{TooltipDirection, feature_label, geometry_type, to_geometry};
use crate::{
    MarkerIcon, PathStyle, Popup, RenderError, RenderFeature, RenderGroup, Symbol, Tooltip,
};

/// Properties that may name a feature, in lookup order.
pub const LABEL_KEYS: &[&str] = &["BUILDING_FUNCTION", "VIL_NAME", "BFU_DESCRIPTION", "name"];

/// Line and area style for a layer color.
#[must_use]
pub fn thematic_path_style(color: &str) -> PathStyle {
    PathStyle {
        color: color.to_string(),
        weight: 2.0,
        opacity: 0.8,
        fill_color: Some(color.to_string()),
        fill_opacity: 0.3,
    }
}

/// Builds the drawable group for an active layer.
///
/// Points (and each point of a multi-point) become dots in the layer
/// color sized by its `point_size`; lines and areas use
/// [`thematic_path_style`]. Features with properties get a popup and a
/// tooltip. Geometry collections and malformed geometries are skipped.
#[must_use]
pub fn build_thematic_layer(layer: &LayerUiState, data: &FeatureCollection) -> RenderGroup {
    let mut group = RenderGroup::default();

    for (index, feature) in data.features.iter().enumerate() {
        let geometry = match to_geometry(feature, index) {
            Ok(geo::Geometry::GeometryCollection(_)) => {
                log::warn!(
                    "Skipping {} feature: {}",
                    layer.name,
                    RenderError::UnsupportedGeometry {
                        feature: feature_label(feature, index),
                        geometry_type: "GeometryCollection".to_string(),
                    }
                );
                group.skipped += 1;
                continue;
            }
            Ok(geometry) => geometry,
            Err(e) => {
                log::warn!("Skipping {} feature: {e}", layer.name);
                group.skipped += 1;
                continue;
            }
        };

        let (popup, tooltip) = feature.properties.as_ref().map_or((None, None), |props| {
            let label = LABEL_KEYS
                .iter()
                .find_map(|key| property_text(props, key))
                .unwrap_or_else(|| layer.display_name.clone());
            (
                Some(Popup {
                    title: layer.display_name.clone(),
                    body: Some(label.clone()),
                    rows: Vec::new(),
                    footer: None,
                    max_width: THEMATIC_POPUP_MAX_WIDTH,
                }),
                Some(Tooltip {
                    text: label,
                    direction: TooltipDirection::Top,
                    offset: [0, -10],
                }),
            )
        });

        let dot = || {
            Symbol::Marker(MarkerIcon::Dot {
                color: layer.color.clone(),
                size: layer.point_size,
            })
        };

        match geometry {
            geo::Geometry::Point(_) => group.features.push(RenderFeature {
                geometry,
                symbol: dot(),
                popup,
                tooltip,
            }),
            geo::Geometry::MultiPoint(points) => {
                group
                    .features
                    .extend(points.into_iter().map(|point| RenderFeature {
                        geometry: geo::Geometry::Point(point),
                        symbol: dot(),
                        popup: popup.clone(),
                        tooltip: tooltip.clone(),
                    }));
            }
            other => {
                log::trace!(
                    "Drawing {} {} as path",
                    layer.name,
                    geometry_type(&other)
                );
                group.features.push(RenderFeature {
                    geometry: other,
                    symbol: Symbol::Path(thematic_path_style(&layer.color)),
                    popup,
                    tooltip,
                });
            }
        }
    }

    log::debug!(
        "Built {} with {} drawable features ({} skipped)",
        layer.name,
        group.len(),
        group.skipped
    );
    group
}
