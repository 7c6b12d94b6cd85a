//! Ward boundary outlines and ward number badges.

use geo::{BoundingRect, Centroid};
use geojson::FeatureCollection;
use haripur_map_layer_models::ward::WardProperties;

use crate::group::{
    PopupRow, TooltipDirection, feature_label, geometry_type, to_geometry,
};
use crate::{
    MapViewConfig, MarkerIcon, PathStyle, Popup, RenderError, RenderFeature, RenderGroup, Symbol,
    Tooltip,
};

const NOT_AVAILABLE: &str = "N/A";

/// Thick solid black outline, no fill.
#[must_use]
pub fn ward_outline_style() -> PathStyle {
    PathStyle {
        color: "#000000".to_string(),
        weight: 3.0,
        opacity: 1.0,
        fill_color: None,
        fill_opacity: 0.0,
    }
}

/// Builds the ward outline layer. Features that are not (multi)polygons
/// or (multi)lines, or whose geometry is malformed, are skipped.
#[must_use]
pub fn build_ward_boundaries(data: &FeatureCollection, view: &MapViewConfig) -> RenderGroup {
    let mut group = RenderGroup::default();

    for (index, feature) in data.features.iter().enumerate() {
        let geometry = match outline_geometry(feature, index) {
            Ok(geometry) => geometry,
            Err(e) => {
                log::warn!("Skipping ward feature: {e}");
                group.skipped += 1;
                continue;
            }
        };

        let (popup, tooltip) = if feature.properties.is_some() {
            let props = WardProperties::from_feature(feature);
            (
                Some(ward_popup(&props, view)),
                Some(ward_tooltip(&props)),
            )
        } else {
            (None, None)
        };

        group.features.push(RenderFeature {
            geometry,
            symbol: Symbol::Path(ward_outline_style()),
            popup,
            tooltip,
        });
    }

    group
}

fn outline_geometry(
    feature: &geojson::Feature,
    index: usize,
) -> Result<geo::Geometry<f64>, RenderError> {
    let geometry = to_geometry(feature, index)?;
    match geometry {
        geo::Geometry::Polygon(_)
        | geo::Geometry::MultiPolygon(_)
        | geo::Geometry::LineString(_)
        | geo::Geometry::MultiLineString(_) => Ok(geometry),
        other => Err(RenderError::UnsupportedGeometry {
            feature: feature_label(feature, index),
            geometry_type: geometry_type(&other).to_string(),
        }),
    }
}

/// Builds one number badge per ward polygon, placed at its centroid (the
/// bounding box center if the centroid is undefined). Wards without a
/// number get no badge.
#[must_use]
pub fn build_ward_labels(data: &FeatureCollection) -> RenderGroup {
    let mut group = RenderGroup::default();

    for (index, feature) in data.features.iter().enumerate() {
        let geometry = match to_geometry(feature, index) {
            Ok(geometry @ (geo::Geometry::Polygon(_) | geo::Geometry::MultiPolygon(_))) => {
                geometry
            }
            Ok(_) => continue,
            Err(e) => {
                log::warn!("Could not add ward label: {e}");
                group.skipped += 1;
                continue;
            }
        };

        let Some(ward_no) = WardProperties::from_feature(feature).ward_no else {
            continue;
        };

        let Some(anchor) = geometry
            .centroid()
            .or_else(|| geometry.bounding_rect().map(|rect| rect.center().into()))
        else {
            log::warn!(
                "Could not place label for ward {ward_no} ({})",
                feature_label(feature, index)
            );
            group.skipped += 1;
            continue;
        };

        group.features.push(RenderFeature {
            geometry: geo::Geometry::Point(anchor),
            symbol: Symbol::Marker(MarkerIcon::Badge { text: ward_no }),
            popup: None,
            tooltip: None,
        });
    }

    group
}

fn ward_popup(props: &WardProperties, view: &MapViewConfig) -> Popup {
    let mut rows = vec![
        PopupRow {
            label: "जिल्ला".to_string(),
            value: props
                .district
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        },
        PopupRow {
            label: "क्षेत्र".to_string(),
            value: props
                .area_name
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        },
    ];
    if let Some(area) = props.area_sq_km() {
        rows.push(PopupRow {
            label: "क्षेत्रफल".to_string(),
            value: format!("{area} वर्ग किमी"),
        });
    }
    if let Some(perimeter) = props.perimeter_km() {
        rows.push(PopupRow {
            label: "परिधि".to_string(),
            value: format!("{perimeter} किमी"),
        });
    }
    if let Some(code) = &props.village_code {
        rows.push(PopupRow {
            label: "गाउँ कोड".to_string(),
            value: code.clone(),
        });
    }

    Popup {
        title: format!("वार्ड नम्बर {}", ward_number(props)),
        body: None,
        rows,
        footer: props.feature_id.as_ref().map(|id| format!("फिचर ID: {id}")),
        max_width: view.ward_popup_max_width(),
    }
}

fn ward_tooltip(props: &WardProperties) -> Tooltip {
    Tooltip {
        text: format!(
            "वार्ड {} - {}",
            ward_number(props),
            props.area_name.as_deref().unwrap_or(NOT_AVAILABLE)
        ),
        direction: TooltipDirection::Center,
        offset: [0, 0],
    }
}

fn ward_number(props: &WardProperties) -> &str {
    props.ward_no.as_deref().unwrap_or(NOT_AVAILABLE)
}
