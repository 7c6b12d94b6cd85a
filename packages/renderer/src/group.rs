//! Engine-independent description of what to draw.

use geo::{BoundingRect, Coord, Rect};
use geojson::feature::Id;
use geojson::{Feature, Value};
use serde::Serialize;

use crate::RenderError;

/// Stroke and fill of a line or area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStyle {
    pub color: String,
    pub weight: f64,
    pub opacity: f64,
    /// `None` draws no fill.
    pub fill_color: Option<String>,
    pub fill_opacity: f64,
}

/// Icon drawn at a point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerIcon {
    /// Filled circle of `size` pixels.
    Dot { color: String, size: u32 },
    /// White circular badge with a bold label.
    Badge { text: String },
}

/// How a feature is drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Symbol {
    Path(PathStyle),
    Marker(MarkerIcon),
}

/// One labelled line of a popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupRow {
    pub label: String,
    pub value: String,
}

/// Click popup content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Popup {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<PopupRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub max_width: u32,
}

/// Side of the feature a tooltip opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TooltipDirection {
    Top,
    Center,
}

/// Hover tooltip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub text: String,
    pub direction: TooltipDirection,
    /// Pixel offset, `[x, y]`.
    pub offset: [i32; 2],
}

/// A drawable feature.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFeature {
    pub geometry: geo::Geometry<f64>,
    pub symbol: Symbol,
    pub popup: Option<Popup>,
    pub tooltip: Option<Tooltip>,
}

/// Features drawn and removed together under one [`crate::LayerKey`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderGroup {
    pub features: Vec<RenderFeature>,
    /// Source features that could not be drawn.
    pub skipped: usize,
}

impl RenderGroup {
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Union of every feature's bounding box, or `None` if nothing has
    /// extent.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|feature| feature.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }
}

/// Identifies a feature in log messages: its id, else its index.
#[must_use]
pub fn feature_label(feature: &Feature, index: usize) -> String {
    match &feature.id {
        Some(Id::String(s)) => s.clone(),
        Some(Id::Number(n)) => n.to_string(),
        None => format!("#{index}"),
    }
}

/// Converts a feature's geometry, rejecting missing geometry and positions
/// with fewer than two finite coordinates.
///
/// # Errors
///
/// Returns [`RenderError::Geometry`] if the geometry is absent or
/// malformed.
pub fn to_geometry(feature: &Feature, index: usize) -> Result<geo::Geometry<f64>, RenderError> {
    let invalid = |message: String| RenderError::Geometry {
        feature: feature_label(feature, index),
        message,
    };

    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| invalid("missing geometry".to_string()))?;
    validate(&geometry.value).map_err(invalid)?;

    geometry
        .clone()
        .try_into()
        .map_err(|e: geojson::Error| invalid(e.to_string()))
}

fn validate(value: &Value) -> Result<(), String> {
    match value {
        Value::Point(position) => validate_position(position),
        Value::MultiPoint(positions) | Value::LineString(positions) => {
            positions.iter().try_for_each(|p| validate_position(p))
        }
        Value::MultiLineString(lines) => lines
            .iter()
            .flatten()
            .try_for_each(|p| validate_position(p)),
        Value::Polygon(rings) => validate_polygon(rings),
        Value::MultiPolygon(polygons) => polygons.iter().try_for_each(|rings| validate_polygon(rings)),
        Value::GeometryCollection(geometries) => geometries
            .iter()
            .try_for_each(|geometry| validate(&geometry.value)),
    }
}

fn validate_polygon(rings: &[Vec<Vec<f64>>]) -> Result<(), String> {
    if rings.is_empty() {
        return Err("polygon has no rings".to_string());
    }
    rings.iter().flatten().try_for_each(|p| validate_position(p))
}

fn validate_position(position: &[f64]) -> Result<(), String> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(()),
        _ => Err(format!("invalid position {position:?}")),
    }
}

/// GeoJSON type name of a geometry.
#[must_use]
pub const fn geometry_type(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use geojson::Geometry;

    use super::*;

    fn feature(value: Option<Value>) -> Feature {
        Feature {
            bbox: None,
            geometry: value.map(Geometry::new),
            id: Some(Id::Number(7.into())),
            properties: None,
            foreign_members: None,
        }
    }

    #[test]
    fn converts_valid_geometry() {
        let geometry = to_geometry(
            &feature(Some(Value::LineString(vec![vec![85.5, 27.0], vec![85.6, 27.1]]))),
            0,
        )
        .unwrap();
        assert_eq!(geometry_type(&geometry), "LineString");
    }

    #[test]
    fn rejects_missing_and_short_positions() {
        let err = to_geometry(&feature(None), 3).unwrap_err();
        assert_eq!(err.to_string(), "Invalid geometry in feature 7: missing geometry");

        assert!(to_geometry(&feature(Some(Value::Point(vec![85.5]))), 0).is_err());
        assert!(to_geometry(&feature(Some(Value::Point(vec![f64::NAN, 27.0]))), 0).is_err());
        assert!(to_geometry(&feature(Some(Value::Polygon(vec![]))), 0).is_err());
    }

    #[test]
    fn bounds_union() {
        let group = RenderGroup {
            features: [(85.5, 27.0), (85.7, 26.9)]
                .into_iter()
                .map(|(x, y)| RenderFeature {
                    geometry: geo::Geometry::Point(geo::Point::new(x, y)),
                    symbol: Symbol::Marker(MarkerIcon::Badge {
                        text: "1".to_string(),
                    }),
                    popup: None,
                    tooltip: None,
                })
                .collect(),
            skipped: 0,
        };
        let bounds = group.bounds().unwrap();
        assert_eq!(bounds.min(), Coord { x: 85.5, y: 26.9 });
        assert_eq!(bounds.max(), Coord { x: 85.7, y: 27.0 });
        assert!(RenderGroup::default().bounds().is_none());
    }
}
