//! Ward boundary feature properties.
//!
//! Ward data comes from a GIS export whose attribute names vary between
//! revisions, so every field is optional and the ward number is looked up
//! under several keys.

use geojson::{Feature, JsonObject, feature::Id};

/// Property keys that may hold the ward number, in lookup order.
pub const WARD_NUMBER_KEYS: &[&str] = &["WNO", "WARD_NO", "Ward_No", "ward_no"];

/// Attributes of one ward polygon, as shown in its popup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WardProperties {
    /// Ward number, falling back to the feature id.
    pub ward_no: Option<String>,
    /// `DISTRICT`.
    pub district: Option<String>,
    /// `AAN` (area / locality name).
    pub area_name: Option<String>,
    /// `Shape_Area` as exported (not scaled).
    pub shape_area: Option<f64>,
    /// `Shape_Length` as exported.
    pub shape_length: Option<f64>,
    /// `VCODE` (village code).
    pub village_code: Option<String>,
    /// The feature id, if any.
    pub feature_id: Option<String>,
}

impl WardProperties {
    /// Extracts ward attributes from a feature. Missing properties are
    /// left as `None`.
    #[must_use]
    pub fn from_feature(feature: &Feature) -> Self {
        let feature_id = feature.id.as_ref().map(id_text);
        let Some(props) = feature.properties.as_ref() else {
            return Self {
                ward_no: feature_id.clone(),
                feature_id,
                ..Self::default()
            };
        };

        let ward_no = WARD_NUMBER_KEYS
            .iter()
            .find_map(|key| property_text(props, key))
            .or_else(|| feature_id.clone());

        Self {
            ward_no,
            district: property_text(props, "DISTRICT"),
            area_name: property_text(props, "AAN"),
            shape_area: property_number(props, "Shape_Area"),
            shape_length: property_number(props, "Shape_Length"),
            village_code: property_text(props, "VCODE"),
            feature_id,
        }
    }

    /// Area in square kilometres, formatted to four decimals.
    ///
    /// The export stores area in units of 100 km².
    #[must_use]
    pub fn area_sq_km(&self) -> Option<String> {
        self.shape_area.map(|area| format!("{:.4}", area * 100.0))
    }

    /// Perimeter formatted to four decimals.
    #[must_use]
    pub fn perimeter_km(&self) -> Option<String> {
        self.shape_length.map(|length| format!("{length:.4}"))
    }
}

fn id_text(id: &Id) -> String {
    match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
    }
}

/// Reads a property as display text. Empty strings and `null` count as
/// absent; numbers and booleans are stringified.
#[must_use]
pub fn property_text(props: &JsonObject, key: &str) -> Option<String> {
    match props.get(key)? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a non-zero numeric property. Numeric strings are accepted.
fn property_number(props: &JsonObject, key: &str) -> Option<f64> {
    let value = match props.get(key)? {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (value.is_finite() && value != 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(id: Option<Id>, props: serde_json::Value) -> Feature {
        Feature {
            bbox: None,
            geometry: None,
            id,
            properties: props.as_object().cloned(),
            foreign_members: None,
        }
    }

    #[test]
    fn reads_ward_number_in_key_order() {
        let f = feature(
            None,
            serde_json::json!({ "WARD_NO": 4, "ward_no": "9", "DISTRICT": "Sarlahi" }),
        );
        let ward = WardProperties::from_feature(&f);
        assert_eq!(ward.ward_no.as_deref(), Some("4"));
        assert_eq!(ward.district.as_deref(), Some("Sarlahi"));
        assert!(ward.area_name.is_none());
    }

    #[test]
    fn falls_back_to_feature_id() {
        let f = feature(
            Some(Id::Number(12.into())),
            serde_json::json!({ "WNO": "", "AAN": "Haripur" }),
        );
        let ward = WardProperties::from_feature(&f);
        assert_eq!(ward.ward_no.as_deref(), Some("12"));
        assert_eq!(ward.feature_id.as_deref(), Some("12"));
        assert_eq!(ward.area_name.as_deref(), Some("Haripur"));
    }

    #[test]
    fn tolerates_missing_properties() {
        let f = Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: None,
            foreign_members: None,
        };
        assert_eq!(WardProperties::from_feature(&f), WardProperties::default());
    }

    #[test]
    fn formats_shape_measurements() {
        let f = feature(
            None,
            serde_json::json!({
                "WNO": 1,
                "Shape_Area": 0.012_345,
                "Shape_Length": "0.5",
                "VCODE": 2301
            }),
        );
        let ward = WardProperties::from_feature(&f);
        assert_eq!(ward.area_sq_km().as_deref(), Some("1.2345"));
        assert_eq!(ward.perimeter_km().as_deref(), Some("0.5000"));
        assert_eq!(ward.village_code.as_deref(), Some("2301"));
    }

    #[test]
    fn zero_area_counts_as_absent() {
        let f = feature(None, serde_json::json!({ "Shape_Area": 0 }));
        assert!(WardProperties::from_feature(&f).area_sq_km().is_none());
    }
}
