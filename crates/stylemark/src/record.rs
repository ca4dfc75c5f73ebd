//! Sampled style records and the fixed property lists they carry.
//!
//! A [`StyleRecord`] is one DOM element observed on one route at one
//! viewport. Records are created by the sampler and never modified afterwards;
//! every later stage only reads them.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Computed-style properties captured for every sampled element.
///
/// Names use the camelCase form exposed by `getComputedStyle`.
pub const STYLE_FIELDS: &[&str] = &[
    // Color
    "color",
    "backgroundColor",
    "borderTopColor",
    "borderRightColor",
    "borderBottomColor",
    "borderLeftColor",
    "outlineColor",
    "textDecorationColor",
    "fill",
    "stroke",
    // Typography
    "fontFamily",
    "fontSize",
    "fontWeight",
    "fontStyle",
    "lineHeight",
    "letterSpacing",
    "textTransform",
    "fontVariantLigatures",
    // Spacing
    "marginTop",
    "marginRight",
    "marginBottom",
    "marginLeft",
    "paddingTop",
    "paddingRight",
    "paddingBottom",
    "paddingLeft",
    "gap",
    "rowGap",
    "columnGap",
    // Shape
    "borderTopLeftRadius",
    "borderTopRightRadius",
    "borderBottomRightRadius",
    "borderBottomLeftRadius",
    "borderTopWidth",
    "borderRightWidth",
    "borderBottomWidth",
    "borderLeftWidth",
    "boxShadow",
    // Layout
    "display",
    "position",
    "top",
    "right",
    "bottom",
    "left",
    "width",
    "height",
    "maxWidth",
    "minWidth",
    "alignItems",
    "justifyContent",
    "alignSelf",
    "justifySelf",
    "gridTemplateColumns",
    "gridTemplateRows",
    "flexDirection",
    "flexWrap",
    "textAlign",
    "opacity",
    "zIndex",
];

/// The six properties that together make up a typography tuple, in key order.
pub const TYPOGRAPHY_FIELDS: [&str; 6] = [
    "fontSize",
    "lineHeight",
    "letterSpacing",
    "fontWeight",
    "fontStyle",
    "textTransform",
];

/// Separator used when joining typography values into a tuple key.
pub const TYPOGRAPHY_KEY_SEPARATOR: &str = "||";

/// Rounds to the nearest 0.5, halves rounding towards positive infinity.
pub fn round_half(value: f64) -> f64 {
    let rounded = (value * 2.0 + 0.5).floor() / 2.0;
    // Avoid serializing negative zero.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Builds the human-readable selector hint stored with every record.
///
/// The format is `tag#id.firstClass [role:name]`; the id and class parts are
/// omitted when the element has none.
pub fn selector_hint(tag: &str, id: &str, first_class: &str, role: &str) -> String {
    tagged_hint(tag, id, first_class, "role", role)
}

/// `tag#id.firstClass [label:value]`, shared by style and state records.
pub(crate) fn tagged_hint(tag: &str, id: &str, first_class: &str, label: &str, value: &str) -> String {
    let mut hint = String::from(tag);
    if !id.is_empty() {
        hint.push('#');
        hint.push_str(id);
    }
    if !first_class.is_empty() {
        hint.push('.');
        hint.push_str(first_class);
    }
    hint.push_str(" [");
    hint.push_str(label);
    hint.push(':');
    hint.push_str(value);
    hint.push(']');
    hint.trim().to_string()
}

/// Bounding rectangle of a sampled element, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Returns a copy with every component rounded to the nearest half pixel.
    pub fn rounded(self) -> Self {
        Self {
            x: round_half(self.x),
            y: round_half(self.y),
            width: round_half(self.width),
            height: round_half(self.height),
        }
    }
}

/// Where a style value was observed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub page: String,
    pub viewport: String,
    pub role: String,
    pub selector_hint: String,
}

/// One sampled DOM element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleRecord {
    pub page: String,
    pub viewport: String,
    pub role: String,
    pub selector_hint: String,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default, deserialize_with = "null_values_as_empty")]
    pub styles: BTreeMap<String, String>,
}

impl StyleRecord {
    /// Returns the provenance tuple for this record.
    pub fn provenance(&self) -> Provenance {
        Provenance {
            page: self.page.clone(),
            viewport: self.viewport.clone(),
            role: self.role.clone(),
            selector_hint: self.selector_hint.clone(),
        }
    }

    /// Returns a computed style value, or `""` when the property is absent.
    pub fn style(&self, property: &str) -> &str {
        self.styles.get(property).map(String::as_str).unwrap_or("")
    }

    /// Ordering used for inventory output: page, viewport, role, selector hint.
    pub fn sort_key(&self) -> (&str, &str, &str, &str) {
        (&self.page, &self.viewport, &self.role, &self.selector_hint)
    }
}

fn null_values_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<String>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect())
}

/// The six typography values of one element or tuple group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypographyValues {
    pub font_size: String,
    pub line_height: String,
    pub letter_spacing: String,
    pub font_weight: String,
    pub font_style: String,
    pub text_transform: String,
}

impl TypographyValues {
    /// Extracts the tuple from a record, using `""` for missing properties.
    pub fn from_record(record: &StyleRecord) -> Self {
        Self {
            font_size: record.style("fontSize").to_string(),
            line_height: record.style("lineHeight").to_string(),
            letter_spacing: record.style("letterSpacing").to_string(),
            font_weight: record.style("fontWeight").to_string(),
            font_style: record.style("fontStyle").to_string(),
            text_transform: record.style("textTransform").to_string(),
        }
    }

    /// Values in [`TYPOGRAPHY_FIELDS`] order.
    pub fn as_array(&self) -> [&str; 6] {
        [
            &self.font_size,
            &self.line_height,
            &self.letter_spacing,
            &self.font_weight,
            &self.font_style,
            &self.text_transform,
        ]
    }

    /// The joined key that identifies this tuple.
    pub fn key(&self) -> String {
        self.as_array().join(TYPOGRAPHY_KEY_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_fields_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for field in STYLE_FIELDS {
            assert!(seen.insert(*field), "duplicate field {}", field);
        }
        for field in TYPOGRAPHY_FIELDS {
            assert!(STYLE_FIELDS.contains(&field));
        }
    }

    #[test]
    fn test_round_half() {
        assert_eq!(round_half(13.24), 13.0);
        assert_eq!(round_half(13.26), 13.5);
        assert_eq!(round_half(13.76), 14.0);
        assert_eq!(round_half(13.25), 13.5);
        assert_eq!(round_half(-13.25), -13.0);
    }

    #[test]
    fn test_round_half_no_negative_zero() {
        let value = round_half(-0.1);
        assert_eq!(value, 0.0);
        assert!(value.is_sign_positive());
    }

    #[test]
    fn test_selector_hint_full() {
        assert_eq!(
            selector_hint("a", "cta", "sqs-button", "button"),
            "a#cta.sqs-button [role:button]"
        );
    }

    #[test]
    fn test_selector_hint_bare_tag() {
        assert_eq!(selector_hint("h1", "", "", "heading"), "h1 [role:heading]");
    }

    #[test]
    fn test_rect_rounded() {
        let rect = Rect {
            x: 10.2,
            y: 0.74,
            width: 99.9,
            height: 20.25,
        };
        assert_eq!(
            rect.rounded(),
            Rect {
                x: 10.0,
                y: 0.5,
                width: 100.0,
                height: 20.5
            }
        );
    }

    #[test]
    fn test_record_reads_null_styles_as_empty() {
        let json = r#"{
            "page": "/",
            "viewport": "mobile",
            "role": "button",
            "selectorHint": "button [role:button]",
            "rect": {"x": 0, "y": 0, "width": 10, "height": 10},
            "styles": {"color": "rgb(0, 0, 0)", "fill": null}
        }"#;
        let record: StyleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.style("color"), "rgb(0, 0, 0)");
        assert_eq!(record.style("fill"), "");
        assert!(record.styles.contains_key("fill"));
        assert_eq!(record.style("stroke"), "");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = StyleRecord {
            page: "/".into(),
            viewport: "desktop".into(),
            role: "link".into(),
            selector_hint: "a [role:link]".into(),
            rect: Rect::default(),
            styles: BTreeMap::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["selectorHint"], "a [role:link]");
    }

    #[test]
    fn test_typography_key() {
        let values = TypographyValues {
            font_size: "16px".into(),
            line_height: "24px".into(),
            letter_spacing: "normal".into(),
            font_weight: "400".into(),
            font_style: "normal".into(),
            text_transform: "none".into(),
        };
        assert_eq!(values.key(), "16px||24px||normal||400||normal||none");
    }
}
