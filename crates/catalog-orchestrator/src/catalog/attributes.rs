//! Structured product attributes produced by the extraction stage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Price with an ISO 4217 currency code. `value` is a normalized decimal
/// string (no grouping separators, no trailing fractional zeros).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub value: String,
    pub currency: String,
}

impl Price {
    pub fn new(value: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            currency: currency.into(),
        }
    }
}

/// A measured quantity such as `{ value: 5.5, unit: "m" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Dimensions with a shared unit. Any axis may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    pub unit: String,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let axes: Vec<String> = [self.length, self.width, self.height]
            .iter()
            .flatten()
            .map(|v| v.to_string())
            .collect();
        write!(f, "{} {}", axes.join(" x "), self.unit)
    }
}

/// A culturally significant term that must be preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CulturallySignificantItem {
    pub vernacular_term: String,
    pub transliteration: String,
    pub contextual_explanation: String,
}

/// Field names used as keys of [`ExtractedAttributes::confidence_by_field`].
pub mod field {
    pub const CATEGORY: &str = "category";
    pub const SUBCATEGORY: &str = "subcategory";
    pub const MATERIAL: &str = "material";
    pub const COLORS: &str = "colors";
    pub const DIMENSIONS: &str = "dimensions";
    pub const WEIGHT: &str = "weight";
    pub const PRICE: &str = "price";
    pub const SHORT_DESCRIPTION: &str = "shortDescription";
    pub const LONG_DESCRIPTION: &str = "longDescription";
    pub const CULTURAL_ITEMS: &str = "culturallySignificantItems";
    pub const CRAFT_TECHNIQUE: &str = "craftTechnique";
    pub const REGION_OF_ORIGIN: &str = "regionOfOrigin";
}

/// Product attributes after conflict resolution.
///
/// Unpopulated fields are `None`/empty and have no confidence entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub material: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub culturally_significant_items: Vec<CulturallySignificantItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub craft_technique: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_of_origin: Option<String>,
    #[serde(default)]
    pub confidence_by_field: BTreeMap<String, f64>,
}

impl ExtractedAttributes {
    /// Records a confidence score, clamped to `[0, 1]`.
    pub fn set_confidence(&mut self, field: &str, score: f64) {
        let score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.confidence_by_field.insert(field.to_string(), score);
    }

    pub fn confidence(&self, field: &str) -> Option<f64> {
        self.confidence_by_field.get(field).copied()
    }
}
