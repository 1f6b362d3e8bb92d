//! Schema mapping and validation.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::{ExtractedAttributes, MappingResult};
use crate::error::ConfigError;

pub mod mapper;
pub mod taxonomy;
pub mod validator;

pub use mapper::{compose_long_desc, map_to_marketplace_schema, truncate_chars};
pub use taxonomy::{Taxonomy, CATALOG_ALL};
pub use validator::{
    auto_correct, validate, HardViolation, MappingLimits, SoftViolation, ValidationReport,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Item cannot be listed: {}", .violations.join("; "))]
    Rejected { violations: Vec<String> },

    #[error("Item still invalid after auto-correction: {}", .violations.join("; "))]
    Uncorrectable { violations: Vec<String> },
}

impl MappingError {
    pub fn violations(&self) -> &[String] {
        match self {
            MappingError::Rejected { violations } | MappingError::Uncorrectable { violations } => {
                violations
            }
        }
    }
}

/// Maps and validates in one step.
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    taxonomy: Taxonomy,
    limits: MappingLimits,
}

impl Default for SchemaMapper {
    fn default() -> Self {
        Self::new(Taxonomy::default(), MappingLimits::default())
    }
}

impl SchemaMapper {
    pub fn new(taxonomy: Taxonomy, limits: MappingLimits) -> Self {
        Self { taxonomy, limits }
    }

    pub fn from_overrides(
        overrides: &BTreeMap<String, String>,
        limits: MappingLimits,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(Taxonomy::with_overrides(overrides)?, limits))
    }

    pub fn limits(&self) -> &MappingLimits {
        &self.limits
    }

    /// Produces a compliant item or explains why none can be produced.
    ///
    /// Hard violations reject immediately. Soft violations get one
    /// correction pass and one re-validation.
    pub fn map(
        &self,
        attrs: &ExtractedAttributes,
        photo: Option<&str>,
    ) -> Result<MappingResult, MappingError> {
        let (item, idempotency_key) =
            map_to_marketplace_schema(attrs, photo, &self.taxonomy, self.limits.max_name_chars);

        let report = validate(&item, &self.limits);
        if !report.hard.is_empty() {
            return Err(MappingError::Rejected {
                violations: report.messages(),
            });
        }
        if report.is_valid() {
            return Ok(MappingResult {
                item,
                idempotency_key,
                auto_corrected: false,
            });
        }

        log::debug!(
            "Auto-correcting item {}: {}",
            item.id,
            report.messages().join("; ")
        );
        let corrected = auto_correct(&item, &self.limits);
        let recheck = validate(&corrected, &self.limits);
        if !recheck.is_valid() {
            return Err(MappingError::Uncorrectable {
                violations: recheck.messages(),
            });
        }

        Ok(MappingResult {
            item: corrected,
            idempotency_key,
            auto_corrected: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CulturallySignificantItem, Price};

    fn attrs() -> ExtractedAttributes {
        ExtractedAttributes {
            category: Some("banarasi saree".to_string()),
            material: vec!["silk".to_string()],
            colors: vec!["red".to_string()],
            price: Some(Price::new("2500", "INR")),
            short_description: "Red silk banarasi saree".to_string(),
            long_description: "Woven by hand.".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_item_is_not_corrected() {
        let result = SchemaMapper::default()
            .map(&attrs(), Some("https://m/p.jpg"))
            .unwrap();
        assert!(!result.auto_corrected);
        assert_eq!(result.item.category_id, "fashion-ethnic-sarees");
    }

    #[test]
    fn test_missing_photo_is_rejected_without_correction() {
        let err = SchemaMapper::default().map(&attrs(), None).unwrap_err();
        assert!(matches!(err, MappingError::Rejected { .. }));
        assert!(err.violations().iter().any(|v| v.contains("images")));
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let mut a = attrs();
        a.price = None;
        let err = SchemaMapper::default()
            .map(&a, Some("https://m/p.jpg"))
            .unwrap_err();
        assert!(matches!(err, MappingError::Rejected { .. }));
    }

    #[test]
    fn test_soft_violation_corrected_once() {
        let mut a = attrs();
        a.short_description = format!("Red saree {}", "very ".repeat(120));
        a.price = Some(Price::new("2500", "inr"));
        let result = SchemaMapper::default()
            .map(&a, Some("https://m/p.jpg"))
            .unwrap();
        assert!(result.auto_corrected);
        assert_eq!(result.item.price.currency, "INR");
        assert!(result.item.descriptor.short_desc.chars().count() <= 500);
    }

    #[test]
    fn test_uncorrectable_cultural_overflow() {
        let mapper = SchemaMapper::new(
            Taxonomy::default(),
            MappingLimits {
                max_long_desc_chars: 30,
                ..Default::default()
            },
        );
        let mut a = attrs();
        a.culturally_significant_items = vec![CulturallySignificantItem {
            vernacular_term: "ज़री".to_string(),
            transliteration: "zari".to_string(),
            contextual_explanation: "Fine metallic thread of gold or silver".to_string(),
        }];
        let err = mapper.map(&a, Some("https://m/p.jpg")).unwrap_err();
        assert!(matches!(err, MappingError::Uncorrectable { .. }));
    }
}
