use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

/// Category id used when nothing in the table matches.
pub const CATALOG_ALL: &str = "catalog-all";

static RE_CATEGORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap());

const BUILTIN: &[(&str, &str)] = &[
    ("saree", "fashion-ethnic-sarees"),
    ("sari", "fashion-ethnic-sarees"),
    ("dupatta", "fashion-ethnic-dupattas-stoles"),
    ("stole", "fashion-ethnic-dupattas-stoles"),
    ("shawl", "fashion-ethnic-shawls"),
    ("kurta", "fashion-ethnic-kurtas"),
    ("lehenga", "fashion-ethnic-lehengas"),
    ("bangle", "fashion-jewellery-bangles"),
    ("necklace", "fashion-jewellery-necklaces"),
    ("earrings", "fashion-jewellery-earrings"),
    ("bag", "fashion-bags"),
    ("pot", "home-decor-pottery"),
    ("vase", "home-decor-pottery"),
    ("bowl", "home-kitchen-bowls"),
    ("basket", "home-decor-baskets"),
    ("lamp", "home-decor-lighting"),
    ("idol", "home-decor-idols"),
    ("rug", "home-furnishing-rugs"),
    ("carpet", "home-furnishing-rugs"),
    ("durrie", "home-furnishing-rugs"),
    ("bedsheet", "home-furnishing-bedsheets"),
    ("painting", "art-paintings"),
    ("toy", "toys-handmade"),
];

/// Fixed category lookup with operator-curated overrides.
///
/// A category such as `banarasi saree` is matched whole first, then word by
/// word from the end, so the product noun decides when no exact entry
/// exists.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    entries: BTreeMap<String, String>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            entries: BUILTIN
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Taxonomy {
    /// Built-in table extended (or overridden) by `overrides`.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut taxonomy = Self::default();
        for (key, id) in overrides {
            let normalized = normalize(key);
            if normalized.is_empty() {
                return Err(ConfigError::InvalidTaxonomy {
                    key: key.clone(),
                    reason: "key is empty".to_string(),
                });
            }
            if !RE_CATEGORY_ID.is_match(id) {
                return Err(ConfigError::InvalidTaxonomy {
                    key: key.clone(),
                    reason: format!("'{}' is not a lowercase, hyphenated category id", id),
                });
            }
            taxonomy.entries.insert(normalized, id.clone());
        }
        Ok(taxonomy)
    }

    pub fn category_id(&self, category: Option<&str>) -> String {
        let Some(category) = category.map(normalize).filter(|c| !c.is_empty()) else {
            return CATALOG_ALL.to_string();
        };

        if let Some(id) = self.entries.get(&category) {
            return id.clone();
        }
        category
            .split(' ')
            .rev()
            .find_map(|word| self.entries.get(word))
            .cloned()
            .unwrap_or_else(|| CATALOG_ALL.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_noun_decides() {
        let taxonomy = Taxonomy::default();
        assert_eq!(
            taxonomy.category_id(Some("Banarasi  Saree")),
            "fashion-ethnic-sarees"
        );
        assert_eq!(taxonomy.category_id(Some("pot")), "home-decor-pottery");
    }

    #[test]
    fn test_unknown_falls_back_to_catalog_all() {
        let taxonomy = Taxonomy::default();
        assert_eq!(taxonomy.category_id(Some("spaceship")), CATALOG_ALL);
        assert_eq!(taxonomy.category_id(None), CATALOG_ALL);
        assert_eq!(taxonomy.category_id(Some("  ")), CATALOG_ALL);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = BTreeMap::from([
            ("Banarasi Saree".to_string(), "fashion-ethnic-sarees-banarasi".to_string()),
            ("terracotta horse".to_string(), "home-decor-figurines".to_string()),
        ]);
        let taxonomy = Taxonomy::with_overrides(&overrides).unwrap();
        assert_eq!(
            taxonomy.category_id(Some("banarasi saree")),
            "fashion-ethnic-sarees-banarasi"
        );
        assert_eq!(
            taxonomy.category_id(Some("kanjeevaram saree")),
            "fashion-ethnic-sarees"
        );
        assert_eq!(
            taxonomy.category_id(Some("terracotta horse")),
            "home-decor-figurines"
        );
    }

    #[test]
    fn test_invalid_override_rejected() {
        let overrides = BTreeMap::from([("saree".to_string(), "Not An Id".to_string())]);
        assert!(matches!(
            Taxonomy::with_overrides(&overrides),
            Err(ConfigError::InvalidTaxonomy { .. })
        ));
    }
}
