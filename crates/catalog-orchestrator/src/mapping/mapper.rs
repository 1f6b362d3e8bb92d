use std::collections::BTreeMap;

use crate::catalog::{
    CulturallySignificantItem, Descriptor, ExtractedAttributes, ItemPrice, MarketplaceCatalogItem,
};
use crate::submission::{idempotency_key, normalize_decimal};

use super::taxonomy::Taxonomy;

pub const CULTURAL_SECTION_HEADER: &str = "Cultural Significance:";
pub const CRAFT_TECHNIQUE_LABEL: &str = "Craft Technique:";
pub const DEFAULT_CURRENCY: &str = "INR";

/// Length of the idempotency-key prefix used in item ids.
const ITEM_ID_KEY_CHARS: usize = 16;

/// Cuts `text` to at most `max` characters without splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// `term (transliteration): explanation`, with the transliteration kept
/// even when it repeats the term.
fn cultural_line(item: &CulturallySignificantItem) -> String {
    format!(
        "- {} ({}): {}",
        item.vernacular_term.trim(),
        item.transliteration.trim(),
        item.contextual_explanation.trim()
    )
}

/// Long description body, then the cultural section, then the craft line.
/// Absent sections are left out.
pub fn compose_long_desc(attrs: &ExtractedAttributes) -> String {
    let mut sections = Vec::new();

    let body = attrs.long_description.trim();
    if !body.is_empty() {
        sections.push(body.to_string());
    }

    let items: Vec<String> = attrs
        .culturally_significant_items
        .iter()
        .filter(|i| !i.vernacular_term.trim().is_empty())
        .map(cultural_line)
        .collect();
    if !items.is_empty() {
        sections.push(format!("{}\n{}", CULTURAL_SECTION_HEADER, items.join("\n")));
    }

    if let Some(technique) = attrs
        .craft_technique
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        sections.push(format!("{} {}", CRAFT_TECHNIQUE_LABEL, technique));
    }

    sections.join("\n\n")
}

fn build_tags(attrs: &ExtractedAttributes) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        if !value.trim().is_empty() {
            tags.insert(key.to_string(), value);
        }
    };

    put("material", attrs.material.join(","));
    put("colors", attrs.colors.join(","));
    put("subcategory", attrs.subcategory.clone().unwrap_or_default());
    put("region_of_origin", attrs.region_of_origin.clone().unwrap_or_default());
    put("craft_technique", attrs.craft_technique.clone().unwrap_or_default());
    put(
        "dimensions",
        attrs.dimensions.as_ref().map(|d| d.to_string()).unwrap_or_default(),
    );
    put(
        "weight",
        attrs.weight.as_ref().map(|w| w.to_string()).unwrap_or_default(),
    );
    put(
        "cultural_terms",
        attrs
            .culturally_significant_items
            .iter()
            .map(|i| i.vernacular_term.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(","),
    );
    tags
}

/// Maps attributes onto the marketplace schema. Pure: the same attributes
/// and photo always give the same item, id included.
pub fn map_to_marketplace_schema(
    attrs: &ExtractedAttributes,
    photo: Option<&str>,
    taxonomy: &Taxonomy,
    max_name_chars: usize,
) -> (MarketplaceCatalogItem, String) {
    let key = idempotency_key(attrs);
    let id = format!("item-{}", truncate_chars(&key, ITEM_ID_KEY_CHARS));

    let short_desc = attrs.short_description.trim().to_string();
    let name = truncate_chars(&short_desc, max_name_chars).trim_end().to_string();

    let price = match &attrs.price {
        Some(p) => ItemPrice {
            currency: p.currency.clone(),
            value: Some(normalize_decimal(&p.value)),
        },
        None => ItemPrice {
            currency: DEFAULT_CURRENCY.to_string(),
            value: None,
        },
    };

    let item = MarketplaceCatalogItem {
        id,
        descriptor: Descriptor {
            name,
            short_desc,
            long_desc: compose_long_desc(attrs),
            images: photo
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| vec![p.to_string()])
                .unwrap_or_default(),
        },
        price,
        category_id: taxonomy.category_id(attrs.category.as_deref()),
        tags: build_tags(attrs),
    };
    (item, key)
}
