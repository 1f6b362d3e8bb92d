//! Marketplace schema rules.
//!
//! Hard rules describe items that cannot be listed at all and are never
//! corrected. Soft rules are fixed by [`auto_correct`] in a single pass.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

use crate::catalog::MarketplaceCatalogItem;

use super::mapper::{truncate_chars, CULTURAL_SECTION_HEADER, DEFAULT_CURRENCY};

static RE_TAG_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").unwrap());
static RE_NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+(\.[0-9]+)?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingLimits {
    pub max_name_chars: usize,
    pub max_short_desc_chars: usize,
    pub max_long_desc_chars: usize,
}

impl Default for MappingLimits {
    fn default() -> Self {
        Self {
            max_name_chars: 100,
            max_short_desc_chars: 500,
            max_long_desc_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardViolation {
    EmptyName,
    MissingPrice,
    NonNumericPrice(String),
    EmptyCategory,
    NoImage,
    MalformedImageUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftViolation {
    NameTooLong(usize),
    ShortDescTooLong(usize),
    LongDescTooLong(usize),
    InvalidCurrency(String),
    ControlCharacters(&'static str),
    InvalidTagKey(String),
    EmptyTagValue(String),
}

impl std::fmt::Display for HardViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HardViolation::EmptyName => write!(f, "descriptor.name is empty"),
            HardViolation::MissingPrice => write!(f, "price.value is missing"),
            HardViolation::NonNumericPrice(v) => write!(f, "price.value '{}' is not numeric", v),
            HardViolation::EmptyCategory => write!(f, "categoryId is empty"),
            HardViolation::NoImage => write!(f, "descriptor.images is empty"),
            HardViolation::MalformedImageUrl(u) => write!(f, "image URL '{}' is malformed", u),
        }
    }
}

impl std::fmt::Display for SoftViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SoftViolation::NameTooLong(n) => write!(f, "descriptor.name has {} characters", n),
            SoftViolation::ShortDescTooLong(n) => {
                write!(f, "descriptor.shortDesc has {} characters", n)
            }
            SoftViolation::LongDescTooLong(n) => {
                write!(f, "descriptor.longDesc has {} characters", n)
            }
            SoftViolation::InvalidCurrency(c) => write!(f, "currency '{}' is not an ISO code", c),
            SoftViolation::ControlCharacters(field) => {
                write!(f, "{} contains control characters", field)
            }
            SoftViolation::InvalidTagKey(k) => write!(f, "tag key '{}' is malformed", k),
            SoftViolation::EmptyTagValue(k) => write!(f, "tag '{}' has an empty value", k),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub hard: Vec<HardViolation>,
    pub soft: Vec<SoftViolation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.hard.is_empty() && self.soft.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.hard
            .iter()
            .map(ToString::to_string)
            .chain(self.soft.iter().map(ToString::to_string))
            .collect()
    }
}

fn is_valid_image_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn is_iso_currency(value: &str) -> bool {
    value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

fn has_control(text: &str, allow_newlines: bool) -> bool {
    text.chars()
        .any(|c| c.is_control() && !(allow_newlines && (c == '\n' || c == '\t')))
}

fn strip_control(text: &str, allow_newlines: bool) -> String {
    text.chars()
        .filter(|c| !c.is_control() || (allow_newlines && (*c == '\n' || *c == '\t')))
        .collect()
}

pub fn validate(item: &MarketplaceCatalogItem, limits: &MappingLimits) -> ValidationReport {
    let mut report = ValidationReport::default();
    let d = &item.descriptor;

    if d.name.trim().is_empty() {
        report.hard.push(HardViolation::EmptyName);
    }
    match item.price.value.as_deref().map(str::trim) {
        None | Some("") => report.hard.push(HardViolation::MissingPrice),
        Some(v) if !RE_NUMERIC.is_match(v) => {
            report.hard.push(HardViolation::NonNumericPrice(v.to_string()))
        }
        Some(_) => {}
    }
    if item.category_id.trim().is_empty() {
        report.hard.push(HardViolation::EmptyCategory);
    }
    if d.images.is_empty() {
        report.hard.push(HardViolation::NoImage);
    }
    for image in &d.images {
        if !is_valid_image_url(image) {
            report.hard.push(HardViolation::MalformedImageUrl(image.clone()));
        }
    }

    let name_len = d.name.chars().count();
    if name_len > limits.max_name_chars {
        report.soft.push(SoftViolation::NameTooLong(name_len));
    }
    let short_len = d.short_desc.chars().count();
    if short_len > limits.max_short_desc_chars {
        report.soft.push(SoftViolation::ShortDescTooLong(short_len));
    }
    let long_len = d.long_desc.chars().count();
    if long_len > limits.max_long_desc_chars {
        report.soft.push(SoftViolation::LongDescTooLong(long_len));
    }
    if !is_iso_currency(&item.price.currency) {
        report
            .soft
            .push(SoftViolation::InvalidCurrency(item.price.currency.clone()));
    }
    if has_control(&d.name, false) {
        report.soft.push(SoftViolation::ControlCharacters("descriptor.name"));
    }
    if has_control(&d.short_desc, false) {
        report
            .soft
            .push(SoftViolation::ControlCharacters("descriptor.shortDesc"));
    }
    if has_control(&d.long_desc, true) {
        report
            .soft
            .push(SoftViolation::ControlCharacters("descriptor.longDesc"));
    }
    for (key, value) in &item.tags {
        if !RE_TAG_KEY.is_match(key) {
            report.soft.push(SoftViolation::InvalidTagKey(key.clone()));
        } else if value.trim().is_empty() {
            report.soft.push(SoftViolation::EmptyTagValue(key.clone()));
        }
    }

    report
}

/// Shortens a long description to `max` characters while keeping the
/// cultural section whole. Only the body before it is cut.
fn fit_long_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }

    let split = if text.starts_with(CULTURAL_SECTION_HEADER) {
        Some(0)
    } else {
        text.find(&format!("\n\n{}", CULTURAL_SECTION_HEADER))
    };

    match split {
        Some(idx) => {
            let (body, tail) = text.split_at(idx);
            let tail_len = tail.chars().count();
            // ellipsis
            let room = max.saturating_sub(tail_len + 1);
            if room == 0 || body.is_empty() {
                // Nothing left to cut without touching the cultural section.
                return text.to_string();
            }
            format!("{}…{}", truncate_chars(body, room).trim_end(), tail)
        }
        None => format!(
            "{}…",
            truncate_chars(text, max.saturating_sub(1)).trim_end()
        ),
    }
}

/// One correction pass over the soft rules. Hard rules are left alone.
pub fn auto_correct(item: &MarketplaceCatalogItem, limits: &MappingLimits) -> MarketplaceCatalogItem {
    let mut fixed = item.clone();
    let d = &mut fixed.descriptor;

    d.name = truncate_chars(&strip_control(&d.name, false), limits.max_name_chars)
        .trim()
        .to_string();
    d.short_desc = truncate_chars(&strip_control(&d.short_desc, false), limits.max_short_desc_chars)
        .trim()
        .to_string();
    d.long_desc = fit_long_desc(&strip_control(&d.long_desc, true), limits.max_long_desc_chars);

    let currency = fixed.price.currency.trim().to_ascii_uppercase();
    fixed.price.currency = if is_iso_currency(&currency) {
        currency
    } else {
        DEFAULT_CURRENCY.to_string()
    };

    fixed
        .tags
        .retain(|key, value| RE_TAG_KEY.is_match(key) && !value.trim().is_empty());

    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Descriptor, ItemPrice};
    use std::collections::BTreeMap;

    fn item() -> MarketplaceCatalogItem {
        MarketplaceCatalogItem {
            id: "item-1".to_string(),
            descriptor: Descriptor {
                name: "Red Banarasi saree".to_string(),
                short_desc: "Red Banarasi saree".to_string(),
                long_desc: "Body.\n\nCultural Significance:\n- zari (zari): gold thread".to_string(),
                images: vec!["https://media.example.com/p.jpg".to_string()],
            },
            price: ItemPrice {
                currency: "INR".to_string(),
                value: Some("2500".to_string()),
            },
            category_id: "fashion-ethnic-sarees".to_string(),
            tags: BTreeMap::from([("material".to_string(), "silk".to_string())]),
        }
    }

    #[test]
    fn test_valid_item() {
        assert!(validate(&item(), &MappingLimits::default()).is_valid());
    }

    #[test]
    fn test_hard_violations() {
        let mut bad = item();
        bad.descriptor.name = " ".to_string();
        bad.price.value = Some("2.5k".to_string());
        bad.category_id = String::new();
        bad.descriptor.images = vec!["not a url".to_string()];
        let report = validate(&bad, &MappingLimits::default());
        assert_eq!(
            report.hard,
            vec![
                HardViolation::EmptyName,
                HardViolation::NonNumericPrice("2.5k".to_string()),
                HardViolation::EmptyCategory,
                HardViolation::MalformedImageUrl("not a url".to_string()),
            ]
        );

        let mut no_image = item();
        no_image.descriptor.images.clear();
        no_image.price.value = None;
        let report = validate(&no_image, &MappingLimits::default());
        assert!(report.hard.contains(&HardViolation::NoImage));
        assert!(report.hard.contains(&HardViolation::MissingPrice));
    }

    #[test]
    fn test_auto_correct_fixes_soft_violations() {
        let limits = MappingLimits::default();
        let mut messy = item();
        messy.descriptor.short_desc = "x".repeat(600);
        messy.descriptor.name = "Red\u{7}saree".to_string();
        messy.price.currency = "inr".to_string();
        messy.tags.insert("Bad Key".to_string(), "v".to_string());
        messy.tags.insert("empty".to_string(), " ".to_string());

        let report = validate(&messy, &limits);
        assert!(report.hard.is_empty());
        assert_eq!(report.soft.len(), 5);

        let fixed = auto_correct(&messy, &limits);
        assert!(validate(&fixed, &limits).is_valid());
        assert_eq!(fixed.descriptor.name, "Redsaree");
        assert_eq!(fixed.descriptor.short_desc.chars().count(), 500);
        assert_eq!(fixed.price.currency, "INR");
        assert_eq!(fixed.tags.len(), 1);
    }

    #[test]
    fn test_unknown_currency_defaults_to_inr() {
        let mut messy = item();
        messy.price.currency = "rupees".to_string();
        assert_eq!(auto_correct(&messy, &MappingLimits::default()).price.currency, "INR");
    }

    #[test]
    fn test_long_desc_truncation_keeps_cultural_section() {
        let limits = MappingLimits {
            max_long_desc_chars: 80,
            ..Default::default()
        };
        let tail = "\n\nCultural Significance:\n- zari (zari): gold thread";
        let mut long = item();
        long.descriptor.long_desc = format!("{}{}", "body ".repeat(40), tail);

        let fixed = auto_correct(&long, &limits);
        assert!(fixed.descriptor.long_desc.ends_with(tail));
        assert!(fixed.descriptor.long_desc.chars().count() <= 80);
        assert!(validate(&fixed, &limits).is_valid());
    }

    #[test]
    fn test_cultural_section_larger_than_limit_is_not_cut() {
        let limits = MappingLimits {
            max_long_desc_chars: 20,
            ..Default::default()
        };
        let mut long = item();
        long.descriptor.long_desc =
            "Body.\n\nCultural Significance:\n- zari (zari): gold thread".to_string();
        let fixed = auto_correct(&long, &limits);
        assert!(fixed.descriptor.long_desc.contains("- zari (zari): gold thread"));
        assert!(!validate(&fixed, &limits).is_valid());
    }
}
