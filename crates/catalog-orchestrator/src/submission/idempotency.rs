//! Content-derived idempotency keys.
//!
//! Two submissions describing the same product carry the same key no matter
//! how the artisan phrased it: text is trimmed and lowercased, lists are
//! sorted and de-duplicated, and the price is a normalized decimal.

use sha2::{Digest, Sha256};

use crate::catalog::ExtractedAttributes;

const FIELD_SEP: char = '\u{1f}';
const ITEM_SEP: char = '\u{1e}';

fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn normalize_list(values: &[String]) -> String {
    let mut items: Vec<String> = values
        .iter()
        .map(|v| normalize_text(v))
        .filter(|v| !v.is_empty())
        .collect();
    items.sort();
    items.dedup();
    items.join(&ITEM_SEP.to_string())
}

/// Canonical decimal form: no grouping separators, no leading zeros, no
/// trailing fractional zeros. Non-numeric input is returned trimmed.
pub fn normalize_decimal(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned.parse::<f64>().is_err() {
        return value.trim().to_string();
    }

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return cleaned;
    }

    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// SHA-256 over `(category, subcategory, sorted materials, sorted colors,
/// price value)`, hex encoded.
pub fn idempotency_key(attrs: &ExtractedAttributes) -> String {
    let fields = [
        attrs.category.as_deref().map(normalize_text).unwrap_or_default(),
        attrs
            .subcategory
            .as_deref()
            .map(normalize_text)
            .unwrap_or_default(),
        normalize_list(&attrs.material),
        normalize_list(&attrs.colors),
        attrs
            .price
            .as_ref()
            .map(|p| normalize_decimal(&p.value))
            .unwrap_or_default(),
    ];

    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(FIELD_SEP.to_string().as_bytes());
        }
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
