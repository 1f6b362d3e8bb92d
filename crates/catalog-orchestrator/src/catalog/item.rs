//! Marketplace catalog item: the external schema the mapper produces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub name: String,
    pub short_desc: String,
    pub long_desc: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Price as sent to the marketplace. `value` stays `None` when no price was
/// extracted so the validator can reject it rather than submit a zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrice {
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Catalog item in the marketplace schema. Replaced wholesale on every
/// mapping run; never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceCatalogItem {
    pub id: String,
    pub descriptor: Descriptor,
    pub price: ItemPrice,
    pub category_id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl MarketplaceCatalogItem {
    /// Canonical JSON bytes. Field and tag ordering are fixed, so equal
    /// items always serialize identically.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
