use crate::catalog::Price;

use super::lexicon;
use super::price::find_price;

/// Attributes the artisan stated out loud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceAttributes {
    /// Style plus product noun, e.g. `banarasi saree`.
    pub category: Option<String>,
    pub product: Option<String>,
    pub style: Option<String>,
    pub region: Option<String>,
    pub materials: Vec<String>,
    pub colors: Vec<String>,
    pub price: Option<Price>,
}

impl VoiceAttributes {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.materials.is_empty()
            && self.colors.is_empty()
            && self.price.is_none()
    }
}

/// Splits precomposed Devanagari nukta letters (U+0958..U+095F) into base
/// letter + nukta, the form the lexicon uses.
fn decompose_nukta(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        let base = match c {
            '\u{958}' => Some('\u{915}'),
            '\u{959}' => Some('\u{916}'),
            '\u{95A}' => Some('\u{917}'),
            '\u{95B}' => Some('\u{91C}'),
            '\u{95C}' => Some('\u{921}'),
            '\u{95D}' => Some('\u{922}'),
            '\u{95E}' => Some('\u{92B}'),
            '\u{95F}' => Some('\u{92F}'),
            _ => None,
        };
        match base {
            Some(b) => {
                out.push(b);
                out.push('\u{93C}');
            }
            None => out.push(c),
        }
    }
    out
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation() || c == '।')
        .filter(|t| !t.is_empty())
        .map(|t| decompose_nukta(&t.to_lowercase()))
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Reads category, materials, colors and price from a transcription.
pub fn interpret(transcription: &str) -> VoiceAttributes {
    let mut attrs = VoiceAttributes {
        price: find_price(transcription),
        ..Default::default()
    };

    for token in tokens(transcription) {
        if let Some(color) = lexicon::color(&token) {
            push_unique(&mut attrs.colors, color);
        }
        if let Some(material) = lexicon::material(&token) {
            push_unique(&mut attrs.materials, material);
        }
        if attrs.product.is_none() {
            if let Some(product) = lexicon::product(&token) {
                attrs.product = Some(product.to_string());
            }
        }
        if attrs.style.is_none() {
            if let Some(style) = lexicon::style(&token) {
                attrs.style = Some(style.canonical.to_string());
                attrs.region = Some(style.region.to_string());
            }
        }
    }

    attrs.category = match (&attrs.style, &attrs.product) {
        (Some(style), Some(product)) => Some(format!("{} {}", style, product)),
        (None, Some(product)) => Some(product.clone()),
        _ => None,
    };
    attrs
}
