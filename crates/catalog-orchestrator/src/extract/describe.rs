//! Locally composed descriptions, used when the description generator is
//! unavailable or returns empty text.

use crate::catalog::ExtractedAttributes;

fn join_words(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One line naming the product, e.g. "Red and gold silk banarasi saree".
pub fn short_description(attrs: &ExtractedAttributes) -> String {
    let mut words = Vec::new();
    if !attrs.colors.is_empty() {
        words.push(join_words(&attrs.colors));
    }
    if !attrs.material.is_empty() {
        words.push(join_words(&attrs.material));
    }
    words.push(
        attrs
            .category
            .clone()
            .unwrap_or_else(|| "handcrafted item".to_string()),
    );
    capitalize(&words.join(" "))
}

/// A few sentences built from the structured fields and, when present, the
/// artisan's own words.
pub fn long_description(attrs: &ExtractedAttributes, transcription: Option<&str>) -> String {
    let mut sentences = vec![format!("{}.", short_description(attrs))];

    if let Some(region) = &attrs.region_of_origin {
        sentences.push(format!("Made in {}.", region));
    }
    if let Some(dimensions) = &attrs.dimensions {
        sentences.push(format!("Dimensions: {}.", dimensions));
    }
    if let Some(weight) = &attrs.weight {
        sentences.push(format!("Weight: {}.", weight));
    }

    let mut text = sentences.join(" ");
    if let Some(words) = transcription.map(str::trim).filter(|t| !t.is_empty()) {
        text.push_str(&format!("\n\nIn the artisan's words: \"{}\"", words));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Dimensions;

    #[test]
    fn test_short_description() {
        let attrs = ExtractedAttributes {
            category: Some("banarasi saree".to_string()),
            colors: vec!["red".to_string(), "gold".to_string()],
            material: vec!["silk".to_string()],
            ..Default::default()
        };
        assert_eq!(short_description(&attrs), "Red and gold silk banarasi saree");
    }

    #[test]
    fn test_short_description_without_anything() {
        assert_eq!(
            short_description(&ExtractedAttributes::default()),
            "Handcrafted item"
        );
    }

    #[test]
    fn test_long_description_quotes_artisan() {
        let attrs = ExtractedAttributes {
            category: Some("pot".to_string()),
            region_of_origin: Some("Kutch, Gujarat".to_string()),
            dimensions: Some(Dimensions {
                length: None,
                width: Some(20.0),
                height: Some(30.0),
                unit: "cm".to_string(),
            }),
            ..Default::default()
        };
        let text = long_description(&attrs, Some(" mitti ka matka "));
        assert!(text.starts_with("Pot. Made in Kutch, Gujarat. Dimensions: 20 x 30 cm."));
        assert!(text.ends_with("In the artisan's words: \"mitti ka matka\""));
    }

    #[test]
    fn test_join_words() {
        let items: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_words(&items), "a, b and c");
    }
}
