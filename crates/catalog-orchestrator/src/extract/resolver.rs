//! Per-field conflict resolution between voice, vision and generated
//! attributes.
//!
//! Precedence for the core fields (category, material, colors) is
//! voice > vision > generator. Each populated field gets the confidence of
//! the source that supplied it.

use crate::catalog::attributes::field;
use crate::catalog::{ExtractedAttributes, VisionResult};

use super::voice::VoiceAttributes;

/// Used when the generator populates a field without scoring it.
pub const GENERATOR_DEFAULT_CONFIDENCE: f64 = 0.5;

/// Voice-derived attributes plus the transcription confidence.
pub struct VoiceInput<'a> {
    pub attributes: &'a VoiceAttributes,
    pub confidence: f64,
}

fn clean_list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let v = value.trim().to_lowercase();
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First non-empty list in precedence order, with its source's confidence.
fn pick_list(
    voice: Option<(&[String], f64)>,
    vision: Option<(&[String], f64)>,
    generated: Option<(&[String], f64)>,
) -> Option<(Vec<String>, f64)> {
    [voice, vision, generated]
        .into_iter()
        .flatten()
        .map(|(values, score)| (clean_list(values), score))
        .find(|(values, _)| !values.is_empty())
}

fn generator_confidence(generated: &ExtractedAttributes, name: &str) -> f64 {
    generated
        .confidence(name)
        .unwrap_or(GENERATOR_DEFAULT_CONFIDENCE)
}

/// Resolves every structured field. Descriptions and cultural items are
/// filled in by the caller.
pub fn resolve(
    voice: Option<VoiceInput<'_>>,
    vision: Option<&VisionResult>,
    generated: Option<&ExtractedAttributes>,
) -> ExtractedAttributes {
    let mut out = ExtractedAttributes::default();

    let voice_confidence = voice.as_ref().map_or(0.0, |v| v.confidence);
    let vision_confidence = vision.map_or(0.0, |v| v.confidence);

    let category = voice
        .as_ref()
        .and_then(|v| v.attributes.category.clone())
        .map(|c| (c, voice_confidence))
        .or_else(|| {
            vision
                .and_then(|v| clean_text(v.category.as_deref()))
                .map(|c| (c.to_lowercase(), vision_confidence))
        })
        .or_else(|| {
            generated.and_then(|g| {
                clean_text(g.category.as_deref())
                    .map(|c| (c.to_lowercase(), generator_confidence(g, field::CATEGORY)))
            })
        });
    if let Some((category, score)) = category {
        out.category = Some(category);
        out.set_confidence(field::CATEGORY, score);
    }

    let materials = pick_list(
        voice.as_ref().map(|v| (v.attributes.materials.as_slice(), voice_confidence)),
        vision.map(|v| (v.materials.as_slice(), vision_confidence)),
        generated.map(|g| (g.material.as_slice(), generator_confidence(g, field::MATERIAL))),
    );
    if let Some((materials, score)) = materials {
        out.material = materials;
        out.set_confidence(field::MATERIAL, score);
    }

    let colors = pick_list(
        voice.as_ref().map(|v| (v.attributes.colors.as_slice(), voice_confidence)),
        vision.map(|v| (v.colors.as_slice(), vision_confidence)),
        generated.map(|g| (g.colors.as_slice(), generator_confidence(g, field::COLORS))),
    );
    if let Some((colors, score)) = colors {
        out.colors = colors;
        out.set_confidence(field::COLORS, score);
    }

    // Price only ever comes from what the artisan said.
    if let Some(v) = voice.as_ref() {
        if let Some(price) = v.attributes.price.clone() {
            out.price = Some(price);
            out.set_confidence(field::PRICE, v.confidence);
        }
    }

    // region: generator first, a style's home region otherwise
    let region = generated
        .and_then(|g| {
            clean_text(g.region_of_origin.as_deref())
                .map(|r| (r, generator_confidence(g, field::REGION_OF_ORIGIN)))
        })
        .or_else(|| {
            voice
                .as_ref()
                .and_then(|v| v.attributes.region.clone())
                .map(|r| (r, voice_confidence))
        });
    if let Some((region, score)) = region {
        out.region_of_origin = Some(region);
        out.set_confidence(field::REGION_OF_ORIGIN, score);
    }

    if let Some(g) = generated {
        if let Some(sub) = clean_text(g.subcategory.as_deref()) {
            out.subcategory = Some(sub.to_lowercase());
            out.set_confidence(field::SUBCATEGORY, generator_confidence(g, field::SUBCATEGORY));
        }
        if let Some(technique) = clean_text(g.craft_technique.as_deref()) {
            out.craft_technique = Some(technique);
            out.set_confidence(
                field::CRAFT_TECHNIQUE,
                generator_confidence(g, field::CRAFT_TECHNIQUE),
            );
        }
        if let Some(dimensions) = g.dimensions.clone() {
            out.dimensions = Some(dimensions);
            out.set_confidence(field::DIMENSIONS, generator_confidence(g, field::DIMENSIONS));
        }
        if let Some(weight) = g.weight.clone() {
            out.weight = Some(weight);
            out.set_confidence(field::WEIGHT, generator_confidence(g, field::WEIGHT));
        }
    }

    out
}
