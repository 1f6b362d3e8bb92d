//! Attribute extraction: turns stage results into [`ExtractedAttributes`].
//!
//! Voice interpretation is local. The description generator and the
//! cultural knowledge service only enrich the result; when either fails the
//! extraction still completes, and the failure is reported back so the
//! caller can audit it.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::adapters::{AdapterError, CulturalKnowledge, DescriptionGenerator, Guarded};
use crate::catalog::attributes::field;
use crate::catalog::{
    AsrResult, CulturallySignificantItem, ExtractedAttributes, LanguageCode, VisionResult,
};

pub mod describe;
pub mod lexicon;
pub mod price;
pub mod resolver;
pub mod voice;

pub use resolver::{resolve, VoiceInput};
pub use voice::{interpret, VoiceAttributes};

/// Confidence of template text composed without the generator.
const LOCAL_DESCRIPTION_CONFIDENCE: f64 = 0.4;
/// Confidence of items returned by the cultural knowledge service.
const CULTURAL_SERVICE_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub cultural_cache_ttl: Duration,
    pub cultural_cache_capacity: u64,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            cultural_cache_ttl: Duration::from_secs(3600),
            cultural_cache_capacity: 10_000,
        }
    }
}

/// An enrichment service that failed during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedInput {
    pub service: &'static str,
    pub error: AdapterError,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub attributes: ExtractedAttributes,
    pub degraded: Vec<DegradedInput>,
}

pub struct AttributeExtractor {
    generator: Option<Arc<Guarded<dyn DescriptionGenerator>>>,
    cultural: Option<Arc<Guarded<dyn CulturalKnowledge>>>,
    cultural_cache: Cache<String, Vec<CulturallySignificantItem>>,
}

impl AttributeExtractor {
    pub fn new(
        generator: Option<Arc<Guarded<dyn DescriptionGenerator>>>,
        cultural: Option<Arc<Guarded<dyn CulturalKnowledge>>>,
        settings: &ExtractorSettings,
    ) -> Self {
        let cultural_cache = Cache::builder()
            .max_capacity(settings.cultural_cache_capacity)
            .time_to_live(settings.cultural_cache_ttl)
            .build();
        Self {
            generator,
            cultural,
            cultural_cache,
        }
    }

    /// Builds attributes from whatever upstream stages produced. Either input
    /// may be absent; with neither, only template descriptions are filled.
    pub async fn extract(
        &self,
        asr: Option<&AsrResult>,
        vision: Option<&VisionResult>,
        language_hint: LanguageCode,
    ) -> Extraction {
        let mut degraded = Vec::new();
        let language = asr
            .and_then(|a| LanguageCode::parse(&a.detected_language))
            .unwrap_or(language_hint);
        let transcription = asr
            .map(|a| a.transcription.trim())
            .filter(|t| !t.is_empty());

        let voice = transcription.map(interpret);

        let generated = match &self.generator {
            Some(generator) => match generator
                .generate(transcription.unwrap_or_default(), vision, language)
                .await
            {
                Ok(generated) => Some(generated),
                Err(error) => {
                    log::warn!("Description generator unavailable, using local text: {}", error);
                    degraded.push(DegradedInput {
                        service: "description_generator",
                        error,
                    });
                    None
                }
            },
            None => None,
        };

        let mut attributes = resolve(
            voice.as_ref().zip(asr).map(|(attributes, asr)| VoiceInput {
                attributes,
                confidence: asr.confidence,
            }),
            vision,
            generated.as_ref(),
        );

        let looked_up = match transcription {
            Some(text) => match self.cultural_lookup(text, language).await {
                Ok(items) => items,
                Err(error) => {
                    log::warn!("Cultural knowledge unavailable, skipping enrichment: {}", error);
                    degraded.push(DegradedInput {
                        service: "cultural_knowledge",
                        error,
                    });
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        merge_cultural_items(&mut attributes, generated.as_ref(), looked_up);

        fill_descriptions(&mut attributes, generated.as_ref(), transcription);

        Extraction {
            attributes,
            degraded,
        }
    }

    async fn cultural_lookup(
        &self,
        transcription: &str,
        language: LanguageCode,
    ) -> Result<Vec<CulturallySignificantItem>, AdapterError> {
        let Some(cultural) = &self.cultural else {
            return Ok(Vec::new());
        };

        let key = format!("{}\u{1f}{}", language.as_str(), transcription);
        if let Some(hit) = self.cultural_cache.get(&key) {
            log::debug!("Cultural lookup served from cache");
            return Ok(hit);
        }

        let items = cultural.lookup(transcription, language).await?;
        self.cultural_cache.insert(key, items.clone());
        Ok(items)
    }
}

/// Generator items first, then service items; de-duplicated by vernacular
/// term, case-insensitively.
fn merge_cultural_items(
    attributes: &mut ExtractedAttributes,
    generated: Option<&ExtractedAttributes>,
    looked_up: Vec<CulturallySignificantItem>,
) {
    let from_generator = generated
        .map(|g| g.culturally_significant_items.clone())
        .unwrap_or_default();
    let service_contributed = !looked_up.is_empty();

    let mut merged: Vec<CulturallySignificantItem> = Vec::new();
    for item in from_generator.into_iter().chain(looked_up) {
        let term = item.vernacular_term.trim().to_lowercase();
        if term.is_empty() {
            continue;
        }
        if merged
            .iter()
            .any(|m| m.vernacular_term.trim().to_lowercase() == term)
        {
            continue;
        }
        merged.push(item);
    }

    if merged.is_empty() {
        return;
    }
    let score = match generated {
        Some(g) if !service_contributed => g
            .confidence(field::CULTURAL_ITEMS)
            .unwrap_or(resolver::GENERATOR_DEFAULT_CONFIDENCE),
        _ => CULTURAL_SERVICE_CONFIDENCE,
    };
    attributes.culturally_significant_items = merged;
    attributes.set_confidence(field::CULTURAL_ITEMS, score);
}

fn fill_descriptions(
    attributes: &mut ExtractedAttributes,
    generated: Option<&ExtractedAttributes>,
    transcription: Option<&str>,
) {
    let generated_short = generated
        .map(|g| g.short_description.trim())
        .filter(|t| !t.is_empty());
    let generated_long = generated
        .map(|g| g.long_description.trim())
        .filter(|t| !t.is_empty());

    match (generated_short, generated) {
        (Some(text), Some(g)) => {
            attributes.short_description = text.to_string();
            attributes.set_confidence(
                field::SHORT_DESCRIPTION,
                g.confidence(field::SHORT_DESCRIPTION)
                    .unwrap_or(resolver::GENERATOR_DEFAULT_CONFIDENCE),
            );
        }
        _ => {
            attributes.short_description = describe::short_description(attributes);
            attributes.set_confidence(field::SHORT_DESCRIPTION, LOCAL_DESCRIPTION_CONFIDENCE);
        }
    }

    match (generated_long, generated) {
        (Some(text), Some(g)) => {
            attributes.long_description = text.to_string();
            attributes.set_confidence(
                field::LONG_DESCRIPTION,
                g.confidence(field::LONG_DESCRIPTION)
                    .unwrap_or(resolver::GENERATOR_DEFAULT_CONFIDENCE),
            );
        }
        _ => {
            attributes.long_description = describe::long_description(attributes, transcription);
            attributes.set_confidence(field::LONG_DESCRIPTION, LOCAL_DESCRIPTION_CONFIDENCE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::BreakerSettings;
    use crate::catalog::ErrorCategory;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Generator {
        fail: bool,
    }

    #[async_trait]
    impl DescriptionGenerator for Generator {
        async fn generate(
            &self,
            _transcription: &str,
            _vision: Option<&VisionResult>,
            _language: LanguageCode,
        ) -> Result<ExtractedAttributes, AdapterError> {
            if self.fail {
                return Err(AdapterError::new(ErrorCategory::ServerError, "down"));
            }
            Ok(ExtractedAttributes {
                short_description: "Handwoven Banarasi silk saree".to_string(),
                long_description: "A red Banarasi saree woven with gold zari.".to_string(),
                craft_technique: Some("Handwoven on pit loom".to_string()),
                culturally_significant_items: vec![csi("Zari")],
                ..Default::default()
            })
        }
    }

    struct Cultural {
        calls: AtomicU32,
    }

    #[async_trait]
    impl CulturalKnowledge for Cultural {
        async fn lookup(
            &self,
            _transcription: &str,
            _language: LanguageCode,
        ) -> Result<Vec<CulturallySignificantItem>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![csi("zari"), csi("Banarasi")])
        }
    }

    fn csi(term: &str) -> CulturallySignificantItem {
        CulturallySignificantItem {
            vernacular_term: term.to_string(),
            transliteration: term.to_lowercase(),
            contextual_explanation: format!("About {}", term),
        }
    }

    fn guarded<S: ?Sized>(name: &str, inner: Arc<S>) -> Arc<Guarded<S>> {
        Arc::new(Guarded::new(
            name,
            inner,
            Duration::from_secs(5),
            BreakerSettings::default(),
        ))
    }

    fn asr(text: &str) -> AsrResult {
        AsrResult {
            transcription: text.to_string(),
            detected_language: "hi".to_string(),
            confidence: 0.92,
        }
    }

    #[tokio::test]
    async fn test_full_enrichment() {
        let generator: Arc<dyn DescriptionGenerator> = Arc::new(Generator { fail: false });
        let cultural_service = Arc::new(Cultural {
            calls: AtomicU32::new(0),
        });
        let cultural: Arc<dyn CulturalKnowledge> = cultural_service.clone();
        let extractor = AttributeExtractor::new(
            Some(guarded("generator", generator)),
            Some(guarded("cultural", cultural)),
            &ExtractorSettings::default(),
        );

        let transcription = asr("lal banarasi silk saree, zari ka kaam, 2500 rupaye");
        let out = extractor
            .extract(Some(&transcription), None, LanguageCode::Hindi)
            .await;
        assert!(out.degraded.is_empty());

        let attrs = out.attributes;
        assert_eq!(attrs.category.as_deref(), Some("banarasi saree"));
        assert_eq!(attrs.short_description, "Handwoven Banarasi silk saree");
        let terms: Vec<&str> = attrs
            .culturally_significant_items
            .iter()
            .map(|c| c.vernacular_term.as_str())
            .collect();
        assert_eq!(terms, vec!["Zari", "Banarasi"]);
        assert!(attrs.confidence(field::CULTURAL_ITEMS).is_some());

        // Second identical lookup is served from the cache.
        extractor
            .extract(Some(&transcription), None, LanguageCode::Hindi)
            .await;
        assert_eq!(cultural_service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generator_failure_degrades_to_local_text() {
        let generator: Arc<dyn DescriptionGenerator> = Arc::new(Generator { fail: true });
        let extractor = AttributeExtractor::new(
            Some(guarded("generator", generator)),
            None,
            &ExtractorSettings::default(),
        );

        let out = extractor
            .extract(Some(&asr("neela sooti dupatta ₹600")), None, LanguageCode::Hindi)
            .await;
        assert_eq!(out.degraded.len(), 1);
        assert_eq!(out.degraded[0].service, "description_generator");

        let attrs = out.attributes;
        assert_eq!(attrs.short_description, "Blue cotton dupatta");
        assert!(attrs.long_description.contains("neela sooti dupatta"));
        assert_eq!(
            attrs.confidence(field::SHORT_DESCRIPTION),
            Some(LOCAL_DESCRIPTION_CONFIDENCE)
        );
    }

    #[tokio::test]
    async fn test_vision_only_extraction() {
        let extractor = AttributeExtractor::new(None, None, &ExtractorSettings::default());
        let vision = VisionResult {
            category: Some("Pot".to_string()),
            colors: vec!["brown".to_string()],
            materials: vec!["terracotta".to_string()],
            confidence: 0.75,
            enhanced_photo_ref: None,
        };
        let out = extractor.extract(None, Some(&vision), LanguageCode::Tamil).await;
        let attrs = out.attributes;
        assert_eq!(attrs.category.as_deref(), Some("pot"));
        assert!(attrs.price.is_none());
        assert!(attrs.culturally_significant_items.is_empty());
        assert_eq!(attrs.short_description, "Brown terracotta pot");
    }
}
