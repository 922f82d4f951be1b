//! AI content classification with a fixed category schema.
//!
//! Providers name their categories differently; everything returned from a
//! [`Classifier`] is normalized to [`TEXT_CATEGORIES`] or [`IMAGE_CATEGORIES`]
//! with every category present. `None` means "no signal" (not configured,
//! failed, timed out) and callers must treat it as allow.

pub mod openai;
pub mod prompt;

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

pub use openai::OpenAiClassifier;

pub const TEXT_CATEGORIES: [&str; 6] = [
    "toxicity",
    "hate",
    "sexual",
    "harassment",
    "selfharm",
    "violence",
];

pub const IMAGE_CATEGORIES: [&str; 5] = ["nudity", "sexual_minors", "violence", "weapons", "gore"];

/// Category name to score in `[0, 1]`.
pub type CategoryScores = BTreeMap<String, f64>;

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify_text(&self, text: &str) -> Option<CategoryScores>;
    async fn classify_image(&self, url: &str) -> Option<CategoryScores>;
    fn provider_name(&self) -> &'static str;

    /// Like [`Classifier::classify_text`] with a chat-specific model. Providers
    /// without a model choice ignore it.
    async fn classify_text_with(&self, text: &str, _model: &str) -> Option<CategoryScores> {
        self.classify_text(text).await
    }

    async fn classify_image_with(&self, url: &str, _model: &str) -> Option<CategoryScores> {
        self.classify_image(url).await
    }
}

/// Always returns `None`; used when no provider is configured.
pub struct DisabledClassifier;

#[async_trait]
impl Classifier for DisabledClassifier {
    async fn classify_text(&self, _text: &str) -> Option<CategoryScores> {
        None
    }

    async fn classify_image(&self, _url: &str) -> Option<CategoryScores> {
        None
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Every category of the schema at `0.0`.
pub fn zero_scores(categories: &[&str]) -> CategoryScores {
    categories.iter().map(|c| (c.to_string(), 0.0)).collect()
}

fn canonical(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect()
}

fn raise(scores: &mut CategoryScores, category: &str, value: f64) {
    let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    let slot = scores.entry(category.to_string()).or_insert(0.0);
    if value > *slot {
        *slot = value;
    }
}

/// Maps provider text categories onto the text schema, taking the max where
/// several provider categories feed one schema category. Providers without a
/// toxicity score get `max(harassment, hate)`.
pub fn normalize_text_scores(raw: &HashMap<String, f64>) -> CategoryScores {
    let mut scores = zero_scores(&TEXT_CATEGORIES);
    let mut saw_toxicity = false;
    for (name, value) in raw {
        let name = canonical(name);
        if name.starts_with("toxic") || name.starts_with("insult") || name.starts_with("profanity") {
            saw_toxicity = true;
            raise(&mut scores, "toxicity", *value);
        } else if name.starts_with("hate") {
            raise(&mut scores, "hate", *value);
        } else if name.starts_with("harassment") {
            raise(&mut scores, "harassment", *value);
        } else if name.starts_with("selfharm") {
            raise(&mut scores, "selfharm", *value);
        } else if name.starts_with("sexual") {
            raise(&mut scores, "sexual", *value);
        } else if name.starts_with("violence") || name == "illicit/violent" {
            raise(&mut scores, "violence", *value);
        }
    }
    if !saw_toxicity {
        let derived = scores["harassment"].max(scores["hate"]);
        raise(&mut scores, "toxicity", derived);
    }
    scores
}

/// Maps provider image categories onto the image schema.
pub fn normalize_image_scores(raw: &HashMap<String, f64>) -> CategoryScores {
    let mut scores = zero_scores(&IMAGE_CATEGORIES);
    for (name, value) in raw {
        let name = canonical(name);
        if name == "sexual/minors" || name == "sexualminors" || name == "minors" {
            raise(&mut scores, "sexual_minors", *value);
        } else if name.starts_with("sexual") || name.starts_with("nudity") || name == "explicit" {
            raise(&mut scores, "nudity", *value);
        } else if name == "violence/graphic" || name.starts_with("gore") {
            raise(&mut scores, "gore", *value);
            raise(&mut scores, "violence", *value);
        } else if name.starts_with("violence") {
            raise(&mut scores, "violence", *value);
        } else if name.starts_with("weapon") {
            raise(&mut scores, "weapons", *value);
        }
    }
    scores
}

/// Whether a provider response carries the visual-only categories directly.
pub fn has_visual_taxonomy(raw: &HashMap<String, f64>) -> bool {
    raw.keys().any(|name| {
        let name = canonical(name);
        name.starts_with("weapon") || name.starts_with("gore")
    })
}

/// Per-category maximum of two score maps.
pub fn merge_max(mut base: CategoryScores, other: &CategoryScores) -> CategoryScores {
    for (name, value) in other {
        raise(&mut base, name, *value);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_text_normalization_maps_provider_names() {
        let scores = normalize_text_scores(&raw(&[
            ("harassment", 0.2),
            ("harassment/threatening", 0.6),
            ("hate", 0.1),
            ("self-harm/intent", 0.4),
            ("sexual/minors", 0.3),
            ("violence/graphic", 0.05),
            ("illicit", 0.9),
        ]));
        assert_eq!(scores.len(), 6);
        assert_eq!(scores["harassment"], 0.6);
        assert_eq!(scores["selfharm"], 0.4);
        assert_eq!(scores["sexual"], 0.3);
        assert_eq!(scores["violence"], 0.05);
        assert_eq!(scores["toxicity"], 0.6);
    }

    #[test]
    fn test_image_normalization_separates_minors() {
        let scores = normalize_image_scores(&raw(&[
            ("sexual", 0.5),
            ("sexual/minors", 0.02),
            ("violence/graphic", 0.7),
        ]));
        assert_eq!(scores["nudity"], 0.5);
        assert_eq!(scores["sexual_minors"], 0.02);
        assert_eq!(scores["gore"], 0.7);
        assert_eq!(scores["violence"], 0.7);
        assert_eq!(scores["weapons"], 0.0);
        assert!(!has_visual_taxonomy(&raw(&[("sexual", 0.5)])));
        assert!(has_visual_taxonomy(&raw(&[("weapons", 0.1)])));
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let scores = normalize_text_scores(&raw(&[("toxicity", 1.7), ("hate", f64::NAN)]));
        assert_eq!(scores["toxicity"], 1.0);
        assert_eq!(scores["hate"], 0.0);
    }
}
