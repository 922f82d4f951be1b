use std::collections::HashMap;
use std::time::Duration;

use emerald_moderator::classifier::prompt::parse_scores;
use emerald_moderator::classifier::{
    has_visual_taxonomy, merge_max, normalize_image_scores, normalize_text_scores, Classifier,
    DisabledClassifier, OpenAiClassifier, IMAGE_CATEGORIES, TEXT_CATEGORIES,
};
use emerald_moderator::config::Settings;
use emerald_moderator::error::ClassifierError;

fn raw(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_parse_scores_tolerates_fences_and_prose() {
    let content = "Sure! ```json\n{\"toxicity\": 0.9, \"hate\": \"0.2\", \"sexual\": false}\n```";
    let scores = parse_scores(content, &TEXT_CATEGORIES).unwrap();

    assert_eq!(scores.len(), TEXT_CATEGORIES.len());
    assert_eq!(scores["toxicity"], 0.9);
    assert_eq!(scores["hate"], 0.2);
    assert_eq!(scores["sexual"], 0.0);
    assert_eq!(scores["violence"], 0.0);
}

#[test]
fn test_parse_scores_clamps_out_of_range_values() {
    let scores = parse_scores(r#"{"nudity": 3.5, "gore": -1}"#, &IMAGE_CATEGORIES).unwrap();
    assert_eq!(scores["nudity"], 1.0);
    assert_eq!(scores["gore"], 0.0);
}

#[test]
fn test_parse_scores_rejects_malformed_output() {
    assert!(matches!(
        parse_scores("I cannot help with that.", &TEXT_CATEGORIES),
        Err(ClassifierError::Parse(_))
    ));
    assert!(matches!(
        parse_scores(r#"{"unrelated": 0.5}"#, &TEXT_CATEGORIES),
        Err(ClassifierError::Parse(_))
    ));
    assert!(matches!(
        parse_scores(r#"{"toxicity": "very"}"#, &TEXT_CATEGORIES),
        Err(ClassifierError::Parse(_))
    ));
    assert!(matches!(
        parse_scores(r#"{"toxicity": 0.4"#, &TEXT_CATEGORIES),
        Err(ClassifierError::Parse(_))
    ));
}

#[test]
fn test_text_normalization_derives_toxicity() {
    let scores = normalize_text_scores(&raw(&[
        ("harassment", 0.9),
        ("hate/threatening", 0.3),
        ("self-harm/intent", 0.6),
        ("sexual", 0.1),
    ]));

    assert_eq!(scores.len(), TEXT_CATEGORIES.len());
    assert_eq!(scores["toxicity"], 0.9);
    assert_eq!(scores["hate"], 0.3);
    assert_eq!(scores["selfharm"], 0.6);
    assert_eq!(scores["violence"], 0.0);
}

#[test]
fn test_image_normalization_and_merge() {
    let moderation = raw(&[
        ("sexual", 0.4),
        ("sexual/minors", 0.05),
        ("violence/graphic", 0.7),
    ]);
    assert!(!has_visual_taxonomy(&moderation));

    let normalized = normalize_image_scores(&moderation);
    assert_eq!(normalized["nudity"], 0.4);
    assert_eq!(normalized["sexual_minors"], 0.05);
    assert_eq!(normalized["gore"], 0.7);
    assert_eq!(normalized["violence"], 0.7);
    assert_eq!(normalized["weapons"], 0.0);

    let prompted = parse_scores(r#"{"weapons": 0.95, "nudity": 0.1}"#, &IMAGE_CATEGORIES).unwrap();
    let merged = merge_max(normalized, &prompted);
    assert_eq!(merged["weapons"], 0.95);
    assert_eq!(merged["nudity"], 0.4);

    assert!(has_visual_taxonomy(&raw(&[("weapons", 0.1)])));
}

#[tokio::test]
async fn test_disabled_classifier_gives_no_signal() {
    let classifier = DisabledClassifier;
    assert_eq!(classifier.classify_text("anything").await, None);
    assert_eq!(classifier.classify_image("https://cdn/x.jpg").await, None);
    assert_eq!(classifier.provider_name(), "disabled");
}

#[tokio::test]
async fn test_openai_without_key_gives_no_signal() {
    let settings = Settings {
        bot_username: "emerald_bot".to_string(),
        redis_url: "redis://127.0.0.1/".to_string(),
        use_memory_store: true,
        openai_api_key: None,
        openai_base_url: "http://127.0.0.1:9/v1".to_string(),
        moderation_model: "omni-moderation-latest".to_string(),
        vision_model: "gpt-4o-mini".to_string(),
        classifier_timeout: Duration::from_secs(1),
    };
    let classifier = OpenAiClassifier::new(&settings);

    assert!(!classifier.is_configured());
    assert_eq!(classifier.classify_text("hello").await, None);
    assert_eq!(classifier.classify_image("https://cdn/x.jpg").await, None);
}
