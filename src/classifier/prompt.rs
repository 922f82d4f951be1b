//! Prompt-based classification: ask a chat model for a JSON object with the
//! schema categories and parse whatever comes back.
//!
//! Fails differently from the moderation endpoint: the HTTP call usually
//! succeeds but the structured output can be malformed.

use serde_json::{json, Value};

use super::CategoryScores;
use crate::error::ClassifierError;

/// System prompt listing the categories the model must score.
pub fn system_prompt(categories: &[&str]) -> String {
    format!(
        "You are a content safety classifier for a group chat. \
         Score the user content for each category from 0.0 (absent) to 1.0 (certain). \
         Reply with a single JSON object and nothing else, using exactly these keys: {}.",
        categories.join(", ")
    )
}

/// Chat Completions request body for text content.
pub fn text_request(model: &str, categories: &[&str], text: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": system_prompt(categories) },
            { "role": "user", "content": text },
        ],
    })
}

/// Chat Completions request body for an image URL.
pub fn image_request(model: &str, categories: &[&str], url: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": system_prompt(categories) },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": "Classify this image." },
                    { "type": "image_url", "image_url": { "url": url } },
                ],
            },
        ],
    })
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Parses model output into the given schema.
///
/// Code fences and prose around the object are tolerated. Missing categories
/// score `0.0`; output with none of the categories, or with a non-numeric
/// score, is a parse error.
pub fn parse_scores(content: &str, categories: &[&str]) -> Result<CategoryScores, ClassifierError> {
    let start = content
        .find('{')
        .ok_or_else(|| ClassifierError::Parse("no JSON object in output".to_string()))?;
    let end = content
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ClassifierError::Parse("unterminated JSON object".to_string()))?;

    let object: serde_json::Map<String, Value> = serde_json::from_str(&content[start..=end])
        .map_err(|e| ClassifierError::Parse(e.to_string()))?;

    let mut scores = CategoryScores::new();
    let mut found = 0;
    for category in categories {
        let value = match object.get(*category) {
            Some(raw) => {
                found += 1;
                score_value(raw).ok_or_else(|| {
                    ClassifierError::Parse(format!("score for '{}' is not a number", category))
                })?
            }
            None => 0.0,
        };
        let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        scores.insert(category.to_string(), value);
    }

    if found == 0 {
        return Err(ClassifierError::Parse(
            "output has none of the expected categories".to_string(),
        ));
    }
    Ok(scores)
}
