use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use super::{
    has_visual_taxonomy, merge_max, normalize_image_scores, normalize_text_scores, prompt,
    CategoryScores, Classifier, IMAGE_CATEGORIES, TEXT_CATEGORIES,
};
use crate::config::Settings;
use crate::error::ClassifierError;

const MODERATIONS_PATH: &str = "/moderations";
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    #[serde(default)]
    category_scores: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Moderation endpoint first, prompt-based classification where the endpoint
/// fails or lacks the categories we need.
pub struct OpenAiClassifier {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    moderation_model: String,
    vision_model: String,
    timeout: Duration,
}

impl OpenAiClassifier {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(settings.classifier_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: settings.openai_api_key.clone(),
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            moderation_model: settings.moderation_model.clone(),
            vision_model: settings.vision_model.clone(),
            timeout: settings.classifier_timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn with_timeout<T, F>(&self, call: F) -> Result<T, ClassifierError>
    where
        F: Future<Output = Result<T, ClassifierError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ClassifierError::Timeout)?
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, ClassifierError> {
        let key = self.api_key.as_deref().ok_or(ClassifierError::Unavailable)?;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(key)
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }
        Ok(response)
    }

    async fn moderation(&self, model: &str, input: Value) -> Result<HashMap<String, f64>, ClassifierError> {
        let body = json!({ "model": model, "input": input });
        let response: ModerationResponse = self.post(MODERATIONS_PATH, &body).await?.json().await?;
        response
            .results
            .into_iter()
            .next()
            .map(|r| r.category_scores)
            .ok_or_else(|| ClassifierError::Parse("moderation response has no results".to_string()))
    }

    async fn prompt(&self, body: Value, categories: &[&str]) -> Result<CategoryScores, ClassifierError> {
        let response: ChatResponse = self.post(CHAT_COMPLETIONS_PATH, &body).await?.json().await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::Parse("empty completion".to_string()))?;
        prompt::parse_scores(&content, categories)
    }

    async fn text_scores(&self, text: &str, model: &str) -> Result<CategoryScores, ClassifierError> {
        match self.with_timeout(self.moderation(model, json!(text))).await {
            Ok(raw) => Ok(normalize_text_scores(&raw)),
            Err(ClassifierError::Unavailable) => Err(ClassifierError::Unavailable),
            Err(e) => {
                log::warn!("Moderation endpoint failed for text, using prompt path: {}", e);
                let body = prompt::text_request(&self.vision_model, &TEXT_CATEGORIES, text);
                self.with_timeout(self.prompt(body, &TEXT_CATEGORIES)).await
            }
        }
    }

    async fn image_scores(&self, url: &str, model: &str) -> Result<CategoryScores, ClassifierError> {
        let input = json!([{ "type": "image_url", "image_url": { "url": url } }]);
        let moderated = match self.with_timeout(self.moderation(model, input)).await {
            Ok(raw) => Some(raw),
            Err(ClassifierError::Unavailable) => return Err(ClassifierError::Unavailable),
            Err(e) => {
                log::warn!("Moderation endpoint failed for image, using prompt path: {}", e);
                None
            }
        };

        if let Some(raw) = &moderated {
            if has_visual_taxonomy(raw) {
                return Ok(normalize_image_scores(raw));
            }
        }

        let body = prompt::image_request(&self.vision_model, &IMAGE_CATEGORIES, url);
        let prompted = self.with_timeout(self.prompt(body, &IMAGE_CATEGORIES)).await;
        match (moderated, prompted) {
            (Some(raw), Ok(prompted)) => Ok(merge_max(normalize_image_scores(&raw), &prompted)),
            (Some(raw), Err(e)) => {
                log::warn!("Prompt image classification failed: {}", e);
                Ok(normalize_image_scores(&raw))
            }
            (None, prompted) => prompted,
        }
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify_text(&self, text: &str) -> Option<CategoryScores> {
        self.classify_text_with(text, &self.moderation_model).await
    }

    async fn classify_image(&self, url: &str) -> Option<CategoryScores> {
        self.classify_image_with(url, &self.moderation_model).await
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    async fn classify_text_with(&self, text: &str, model: &str) -> Option<CategoryScores> {
        if text.trim().is_empty() {
            return None;
        }
        match self.text_scores(text, model).await {
            Ok(scores) => Some(scores),
            Err(ClassifierError::Unavailable) => None,
            Err(e) => {
                log::warn!("Text classification unavailable: {}", e);
                None
            }
        }
    }

    async fn classify_image_with(&self, url: &str, model: &str) -> Option<CategoryScores> {
        match self.image_scores(url, model).await {
            Ok(scores) => Some(scores),
            Err(ClassifierError::Unavailable) => None,
            Err(e) => {
                log::warn!("Image classification unavailable: {}", e);
                None
            }
        }
    }
}
