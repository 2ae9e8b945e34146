//! OpenAI chat-completions client behind the [`Inference`] capability.

use std::time::Duration;

use async_trait::async_trait;
use libroteca_core::constants::MAX_KEYWORDS_PER_BOOK;
use libroteca_core::{AppError, BibliographicFields, Config, Inference};
use serde::{Deserialize, Serialize};

use crate::parse::parse_keyword_list;

// Backstop only; the pipeline applies the configured per-call timeout.
const HTTP_TIMEOUT_SECS: u64 = 120;

pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    language: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build inference HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            language: config.description_language.clone(),
        })
    }

    /// One user-message chat completion, returning the reply text.
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Inference(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Inference(format!(
                "chat completion failed: {status} - {error_text}"
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Inference(format!("failed to decode response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(AppError::InferenceParse(
                "model returned an empty completion".to_string(),
            ));
        }
        Ok(content)
    }
}

#[async_trait]
impl Inference for OpenAiClient {
    async fn infer_bibliographic_fields(
        &self,
        excerpt: &str,
    ) -> Result<BibliographicFields, AppError> {
        let content = self.complete(&fields_prompt(excerpt, &self.language)).await?;
        parse_fields_response(&content)
    }

    async fn describe(&self, title: &str, author: &str) -> Result<String, AppError> {
        let content = self
            .complete(&describe_prompt(title, author, &self.language))
            .await?;
        Ok(content.trim().to_string())
    }

    async fn subject(&self, title: &str, author: &str) -> Result<String, AppError> {
        let content = self.complete(&subject_prompt(title, author)).await?;
        Ok(content.trim().to_string())
    }

    async fn keywords(
        &self,
        title: &str,
        author: &str,
        vocabulary: &[String],
    ) -> Result<Vec<String>, AppError> {
        let content = self
            .complete(&keywords_prompt(title, author, vocabulary))
            .await?;
        parse_keyword_list(&content)
    }
}

fn fields_prompt(excerpt: &str, language: &str) -> String {
    format!(
        "The following text is the beginning of a book. Identify the work and reply \
         with a single JSON object with exactly these string fields: \"title\", \
         \"author\", \"description\", \"subject\". The description must be about \
         fifty words long and written in {language}. The subject is a classification \
         of one or two words. Use an empty string for anything you cannot determine. \
         Reply with the JSON object only.\n\n{excerpt}"
    )
}

fn describe_prompt(title: &str, author: &str, language: &str) -> String {
    format!(
        "Write a description of about fifty words, in {language}, for the book \
         \"{title}\" by {author}. Reply with the description only."
    )
}

fn subject_prompt(title: &str, author: &str) -> String {
    format!(
        "Classify the book \"{title}\" by {author} with a subject of one or two \
         words. Reply with the subject only."
    )
}

fn keywords_prompt(title: &str, author: &str, vocabulary: &[String]) -> String {
    let mut prompt = format!(
        "Suggest up to {MAX_KEYWORDS_PER_BOOK} keywords for the book \"{title}\" by {author}."
    );
    if !vocabulary.is_empty() {
        prompt.push_str(&format!(
            " Prefer reusing keywords from this list when they fit: {}.",
            vocabulary.join(", ")
        ));
    }
    prompt.push_str(" Reply with a comma separated list only.");
    prompt
}

/// Decode the model's JSON reply, stripping the markdown code fences models
/// like to wrap JSON in. An undecodable reply is a parse failure, distinct
/// from transport errors, so it is never retried as if it were transient.
fn parse_fields_response(content: &str) -> Result<BibliographicFields, AppError> {
    let json_text = strip_code_fences(content);
    serde_json::from_str(json_text).map_err(|e| {
        AppError::InferenceParse(format!(
            "bibliographic fields reply was not the expected JSON: {e}"
        ))
    })
}

fn strip_code_fences(text: &str) -> &str {
    if text.contains("```json") {
        text.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
            .trim()
    } else if text.contains("```") {
        text.split("```")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(text)
            .trim()
    } else {
        text.trim()
    }
}
