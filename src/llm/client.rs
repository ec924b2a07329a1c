use crate::coercion::parse_raw_extraction;
use crate::error::{NoiAnalyzerError, Result};
use crate::llm::prompts::{build_extraction_prompt, SYSTEM_PROMPT};
use crate::pipeline::{DocumentExtractor, SourceDocument};
use crate::schema::RawExtraction;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn default_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    800
}

fn default_max_document_chars() -> usize {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Documents are cut to this many characters before being sent.
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
}

impl ExtractorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_document_chars: default_max_document_chars(),
        }
    }

    /// Reads `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` and
    /// `NOI_EXTRACTION_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                NoiAnalyzerError::ExtractionFailed("OPENAI_API_KEY is not set".to_string())
            })?;

        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("NOI_EXTRACTION_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Extracts statement figures through an OpenAI-compatible chat
/// completions endpoint.
#[derive(Clone)]
pub struct OpenAiExtractor {
    client: Client,
    config: ExtractorConfig,
}

impl OpenAiExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ExtractorConfig::from_env()?))
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    async fn complete(&self, user_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let payload = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(NoiAnalyzerError::ExtractionFailed(format!(
                "Chat completion error (status {}): {}",
                status, err_text
            )));
        }

        let body: ChatCompletionResponse = res.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                NoiAnalyzerError::ExtractionFailed("No content in completion".to_string())
            })
    }
}

#[async_trait]
impl DocumentExtractor for OpenAiExtractor {
    async fn extract(&self, document: &SourceDocument) -> Result<RawExtraction> {
        let text = truncate_document(&document.text, self.config.max_document_chars);
        info!(
            "Extracting '{}' with {} ({} chars)",
            document.name,
            self.config.model,
            text.chars().count()
        );

        let reply = self.complete(&build_extraction_prompt(text)).await?;
        debug!("Model reply for '{}': {}", document.name, reply);

        parse_raw_extraction(&reply)
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_document(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
