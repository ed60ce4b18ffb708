use crate::core::error::{Result, StoryError};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Shape the caller expects back from the completion service.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// One system/user exchange. `format` is a hint to providers that support
    /// constrained JSON output; callers still validate the result.
    async fn chat(&self, system: &str, user: &str, format: ResponseFormat) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "openai", "ollama" or "gemini"
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub openai: Option<OpenAIConfig>,
    pub ollama: Option<OllamaConfig>,
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    /// Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub model: String,
    pub base_url: Option<String>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_openai_model(),
            base_url: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    /// Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
        }
    }
}

fn default_temperature() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_openai_model() -> String {
    "gpt-4.1".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn resolve_key(configured: Option<&str>, env_var: &str) -> Result<String> {
    configured
        .map(str::to_string)
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| StoryError::MissingCredential(env_var.to_string()))
}

pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    let sampling = Sampling {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    match config.provider.as_str() {
        "openai" => {
            let cfg = config
                .openai
                .as_ref()
                .ok_or_else(|| StoryError::Config("OpenAI config missing".to_string()))?;
            let api_key = resolve_key(cfg.api_key.as_deref(), "OPENAI_API_KEY")?;
            Ok(Box::new(OpenAIClient::new(
                &api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
                sampling,
            )))
        }
        "ollama" => {
            let cfg = config
                .ollama
                .as_ref()
                .ok_or_else(|| StoryError::Config("Ollama config missing".to_string()))?;
            Ok(Box::new(OllamaClient::new(&cfg.base_url, &cfg.model, sampling)))
        }
        "gemini" => {
            let cfg = config
                .gemini
                .as_ref()
                .ok_or_else(|| StoryError::Config("Gemini config missing".to_string()))?;
            let api_key = resolve_key(cfg.api_key.as_deref(), "GEMINI_API_KEY")?;
            Ok(Box::new(GeminiClient::new(&api_key, &cfg.model, sampling)))
        }
        other => Err(StoryError::Config(format!("Unknown LLM provider: {}", other))),
    }
}

#[derive(Debug, Clone, Copy)]
struct Sampling {
    temperature: f32,
    max_tokens: u32,
}

async fn upstream_error(provider: &str, resp: reqwest::Response) -> StoryError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    debug!("{} error body: {}", provider, body);
    StoryError::Service(format!(
        "{} API error: {} {}",
        provider,
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    ))
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>, sampling: Sampling) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            sampling,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

fn chat_messages(system: &str, user: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: system.to_string(),
        },
        ChatMessage {
            role: "user",
            content: user.to_string(),
        },
    ]
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(&self, system: &str, user: &str, format: ResponseFormat) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: chat_messages(system, user),
            temperature: self.sampling.temperature,
            max_tokens: self.sampling.max_tokens,
            response_format: match format {
                ResponseFormat::Json => Some(OpenAIResponseFormat { kind: "json_object" }),
                ResponseFormat::Text => None,
            },
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(upstream_error("OpenAI", resp).await);
        }

        let result: OpenAIResponse = resp.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| StoryError::Service("OpenAI response empty or missing content".to_string()))
    }
}

// --- Ollama ---

#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str, sampling: Sampling) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            sampling,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, system: &str, user: &str, format: ResponseFormat) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: chat_messages(system, user),
            stream: false,
            format: (format == ResponseFormat::Json).then_some("json"),
            options: OllamaOptions {
                temperature: self.sampling.temperature,
                num_predict: self.sampling.max_tokens,
            },
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            return Err(upstream_error("Ollama", resp).await);
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.content)
    }
}

// --- Gemini ---

#[derive(Debug)]
struct GeminiClient {
    api_key: String,
    model: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl GeminiClient {
    fn new(api_key: &str, model: &str, sampling: Sampling) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            sampling,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    system_instruction: GeminiSystemInstruction,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

fn gemini_text(result: GeminiResponse) -> Result<String> {
    if let Some(err) = result.error {
        return Err(StoryError::Service(format!("Gemini API returned error: {}", err.message)));
    }

    let first = result
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| StoryError::Service("Gemini response contained no candidates".to_string()))?;

    if let Some(part) = first.content.and_then(|c| c.parts.into_iter().next()) {
        return Ok(part.text);
    }

    let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
    Err(StoryError::Service(format!(
        "Gemini response empty. Finish reason: {}",
        reason
    )))
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, system: &str, user: &str, format: ResponseFormat) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: user.to_string(),
                }],
            }],
            system_instruction: GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: system.to_string(),
                }],
            },
            generation_config: GeminiGenerationConfig {
                temperature: self.sampling.temperature,
                max_output_tokens: self.sampling.max_tokens,
                response_mime_type: (format == ResponseFormat::Json).then_some("application/json"),
            },
        };

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(upstream_error("Gemini", resp).await);
        }

        let result: GeminiResponse = resp.json().await?;
        gemini_text(result)
    }
}
