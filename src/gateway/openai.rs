//! OpenAI-compatible chat-completions client.
//!
//! Implements the generation gateway against any backend exposing
//! `POST {base_url}/chat/completions` (OpenAI, vLLM, llama.cpp server, ...).
//! Each operation sends one user message: the assembled prompt followed by any
//! uploaded files as additional content parts.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::GatewayConfig;
use crate::gateway::{parse, prompts, GatewayError, GenerationGateway};
use crate::roadmap::types::{ChatMessage, LearningContent, LearningMaterial, MaterialKind, Roadmap};

// ─── Wire types ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<RequestMessage>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ─── Client ────────────────────────────────────────────────────────────────

pub struct OpenAiGateway {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f64,
    api_key: String,
}

impl OpenAiGateway {
    /// Build a gateway, reading the API key from the configured environment variable.
    pub fn from_env(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GatewayError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GatewayConfig, api_key: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: api_key.into(),
        })
    }

    /// Send one prompt (plus file attachments) and return the raw reply text.
    async fn complete(&self, prompt: String, materials: &[LearningMaterial]) -> Result<String, GatewayError> {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        content.extend(materials.iter().filter_map(attachment_part));

        let request = ChatCompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![RequestMessage {
                role: "user",
                content,
            }],
        };

        debug!(endpoint = %self.endpoint, model = %self.model, "Sending chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatCompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GatewayError::EmptyResponse)
    }
}

/// Content part carrying an uploaded file, if the material is a file.
///
/// Text-like files are inlined as text; images use `image_url` data URLs;
/// anything else is sent as a base64 `file` part.
fn attachment_part(material: &LearningMaterial) -> Option<Value> {
    if material.kind != MaterialKind::File {
        return None;
    }
    let data = material.file_data.as_ref()?;
    let mime = material
        .mime_type
        .as_deref()
        .unwrap_or("application/octet-stream");

    if mime.starts_with("text/") || mime == "application/json" {
        let text = String::from_utf8_lossy(data);
        return Some(json!({
            "type": "text",
            "text": format!("Contents of \"{}\":\n---\n{}\n---", material.content, text),
        }));
    }

    let data_url = format!("data:{mime};base64,{}", BASE64.encode(data));
    if mime.starts_with("image/") {
        Some(json!({ "type": "image_url", "image_url": { "url": data_url } }))
    } else {
        Some(json!({
            "type": "file",
            "file": { "filename": material.content, "file_data": data_url },
        }))
    }
}

#[async_trait]
impl GenerationGateway for OpenAiGateway {
    async fn generate_roadmap(&self, materials: &[LearningMaterial]) -> Result<Roadmap, GatewayError> {
        let result = async {
            let text = self.complete(prompts::roadmap_prompt(materials), materials).await?;
            parse::parse_roadmap(&text)
        }
        .await;

        match result {
            Ok(outline) => Ok(Roadmap::from_outline(outline)),
            Err(e) => {
                error!(error = %e, "LLM request failed (generate_roadmap)");
                Err(GatewayError::operation(
                    "Failed to generate a learning roadmap from the AI. Please check the provided materials and try again.",
                    e,
                ))
            }
        }
    }

    async fn generate_learning_content(
        &self,
        topic_title: &str,
        materials: &[LearningMaterial],
    ) -> Result<LearningContent, GatewayError> {
        let result = async {
            let text = self
                .complete(prompts::content_prompt(topic_title, materials), materials)
                .await?;
            parse::parse_learning_content(&text)
        }
        .await;

        result.map_err(|e| {
            error!(topic = topic_title, error = %e, "LLM request failed (generate_learning_content)");
            GatewayError::operation(format!("Failed to generate content for \"{topic_title}\"."), e)
        })
    }

    async fn generate_practice_examples(
        &self,
        topic_title: &str,
        materials: &[LearningMaterial],
        existing: &[String],
    ) -> Result<Vec<String>, GatewayError> {
        let result = async {
            let text = self
                .complete(prompts::examples_prompt(topic_title, materials, existing), materials)
                .await?;
            parse::parse_examples(&text)
        }
        .await;

        result.map_err(|e| {
            error!(topic = topic_title, error = %e, "LLM request failed (generate_practice_examples)");
            GatewayError::operation(
                format!("Failed to generate practice examples for \"{topic_title}\"."),
                e,
            )
        })
    }

    async fn answer_doubt(
        &self,
        question: &str,
        history: &[ChatMessage],
        materials: &[LearningMaterial],
        topic_title: &str,
        highlighted: Option<&str>,
    ) -> Result<String, GatewayError> {
        let prompt = prompts::doubt_prompt(question, history, materials, topic_title, highlighted);
        self.complete(prompt, materials).await.map_err(|e| {
            error!(topic = topic_title, error = %e, "LLM request failed (answer_doubt)");
            GatewayError::operation("Failed to get an answer from the AI assistant.", e)
        })
    }
}
