//! Generation gateway: the boundary to the language model.
//!
//! - [`prompts`]: Prompt assembly from learning materials
//! - [`parse`]: Tolerant decoding of model output into roadmap/content types
//! - [`openai`]: HTTP client for OpenAI-compatible chat-completion backends
//! - [`instrumented`]: Wrapper recording per-operation call/failure metrics
//!
//! Every operation is a single attempt that either returns a complete result
//! or fails with a human-readable [`GatewayError`].

pub mod instrumented;
pub mod openai;
pub mod parse;
pub mod prompts;

use async_trait::async_trait;
use thiserror::Error;

use crate::roadmap::types::{ChatMessage, LearningContent, LearningMaterial, Roadmap};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM backend returned an empty response")]
    EmptyResponse,

    #[error("Could not decode LLM response: {0}")]
    Decode(String),

    /// A failed operation, carrying the message shown to the learner.
    #[error("{message}")]
    Operation {
        message: String,
        #[source]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    /// Wrap a low-level failure with a learner-facing message.
    pub fn operation(message: impl Into<String>, source: GatewayError) -> Self {
        GatewayError::Operation {
            message: message.into(),
            source: Box::new(source),
        }
    }
}

/// The four generation operations the session controller depends on.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Produce a roadmap. Every topic comes back with a fresh id and
    /// `completed == false`.
    async fn generate_roadmap(&self, materials: &[LearningMaterial]) -> Result<Roadmap, GatewayError>;

    /// Produce the lesson for one topic. A missing glossary is returned empty.
    async fn generate_learning_content(
        &self,
        topic_title: &str,
        materials: &[LearningMaterial],
    ) -> Result<LearningContent, GatewayError>;

    /// Produce a few (2-3) new examples, avoiding the ones in `existing`.
    async fn generate_practice_examples(
        &self,
        topic_title: &str,
        materials: &[LearningMaterial],
        existing: &[String],
    ) -> Result<Vec<String>, GatewayError>;

    /// Answer a free-form question given the conversation so far.
    async fn answer_doubt(
        &self,
        question: &str,
        history: &[ChatMessage],
        materials: &[LearningMaterial],
        topic_title: &str,
        highlighted: Option<&str>,
    ) -> Result<String, GatewayError>;
}
