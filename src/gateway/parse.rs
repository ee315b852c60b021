//! Decoding model output.
//!
//! Models asked for "JSON only" still wrap it in markdown fences now and then,
//! and sometimes return an object wrapping the array that was asked for. Both
//! shapes are accepted.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::gateway::GatewayError;
use crate::roadmap::types::{LearningContent, ModuleOutline};

/// Strip a surrounding ```json ... ``` fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, GatewayError> {
    let json = strip_code_fence(text);
    if json.is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    serde_json::from_str(json).map_err(|e| GatewayError::Decode(e.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoadmapShape {
    Bare(Vec<ModuleOutline>),
    Wrapped { modules: Vec<ModuleOutline> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExamplesShape {
    Bare(Vec<String>),
    Wrapped { examples: Vec<String> },
}

pub fn parse_roadmap(text: &str) -> Result<Vec<ModuleOutline>, GatewayError> {
    match decode::<RoadmapShape>(text)? {
        RoadmapShape::Bare(modules) | RoadmapShape::Wrapped { modules } => Ok(modules),
    }
}

pub fn parse_learning_content(text: &str) -> Result<LearningContent, GatewayError> {
    decode(text)
}

pub fn parse_examples(text: &str) -> Result<Vec<String>, GatewayError> {
    match decode::<ExamplesShape>(text)? {
        ExamplesShape::Bare(examples) | ExamplesShape::Wrapped { examples } => Ok(examples),
    }
}
