//! Learner input: decoding and validating submitted materials.
//!
//! Files arrive base64-encoded (optionally as a full `data:` URL). Validation
//! failures stay confined to the submission and never touch session state.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use thiserror::Error;

use crate::config::MaterialsConfig;
use crate::roadmap::types::LearningMaterial;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MaterialError {
    #[error("Add at least one topic, text or file to start learning.")]
    NoMaterials,

    #[error("Too many materials: {count} (limit {limit}).")]
    TooMany { count: usize, limit: usize },

    #[error("Material #{index} is empty.")]
    EmptyContent { index: usize },

    #[error("Could not read file content of \"{name}\".")]
    UnreadableFile { name: String },

    #[error("File \"{name}\" is {size} bytes; the limit is {limit} bytes.")]
    FileTooLarge { name: String, size: usize, limit: usize },
}

/// A material as submitted over the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MaterialInput {
    Topic {
        content: String,
    },
    Text {
        content: String,
    },
    File {
        name: String,
        /// Base64 payload, or a `data:<mime>;base64,<payload>` URL.
        data: String,
        #[serde(default)]
        mime_type: Option<String>,
    },
}

/// Split a `data:` URL into its mime type and base64 payload.
fn split_data_url(data: &str) -> (Option<&str>, &str) {
    match data.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((header, payload)) => {
            let mime = header.split(';').next().filter(|m| !m.is_empty());
            (mime, payload)
        }
        None => (None, data),
    }
}

impl MaterialInput {
    fn into_material(self, index: usize, limits: &MaterialsConfig) -> Result<LearningMaterial, MaterialError> {
        match self {
            MaterialInput::Topic { content } => non_empty(content, index).map(LearningMaterial::topic),
            MaterialInput::Text { content } => non_empty(content, index).map(LearningMaterial::text),
            MaterialInput::File {
                name,
                data,
                mime_type,
            } => {
                let name = non_empty(name, index)?;
                let (url_mime, payload) = split_data_url(data.trim());

                let bytes = BASE64
                    .decode(payload.trim())
                    .ok()
                    .filter(|b| !b.is_empty())
                    .ok_or_else(|| MaterialError::UnreadableFile { name: name.clone() })?;

                if bytes.len() > limits.max_file_bytes {
                    return Err(MaterialError::FileTooLarge {
                        name,
                        size: bytes.len(),
                        limit: limits.max_file_bytes,
                    });
                }

                let mime = mime_type
                    .filter(|m| !m.trim().is_empty())
                    .or_else(|| url_mime.map(str::to_string))
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                Ok(LearningMaterial::file(name, bytes, mime))
            }
        }
    }
}

fn non_empty(value: String, index: usize) -> Result<String, MaterialError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(MaterialError::EmptyContent { index })
    } else {
        Ok(trimmed.to_string())
    }
}

/// Validate a submission and convert it to learning materials, in order.
pub fn validate_materials(
    inputs: Vec<MaterialInput>,
    limits: &MaterialsConfig,
) -> Result<Vec<LearningMaterial>, MaterialError> {
    if inputs.is_empty() {
        return Err(MaterialError::NoMaterials);
    }
    if inputs.len() > limits.max_materials {
        return Err(MaterialError::TooMany {
            count: inputs.len(),
            limit: limits.max_materials,
        });
    }

    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| input.into_material(index, limits))
        .collect()
}
