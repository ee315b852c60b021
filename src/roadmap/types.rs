//! Learning materials, roadmap tree and generated content types.
//!
//! A roadmap is a two-level ordered tree: modules contain topics. Every topic
//! receives a [`TopicId`] when the roadmap is built, and that id (not the
//! title) is the key for caching, navigation and completion.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Stable identifier assigned to a topic at roadmap creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(Uuid);

impl TopicId {
    /// Allocate a fresh random topic ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TopicId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for TopicId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// What kind of learning material the user supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    /// A subject name, e.g. "Quantum Physics".
    Topic,
    /// Pasted free text.
    Text,
    /// An uploaded file; `content` holds the file name.
    File,
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialKind::Topic => write!(f, "topic"),
            MaterialKind::Text => write!(f, "text"),
            MaterialKind::File => write!(f, "file"),
        }
    }
}

/// A single piece of user input the roadmap is generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearningMaterial {
    pub id: Uuid,
    pub kind: MaterialKind,
    /// Topic name, pasted text, or file name.
    pub content: String,
    /// Raw file bytes (files only). Never echoed back to clients.
    #[serde(skip_serializing)]
    pub file_data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl LearningMaterial {
    pub fn topic(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MaterialKind::Topic,
            content: content.into(),
            file_data: None,
            mime_type: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MaterialKind::Text,
            content: content.into(),
            file_data: None,
            mime_type: None,
        }
    }

    pub fn file(name: impl Into<String>, data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MaterialKind::File,
            content: name.into(),
            file_data: Some(data),
            mime_type: Some(mime_type.into()),
        }
    }
}

/// A leaf of the roadmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapTopic {
    pub id: TopicId,
    pub title: String,
    pub description: String,
    pub completed: bool,
}

impl RoadmapTopic {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: TopicId::new(),
            title: title.into(),
            description: description.into(),
            completed: false,
        }
    }
}

/// An ordered group of topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadmapModule {
    pub title: String,
    pub topics: Vec<RoadmapTopic>,
}

/// Model output sometimes carries `null` where a field is optional.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Topic shape as returned by the generation backend, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicOutline {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// Module shape as returned by the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOutline {
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topics: Vec<TopicOutline>,
}

/// The generated curriculum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roadmap {
    pub modules: Vec<RoadmapModule>,
}

impl Roadmap {
    pub fn new(modules: Vec<RoadmapModule>) -> Self {
        Self { modules }
    }

    /// Build a roadmap from backend output, assigning a fresh id to every
    /// topic and marking all of them incomplete. Order is preserved.
    pub fn from_outline(outline: Vec<ModuleOutline>) -> Self {
        let modules = outline
            .into_iter()
            .map(|module| RoadmapModule {
                title: module.title,
                topics: module
                    .topics
                    .into_iter()
                    .map(|t| RoadmapTopic::new(t.title, t.description))
                    .collect(),
            })
            .collect();
        Self { modules }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Total number of topics across all modules.
    pub fn topic_count(&self) -> usize {
        self.modules.iter().map(|m| m.topics.len()).sum()
    }
}

/// One glossary entry attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub term: String,
    pub definition: String,
}

/// Generated lesson for a single topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningContent {
    pub explanation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub examples: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub glossary: Vec<GlossaryTerm>,
}

impl LearningContent {
    /// Placeholder shown in place of a lesson that failed to load.
    pub fn load_failed(topic_title: &str) -> Self {
        Self {
            explanation: format!("Failed to load content for {topic_title}. Please try again."),
            examples: Vec::new(),
            glossary: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One turn of the doubt conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}
