//! Roadmap data model and sequential navigation.
//!
//! - [`types`]: LearningMaterial, Roadmap, RoadmapModule, RoadmapTopic, TopicId, content types
//! - [`navigator`]: Next-topic lookup over the module/topic tree

pub mod navigator;
pub mod types;

pub use types::{
    ChatMessage, ChatRole, GlossaryTerm, LearningContent, LearningMaterial, MaterialKind, Roadmap,
    RoadmapModule, RoadmapTopic, TopicId,
};
