//! Content cache: generated lessons and example lists keyed by topic.
//!
//! No eviction and no invalidation; entries live until the session is reset.
//! Last write wins.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::roadmap::types::{LearningContent, TopicId};

/// Everything cached for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTopic {
    pub content: LearningContent,
    pub examples: Vec<String>,
}

/// Storage capability used by the session controller.
#[async_trait]
pub trait ContentCache: Send + Sync {
    async fn get(&self, id: TopicId) -> Option<CachedTopic>;

    async fn put(&self, id: TopicId, entry: CachedTopic);

    async fn has(&self, id: TopicId) -> bool;

    /// Drop every entry.
    async fn clear(&self);

    /// Number of cached topics.
    async fn len(&self) -> usize;
}

/// Process-local cache backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryContentCache {
    entries: RwLock<HashMap<TopicId, CachedTopic>>,
}

impl MemoryContentCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentCache for MemoryContentCache {
    async fn get(&self, id: TopicId) -> Option<CachedTopic> {
        self.entries.read().await.get(&id).cloned()
    }

    async fn put(&self, id: TopicId, entry: CachedTopic) {
        let mut entries = self.entries.write().await;
        let replaced = entries.insert(id, entry).is_some();
        debug!(topic = %id, replaced, "Cached topic content");
    }

    async fn has(&self, id: TopicId) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
