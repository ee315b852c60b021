//! Sequential navigation over the roadmap tree.
//!
//! Traversal order is module-then-topic: every topic of module 0 in order,
//! then module 1, and so on. Empty modules contribute nothing.

use crate::roadmap::types::{Roadmap, RoadmapTopic, TopicId};

/// Iterate every topic in traversal order.
pub fn flatten(roadmap: &Roadmap) -> impl Iterator<Item = &RoadmapTopic> {
    roadmap.modules.iter().flat_map(|m| m.topics.iter())
}

/// The first topic of the roadmap, if any.
pub fn first_topic(roadmap: &Roadmap) -> Option<&RoadmapTopic> {
    flatten(roadmap).next()
}

/// Look up a topic by id.
pub fn find(roadmap: &Roadmap, id: TopicId) -> Option<&RoadmapTopic> {
    flatten(roadmap).find(|t| t.id == id)
}

/// Look up a topic by id for mutation (completion flag).
pub fn find_mut(roadmap: &mut Roadmap, id: TopicId) -> Option<&mut RoadmapTopic> {
    roadmap
        .modules
        .iter_mut()
        .flat_map(|m| m.topics.iter_mut())
        .find(|t| t.id == id)
}

/// Locate a topic as `(module_index, topic_index)`.
pub fn position(roadmap: &Roadmap, id: TopicId) -> Option<(usize, usize)> {
    roadmap.modules.iter().enumerate().find_map(|(mi, module)| {
        module
            .topics
            .iter()
            .position(|t| t.id == id)
            .map(|ti| (mi, ti))
    })
}

/// Find the topic that follows `current` in traversal order.
///
/// Returns `None` when `current` is the last topic overall or is not part of
/// the roadmap.
pub fn find_next(roadmap: &Roadmap, current: TopicId) -> Option<&RoadmapTopic> {
    let (module_idx, topic_idx) = position(roadmap, current)?;

    let module = &roadmap.modules[module_idx];
    if topic_idx + 1 < module.topics.len() {
        return module.topics.get(topic_idx + 1);
    }

    roadmap.modules[module_idx + 1..]
        .iter()
        .find_map(|m| m.topics.first())
}
