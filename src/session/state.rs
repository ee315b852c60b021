//! Session phases, the active-topic view and serializable snapshots.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::roadmap::types::{ChatMessage, LearningContent, LearningMaterial, Roadmap, RoadmapTopic, TopicId};

/// Where the session is in its lifecycle.
///
/// ```text
/// Input ──start──▶ Generating ──ok──▶ Learning ──reset──▶ Input
///                      │
///                      └──fail──▶ Error ──reset──▶ Input
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Input,
    Generating,
    Learning,
    Error { message: String },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Input => "input",
            Phase::Generating => "generating",
            Phase::Learning => "learning",
            Phase::Error { .. } => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything shown for the currently selected topic.
#[derive(Debug, Clone, Serialize)]
pub struct TopicView {
    pub topic: RoadmapTopic,
    pub content: Option<LearningContent>,
    pub examples: Vec<String>,
    pub loading: bool,
    pub generating_examples: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples_error: Option<String>,
    pub transcript: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    pub doubt_loading: bool,
    /// Selection counter value when this view was created.
    #[serde(skip)]
    pub(crate) selection: u64,
}

impl TopicView {
    pub(crate) fn new(topic: RoadmapTopic, selection: u64) -> Self {
        Self {
            topic,
            content: None,
            examples: Vec::new(),
            loading: false,
            generating_examples: false,
            examples_error: None,
            transcript: Vec::new(),
            highlight: None,
            doubt_loading: false,
            selection,
        }
    }
}

/// Mutable session state, guarded by the controller's lock.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub phase: Phase,
    /// Bumped on every reset; async results from an older epoch are dropped.
    pub epoch: u64,
    /// Bumped on every topic selection.
    pub selection: u64,
    pub materials: Arc<Vec<LearningMaterial>>,
    pub roadmap: Roadmap,
    pub view: Option<TopicView>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Input,
            epoch: 0,
            selection: 0,
            materials: Arc::new(Vec::new()),
            roadmap: Roadmap::default(),
            view: None,
        }
    }
}

impl SessionState {
    pub fn snapshot(&self, prefetching: Vec<TopicId>) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase.clone(),
            materials: self.materials.as_ref().clone(),
            roadmap: self.roadmap.clone(),
            active: self.view.clone(),
            prefetching,
        }
    }

    /// The view, if it still belongs to the given selection.
    pub fn view_for_selection(&mut self, selection: u64) -> Option<&mut TopicView> {
        self.view.as_mut().filter(|v| v.selection == selection)
    }
}

/// Read-only copy of the session handed to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub materials: Vec<LearningMaterial>,
    pub roadmap: Roadmap,
    pub active: Option<TopicView>,
    pub prefetching: Vec<TopicId>,
}
