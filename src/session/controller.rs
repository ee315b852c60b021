//! Session controller: the learner-facing state machine.
//!
//! The controller owns the session state and coordinates:
//! 1. Roadmap generation on start
//! 2. Topic selection, served from the content cache when possible
//! 3. Background prefetch of the next topic in roadmap order
//! 4. Practice-example generation and the doubt conversation
//! 5. Full reset
//!
//! The state lock is never held across a gateway call. Results of a call are
//! applied only if the session epoch (and, for view updates, the selected
//! topic) is unchanged since the call was issued.
//!
//! Every gateway call and the state update that follows it run in a spawned
//! task. A caller that stops waiting (e.g. a disconnected HTTP client) cannot
//! leave the session stuck in `generating` or a view stuck loading.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::prefetcher::{PrefetchDecision, PrefetchTracker};
use crate::cache::store::{CachedTopic, ContentCache};
use crate::gateway::GenerationGateway;
use crate::material::MaterialError;
use crate::metrics::Metrics;
use crate::roadmap::navigator;
use crate::roadmap::types::{ChatMessage, LearningContent, LearningMaterial, RoadmapTopic, TopicId};
use crate::session::fetch::fetch_topic_bundle;
use crate::session::state::{Phase, SessionSnapshot, SessionState, TopicView};
use crate::session::SessionError;

/// Reply appended to the transcript when a doubt cannot be answered.
pub const DOUBT_FAILURE_REPLY: &str = "Sorry, I encountered an error trying to answer your question.";

#[derive(Clone)]
pub struct SessionController {
    gateway: Arc<dyn GenerationGateway>,
    cache: Arc<dyn ContentCache>,
    tracker: Arc<PrefetchTracker>,
    metrics: Arc<Metrics>,
    prefetch_enabled: bool,
    state: Arc<RwLock<SessionState>>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        cache: Arc<dyn ContentCache>,
        metrics: Arc<Metrics>,
        prefetch_enabled: bool,
    ) -> Self {
        Self {
            gateway,
            cache,
            tracker: Arc::new(PrefetchTracker::new()),
            metrics,
            prefetch_enabled,
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ContentCache> {
        &self.cache
    }

    pub fn tracker(&self) -> &Arc<PrefetchTracker> {
        &self.tracker
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        state.snapshot(self.tracker.snapshot())
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase.clone()
    }

    /// Generate a roadmap for `materials` and enter the learning phase.
    ///
    /// A generation failure is not an `Err`: the session moves to
    /// [`Phase::Error`] carrying the gateway's message.
    pub async fn start(&self, materials: Vec<LearningMaterial>) -> Result<SessionSnapshot, SessionError> {
        if materials.is_empty() {
            return Err(MaterialError::NoMaterials.into());
        }

        let (materials, epoch) = {
            let mut state = self.state.write().await;
            if state.phase != Phase::Input {
                return Err(SessionError::InvalidTransition {
                    action: "start",
                    phase: state.phase.name(),
                });
            }
            state.phase = Phase::Generating;
            state.materials = Arc::new(materials);
            (state.materials.clone(), state.epoch)
        };

        info!(materials = materials.len(), "Generating roadmap");
        let this = self.clone();
        Ok(tokio::spawn(async move { this.finish_start(materials, epoch).await }).await?)
    }

    async fn finish_start(&self, materials: Arc<Vec<LearningMaterial>>, epoch: u64) -> SessionSnapshot {
        let result = self.gateway.generate_roadmap(&materials).await;

        let first = {
            let mut state = self.state.write().await;
            if state.epoch != epoch {
                debug!("Session reset while generating; dropping roadmap");
                return state.snapshot(self.tracker.snapshot());
            }
            match result {
                Ok(roadmap) => {
                    info!(
                        modules = roadmap.modules.len(),
                        topics = roadmap.topic_count(),
                        "Roadmap ready"
                    );
                    state.roadmap = roadmap;
                    state.phase = Phase::Learning;
                    navigator::first_topic(&state.roadmap).cloned()
                }
                Err(e) => {
                    error!(error = %e, "Roadmap generation failed");
                    state.phase = Phase::Error {
                        message: e.to_string(),
                    };
                    None
                }
            }
        };

        if let Some(first) = first {
            self.spawn_prefetch(first, materials, epoch).await;
        }

        self.snapshot().await
    }

    /// Make `id` the active topic.
    ///
    /// Selecting the already active topic is a no-op. Otherwise the doubt
    /// transcript and highlight are reset, the next topic is prefetched, and
    /// the lesson is served from cache or generated. A lesson arriving after
    /// another topic was selected is cached but not displayed.
    pub async fn select_topic(&self, id: TopicId) -> Result<SessionSnapshot, SessionError> {
        let (topic, materials, epoch, hit, next) = {
            let mut state = self.state.write().await;
            if state.phase != Phase::Learning {
                return Err(SessionError::NotLearning);
            }
            let topic = navigator::find(&state.roadmap, id)
                .cloned()
                .ok_or(SessionError::UnknownTopic(id))?;

            if state.view.as_ref().map(|v| v.topic.id) == Some(id) {
                debug!(topic = %id, "Topic already active");
                return Ok(state.snapshot(self.tracker.snapshot()));
            }

            state.selection += 1;
            let mut view = TopicView::new(topic.clone(), state.selection);

            let cached = self.cache.get(id).await;
            let hit = cached.is_some();
            match cached {
                Some(entry) => {
                    self.metrics.cache_hits.inc();
                    view.content = Some(entry.content);
                    view.examples = entry.examples;
                }
                None => {
                    self.metrics.cache_misses.inc();
                    view.loading = true;
                }
            }
            state.view = Some(view);

            let next = navigator::find_next(&state.roadmap, id).cloned();
            (topic, state.materials.clone(), state.epoch, hit, next)
        };

        info!(topic = %topic.id, title = %topic.title, cached = hit, "Topic selected");

        if let Some(next) = next {
            self.spawn_prefetch(next, materials.clone(), epoch).await;
        }

        if hit {
            return Ok(self.snapshot().await);
        }

        let this = self.clone();
        Ok(tokio::spawn(async move { this.load_topic(topic, materials, epoch).await }).await?)
    }

    /// Fetch the lesson for a cache miss and apply it.
    ///
    /// If a prefetch of the topic is already running, its result is awaited
    /// and reused instead of issuing a second request.
    async fn load_topic(&self, topic: RoadmapTopic, materials: Arc<Vec<LearningMaterial>>, epoch: u64) -> SessionSnapshot {
        let prefetched = if self.tracker.wait(topic.id).await {
            self.cache.get(topic.id).await
        } else {
            None
        };

        let (result, fresh) = match prefetched {
            Some(entry) => {
                debug!(topic = %topic.id, "Reusing in-flight prefetch");
                (Ok(entry), false)
            }
            None => (
                fetch_topic_bundle(self.gateway.as_ref(), &topic.title, &materials).await,
                true,
            ),
        };

        let mut state = self.state.write().await;
        if state.epoch != epoch {
            debug!(topic = %topic.id, "Session reset during fetch; dropping result");
            return state.snapshot(self.tracker.snapshot());
        }

        let content = match result {
            Ok(bundle) => {
                if fresh {
                    self.cache.put(topic.id, bundle.clone()).await;
                }
                bundle
            }
            Err(e) => {
                error!(topic = %topic.id, title = %topic.title, error = %e, "Failed to load topic content");
                CachedTopic {
                    content: LearningContent::load_failed(&topic.title),
                    examples: Vec::new(),
                }
            }
        };

        match state.view.as_mut().filter(|v| v.topic.id == topic.id) {
            Some(view) => {
                view.content = Some(content.content);
                view.examples = content.examples;
                view.loading = false;
            }
            None => {
                self.metrics.stale_responses.inc();
                debug!(topic = %topic.id, "Another topic is active; result not displayed");
            }
        }

        state.snapshot(self.tracker.snapshot())
    }

    /// Start a background prefetch of `id` if it is neither cached nor in flight.
    ///
    /// Returns the task handle when a prefetch was started.
    pub async fn prefetch(&self, id: TopicId) -> Result<Option<JoinHandle<()>>, SessionError> {
        let (topic, materials, epoch) = {
            let state = self.state.read().await;
            if state.phase != Phase::Learning {
                return Err(SessionError::NotLearning);
            }
            let topic = navigator::find(&state.roadmap, id)
                .cloned()
                .ok_or(SessionError::UnknownTopic(id))?;
            (topic, state.materials.clone(), state.epoch)
        };
        Ok(self.spawn_prefetch(topic, materials, epoch).await)
    }

    async fn spawn_prefetch(
        &self,
        topic: RoadmapTopic,
        materials: Arc<Vec<LearningMaterial>>,
        epoch: u64,
    ) -> Option<JoinHandle<()>> {
        if !self.prefetch_enabled {
            return None;
        }

        match self.tracker.begin_if_needed(self.cache.as_ref(), topic.id).await {
            PrefetchDecision::Start => {}
            PrefetchDecision::Cached => {
                self.metrics.prefetch_skipped.with_label_values(&["cached"]).inc();
                return None;
            }
            PrefetchDecision::InFlight => {
                self.metrics.prefetch_skipped.with_label_values(&["in_flight"]).inc();
                return None;
            }
        }

        self.metrics.prefetch_started.inc();
        debug!(topic = %topic.id, title = %topic.title, "Prefetching topic");

        let this = self.clone();
        Some(tokio::spawn(async move {
            this.run_prefetch(topic, materials, epoch).await;
        }))
    }

    async fn run_prefetch(&self, topic: RoadmapTopic, materials: Arc<Vec<LearningMaterial>>, epoch: u64) {
        let result = fetch_topic_bundle(self.gateway.as_ref(), &topic.title, &materials).await;

        match result {
            Ok(bundle) => {
                // Holding the read lock orders this write before any reset's clear.
                let state = self.state.read().await;
                if state.epoch == epoch {
                    self.cache.put(topic.id, bundle).await;
                    debug!(topic = %topic.id, "Prefetch complete");
                } else {
                    debug!(topic = %topic.id, "Session reset during prefetch; dropping result");
                }
            }
            Err(e) => {
                self.metrics.prefetch_failed.inc();
                warn!(topic = %topic.id, title = %topic.title, error = %e, "Prefetch failed");
            }
        }

        self.tracker.finish(topic.id);
    }

    /// Generate a few more practice examples for the active topic and append
    /// them to both the view and the cached entry.
    pub async fn generate_more_examples(&self) -> Result<SessionSnapshot, SessionError> {
        let (topic, selection, existing, materials, epoch) = {
            let mut state = self.state.write().await;
            if state.phase != Phase::Learning {
                return Err(SessionError::NotLearning);
            }
            let materials = state.materials.clone();
            let epoch = state.epoch;
            let view = state.view.as_mut().ok_or(SessionError::NoActiveTopic)?;
            if view.loading {
                return Err(SessionError::TopicLoading);
            }
            view.generating_examples = true;
            view.examples_error = None;
            (view.topic.clone(), view.selection, view.examples.clone(), materials, epoch)
        };

        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.append_examples(topic, selection, existing, materials, epoch)
                .await
        })
        .await?)
    }

    async fn append_examples(
        &self,
        topic: RoadmapTopic,
        selection: u64,
        existing: Vec<String>,
        materials: Arc<Vec<LearningMaterial>>,
        epoch: u64,
    ) -> SessionSnapshot {
        let result = self
            .gateway
            .generate_practice_examples(&topic.title, &materials, &existing)
            .await;

        let mut state = self.state.write().await;
        if state.epoch != epoch {
            return state.snapshot(self.tracker.snapshot());
        }

        match result {
            Ok(new_examples) => {
                info!(topic = %topic.id, added = new_examples.len(), "Generated more examples");
                if let Some(mut entry) = self.cache.get(topic.id).await {
                    entry.examples.extend(new_examples.iter().cloned());
                    self.cache.put(topic.id, entry).await;
                }
                if let Some(view) = state.view_for_selection(selection) {
                    view.examples.extend(new_examples);
                    view.generating_examples = false;
                }
            }
            Err(e) => {
                warn!(topic = %topic.id, error = %e, "Failed to generate more examples");
                if let Some(view) = state.view_for_selection(selection) {
                    view.examples_error = Some(e.to_string());
                    view.generating_examples = false;
                }
            }
        }

        state.snapshot(self.tracker.snapshot())
    }

    /// Mark a topic completed. Only that topic's flag changes.
    pub async fn mark_complete(&self, id: TopicId) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.write().await;
        if state.phase != Phase::Learning {
            return Err(SessionError::NotLearning);
        }

        let topic = navigator::find_mut(&mut state.roadmap, id).ok_or(SessionError::UnknownTopic(id))?;
        topic.completed = true;
        info!(topic = %id, title = %topic.title, "Topic completed");

        if let Some(view) = state.view.as_mut().filter(|v| v.topic.id == id) {
            view.topic.completed = true;
        }

        Ok(state.snapshot(self.tracker.snapshot()))
    }

    /// Record (or clear, with `None`/blank) the text the learner highlighted.
    pub async fn set_highlight(&self, text: Option<String>) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.write().await;
        if state.phase != Phase::Learning {
            return Err(SessionError::NotLearning);
        }
        let view = state.view.as_mut().ok_or(SessionError::NoActiveTopic)?;
        view.highlight = text.filter(|t| !t.trim().is_empty());
        Ok(state.snapshot(self.tracker.snapshot()))
    }

    /// Ask a question about the active topic.
    ///
    /// `context` overrides the stored highlight. A blank question with context
    /// asks for an explanation of the context; blank with no context is a no-op.
    pub async fn ask_doubt(&self, question: &str, context: Option<String>) -> Result<SessionSnapshot, SessionError> {
        let question = question.trim().to_string();

        let (topic, selection, history, context, materials, epoch) = {
            let mut state = self.state.write().await;
            if state.phase != Phase::Learning {
                return Err(SessionError::NotLearning);
            }
            let materials = state.materials.clone();
            let epoch = state.epoch;
            let view = state.view.as_mut().ok_or(SessionError::NoActiveTopic)?;

            let context = context
                .filter(|c| !c.trim().is_empty())
                .or_else(|| view.highlight.clone());

            let user_text = if !question.is_empty() {
                question.clone()
            } else if let Some(ctx) = &context {
                format!("Can you explain this?: \"{ctx}\"")
            } else {
                return Ok(state.snapshot(self.tracker.snapshot()));
            };

            view.transcript.push(ChatMessage::user(user_text));
            view.doubt_loading = true;
            (
                view.topic.clone(),
                view.selection,
                view.transcript.clone(),
                context,
                materials,
                epoch,
            )
        };

        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.answer(question, topic, selection, history, context, materials, epoch)
                .await
        })
        .await?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn answer(
        &self,
        question: String,
        topic: RoadmapTopic,
        selection: u64,
        history: Vec<ChatMessage>,
        context: Option<String>,
        materials: Arc<Vec<LearningMaterial>>,
        epoch: u64,
    ) -> SessionSnapshot {
        let result = self
            .gateway
            .answer_doubt(&question, &history, &materials, &topic.title, context.as_deref())
            .await;

        let mut state = self.state.write().await;
        if state.epoch != epoch {
            return state.snapshot(self.tracker.snapshot());
        }

        match state.view_for_selection(selection) {
            Some(view) => {
                let reply = match result {
                    Ok(answer) => answer,
                    Err(e) => {
                        warn!(topic = %topic.id, error = %e, "Failed to answer doubt");
                        DOUBT_FAILURE_REPLY.to_string()
                    }
                };
                view.transcript.push(ChatMessage::model(reply));
                view.doubt_loading = false;
            }
            None => debug!(topic = %topic.id, "Topic changed before answer arrived; dropping it"),
        }

        state.snapshot(self.tracker.snapshot())
    }

    /// Return to the input phase, clearing roadmap, cache, prefetch tracker,
    /// active topic and transcript together.
    pub async fn reset(&self) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.write().await;
        match state.phase {
            Phase::Input => return Ok(state.snapshot(self.tracker.snapshot())),
            Phase::Generating => {
                return Err(SessionError::InvalidTransition {
                    action: "reset",
                    phase: state.phase.name(),
                })
            }
            Phase::Learning | Phase::Error { .. } => {}
        }

        let epoch = state.epoch + 1;
        *state = SessionState {
            epoch,
            ..SessionState::default()
        };
        self.cache.clear().await;
        self.tracker.clear();

        info!(epoch, "Session reset");
        Ok(state.snapshot(self.tracker.snapshot()))
    }
}
