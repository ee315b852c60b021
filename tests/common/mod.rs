//! Shared test fixtures: a scripted in-memory generation gateway.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use roadmap_tutor::cache::store::MemoryContentCache;
use roadmap_tutor::gateway::{GatewayError, GenerationGateway};
use roadmap_tutor::metrics::Metrics;
use roadmap_tutor::roadmap::types::{
    ChatMessage, LearningContent, LearningMaterial, ModuleOutline, Roadmap, TopicOutline,
};
use roadmap_tutor::session::SessionController;

/// Gateway whose answers are derived from the topic title.
///
/// Calls for a title can be held open with [`hold`](Self::hold) until
/// [`release`](Self::release), and made to fail with [`fail_topic`](Self::fail_topic).
#[derive(Default)]
pub struct ScriptedGateway {
    outline: Mutex<Option<Vec<ModuleOutline>>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    failing: Mutex<HashSet<String>>,
    fail_doubts: AtomicBool,
    example_seq: AtomicUsize,
    pub last_existing: Mutex<Vec<String>>,
    pub roadmap_calls: AtomicUsize,
    pub content_calls: AtomicUsize,
    pub example_calls: AtomicUsize,
    pub doubt_calls: AtomicUsize,
}

impl ScriptedGateway {
    /// A gateway returning a roadmap with the given `(module, [topics])` layout.
    pub fn with_roadmap(layout: &[(&str, &[&str])]) -> Self {
        let outline = layout
            .iter()
            .map(|(module, topics)| ModuleOutline {
                title: module.to_string(),
                topics: topics
                    .iter()
                    .map(|t| TopicOutline {
                        title: t.to_string(),
                        description: format!("About {t}"),
                    })
                    .collect(),
            })
            .collect();
        Self {
            outline: Mutex::new(Some(outline)),
            ..Default::default()
        }
    }

    /// A gateway whose roadmap generation always fails.
    pub fn failing_roadmap() -> Self {
        Self::default()
    }

    pub fn hold(&self, key: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(key) {
            gate.close();
        }
    }

    pub fn fail_topic(&self, title: &str) {
        self.failing.lock().unwrap().insert(title.to_string());
    }

    pub fn fail_doubts(&self) {
        self.fail_doubts.store(true, Ordering::SeqCst);
    }

    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    pub fn example_calls(&self) -> usize {
        self.example_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self, key: &str) {
        let gate = self.gates.lock().unwrap().get(key).cloned();
        if let Some(gate) = gate {
            // A closed gate means released.
            let _ = gate.acquire().await;
        }
    }

    fn check(&self, title: &str) -> Result<(), GatewayError> {
        if self.failing.lock().unwrap().contains(title) {
            return Err(GatewayError::operation(
                format!("Failed to generate content for \"{title}\"."),
                GatewayError::EmptyResponse,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate_roadmap(&self, _materials: &[LearningMaterial]) -> Result<Roadmap, GatewayError> {
        self.roadmap_calls.fetch_add(1, Ordering::SeqCst);
        self.wait("roadmap").await;
        let outline = self.outline.lock().unwrap().clone();
        outline.map(Roadmap::from_outline).ok_or_else(|| {
            GatewayError::operation(
                "Failed to generate a learning roadmap from the AI. Please check the provided materials and try again.",
                GatewayError::EmptyResponse,
            )
        })
    }

    async fn generate_learning_content(
        &self,
        topic_title: &str,
        _materials: &[LearningMaterial],
    ) -> Result<LearningContent, GatewayError> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.wait(topic_title).await;
        self.check(topic_title)?;
        Ok(LearningContent {
            explanation: format!("Lesson on {topic_title}"),
            examples: vec![format!("{topic_title} inline example")],
            glossary: vec![],
        })
    }

    async fn generate_practice_examples(
        &self,
        topic_title: &str,
        _materials: &[LearningMaterial],
        existing: &[String],
    ) -> Result<Vec<String>, GatewayError> {
        self.example_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_existing.lock().unwrap() = existing.to_vec();
        self.wait(topic_title).await;
        self.check(topic_title)?;
        let n = self.example_seq.fetch_add(2, Ordering::SeqCst);
        Ok(vec![
            format!("{topic_title} example {n}"),
            format!("{topic_title} example {}", n + 1),
        ])
    }

    async fn answer_doubt(
        &self,
        question: &str,
        history: &[ChatMessage],
        _materials: &[LearningMaterial],
        topic_title: &str,
        highlighted: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.doubt_calls.fetch_add(1, Ordering::SeqCst);
        self.wait("doubt").await;
        if self.fail_doubts.load(Ordering::SeqCst) {
            return Err(GatewayError::operation(
                "Failed to get an answer from the AI assistant.",
                GatewayError::EmptyResponse,
            ));
        }
        Ok(format!(
            "[{topic_title}] q={question} turns={} ctx={}",
            history.len(),
            highlighted.unwrap_or("-")
        ))
    }
}

/// Build a controller over `gateway` with an in-memory cache.
pub fn controller(gateway: Arc<ScriptedGateway>, prefetch: bool) -> SessionController {
    SessionController::new(
        gateway,
        Arc::new(MemoryContentCache::new()),
        Arc::new(Metrics::new().unwrap()),
        prefetch,
    )
}

pub fn materials() -> Vec<LearningMaterial> {
    vec![LearningMaterial::topic("Rust")]
}

/// Poll `check` until it returns true, panicking after two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}
