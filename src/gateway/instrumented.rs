//! Gateway wrapper that counts calls and failures per operation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::gateway::{GatewayError, GenerationGateway};
use crate::metrics::Metrics;
use crate::roadmap::types::{ChatMessage, LearningContent, LearningMaterial, Roadmap};

pub struct InstrumentedGateway {
    inner: Arc<dyn GenerationGateway>,
    metrics: Arc<Metrics>,
}

impl InstrumentedGateway {
    pub fn new(inner: Arc<dyn GenerationGateway>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }

    fn record<T>(&self, operation: &str, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
        self.metrics.gateway_calls.with_label_values(&[operation]).inc();
        if result.is_err() {
            self.metrics.gateway_failures.with_label_values(&[operation]).inc();
        }
        result
    }
}

#[async_trait]
impl GenerationGateway for InstrumentedGateway {
    async fn generate_roadmap(&self, materials: &[LearningMaterial]) -> Result<Roadmap, GatewayError> {
        let result = self.inner.generate_roadmap(materials).await;
        self.record("generate_roadmap", result)
    }

    async fn generate_learning_content(
        &self,
        topic_title: &str,
        materials: &[LearningMaterial],
    ) -> Result<LearningContent, GatewayError> {
        let result = self.inner.generate_learning_content(topic_title, materials).await;
        self.record("generate_learning_content", result)
    }

    async fn generate_practice_examples(
        &self,
        topic_title: &str,
        materials: &[LearningMaterial],
        existing: &[String],
    ) -> Result<Vec<String>, GatewayError> {
        let result = self
            .inner
            .generate_practice_examples(topic_title, materials, existing)
            .await;
        self.record("generate_practice_examples", result)
    }

    async fn answer_doubt(
        &self,
        question: &str,
        history: &[ChatMessage],
        materials: &[LearningMaterial],
        topic_title: &str,
        highlighted: Option<&str>,
    ) -> Result<String, GatewayError> {
        let result = self
            .inner
            .answer_doubt(question, history, materials, topic_title, highlighted)
            .await;
        self.record("answer_doubt", result)
    }
}
