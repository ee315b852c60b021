//! Paired lesson + examples generation.
//!
//! A topic's lesson and its initial practice examples are requested together
//! and joined. The pair is all-or-nothing: if either call fails, the whole
//! fetch fails with the first error and nothing is cached.

use futures::future::join;

use crate::cache::store::CachedTopic;
use crate::gateway::{GatewayError, GenerationGateway};
use crate::roadmap::types::LearningMaterial;

/// Combine two independent outcomes; both must succeed.
///
/// When both fail, the first error is reported.
pub fn join_all_or_nothing<A, B, E>(a: Result<A, E>, b: Result<B, E>) -> Result<(A, B), E> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

/// Generate the lesson and initial examples for a topic concurrently.
///
/// Both requests always run to completion before the result is decided.
pub async fn fetch_topic_bundle(
    gateway: &dyn GenerationGateway,
    topic_title: &str,
    materials: &[LearningMaterial],
) -> Result<CachedTopic, GatewayError> {
    let (content, examples) = join(
        gateway.generate_learning_content(topic_title, materials),
        gateway.generate_practice_examples(topic_title, materials, &[]),
    )
    .await;

    let (content, examples) = join_all_or_nothing(content, examples)?;
    Ok(CachedTopic { content, examples })
}
