//! Integration tests for the learning session controller.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{controller, eventually, materials, ScriptedGateway};
use roadmap_tutor::material::MaterialError;
use roadmap_tutor::roadmap::navigator;
use roadmap_tutor::roadmap::types::{ChatRole, TopicId};
use roadmap_tutor::session::controller::DOUBT_FAILURE_REPLY;
use roadmap_tutor::session::{Phase, SessionController, SessionError, SessionSnapshot, TopicView};

const LAYOUT: &[(&str, &[&str])] = &[("M1", &["A", "B"]), ("M2", &["C"])];

fn topic_id(snapshot: &SessionSnapshot, title: &str) -> TopicId {
    navigator::flatten(&snapshot.roadmap)
        .find(|t| t.title == title)
        .unwrap()
        .id
}

async fn started(prefetch: bool) -> (Arc<ScriptedGateway>, SessionController, SessionSnapshot) {
    let gateway = Arc::new(ScriptedGateway::with_roadmap(LAYOUT));
    let controller = controller(gateway.clone(), prefetch);
    let snapshot = controller.start(materials()).await.unwrap();
    (gateway, controller, snapshot)
}

#[tokio::test]
async fn test_start_enters_learning_and_prefetches_first_topic() {
    let (gateway, controller, snapshot) = started(true).await;

    assert_eq!(snapshot.phase, Phase::Learning);
    assert_eq!(snapshot.roadmap.modules.len(), 2);
    assert!(navigator::flatten(&snapshot.roadmap).all(|t| !t.completed));

    let a = topic_id(&snapshot, "A");
    let cache = controller.cache().clone();
    eventually(|| {
        let cache = cache.clone();
        async move { cache.has(a).await }
    })
    .await;

    assert_eq!(gateway.content_calls(), 1);
    assert_eq!(gateway.example_calls(), 1);
}

#[tokio::test]
async fn test_roadmap_failure_enters_error_until_reset() {
    let gateway = Arc::new(ScriptedGateway::failing_roadmap());
    let controller = controller(gateway, true);

    let snapshot = controller.start(materials()).await.unwrap();
    match &snapshot.phase {
        Phase::Error { message } => assert!(message.contains("Failed to generate a learning roadmap")),
        other => panic!("expected error phase, got {other:?}"),
    }

    // No path out of Error except reset.
    assert!(matches!(
        controller.start(materials()).await,
        Err(SessionError::InvalidTransition { action: "start", .. })
    ));

    let snapshot = controller.reset().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Input);
}

#[tokio::test]
async fn test_start_requires_materials_and_input_phase() {
    let (_gateway, controller, _snapshot) = started(false).await;
    assert!(matches!(
        controller.start(materials()).await,
        Err(SessionError::InvalidTransition { phase: "learning", .. })
    ));

    let fresh = common::controller(Arc::new(ScriptedGateway::with_roadmap(LAYOUT)), false);
    assert!(matches!(
        fresh.start(vec![]).await,
        Err(SessionError::Material(MaterialError::NoMaterials))
    ));
    assert_eq!(fresh.phase().await, Phase::Input);
}

#[tokio::test]
async fn test_select_before_start_is_rejected() {
    let controller = controller(Arc::new(ScriptedGateway::with_roadmap(LAYOUT)), false);
    assert!(matches!(
        controller.select_topic(TopicId::new()).await,
        Err(SessionError::NotLearning)
    ));
}

#[tokio::test]
async fn test_cached_selection_does_not_call_gateway() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    let b = topic_id(&snapshot, "B");

    let first = controller.select_topic(a).await.unwrap();
    let view = first.active.unwrap();
    assert!(!view.loading);
    assert_eq!(view.content.unwrap().explanation, "Lesson on A");
    assert_eq!(view.examples.len(), 2);

    controller.select_topic(b).await.unwrap();
    assert_eq!(gateway.content_calls(), 2);

    let again = controller.select_topic(a).await.unwrap();
    assert_eq!(gateway.content_calls(), 2);
    assert_eq!(gateway.example_calls(), 2);
    assert_eq!(
        again.active.unwrap().content.unwrap().explanation,
        "Lesson on A"
    );
    assert_eq!(controller.metrics().cache_hits.get(), 1);
    assert_eq!(controller.metrics().cache_misses.get(), 2);
}

#[tokio::test]
async fn test_prefetched_topic_is_served_from_cache() {
    let (gateway, controller, snapshot) = started(true).await;
    let a = topic_id(&snapshot, "A");

    let cache = controller.cache().clone();
    eventually(|| {
        let cache = cache.clone();
        async move { cache.has(a).await }
    })
    .await;

    let snapshot = controller.select_topic(a).await.unwrap();
    let view = snapshot.active.as_ref().unwrap();
    assert_eq!(view.content.as_ref().unwrap().explanation, "Lesson on A");
    assert_eq!(controller.metrics().cache_hits.get(), 1);

    // Selecting A prefetched B.
    let b = topic_id(&snapshot, "B");
    eventually(|| {
        let cache = cache.clone();
        async move { cache.has(b).await }
    })
    .await;
    assert_eq!(gateway.content_calls(), 2);
}

#[tokio::test]
async fn test_stale_response_never_overwrites_newer_selection() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    let b = topic_id(&snapshot, "B");

    gateway.hold("A");
    let slow = controller.clone();
    let pending_a = tokio::spawn(async move { slow.select_topic(a).await });

    let watcher = controller.clone();
    eventually(|| {
        let watcher = watcher.clone();
        async move {
            watcher
                .snapshot()
                .await
                .active
                .is_some_and(|v| v.topic.id == a && v.loading)
        }
    })
    .await;

    let shown_b = controller.select_topic(b).await.unwrap();
    assert_eq!(shown_b.active.as_ref().unwrap().topic.id, b);

    gateway.release("A");
    let after_a = pending_a.await.unwrap().unwrap();

    let view = after_a.active.unwrap();
    assert_eq!(view.topic.id, b);
    assert_eq!(view.content.unwrap().explanation, "Lesson on B");
    assert_eq!(controller.metrics().stale_responses.get(), 1);

    // The late lesson is still cached for A.
    assert!(controller.cache().has(a).await);
}

#[tokio::test]
async fn test_reselecting_active_topic_is_noop() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");

    controller.select_topic(a).await.unwrap();
    controller.ask_doubt("why?", None).await.unwrap();

    let again = controller.select_topic(a).await.unwrap();
    assert_eq!(again.active.unwrap().transcript.len(), 2);
    assert_eq!(gateway.content_calls(), 1);
}

#[tokio::test]
async fn test_new_selection_resets_transcript_and_highlight() {
    let (_gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    let b = topic_id(&snapshot, "B");

    controller.select_topic(a).await.unwrap();
    controller.set_highlight(Some("ownership".to_string())).await.unwrap();
    controller.ask_doubt("what?", None).await.unwrap();

    let view = controller.select_topic(b).await.unwrap().active.unwrap();
    assert!(view.transcript.is_empty());
    assert!(view.highlight.is_none());
}

#[tokio::test]
async fn test_prefetch_is_idempotent() {
    let (gateway, controller, snapshot) = started(true).await;
    let b = topic_id(&snapshot, "B");

    gateway.hold("B");
    let handle = controller.prefetch(b).await.unwrap();
    assert!(handle.is_some());
    assert!(controller.prefetch(b).await.unwrap().is_none());
    assert!(controller.tracker().contains(b));

    gateway.release("B");
    handle.unwrap().await.unwrap();

    assert!(controller.cache().has(b).await);
    assert!(!controller.tracker().contains(b));
    assert!(controller.prefetch(b).await.unwrap().is_none());

    let metrics = controller.metrics();
    assert_eq!(metrics.prefetch_skipped.with_label_values(&["in_flight"]).get(), 1);
    assert_eq!(metrics.prefetch_skipped.with_label_values(&["cached"]).get(), 1);
}

#[tokio::test]
async fn test_prefetch_failure_is_dropped_and_foreground_failure_shows_placeholder() {
    let (gateway, controller, snapshot) = started(true).await;
    let a = topic_id(&snapshot, "A");
    let b = topic_id(&snapshot, "B");
    gateway.fail_topic("B");

    controller.select_topic(a).await.unwrap();

    let watcher = controller.clone();
    eventually(|| {
        let watcher = watcher.clone();
        async move { watcher.metrics().prefetch_failed.get() == 1 && watcher.tracker().is_empty() }
    })
    .await;
    assert!(!controller.cache().has(b).await);

    let view = controller.select_topic(b).await.unwrap().active.unwrap();
    assert!(!view.loading);
    assert_eq!(
        view.content.unwrap().explanation,
        "Failed to load content for B. Please try again."
    );
    assert!(!controller.cache().has(b).await);
}

#[tokio::test]
async fn test_generate_more_examples_appends() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");

    let initial = controller.select_topic(a).await.unwrap().active.unwrap().examples;
    assert_eq!(initial.len(), 2);

    let once = controller.generate_more_examples().await.unwrap().active.unwrap();
    assert_eq!(once.examples.len(), 4);
    assert_eq!(&once.examples[..2], &initial[..]);
    assert!(!once.generating_examples);
    assert_eq!(*gateway.last_existing.lock().unwrap(), initial);

    let twice = controller.generate_more_examples().await.unwrap().active.unwrap();
    assert_eq!(twice.examples.len(), 6);
    assert_eq!(&twice.examples[..4], &once.examples[..]);

    let cached = controller.cache().get(a).await.unwrap();
    assert_eq!(cached.examples, twice.examples);
}

#[tokio::test]
async fn test_generate_more_examples_failure_keeps_existing() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    controller.select_topic(a).await.unwrap();

    gateway.fail_topic("A");
    let view = controller.generate_more_examples().await.unwrap().active.unwrap();
    assert_eq!(view.examples.len(), 2);
    assert!(view.examples_error.is_some());
    assert!(!view.generating_examples);
}

#[tokio::test]
async fn test_generate_more_examples_requires_active_topic() {
    let (_gateway, controller, _snapshot) = started(false).await;
    assert!(matches!(
        controller.generate_more_examples().await,
        Err(SessionError::NoActiveTopic)
    ));
}

#[tokio::test]
async fn test_mark_complete_touches_only_that_topic() {
    let (_gateway, controller, snapshot) = started(false).await;
    let b = topic_id(&snapshot, "B");

    let snapshot = controller.mark_complete(b).await.unwrap();
    let completed: Vec<_> = navigator::flatten(&snapshot.roadmap)
        .map(|t| (t.title.as_str(), t.completed))
        .collect();
    assert_eq!(completed, vec![("A", false), ("B", true), ("C", false)]);

    assert!(matches!(
        controller.mark_complete(TopicId::new()).await,
        Err(SessionError::UnknownTopic(_))
    ));
}

#[tokio::test]
async fn test_doubt_conversation() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    controller.select_topic(a).await.unwrap();

    // Blank question and no context: nothing happens.
    let view = controller.ask_doubt("   ", None).await.unwrap().active.unwrap();
    assert!(view.transcript.is_empty());
    assert_eq!(gateway.doubt_calls.load(Ordering::SeqCst), 0);

    let view = controller.ask_doubt("What is A?", None).await.unwrap().active.unwrap();
    assert_eq!(view.transcript.len(), 2);
    assert_eq!(view.transcript[0].role, ChatRole::User);
    assert_eq!(view.transcript[1].text, "[A] q=What is A? turns=1 ctx=-");

    // Blank question falls back to the highlight.
    controller.set_highlight(Some("borrowing".to_string())).await.unwrap();
    let view = controller.ask_doubt("", None).await.unwrap().active.unwrap();
    assert_eq!(view.transcript[2].text, "Can you explain this?: \"borrowing\"");
    assert_eq!(view.transcript[3].text, "[A] q= turns=3 ctx=borrowing");
    assert!(!view.doubt_loading);

    gateway.fail_doubts();
    let view = controller.ask_doubt("again?", None).await.unwrap().active.unwrap();
    assert_eq!(view.transcript.last().unwrap().text, DOUBT_FAILURE_REPLY);
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let (gateway, controller, snapshot) = started(true).await;
    let a = topic_id(&snapshot, "A");
    let c = topic_id(&snapshot, "C");

    controller.select_topic(a).await.unwrap();
    controller.ask_doubt("hi", None).await.unwrap();

    gateway.hold("C");
    let pending = controller.prefetch(c).await.unwrap().unwrap();
    assert!(!controller.tracker().is_empty());

    let snapshot = controller.reset().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Input);
    assert!(snapshot.roadmap.is_empty());
    assert!(snapshot.active.is_none());
    assert!(snapshot.materials.is_empty());
    assert!(snapshot.prefetching.is_empty());
    assert_eq!(controller.cache().len().await, 0);
    assert!(controller.tracker().is_empty());

    // A prefetch from the old session never lands in the new one.
    gateway.release("C");
    pending.await.unwrap();
    assert_eq!(controller.cache().len().await, 0);

    // Reset in Input is a no-op.
    assert_eq!(controller.reset().await.unwrap().phase, Phase::Input);
}

/// Poll the active view until `check` holds.
async fn wait_for_view<F>(controller: &SessionController, check: F)
where
    F: Fn(&TopicView) -> bool,
{
    let check = &check;
    eventually(|| async move {
        controller.snapshot().await.active.as_ref().is_some_and(check)
    })
    .await;
}

#[tokio::test]
async fn test_abandoned_start_still_completes() {
    let gateway = Arc::new(ScriptedGateway::with_roadmap(LAYOUT));
    let controller = controller(gateway.clone(), false);
    gateway.hold("roadmap");

    let caller = controller.clone();
    let task = tokio::spawn(async move { caller.start(materials()).await });
    let calls = gateway.clone();
    eventually(|| {
        let calls = calls.clone();
        async move { calls.roadmap_calls.load(Ordering::SeqCst) == 1 }
    })
    .await;

    // The client goes away while the roadmap is being generated.
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(controller.phase().await, Phase::Generating);

    gateway.release("roadmap");
    let watcher = &controller;
    eventually(|| async move { watcher.phase().await == Phase::Learning }).await;

    assert_eq!(controller.reset().await.unwrap().phase, Phase::Input);
    assert!(controller.start(materials()).await.is_ok());
}

#[tokio::test]
async fn test_abandoned_selection_still_loads() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    gateway.hold("A");

    let caller = controller.clone();
    let task = tokio::spawn(async move { caller.select_topic(a).await });
    wait_for_view(&controller, |v| v.topic.id == a && v.loading).await;
    task.abort();
    let _ = task.await;

    gateway.release("A");
    wait_for_view(&controller, |v| !v.loading).await;

    let view = controller.snapshot().await.active.unwrap();
    assert_eq!(view.content.unwrap().explanation, "Lesson on A");
    assert!(controller.cache().has(a).await);
    assert!(controller.generate_more_examples().await.is_ok());
}

#[tokio::test]
async fn test_abandoned_example_request_still_applies() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    controller.select_topic(a).await.unwrap();
    gateway.hold("A");

    let caller = controller.clone();
    let task = tokio::spawn(async move { caller.generate_more_examples().await });
    wait_for_view(&controller, |v| v.generating_examples).await;
    task.abort();
    let _ = task.await;

    gateway.release("A");
    wait_for_view(&controller, |v| !v.generating_examples).await;
    assert_eq!(controller.snapshot().await.active.unwrap().examples.len(), 4);
}

#[tokio::test]
async fn test_abandoned_doubt_still_answers() {
    let (gateway, controller, snapshot) = started(false).await;
    let a = topic_id(&snapshot, "A");
    controller.select_topic(a).await.unwrap();
    gateway.hold("doubt");

    let caller = controller.clone();
    let task = tokio::spawn(async move { caller.ask_doubt("why?", None).await });
    wait_for_view(&controller, |v| v.doubt_loading).await;
    task.abort();
    let _ = task.await;

    gateway.release("doubt");
    wait_for_view(&controller, |v| !v.doubt_loading).await;

    let transcript = controller.snapshot().await.active.unwrap().transcript;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].text, "[A] q=why? turns=1 ctx=-");
}

#[tokio::test]
async fn test_selection_reuses_in_flight_prefetch() {
    let gateway = Arc::new(ScriptedGateway::with_roadmap(LAYOUT));
    let controller = controller(gateway.clone(), true);
    gateway.hold("A");

    let snapshot = controller.start(materials()).await.unwrap();
    let a = topic_id(&snapshot, "A");
    let b = topic_id(&snapshot, "B");
    assert!(controller.tracker().contains(a));

    let caller = controller.clone();
    let pending = tokio::spawn(async move { caller.select_topic(a).await });
    wait_for_view(&controller, |v| v.topic.id == a && v.loading).await;

    gateway.release("A");
    let view = pending.await.unwrap().unwrap().active.unwrap();
    assert_eq!(view.content.unwrap().explanation, "Lesson on A");

    let cache = controller.cache().clone();
    eventually(|| {
        let cache = cache.clone();
        async move { cache.has(b).await }
    })
    .await;
    // One request pair for A (the prefetch) and one for B.
    assert_eq!(gateway.content_calls(), 2);
    assert_eq!(gateway.example_calls(), 2);
}
