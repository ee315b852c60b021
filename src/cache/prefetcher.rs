//! Prefetching: speculatively generates the lesson for the topic a learner
//! is most likely to open next, so selecting it is served from the cache.
//!
//! The tracker holds the set of topics with a prefetch in flight, which keeps
//! a topic from being fetched twice concurrently. A foreground load that
//! finds its topic in flight waits for that prefetch instead of issuing a
//! second request.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;

use crate::cache::store::ContentCache;
use crate::roadmap::types::TopicId;

/// Why a prefetch was or was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchDecision {
    /// Caller owns the fetch and must call [`PrefetchTracker::finish`].
    Start,
    /// Content is already cached.
    Cached,
    /// Another prefetch for this topic is running.
    InFlight,
}

/// Topics currently being prefetched.
///
/// Each claim holds a `watch` sender that is dropped when the claim is
/// released, waking every [`wait`](PrefetchTracker::wait)er.
#[derive(Debug, Default)]
pub struct PrefetchTracker {
    in_flight: Mutex<HashMap<TopicId, watch::Sender<()>>>,
}

impl PrefetchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for prefetching. Returns `false` if it is already claimed.
    pub fn try_begin(&self, id: TopicId) -> bool {
        let mut in_flight = self.lock();
        if in_flight.contains_key(&id) {
            return false;
        }
        let (done, _) = watch::channel(());
        in_flight.insert(id, done);
        true
    }

    /// Release a claim taken with [`try_begin`](Self::try_begin).
    pub fn finish(&self, id: TopicId) {
        self.lock().remove(&id);
    }

    pub fn contains(&self, id: TopicId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Topics currently in flight, sorted for stable output.
    pub fn snapshot(&self) -> Vec<TopicId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Wait until the prefetch of `id` is released.
    ///
    /// Returns `false` immediately if no prefetch of `id` is in flight.
    pub async fn wait(&self, id: TopicId) -> bool {
        let Some(mut done) = self.lock().get(&id).map(watch::Sender::subscribe) else {
            return false;
        };
        // Nothing is ever sent; this resolves when the sender is dropped.
        let _ = done.changed().await;
        true
    }

    /// Decide whether `id` should be prefetched, claiming it when it should.
    ///
    /// Prefetching a cached or in-flight topic is a no-op.
    pub async fn begin_if_needed(&self, cache: &dyn ContentCache, id: TopicId) -> PrefetchDecision {
        if cache.has(id).await {
            return PrefetchDecision::Cached;
        }
        if !self.try_begin(id) {
            return PrefetchDecision::InFlight;
        }
        PrefetchDecision::Start
    }

    // The map is only touched in short non-async sections; a poisoned lock
    // still holds a consistent map.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TopicId, watch::Sender<()>>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
