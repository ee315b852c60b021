//! Prometheus metrics for cache effectiveness and backend calls.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    /// Topic selections served from the cache.
    pub cache_hits: IntCounter,
    /// Topic selections that had to call the backend.
    pub cache_misses: IntCounter,

    pub prefetch_started: IntCounter,
    pub prefetch_failed: IntCounter,
    /// Prefetches not started, by reason ("cached", "in_flight").
    pub prefetch_skipped: IntCounterVec,

    /// Foreground results that arrived after the learner moved on.
    pub stale_responses: IntCounter,

    pub gateway_calls: IntCounterVec,
    pub gateway_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("roadmap_tutor".to_string()), None)?;

        let cache_hits = IntCounter::new("cache_hits_total", "Topic selections served from cache")?;
        let cache_misses = IntCounter::new("cache_misses_total", "Topic selections requiring generation")?;
        let prefetch_started = IntCounter::new("prefetch_started_total", "Background prefetches started")?;
        let prefetch_failed = IntCounter::new("prefetch_failed_total", "Background prefetches that failed")?;
        let prefetch_skipped = IntCounterVec::new(
            Opts::new("prefetch_skipped_total", "Prefetches skipped because already cached or in flight"),
            &["reason"],
        )?;
        let stale_responses = IntCounter::new(
            "stale_responses_total",
            "Foreground results discarded because another topic was selected",
        )?;
        let gateway_calls = IntCounterVec::new(
            Opts::new("gateway_calls_total", "Generation backend calls by operation"),
            &["operation"],
        )?;
        let gateway_failures = IntCounterVec::new(
            Opts::new("gateway_failures_total", "Failed generation backend calls by operation"),
            &["operation"],
        )?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(prefetch_started.clone()))?;
        registry.register(Box::new(prefetch_failed.clone()))?;
        registry.register(Box::new(prefetch_skipped.clone()))?;
        registry.register(Box::new(stale_responses.clone()))?;
        registry.register(Box::new(gateway_calls.clone()))?;
        registry.register(Box::new(gateway_failures.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            prefetch_started,
            prefetch_failed,
            prefetch_skipped,
            stale_responses,
            gateway_calls,
            gateway_failures,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
