//! Generated-content caching.
//!
//! - [`store`]: ContentCache trait and the in-memory implementation
//! - [`prefetcher`]: In-flight prefetch tracking

pub mod prefetcher;
pub mod store;
