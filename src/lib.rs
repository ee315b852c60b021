//! roadmap-tutor: AI-assisted learning paths.
//!
//! Turns learner-supplied materials into an LLM-generated roadmap of modules
//! and topics, then generates each topic's lesson on demand:
//!   select topic → content cache → (miss) generation gateway
//!   and in the background: navigator → next topic → prefetch into the cache
//!
//! Exposes the learning session over an HTTP/JSON API.

pub mod cache;
pub mod config;
pub mod gateway;
pub mod material;
pub mod metrics;
pub mod roadmap;
pub mod server;
pub mod session;
