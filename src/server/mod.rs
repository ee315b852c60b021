//! HTTP server exposing the learning session.
//!
//! - [`api`]: Request/response types and route handlers

pub mod api;
