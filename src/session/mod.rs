//! Learning session orchestration.
//!
//! - [`controller`]: The session state machine driving gateway, cache and prefetch
//! - [`state`]: Phases, active-topic view, snapshots
//! - [`fetch`]: Joined lesson + examples generation

pub mod controller;
pub mod fetch;
pub mod state;

use thiserror::Error;

use crate::material::MaterialError;
use crate::roadmap::types::TopicId;

pub use controller::SessionController;
pub use state::{Phase, SessionSnapshot, TopicView};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot {action} while the session is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("No roadmap is loaded; start a session first")]
    NotLearning,

    #[error("Unknown topic: {0}")]
    UnknownTopic(TopicId),

    #[error("No topic is selected")]
    NoActiveTopic,

    #[error("Content for the selected topic is still loading")]
    TopicLoading,

    #[error(transparent)]
    Material(#[from] MaterialError),

    /// The task applying a gateway result panicked.
    #[error("Session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
