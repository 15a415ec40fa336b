use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Short-lived conversational state for the pre-flight Clarifier loop.
/// Capped at three conversational turns (see `orchestra-thinker`'s
/// Clarifier implementation for the policy that enforces this).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarifierSession {
    pub session_id: String,
    pub history: Vec<Message>,
    #[serde(default)]
    pub refined_intent: Option<String>,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub ready: bool,
}

impl ClarifierSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            refined_intent: None,
            round: 0,
            ready: false,
        }
    }
}
