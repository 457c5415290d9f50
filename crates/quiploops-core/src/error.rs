use quiploops_agent::CompletionError;
use thiserror::Error;

use crate::{SessionAction, SessionStatus};

#[derive(Error, Debug)]
pub enum SessionError {
    /// The action is not allowed in the current status
    #[error("Cannot {action} while the session is {status}")]
    InvalidTransition {
        action: SessionAction,
        status: SessionStatus,
    },

    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, SessionError::InvalidTransition { .. })
    }
}
