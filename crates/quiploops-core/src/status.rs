use serde::{Deserialize, Serialize};

/// Lifecycle of a refinement session. Moves forward only:
/// `Idle -> AwaitingAction -> Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Nothing generated yet
    Idle,
    /// At least one cycle exists, waiting for the user's choice
    AwaitingAction,
    /// Finished, no further actions accepted
    Complete,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::AwaitingAction => write!(f, "awaiting action"),
            SessionStatus::Complete => write!(f, "complete"),
        }
    }
}

/// Operations a session accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Start,
    AcceptAndRevise,
    RejectAndReevaluate,
    Finish,
    Configure,
}

impl SessionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionAction::Start => "start",
            SessionAction::AcceptAndRevise => "accept_and_revise",
            SessionAction::RejectAndReevaluate => "reject_and_reevaluate",
            SessionAction::Finish => "finish",
            SessionAction::Configure => "configure",
        }
    }
}

impl std::fmt::Display for SessionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
