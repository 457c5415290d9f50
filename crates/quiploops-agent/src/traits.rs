use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{CompletionOutput, ProviderKind};

/// Default per-call limit applied by [`crate::RoleAgent`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur while asking a backend for a completion
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: ProviderKind,
        message: String,
    },

    #[error("{provider} rejected the credentials: {message}")]
    Auth {
        provider: ProviderKind,
        message: String,
    },

    #[error("{provider} rate limit exceeded: {message}")]
    RateLimited {
        provider: ProviderKind,
        message: String,
    },

    #[error("{provider} model '{model}' is unavailable: {message}")]
    ModelUnavailable {
        provider: ProviderKind,
        model: String,
        message: String,
    },

    #[error("{env_var} is not set, it is required by the {provider} provider")]
    MissingCredentials {
        provider: ProviderKind,
        env_var: &'static str,
    },

    #[error("{provider} returned an unusable response: {message}")]
    InvalidResponse {
        provider: ProviderKind,
        message: String,
    },

    #[error("Completion timed out after {0:?}")]
    Timeout(Duration),
}

impl CompletionError {
    /// The message reported by the backend (or a synthesized one)
    pub fn provider_message(&self) -> String {
        match self {
            Self::Transport { message, .. }
            | Self::Auth { message, .. }
            | Self::RateLimited { message, .. }
            | Self::ModelUnavailable { message, .. }
            | Self::InvalidResponse { message, .. } => message.clone(),
            Self::MissingCredentials { env_var, .. } => format!("{} is not set", env_var),
            Self::Timeout(limit) => format!("no response within {:?}", limit),
        }
    }

    /// The provider that produced the error, if known
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            Self::Transport { provider, .. }
            | Self::Auth { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::ModelUnavailable { provider, .. }
            | Self::MissingCredentials { provider, .. }
            | Self::InvalidResponse { provider, .. } => Some(*provider),
            Self::Timeout(_) => None,
        }
    }
}

/// Which side of the refinement loop an agent plays.
///
/// The role only changes tuning defaults, never the shape of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Produces and revises the artifact
    Generator,
    /// Scores and annotates the artifact
    Evaluator,
}

impl Role {
    pub fn default_temperature(self) -> f32 {
        match self {
            Role::Generator => 0.9,
            Role::Evaluator => 0.3,
        }
    }

    pub fn default_max_tokens(self) -> u32 {
        match self {
            Role::Generator => 500,
            Role::Evaluator => 1000,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Generator => write!(f, "generator"),
            Role::Evaluator => write!(f, "evaluator"),
        }
    }
}

/// Tuning for a single role agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Model identifier understood by the backend
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call limit (None = wait for the backend)
    pub timeout: Option<Duration>,
}

impl AgentConfig {
    /// Defaults tuned for `role`
    pub fn for_role(role: Role, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: role.default_temperature(),
            max_tokens: role.default_max_tokens(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }
}

/// A single outbound completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub role: Role,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Instructions framing the role
    pub system: String,
    /// The user turn
    pub prompt: String,
    /// Per-call limit, also enforced by the caller
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

/// The core abstraction over text-completion services
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Human-readable name of the backend (e.g., "Groq")
    fn name(&self) -> &str;

    /// The provider this backend talks to
    fn provider(&self) -> ProviderKind;

    /// Whether the backend has what it needs (credentials) to accept calls
    async fn is_available(&self) -> bool;

    /// Ask the backend for a completion
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionOutput, CompletionError>;
}
