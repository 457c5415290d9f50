use std::time::Duration;

use quiploops_agent::{AgentConfig, ModelCatalog, ProviderKind, Role, DEFAULT_TIMEOUT};
use tracing::warn;

use crate::SessionError;

/// Accepted sampling temperature range
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Provider, model and tuning for one role
#[derive(Debug, Clone, PartialEq)]
pub struct RoleSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call limit (None = wait for the backend)
    pub timeout: Option<Duration>,
}

impl RoleSettings {
    /// Role defaults on `provider` and `model`
    pub fn for_role(role: Role, provider: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            provider,
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

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        }
    }

    /// `provider/model`
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }

    fn validate(&self, role: Role) -> Result<(), SessionError> {
        if self.model.trim().is_empty() {
            return Err(SessionError::Config(format!("{} model is empty", role)));
        }
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(SessionError::Config(format!(
                "{} temperature {} is outside {:?}",
                role, self.temperature, TEMPERATURE_RANGE
            )));
        }
        if self.max_tokens == 0 {
            return Err(SessionError::Config(format!(
                "{} max_tokens must be positive",
                role
            )));
        }
        if self.timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(SessionError::Config(format!(
                "{} timeout must be positive",
                role
            )));
        }
        if ModelCatalog::is_deprecated(self.provider, &self.model) {
            return Err(SessionError::Config(format!(
                "{} model '{}' is deprecated on {}",
                role, self.model, self.provider
            )));
        }
        if !ModelCatalog::is_known(self.provider, &self.model) {
            warn!(
                role = %role,
                provider = %self.provider,
                model = %self.model,
                "Model is not in the catalog, trying it anyway"
            );
        }
        Ok(())
    }
}

/// Settings for both roles of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub generator: RoleSettings,
    pub evaluator: RoleSettings,
}

impl SessionConfig {
    pub fn new(generator: RoleSettings, evaluator: RoleSettings) -> Self {
        Self {
            generator,
            evaluator,
        }
    }

    /// Both roles on the same provider and model, with role defaults
    pub fn uniform(provider: ProviderKind, model: &str) -> Self {
        Self {
            generator: RoleSettings::for_role(Role::Generator, provider, model),
            evaluator: RoleSettings::for_role(Role::Evaluator, provider, model),
        }
    }

    pub fn role(&self, role: Role) -> &RoleSettings {
        match role {
            Role::Generator => &self.generator,
            Role::Evaluator => &self.evaluator,
        }
    }

    /// Check both roles. Unknown models only warn, deprecated ones are
    /// rejected.
    pub fn validate(&self) -> Result<(), SessionError> {
        self.generator.validate(Role::Generator)?;
        self.evaluator.validate(Role::Evaluator)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let provider = ProviderKind::Groq;
        Self::uniform(provider, ModelCatalog::default_model(provider))
    }
}
