use std::sync::Arc;
use tracing::debug;

use crate::{
    AgentConfig, CompletionBackend, CompletionError, CompletionOutput, CompletionRequest,
    ProviderKind, Role,
};

/// A completion backend bound to a role and its tuning.
///
/// Agents are stateless: every call carries all of its context, nothing
/// from a previous call is remembered.
#[derive(Clone)]
pub struct RoleAgent {
    role: Role,
    backend: Arc<dyn CompletionBackend>,
    config: AgentConfig,
}

impl RoleAgent {
    pub fn new(role: Role, backend: Arc<dyn CompletionBackend>, config: AgentConfig) -> Self {
        Self {
            role,
            backend,
            config,
        }
    }

    /// Same role on a different backend, model and temperature.
    /// Token limit and timeout carry over.
    pub fn configure(
        &self,
        backend: Arc<dyn CompletionBackend>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            role: self.role,
            backend,
            config: AgentConfig {
                model: model.into(),
                temperature,
                ..self.config.clone()
            },
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn provider(&self) -> ProviderKind {
        self.backend.provider()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one completion, honouring the configured timeout
    pub async fn complete(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<CompletionOutput, CompletionError> {
        let request = CompletionRequest {
            role: self.role,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            system: system.to_string(),
            prompt: prompt.to_string(),
            timeout: self.config.timeout,
        };

        debug!(
            role = %self.role,
            provider = %self.backend.provider(),
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Requesting completion"
        );

        let call = self.backend.complete(&request);
        let output = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| CompletionError::Timeout(limit))??,
            None => call.await?,
        };

        debug!(
            role = %self.role,
            duration_ms = output.duration.as_millis() as u64,
            lines = output.line_count(),
            "Completion finished"
        );

        Ok(output)
    }
}

impl std::fmt::Debug for RoleAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleAgent")
            .field("role", &self.role)
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedBackend;
    use std::time::Duration;

    #[tokio::test]
    async fn test_complete_forwards_tuning() {
        let backend = Arc::new(ScriptedBackend::new(ProviderKind::Groq).respond("a joke"));
        let agent = RoleAgent::new(
            Role::Generator,
            backend.clone(),
            AgentConfig::for_role(Role::Generator, "llama-3.3-70b-versatile"),
        );

        let output = agent.complete("be funny", "cats").await.unwrap();
        assert_eq!(output.text, "a joke");

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].role, Role::Generator);
        assert_eq!(requests[0].model, "llama-3.3-70b-versatile");
        assert_eq!(requests[0].system, "be funny");
        assert_eq!(requests[0].prompt, "cats");
        assert!((requests[0].temperature - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_configure_switches_backend_and_model() {
        let first = Arc::new(ScriptedBackend::new(ProviderKind::Groq));
        let second = Arc::new(ScriptedBackend::new(ProviderKind::OpenAi).respond("ok"));
        let agent = RoleAgent::new(
            Role::Evaluator,
            first,
            AgentConfig::for_role(Role::Evaluator, "llama").with_max_tokens(42),
        );

        let agent = agent.configure(second.clone(), "gpt-4o", 0.1);
        assert_eq!(agent.provider(), ProviderKind::OpenAi);
        assert_eq!(agent.model(), "gpt-4o");
        assert_eq!(agent.config().max_tokens, 42);

        agent.complete("", "judge").await.unwrap();
        assert_eq!(second.requests()[0].model, "gpt-4o");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_completion_error() {
        let backend = Arc::new(
            ScriptedBackend::new(ProviderKind::Groq)
                .respond("late")
                .with_delay(Duration::from_millis(200)),
        );
        let agent = RoleAgent::new(
            Role::Evaluator,
            backend,
            AgentConfig::for_role(Role::Evaluator, "m").with_timeout(Duration::from_millis(10)),
        );

        let err = agent.complete("", "x").await.unwrap_err();
        assert_eq!(err, CompletionError::Timeout(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_backend_error_propagates_unchanged() {
        let failure = CompletionError::Auth {
            provider: ProviderKind::Groq,
            message: "bad key".into(),
        };
        let backend = Arc::new(ScriptedBackend::new(ProviderKind::Groq).fail(failure.clone()));
        let agent = RoleAgent::new(
            Role::Generator,
            backend,
            AgentConfig::for_role(Role::Generator, "m"),
        );

        assert_eq!(agent.complete("", "x").await.unwrap_err(), failure);
    }
}
