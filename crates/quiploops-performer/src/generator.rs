use quiploops_agent::{CompletionError, RoleAgent, TokenUsage};
use quiploops_critic::Feedback;
use tracing::{debug, info};

use crate::GeneratorPrompts;

/// An artifact as written by the generator
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Completion text, unmodified
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Generator role: writes an artifact for a topic and revises it from
/// feedback. The completion text is the artifact, unmodified.
pub struct Generator {
    agent: RoleAgent,
}

impl Generator {
    pub fn new(agent: RoleAgent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &RoleAgent {
        &self.agent
    }

    pub async fn generate(&self, topic: &str) -> Result<Draft, CompletionError> {
        let prompt = GeneratorPrompts::build_generation_prompt(topic);
        debug!(topic = %topic, model = %self.agent.model(), "Generating artifact");
        self.run(&prompt).await
    }

    pub async fn revise(
        &self,
        artifact: &str,
        feedback: &Feedback,
    ) -> Result<Draft, CompletionError> {
        let prompt = GeneratorPrompts::build_revision_prompt(artifact, feedback);
        debug!(
            prior_score = feedback.score(),
            model = %self.agent.model(),
            "Revising artifact"
        );
        self.run(&prompt).await
    }

    async fn run(&self, prompt: &str) -> Result<Draft, CompletionError> {
        let output = self.agent.complete(GeneratorPrompts::system(), prompt).await?;

        // Blank text is never a usable artifact
        if output.text.trim().is_empty() {
            return Err(CompletionError::InvalidResponse {
                provider: self.agent.provider(),
                message: "generator returned empty text".to_string(),
            });
        }

        info!(
            lines = output.line_count(),
            tokens = output.usage.map(|u| u.total()),
            duration_secs = output.duration.as_secs_f64(),
            "Generator completed"
        );
        Ok(Draft {
            text: output.text,
            usage: output.usage,
        })
    }
}
