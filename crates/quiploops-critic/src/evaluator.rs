use quiploops_agent::{CompletionError, RoleAgent, TokenUsage};
use tracing::{debug, info, warn};

use crate::{EvaluatorPrompts, Feedback, FeedbackExtractor};

/// Feedback for one artifact and the tokens the evaluation cost
#[derive(Debug, Clone, PartialEq)]
pub struct Critique {
    pub feedback: Feedback,
    pub usage: Option<TokenUsage>,
}

/// Evaluator role: asks a model to critique an artifact and extracts
/// structured feedback from the answer
pub struct Evaluator {
    agent: RoleAgent,
    extractor: FeedbackExtractor,
}

impl Evaluator {
    pub fn new(agent: RoleAgent) -> Self {
        Self {
            agent,
            extractor: FeedbackExtractor::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: FeedbackExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn agent(&self) -> &RoleAgent {
        &self.agent
    }

    /// Critique an artifact
    pub async fn evaluate(&self, artifact: &str) -> Result<Critique, CompletionError> {
        let prompt = EvaluatorPrompts::build_evaluation_prompt(artifact);
        self.run(EvaluatorPrompts::system(), &prompt).await
    }

    /// Critique the same artifact again with a fresh completion call
    pub async fn reevaluate(&self, artifact: &str) -> Result<Critique, CompletionError> {
        let system = EvaluatorPrompts::reevaluation_system();
        let prompt = EvaluatorPrompts::build_reevaluation_prompt(artifact);
        self.run(&system, &prompt).await
    }

    async fn run(&self, system: &str, prompt: &str) -> Result<Critique, CompletionError> {
        debug!(
            prompt_len = prompt.len(),
            model = %self.agent.model(),
            "Running evaluation"
        );

        let output = self.agent.complete(system, prompt).await?;
        let extraction = self.extractor.extract(&output.text);

        if let Some(diagnostic) = &extraction.diagnostic {
            warn!(
                provider = %self.agent.provider(),
                model = %self.agent.model(),
                reason = %diagnostic.reason,
                raw_prefix = %diagnostic.raw_prefix,
                "Evaluator output could not be parsed, using fallback feedback"
            );
        }

        info!(
            score = extraction.feedback.score(),
            degraded = extraction.feedback.is_degraded(),
            tokens = output.usage.map(|u| u.total()),
            duration_secs = output.duration.as_secs_f64(),
            "Evaluator completed"
        );

        Ok(Critique {
            feedback: extraction.feedback,
            usage: output.usage,
        })
    }
}
