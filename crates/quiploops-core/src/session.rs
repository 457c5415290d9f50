use std::sync::Arc;
use std::time::Instant;

use quiploops_agent::{BackendResolver, Role, RoleAgent};
use quiploops_critic::{Evaluator, Feedback, FeedbackExtractor};
use quiploops_logging::{LogEvent, Logger, SessionWriter};
use quiploops_performer::Generator;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    Cycle, CycleKind, History, ModelsUsed, SessionAction, SessionConfig, SessionError,
    SessionStatus,
};

/// Drives one refinement session: generate, evaluate, then let the user
/// revise, re-evaluate or finish.
///
/// Every action either appends exactly one cycle or leaves the session
/// untouched. Actions take `&mut self`, so at most one is ever in flight.
pub struct RefinementSession {
    id: Uuid,
    status: SessionStatus,
    topic: Option<String>,
    config: SessionConfig,
    history: History,
    resolver: Arc<dyn BackendResolver>,
    logger: Arc<Logger>,
    transcript: Option<SessionWriter>,
    extractor: FeedbackExtractor,
    created: Instant,
}

impl RefinementSession {
    pub fn new(resolver: Arc<dyn BackendResolver>, logger: Arc<Logger>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Idle,
            topic: None,
            config: SessionConfig::default(),
            history: History::new(),
            resolver,
            logger,
            transcript: None,
            extractor: FeedbackExtractor::default(),
            created: Instant::now(),
        }
    }

    /// Record the session as JSONL through `writer`
    pub fn with_transcript(mut self, writer: SessionWriter) -> Self {
        self.transcript = Some(writer);
        self
    }

    /// Use a custom fallback policy for unparseable evaluations
    pub fn with_extractor(mut self, extractor: FeedbackExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn agent_config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn last_cycle(&self) -> Option<&Cycle> {
        self.history.last()
    }

    pub fn transcript(&self) -> Option<&SessionWriter> {
        self.transcript.as_ref()
    }

    /// Replace the configuration used by later actions. Existing cycles
    /// keep the models they were produced with.
    pub fn set_agent_config(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        if self.status == SessionStatus::Complete {
            return Err(self.invalid(SessionAction::Configure));
        }
        config.validate()?;

        info!(
            session_id = %self.id,
            generator = %config.generator.label(),
            evaluator = %config.evaluator.label(),
            "Session configuration changed"
        );
        self.config = config;
        Ok(())
    }

    /// Generate the first artifact for `topic` and evaluate it
    pub async fn start(
        &mut self,
        topic: &str,
        config: SessionConfig,
    ) -> Result<&Cycle, SessionError> {
        let action = SessionAction::Start;
        self.require(action, SessionStatus::Idle)?;

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::Config("topic is empty".to_string()));
        }
        config.validate()?;

        self.logger.log(&LogEvent::SessionStarted {
            session_id: self.id.to_string(),
            topic: topic.to_string(),
            generator: config.generator.label(),
            evaluator: config.evaluator.label(),
        });

        let started = Instant::now();
        let result = self.generate_and_evaluate(action, &config, topic, None).await;
        match result {
            Ok((artifact, feedback)) => {
                self.topic = Some(topic.to_string());
                self.config = config;
                if let Some(writer) = &self.transcript {
                    writer.write_start(
                        &self.id.to_string(),
                        topic,
                        ModelsUsed::from_config(&self.config).to_transcript(),
                    );
                }
                Ok(self.commit(action, artifact, feedback, CycleKind::Initial, started))
            }
            Err(e) => Err(self.failed(action, &config, e, started)),
        }
    }

    /// Ask the generator to rewrite the latest artifact using its feedback,
    /// then evaluate the rewrite
    pub async fn accept_and_revise(&mut self) -> Result<&Cycle, SessionError> {
        let action = SessionAction::AcceptAndRevise;
        let (artifact, feedback) = self.latest(action)?;

        let config = self.config.clone();
        let started = Instant::now();
        let result = self
            .generate_and_evaluate(action, &config, &artifact, Some(&feedback))
            .await;
        match result {
            Ok((revised, feedback)) => {
                Ok(self.commit(action, revised, feedback, CycleKind::Revised, started))
            }
            Err(e) => Err(self.failed(action, &config, e, started)),
        }
    }

    /// Evaluate the latest artifact again with a fresh completion
    pub async fn reject_and_reevaluate(&mut self) -> Result<&Cycle, SessionError> {
        let action = SessionAction::RejectAndReevaluate;
        let (artifact, _) = self.latest(action)?;

        let config = self.config.clone();
        let started = Instant::now();
        let result = self.evaluate(&config, &artifact, true).await;
        match result {
            Ok(feedback) => {
                Ok(self.commit(action, artifact, feedback, CycleKind::Reevaluated, started))
            }
            Err(e) => Err(self.failed(action, &config, e, started)),
        }
    }

    /// Close the session. No completion calls are made.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        self.require(SessionAction::Finish, SessionStatus::AwaitingAction)?;
        self.status = SessionStatus::Complete;

        let duration = self.created.elapsed();
        let final_score = self.history.last().map(|c| c.feedback.score());

        if let Some(writer) = &self.transcript {
            writer.write_end(self.history.len(), final_score, duration.as_secs_f64());
        }
        self.logger.log(&LogEvent::SessionFinished {
            session_id: self.id.to_string(),
            cycles: self.history.len(),
            first_score: self.history.first().map(|c| c.feedback.score()),
            final_score,
            duration_secs: duration.as_secs_f64(),
        });
        info!(session_id = %self.id, cycles = self.history.len(), "Session finished");
        Ok(())
    }

    fn require(&self, action: SessionAction, expected: SessionStatus) -> Result<(), SessionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: SessionAction) -> SessionError {
        debug!(action = %action, status = %self.status, "Rejected action");
        SessionError::InvalidTransition {
            action,
            status: self.status,
        }
    }

    /// Artifact and feedback of the newest cycle
    fn latest(&self, action: SessionAction) -> Result<(String, Feedback), SessionError> {
        self.require(action, SessionStatus::AwaitingAction)?;
        self.history
            .last()
            .map(|c| (c.artifact.clone(), c.feedback.clone()))
            .ok_or_else(|| self.invalid(action))
    }

    fn role_agent(&self, role: Role, config: &SessionConfig) -> Result<RoleAgent, SessionError> {
        let settings = config.role(role);
        let backend = self.resolver.resolve(settings.provider)?;
        Ok(RoleAgent::new(role, backend, settings.agent_config()))
    }

    /// With `feedback`, `input` is revised; without, it is the topic.
    async fn generate_and_evaluate(
        &self,
        action: SessionAction,
        config: &SessionConfig,
        input: &str,
        feedback: Option<&Feedback>,
    ) -> Result<(String, Feedback), SessionError> {
        let cycle_index = self.history.len() + 1;
        let generator = Generator::new(self.role_agent(Role::Generator, config)?);

        self.logger.log(&LogEvent::GeneratorStarted {
            session_id: self.id.to_string(),
            action: action.to_string(),
            cycle_index,
        });

        let started = Instant::now();
        let draft = match feedback {
            Some(feedback) => generator.revise(input, feedback).await?,
            None => generator.generate(input).await?,
        };

        self.logger.log(&LogEvent::GeneratorCompleted {
            session_id: self.id.to_string(),
            cycle_index,
            chars: draft.text.chars().count(),
            tokens: draft.usage.map(|u| u.total()),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        let feedback = self.evaluate(config, &draft.text, false).await?;
        Ok((draft.text, feedback))
    }

    async fn evaluate(
        &self,
        config: &SessionConfig,
        artifact: &str,
        fresh: bool,
    ) -> Result<Feedback, SessionError> {
        let cycle_index = self.history.len() + 1;
        let evaluator = Evaluator::new(self.role_agent(Role::Evaluator, config)?)
            .with_extractor(self.extractor.clone());

        self.logger.log(&LogEvent::EvaluatorStarted {
            session_id: self.id.to_string(),
            cycle_index,
            reevaluation: fresh,
        });

        let started = Instant::now();
        let critique = if fresh {
            evaluator.reevaluate(artifact).await?
        } else {
            evaluator.evaluate(artifact).await?
        };

        self.logger.log(&LogEvent::EvaluatorCompleted {
            session_id: self.id.to_string(),
            cycle_index,
            score: critique.feedback.score(),
            degraded: critique.feedback.is_degraded(),
            tokens: critique.usage.map(|u| u.total()),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        Ok(critique.feedback)
    }

    /// Append the cycle produced by a successful action
    fn commit(
        &mut self,
        action: SessionAction,
        artifact: String,
        feedback: Feedback,
        kind: CycleKind,
        started: Instant,
    ) -> &Cycle {
        self.status = SessionStatus::AwaitingAction;
        let models_used = ModelsUsed::from_config(&self.config);
        let duration = started.elapsed();

        let cycle = self
            .history
            .append(artifact, feedback, kind, models_used, duration);

        if let Some(writer) = &self.transcript {
            writer.write_cycle(
                cycle.index,
                cycle.kind.as_str(),
                &cycle.artifact,
                serde_json::to_value(&cycle.feedback).unwrap_or_default(),
                cycle.models_used.to_transcript(),
                duration.as_secs_f64(),
                cycle.created_at,
            );
        }

        self.logger.log(&LogEvent::ActionCompleted {
            session_id: self.id.to_string(),
            action: action.to_string(),
            cycle_index: Some(cycle.index),
            kind: Some(cycle.kind.to_string()),
            models_used: cycle.models_used.to_string(),
            duration_ms: duration.as_millis() as u64,
            success: true,
        });

        info!(
            session_id = %self.id,
            action = %action,
            cycle = cycle.index,
            score = cycle.feedback.score(),
            "Cycle recorded"
        );

        cycle
    }

    /// Report a failed action; the session itself is left as it was
    fn failed(
        &self,
        action: SessionAction,
        config: &SessionConfig,
        error: SessionError,
        started: Instant,
    ) -> SessionError {
        warn!(session_id = %self.id, action = %action, error = %error, "Action failed");

        self.logger.log(&LogEvent::ActionFailed {
            session_id: self.id.to_string(),
            action: action.to_string(),
            error: error.to_string(),
        });
        self.logger.log(&LogEvent::ActionCompleted {
            session_id: self.id.to_string(),
            action: action.to_string(),
            cycle_index: None,
            kind: None,
            models_used: ModelsUsed::from_config(config).to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
            success: false,
        });

        error
    }
}

impl std::fmt::Debug for RefinementSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinementSession")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("topic", &self.topic)
            .field("config", &self.config)
            .field("cycles", &self.history.len())
            .finish()
    }
}
