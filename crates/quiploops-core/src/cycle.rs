use std::time::Duration;

use chrono::{DateTime, Utc};
use quiploops_agent::ProviderKind;
use quiploops_critic::Feedback;
use quiploops_logging::TranscriptModels;
use serde::{Deserialize, Serialize};

use crate::SessionConfig;

/// How a cycle's artifact came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// First generation for the topic
    Initial,
    /// Generator rewrote the previous artifact from its feedback
    Revised,
    /// Same artifact, fresh evaluation
    Reevaluated,
}

impl CycleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CycleKind::Initial => "initial",
            CycleKind::Revised => "revised",
            CycleKind::Reevaluated => "reevaluated",
        }
    }
}

impl std::fmt::Display for CycleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Providers and models that produced a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsUsed {
    pub generator_provider: ProviderKind,
    pub generator_model: String,
    pub evaluator_provider: ProviderKind,
    pub evaluator_model: String,
}

impl ModelsUsed {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            generator_provider: config.generator.provider,
            generator_model: config.generator.model.clone(),
            evaluator_provider: config.evaluator.provider,
            evaluator_model: config.evaluator.model.clone(),
        }
    }

    pub(crate) fn to_transcript(&self) -> TranscriptModels {
        TranscriptModels {
            generator_provider: self.generator_provider.to_string(),
            generator_model: self.generator_model.clone(),
            evaluator_provider: self.evaluator_provider.to_string(),
            evaluator_model: self.evaluator_model.clone(),
        }
    }
}

impl std::fmt::Display for ModelsUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "generator={}/{} evaluator={}/{}",
            self.generator_provider,
            self.generator_model,
            self.evaluator_provider,
            self.evaluator_model
        )
    }
}

/// One generate-and-evaluate step. Cycles are only ever appended to a
/// history, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// 1-based position in the history
    pub index: usize,
    pub artifact: String,
    pub feedback: Feedback,
    pub kind: CycleKind,
    pub models_used: ModelsUsed,
    /// Display only, ordering comes from `index`
    pub created_at: DateTime<Utc>,
    /// Wall time of the action that produced the cycle
    pub duration: Duration,
}
