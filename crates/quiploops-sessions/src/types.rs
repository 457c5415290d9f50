use chrono::{DateTime, Utc};
use quiploops_critic::Feedback;
use serde::{Deserialize, Serialize};

/// Mirrors the SessionLine enum from quiploops-logging but with Deserialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionLine {
    SessionStart(SessionStart),
    Cycle(CycleRecord),
    SessionEnd(SessionEnd),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStart {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub topic: String,
    pub generator_provider: String,
    pub generator_model: String,
    pub evaluator_provider: String,
    pub evaluator_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub index: usize,
    pub kind: String,
    pub artifact: String,
    pub feedback: Feedback,
    pub generator_provider: String,
    pub generator_model: String,
    pub evaluator_provider: String,
    pub evaluator_model: String,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnd {
    pub cycles: usize,
    pub final_score: Option<u8>,
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

/// A fully parsed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// File stem of the transcript
    pub id: String,
    pub start: SessionStart,
    pub cycles: Vec<CycleRecord>,
    pub end: Option<SessionEnd>,
}

impl Session {
    /// Score change from each cycle to the next
    pub fn score_deltas(&self) -> Vec<i16> {
        self.cycles
            .windows(2)
            .map(|pair| pair[1].feedback.score() as i16 - pair[0].feedback.score() as i16)
            .collect()
    }

    /// Highest scoring cycle (the earliest one on ties)
    pub fn best_cycle(&self) -> Option<&CycleRecord> {
        self.cycles.iter().reduce(|best, c| {
            if c.feedback.score() > best.feedback.score() {
                c
            } else {
                best
            }
        })
    }
}

/// Summary for list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub topic_preview: String,
    /// `provider/model`
    pub generator: String,
    pub evaluator: String,
    pub cycles: usize,
    pub first_score: Option<u8>,
    pub final_score: Option<u8>,
    pub duration_secs: Option<f64>,
    /// A `session_end` line was written
    pub finished: bool,
}

/// Filter parameters for listing sessions.
#[derive(Debug, Default)]
pub struct SessionFilter {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub search: Option<String>,
    /// Matches either role's provider
    pub provider: Option<String>,
    pub finished: Option<bool>,
}

/// Aggregate statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub finished_sessions: usize,
    pub avg_cycles: f64,
    pub avg_final_score: f64,
    /// Mean of final minus first score, over sessions with more than one cycle
    pub avg_improvement: f64,
    pub sessions_over_time: Vec<DayCount>,
    pub by_provider: Vec<ProviderStats>,
}

/// Sessions count for a single day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayCount {
    pub date: String,
    pub count: usize,
}

/// Per-evaluator-provider statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider: String,
    pub total: usize,
    pub avg_final_score: f64,
}
