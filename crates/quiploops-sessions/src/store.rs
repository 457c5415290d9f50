use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::parser::{parse_session, parse_session_summary};
use crate::types::{
    DayCount, ProviderStats, Session, SessionFilter, SessionStats, SessionSummary,
};

/// Provides access to session files on disk.
pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Create a new SessionStore using the default sessions directory.
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_dir().with_context(|| "Could not determine data directory")?;
        let sessions_dir = data_dir.join("quiploops").join("sessions");
        Ok(Self { sessions_dir })
    }

    /// Create a SessionStore with a custom directory (useful for testing).
    pub fn with_dir(sessions_dir: PathBuf) -> Self {
        Self { sessions_dir }
    }

    /// Return the sessions directory path.
    pub fn sessions_dir(&self) -> &PathBuf {
        &self.sessions_dir
    }

    /// List sessions matching the given filter, sorted by timestamp descending.
    pub fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries: Vec<SessionSummary> = Vec::new();

        let entries = std::fs::read_dir(&self.sessions_dir)
            .with_context(|| format!("Failed to read sessions dir: {:?}", self.sessions_dir))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }

            match parse_session_summary(&path) {
                Ok(summary) => {
                    if self.matches_filter(&summary, filter) {
                        summaries.push(summary);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse session {:?}: {}", path, e);
                }
            }
        }

        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(summaries)
    }

    /// Get a fully parsed session by ID.
    pub fn get(&self, id: &str) -> Result<Session> {
        let path = self.sessions_dir.join(format!("{}.jsonl", id));
        parse_session(&path)
    }

    /// Compute aggregate statistics over sessions matching the filter.
    pub fn stats(&self, filter: &SessionFilter) -> Result<SessionStats> {
        let summaries = self.list(filter)?;
        let total_sessions = summaries.len();

        if total_sessions == 0 {
            return Ok(SessionStats {
                total_sessions: 0,
                finished_sessions: 0,
                avg_cycles: 0.0,
                avg_final_score: 0.0,
                avg_improvement: 0.0,
                sessions_over_time: Vec::new(),
                by_provider: Vec::new(),
            });
        }

        let finished_sessions = summaries.iter().filter(|s| s.finished).count();

        let avg_cycles =
            summaries.iter().map(|s| s.cycles as f64).sum::<f64>() / total_sessions as f64;

        let finals: Vec<f64> = summaries
            .iter()
            .filter_map(|s| s.final_score.map(f64::from))
            .collect();
        let avg_final_score = mean(&finals);

        let improvements: Vec<f64> = summaries
            .iter()
            .filter(|s| s.cycles > 1)
            .filter_map(|s| match (s.first_score, s.final_score) {
                (Some(first), Some(last)) => Some(f64::from(last) - f64::from(first)),
                _ => None,
            })
            .collect();
        let avg_improvement = mean(&improvements);

        // Sessions over time (group by date)
        let mut day_counts: BTreeMap<String, usize> = BTreeMap::new();
        for s in &summaries {
            let date = s.timestamp.format("%Y-%m-%d").to_string();
            *day_counts.entry(date).or_insert(0) += 1;
        }
        let sessions_over_time: Vec<DayCount> = day_counts
            .into_iter()
            .map(|(date, count)| DayCount { date, count })
            .collect();

        // By evaluator provider
        let mut provider_map: HashMap<String, (usize, Vec<f64>)> = HashMap::new();
        for s in &summaries {
            let provider = provider_of(&s.evaluator).to_string();
            let entry = provider_map.entry(provider).or_insert((0, Vec::new()));
            entry.0 += 1;
            if let Some(score) = s.final_score {
                entry.1.push(f64::from(score));
            }
        }
        let mut by_provider: Vec<ProviderStats> = provider_map
            .into_iter()
            .map(|(provider, (total, scores))| ProviderStats {
                provider,
                total,
                avg_final_score: mean(&scores),
            })
            .collect();
        by_provider.sort_by(|a, b| b.total.cmp(&a.total).then(a.provider.cmp(&b.provider)));

        Ok(SessionStats {
            total_sessions,
            finished_sessions,
            avg_cycles,
            avg_final_score,
            avg_improvement,
            sessions_over_time,
            by_provider,
        })
    }

    fn matches_filter(&self, summary: &SessionSummary, filter: &SessionFilter) -> bool {
        if let Some(after) = filter.after {
            if summary.timestamp < after {
                return false;
            }
        }

        if let Some(before) = filter.before {
            if summary.timestamp > before {
                return false;
            }
        }

        if let Some(ref search) = filter.search {
            let search_lower = search.to_lowercase();
            if !summary
                .topic_preview
                .to_lowercase()
                .contains(&search_lower)
            {
                return false;
            }
        }

        if let Some(ref provider) = filter.provider {
            let provider = provider.to_lowercase();
            if provider_of(&summary.generator) != provider
                && provider_of(&summary.evaluator) != provider
            {
                return false;
            }
        }

        if let Some(finished) = filter.finished {
            if summary.finished != finished {
                return false;
            }
        }

        true
    }
}

/// Provider part of a `provider/model` label
fn provider_of(label: &str) -> &str {
    label.split('/').next().unwrap_or(label)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
