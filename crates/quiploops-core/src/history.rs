use std::time::Duration;

use chrono::Utc;
use quiploops_critic::Feedback;

use crate::{Cycle, CycleKind, ModelsUsed};

/// Append-only, ordered list of cycles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    cycles: Vec<Cycle>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a cycle with the next index and return it
    pub(crate) fn append(
        &mut self,
        artifact: String,
        feedback: Feedback,
        kind: CycleKind,
        models_used: ModelsUsed,
        duration: Duration,
    ) -> &Cycle {
        let position = self.cycles.len();
        self.cycles.push(Cycle {
            index: position + 1,
            artifact,
            feedback,
            kind,
            models_used,
            created_at: Utc::now(),
            duration,
        });
        &self.cycles[position]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cycle> {
        self.cycles.iter()
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn first(&self) -> Option<&Cycle> {
        self.cycles.first()
    }

    pub fn last(&self) -> Option<&Cycle> {
        self.cycles.last()
    }

    /// Cycle by its 1-based index
    pub fn get(&self, index: usize) -> Option<&Cycle> {
        index.checked_sub(1).and_then(|i| self.cycles.get(i))
    }

    pub fn as_slice(&self) -> &[Cycle] {
        &self.cycles
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Cycle;
    type IntoIter = std::slice::Iter<'a, Cycle>;

    fn into_iter(self) -> Self::IntoIter {
        self.cycles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;
    use quiploops_critic::MaturityTier;

    fn feedback(score: i64) -> Feedback {
        Feedback::new(score, MaturityTier::Teen, vec![], vec![], vec![], "fine")
    }

    #[test]
    fn test_append_assigns_gapless_indices() {
        let models = ModelsUsed::from_config(&SessionConfig::default());
        let mut history = History::new();
        assert!(history.is_empty());
        assert!(history.get(1).is_none());

        for (i, kind) in [CycleKind::Initial, CycleKind::Revised, CycleKind::Reevaluated]
            .into_iter()
            .enumerate()
        {
            let cycle = history.append(
                format!("joke {}", i),
                feedback(10 * i as i64),
                kind,
                models.clone(),
                Duration::from_millis(5),
            );
            assert_eq!(cycle.index, i + 1);
        }

        assert_eq!(history.len(), 3);
        for (position, cycle) in history.iter().enumerate() {
            assert_eq!(cycle.index, position + 1);
        }
        assert_eq!(history.get(2).unwrap().kind, CycleKind::Revised);
        assert!(history.get(0).is_none());
        assert!(history.get(4).is_none());
        assert_eq!(history.last().unwrap().artifact, "joke 2");
        assert_eq!(history.first().unwrap().feedback.score(), 0);
    }
}
