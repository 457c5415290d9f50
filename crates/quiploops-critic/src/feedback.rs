use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Verdict used when the evaluator gave none
pub const NO_VERDICT: &str = "no verdict provided";

/// Highest possible score
pub const MAX_SCORE: u8 = 100;

/// Audience the artifact is suitable for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaturityTier {
    Child,
    Teen,
    Adult,
}

impl MaturityTier {
    pub const ALL: [MaturityTier; 3] = [MaturityTier::Child, MaturityTier::Teen, MaturityTier::Adult];

    pub fn as_str(self) -> &'static str {
        match self {
            MaturityTier::Child => "Child",
            MaturityTier::Teen => "Teen",
            MaturityTier::Adult => "Adult",
        }
    }
}

impl std::fmt::Display for MaturityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaturityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MaturityTier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown maturity tier: {}", s))
    }
}

/// Structured critique of one artifact.
///
/// [`Feedback::new`], fallback policies and deserialization all clamp the
/// score and fill in a missing verdict, so every instance satisfies
/// `score <= 100` and has a non-empty verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(deserialize_with = "clamped_score")]
    score: u8,
    maturity_tier: MaturityTier,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default = "no_verdict", deserialize_with = "filled_verdict")]
    verdict: String,
    /// Set only on fallback records
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    degraded: bool,
}

fn clamped_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_score(raw))
}

fn filled_verdict<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(fill_verdict(raw.as_deref().unwrap_or_default()))
}

fn no_verdict() -> String {
    NO_VERDICT.to_string()
}

fn fill_verdict(verdict: &str) -> String {
    match verdict.trim() {
        "" => NO_VERDICT.to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Clamp any integer into the score range
pub fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, MAX_SCORE as i64) as u8
}

impl Feedback {
    pub fn new(
        score: i64,
        maturity_tier: MaturityTier,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        suggestions: Vec<String>,
        verdict: impl Into<String>,
    ) -> Self {
        let verdict = fill_verdict(&verdict.into());

        Self {
            score: clamp_score(score),
            maturity_tier,
            strengths,
            weaknesses,
            suggestions,
            verdict,
            degraded: false,
        }
    }

    /// Mark this record as a fallback
    pub(crate) fn into_degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn maturity_tier(&self) -> MaturityTier {
        self.maturity_tier
    }

    pub fn strengths(&self) -> &[String] {
        &self.strengths
    }

    pub fn weaknesses(&self) -> &[String] {
        &self.weaknesses
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn verdict(&self) -> &str {
        &self.verdict
    }

    /// True when the evaluator output could not be parsed
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}
