use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token accounting reported by the backend, when it reports any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Text returned by a completion backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutput {
    /// Raw completion text, untouched
    pub text: String,
    /// Model that actually served the request
    pub model: String,
    /// Wall time of the call
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl CompletionOutput {
    pub fn new(text: String, model: String, duration: Duration) -> Self {
        Self {
            text,
            model,
            duration,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Count lines in the completion text
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total_saturates() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 30,
        };
        assert_eq!(usage.total(), 150);

        let huge = TokenUsage {
            prompt_tokens: u32::MAX,
            completion_tokens: 5,
        };
        assert_eq!(huge.total(), u32::MAX);
    }

    #[test]
    fn test_usage_is_optional_in_json() {
        let output = CompletionOutput::new("hi".into(), "m".into(), Duration::from_millis(1500));
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("usage").is_none());
        assert_eq!(json["duration"], 1.5);

        let with_usage = output.with_usage(TokenUsage {
            prompt_tokens: 3,
            completion_tokens: 4,
        });
        let back: CompletionOutput =
            serde_json::from_value(serde_json::to_value(&with_usage).unwrap()).unwrap();
        assert_eq!(back.usage.map(|u| u.total()), Some(7));
    }
}
