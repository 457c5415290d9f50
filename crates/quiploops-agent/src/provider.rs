use serde::{Deserialize, Serialize};

/// Supported completion providers.
///
/// Every provider speaks the OpenAI chat-completions dialect, so one HTTP
/// backend serves them all; they differ in endpoint and credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Groq,
    Together,
    DeepInfra,
    HuggingFace,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Groq,
        ProviderKind::OpenAi,
        ProviderKind::HuggingFace,
        ProviderKind::Together,
        ProviderKind::DeepInfra,
    ];

    /// Name shown to humans
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Groq => "Groq",
            ProviderKind::Together => "Together AI",
            ProviderKind::DeepInfra => "DeepInfra",
            ProviderKind::HuggingFace => "HuggingFace",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_env(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::Together => "TOGETHER_API_KEY",
            ProviderKind::DeepInfra => "DEEPINFRA_API_KEY",
            ProviderKind::HuggingFace => "HUGGINGFACE_API_KEY",
        }
    }

    /// Base URL of the OpenAI-compatible API
    pub fn base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Groq => "https://api.groq.com/openai/v1",
            ProviderKind::Together => "https://api.together.xyz/v1",
            ProviderKind::DeepInfra => "https://api.deepinfra.com/v1/openai",
            ProviderKind::HuggingFace => "https://router.huggingface.co/v1",
        }
    }

    /// Prefix of the sample key shipped in env templates.
    /// A key starting with it has not been filled in.
    fn placeholder_prefix(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "sk-your",
            ProviderKind::Groq => "gsk-your",
            ProviderKind::Together => "your-together",
            ProviderKind::DeepInfra => "your-deepinfra",
            ProviderKind::HuggingFace => "hf_your",
        }
    }

    /// Whether `key` looks like a real credential
    pub fn is_usable_key(self, key: &str) -> bool {
        let key = key.trim();
        !key.is_empty() && !key.starts_with(self.placeholder_prefix())
    }

    /// Read the API key from the environment, ignoring placeholders
    pub fn api_key_from_env(self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .filter(|key| self.is_usable_key(key))
            .map(|key| key.trim().to_string())
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Groq => write!(f, "groq"),
            ProviderKind::Together => write!(f, "together"),
            ProviderKind::DeepInfra => write!(f, "deepinfra"),
            ProviderKind::HuggingFace => write!(f, "huggingface"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open-ai" => Ok(ProviderKind::OpenAi),
            "groq" => Ok(ProviderKind::Groq),
            "together" | "together-ai" | "togetherai" => Ok(ProviderKind::Together),
            "deepinfra" | "deep-infra" => Ok(ProviderKind::DeepInfra),
            "huggingface" | "hugging-face" | "hf" => Ok(ProviderKind::HuggingFace),
            _ => Err(format!(
                "Unknown provider: {} (supported: openai, groq, together, deepinfra, huggingface)",
                s
            )),
        }
    }
}
