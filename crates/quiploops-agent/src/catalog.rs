//! Known models per provider.
//!
//! Provider model lists move quickly, so the catalog is advisory: unknown
//! models are allowed, deprecated ones are not.

use crate::ProviderKind;

/// Static catalog of models per provider
pub struct ModelCatalog;

impl ModelCatalog {
    /// Models known to work with `provider`, most capable first
    pub fn models(provider: ProviderKind) -> &'static [&'static str] {
        match provider {
            ProviderKind::Groq => &["llama-3.3-70b-versatile", "llama-3.1-8b-instant"],
            ProviderKind::OpenAi => &["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"],
            ProviderKind::HuggingFace => &[
                "mistralai/Mistral-7B-Instruct-v0.2",
                "Qwen/Qwen2.5-7B-Instruct",
            ],
            ProviderKind::Together => &[
                "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
                "mistralai/Mistral-7B-Instruct-v0.2",
                "Qwen/Qwen2.5-7B-Instruct-Turbo",
                "meta-llama/Llama-3.2-3B-Instruct-Turbo",
            ],
            ProviderKind::DeepInfra => &[
                "meta-llama/Meta-Llama-3.1-8B-Instruct",
                "mistralai/Mistral-7B-Instruct-v0.2",
                "Qwen/Qwen2.5-7B-Instruct",
            ],
        }
    }

    /// Model used when none is configured
    pub fn default_model(provider: ProviderKind) -> &'static str {
        match provider {
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::HuggingFace => "mistralai/Mistral-7B-Instruct-v0.2",
            ProviderKind::Together => "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
            ProviderKind::DeepInfra => "meta-llama/Meta-Llama-3.1-8B-Instruct",
        }
    }

    /// Models the provider has removed or replaced
    pub fn deprecated(provider: ProviderKind) -> &'static [&'static str] {
        match provider {
            ProviderKind::Groq => &[
                "llama-3.1-70b-versatile",
                "llama-3.3-70b-specdec",
                "mixtral-8x7b-32768",
                "gemma2-9b-it",
            ],
            _ => &[],
        }
    }

    pub fn is_known(provider: ProviderKind, model: &str) -> bool {
        Self::models(provider).contains(&model)
    }

    pub fn is_deprecated(provider: ProviderKind, model: &str) -> bool {
        Self::deprecated(provider).contains(&model)
    }
}
