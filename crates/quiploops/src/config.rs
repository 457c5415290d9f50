//! Project configuration file support for quiploops.
//!
//! Loads configuration from `quiploops.toml` in the working directory and
//! merges it with command-line overrides into a [`SessionConfig`].

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use quiploops_agent::{ModelCatalog, ProviderKind, Role};
use quiploops_core::{RoleSettings, SessionConfig};

/// The config file name
pub const CONFIG_FILE_NAME: &str = "quiploops.toml";

/// Provider used when no layer names one
pub const DEFAULT_PROVIDER: ProviderKind = ProviderKind::Groq;

/// Project-level configuration loaded from `quiploops.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default provider (applies to both roles)
    pub provider: Option<String>,
    /// Global default model (applies to both roles)
    pub model: Option<String>,
    /// Generator-specific configuration
    #[serde(default)]
    pub generator: RoleConfig,
    /// Evaluator-specific configuration
    #[serde(default)]
    pub evaluator: RoleConfig,
}

/// Configuration for one role
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    fn role(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Generator => &self.generator,
            Role::Evaluator => &self.evaluator,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub generator: RoleConfig,
    pub evaluator: RoleConfig,
    pub timeout: Option<Duration>,
}

impl Overrides {
    fn role(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Generator => &self.generator,
            Role::Evaluator => &self.evaluator,
        }
    }
}

/// Merge command-line values, the project file and built-in defaults.
///
/// Priority for every field: CLI role flag > CLI global flag > role table >
/// global table > default. A model set on a lower layer than the provider
/// is dropped in favour of that provider's default model, so switching
/// provider on the command line never pairs it with another provider's model.
pub fn resolve(project: Option<&ProjectConfig>, overrides: &Overrides) -> Result<SessionConfig> {
    Ok(SessionConfig::new(
        resolve_role(Role::Generator, project, overrides)?,
        resolve_role(Role::Evaluator, project, overrides)?,
    ))
}

fn resolve_role(
    role: Role,
    project: Option<&ProjectConfig>,
    overrides: &Overrides,
) -> Result<RoleSettings> {
    let empty = RoleConfig::default();
    let cli_role = overrides.role(role);
    let file_role = project.map(|p| p.role(role)).unwrap_or(&empty);
    let file_global = project.map(|p| (p.provider.as_deref(), p.model.as_deref()));

    // Highest priority first
    let providers = [
        cli_role.provider.as_deref(),
        overrides.provider.as_deref(),
        file_role.provider.as_deref(),
        file_global.and_then(|(p, _)| p),
    ];
    let models = [
        cli_role.model.as_deref(),
        overrides.model.as_deref(),
        file_role.model.as_deref(),
        file_global.and_then(|(_, m)| m),
    ];

    let provider_layer = providers.iter().position(Option::is_some);
    let provider = match provider_layer.and_then(|i| providers[i]) {
        Some(name) => name
            .parse::<ProviderKind>()
            .map_err(|e| anyhow::anyhow!("{} provider: {}", role, e))?,
        None => DEFAULT_PROVIDER,
    };

    let model_layer = models.iter().position(Option::is_some);
    let model = match (model_layer, provider_layer) {
        (Some(m), Some(p)) if m > p => ModelCatalog::default_model(provider),
        (Some(m), _) => models[m].unwrap_or_else(|| ModelCatalog::default_model(provider)),
        (None, _) => ModelCatalog::default_model(provider),
    };

    let mut settings = RoleSettings::for_role(role, provider, model);
    if let Some(t) = cli_role.temperature.or(file_role.temperature) {
        settings = settings.with_temperature(t);
    }
    if let Some(n) = cli_role.max_tokens.or(file_role.max_tokens) {
        settings = settings.with_max_tokens(n);
    }
    if let Some(timeout) = overrides.timeout {
        settings = settings.with_timeout(Some(timeout));
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(toml_str: &str) -> ProjectConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "agent = \"claude\"\n").unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_load_role_tables() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
provider = "groq"

[evaluator]
provider = "openai"
model = "gpt-4o-mini"
temperature = 0.1
"#,
        )
        .unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.provider.as_deref(), Some("groq"));
        assert_eq!(config.evaluator.model.as_deref(), Some("gpt-4o-mini"));
        assert!(config.generator.provider.is_none());
    }

    #[test]
    fn test_defaults_without_any_layer() {
        let config = resolve(None, &Overrides::default()).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_role_table_beats_global_table() {
        let project = parse(
            r#"
provider = "groq"
model = "llama-3.1-8b-instant"

[evaluator]
provider = "openai"
model = "gpt-4o-mini"
max_tokens = 300
"#,
        );
        let config = resolve(Some(&project), &Overrides::default()).unwrap();

        assert_eq!(config.generator.provider, ProviderKind::Groq);
        assert_eq!(config.generator.model, "llama-3.1-8b-instant");
        assert_eq!(config.evaluator.provider, ProviderKind::OpenAi);
        assert_eq!(config.evaluator.model, "gpt-4o-mini");
        assert_eq!(config.evaluator.max_tokens, 300);
    }

    #[test]
    fn test_cli_beats_file() {
        let project = parse(
            r#"
provider = "groq"

[generator]
temperature = 0.5
"#,
        );
        let overrides = Overrides {
            provider: Some("together".into()),
            generator: RoleConfig {
                temperature: Some(1.2),
                ..Default::default()
            },
            evaluator: RoleConfig {
                provider: Some("openai".into()),
                model: Some("gpt-4o".into()),
                ..Default::default()
            },
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let config = resolve(Some(&project), &overrides).unwrap();

        assert_eq!(config.generator.provider, ProviderKind::Together);
        assert_eq!(
            config.generator.model,
            ModelCatalog::default_model(ProviderKind::Together)
        );
        assert!((config.generator.temperature - 1.2).abs() < f32::EPSILON);
        assert_eq!(config.generator.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.evaluator.provider, ProviderKind::OpenAi);
        assert_eq!(config.evaluator.model, "gpt-4o");
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let overrides = Overrides {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        let config = resolve(None, &overrides).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout must be positive"));
    }

    #[test]
    fn test_provider_switch_drops_lower_layer_model() {
        let project = parse("model = \"llama-3.1-8b-instant\"\n");
        let overrides = Overrides {
            provider: Some("openai".into()),
            ..Default::default()
        };
        let config = resolve(Some(&project), &overrides).unwrap();
        assert_eq!(
            config.evaluator.model,
            ModelCatalog::default_model(ProviderKind::OpenAi)
        );
    }

    #[test]
    fn test_model_without_provider_keeps_default_provider() {
        let overrides = Overrides {
            model: Some("llama-3.1-8b-instant".into()),
            ..Default::default()
        };
        let config = resolve(None, &overrides).unwrap();
        assert_eq!(config.generator.provider, DEFAULT_PROVIDER);
        assert_eq!(config.generator.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn test_unknown_provider_is_error() {
        let overrides = Overrides {
            provider: Some("anthropic".into()),
            ..Default::default()
        };
        let err = resolve(None, &overrides).unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
