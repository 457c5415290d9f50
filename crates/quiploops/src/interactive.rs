//! The interactive refinement loop.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{FuzzySelect, Input, Select};

use quiploops_agent::{ModelCatalog, ProviderKind, Role};
use quiploops_core::{CycleKind, RefinementSession, SessionConfig, SessionError};

use crate::render;

/// Menu shown after every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    Revise,
    Reevaluate,
    ChangeModels,
    Finish,
}

impl MenuChoice {
    const ALL: [MenuChoice; 4] = [
        MenuChoice::Revise,
        MenuChoice::Reevaluate,
        MenuChoice::ChangeModels,
        MenuChoice::Finish,
    ];

    fn label(self) -> &'static str {
        match self {
            MenuChoice::Revise => "Accept feedback & revise",
            MenuChoice::Reevaluate => "Reject feedback & re-evaluate",
            MenuChoice::ChangeModels => "Change models",
            MenuChoice::Finish => "Finish",
        }
    }
}

/// Menu shown when the first cycle fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryChoice {
    Retry,
    ChangeModels,
    Quit,
}

impl RetryChoice {
    const ALL: [RetryChoice; 3] = [
        RetryChoice::Retry,
        RetryChoice::ChangeModels,
        RetryChoice::Quit,
    ];

    fn label(self) -> &'static str {
        match self {
            RetryChoice::Retry => "Try again",
            RetryChoice::ChangeModels => "Change models and try again",
            RetryChoice::Quit => "Quit",
        }
    }
}

/// Which roles a model change applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleTarget {
    Both,
    Generator,
    Evaluator,
}

impl RoleTarget {
    const ALL: [RoleTarget; 3] = [RoleTarget::Both, RoleTarget::Generator, RoleTarget::Evaluator];

    fn label(self) -> &'static str {
        match self {
            RoleTarget::Both => "Both roles",
            RoleTarget::Generator => "Generator",
            RoleTarget::Evaluator => "Evaluator",
        }
    }

    fn roles(self) -> &'static [Role] {
        match self {
            RoleTarget::Both => &[Role::Generator, Role::Evaluator],
            RoleTarget::Generator => &[Role::Generator],
            RoleTarget::Evaluator => &[Role::Evaluator],
        }
    }
}

/// `config` with `provider`/`model` on the targeted roles. Tuning is kept.
fn with_models(
    config: &SessionConfig,
    target: RoleTarget,
    provider: ProviderKind,
    model: &str,
) -> SessionConfig {
    let mut changed = config.clone();
    for role in target.roles() {
        let settings = match role {
            Role::Generator => &mut changed.generator,
            Role::Evaluator => &mut changed.evaluator,
        };
        settings.provider = provider;
        settings.model = model.to_string();
    }
    changed
}

/// Position of `model` in the catalog of `provider`, else of its default
fn model_index(provider: ProviderKind, model: &str) -> usize {
    let models = ModelCatalog::models(provider);
    models
        .iter()
        .position(|m| *m == model)
        .or_else(|| {
            models
                .iter()
                .position(|m| *m == ModelCatalog::default_model(provider))
        })
        .unwrap_or(0)
}

/// Ask for a role, provider and model, starting from `current`
fn choose_models(current: &SessionConfig) -> Result<SessionConfig> {
    let targets: Vec<&str> = RoleTarget::ALL.iter().map(|t| t.label()).collect();
    let target = RoleTarget::ALL[Select::new()
        .with_prompt("Change models for")
        .items(&targets)
        .default(0)
        .interact()?];

    let reference = match target {
        RoleTarget::Evaluator => &current.evaluator,
        RoleTarget::Both | RoleTarget::Generator => &current.generator,
    };

    let providers: Vec<String> = ProviderKind::ALL
        .iter()
        .map(|p| {
            if p.api_key_from_env().is_some() {
                p.display_name().to_string()
            } else {
                format!("{} ({} not set)", p.display_name(), p.api_key_env())
            }
        })
        .collect();
    let provider_default = ProviderKind::ALL
        .iter()
        .position(|p| *p == reference.provider)
        .unwrap_or(0);
    let provider = ProviderKind::ALL[Select::new()
        .with_prompt("Provider")
        .items(&providers)
        .default(provider_default)
        .interact()?];

    let models = ModelCatalog::models(provider);
    let model = models[FuzzySelect::new()
        .with_prompt("Model")
        .items(models)
        .default(model_index(provider, &reference.model))
        .interact()?];

    Ok(with_models(current, target, provider, model))
}

/// Topic from the command line, or asked for
pub fn read_topic(topic: Option<String>) -> Result<String> {
    if let Some(topic) = topic.filter(|t| !t.trim().is_empty()) {
        return Ok(topic.trim().to_string());
    }

    let topic: String = Input::new()
        .with_prompt("What should the joke be about?")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Topic cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("Failed to read topic")?;

    Ok(topic.trim().to_string())
}

/// Run `session` from the first generation until the user finishes
pub async fn run(session: &mut RefinementSession, topic: &str, config: SessionConfig) -> Result<()> {
    let mut config = config;
    eprintln!("{}", "Writing the first joke...".dimmed());
    loop {
        match session.start(topic, config.clone()).await {
            Ok(cycle) => {
                render::print_cycle(cycle);
                break;
            }
            Err(e) => {
                print_error(&e);
                let retry_items: Vec<&str> =
                    RetryChoice::ALL.iter().map(|c| c.label()).collect();
                let choice = Select::new()
                    .with_prompt("What now?")
                    .items(&retry_items)
                    .default(0)
                    .interact()?;
                match RetryChoice::ALL[choice] {
                    RetryChoice::Retry => {}
                    RetryChoice::ChangeModels => change_models(session, &mut config)?,
                    RetryChoice::Quit => return Ok(()),
                }
            }
        }
    }

    let items: Vec<&str> = MenuChoice::ALL.iter().map(|c| c.label()).collect();
    loop {
        let selection = Select::new()
            .with_prompt("What next?")
            .items(&items)
            .default(0)
            .interact()?;

        let outcome = match MenuChoice::ALL[selection] {
            MenuChoice::Revise => {
                eprintln!("{}", "Revising...".dimmed());
                session.accept_and_revise().await.map(|_| ())
            }
            MenuChoice::Reevaluate => {
                eprintln!("{}", "Re-evaluating...".dimmed());
                session.reject_and_reevaluate().await.map(|_| ())
            }
            MenuChoice::ChangeModels => {
                change_models(session, &mut config)?;
                continue;
            }
            MenuChoice::Finish => break,
        };

        match outcome {
            Ok(()) => print_latest(session),
            Err(e) => print_error(&e),
        }
    }

    session.finish()?;
    render::print_summary(session.history());
    if let Some(writer) = session.transcript() {
        eprintln!(
            "{} {}",
            "Transcript:".dimmed(),
            writer.path().display()
        );
    }
    Ok(())
}

/// Ask for new models and apply them to later cycles
fn change_models(session: &mut RefinementSession, config: &mut SessionConfig) -> Result<()> {
    let changed = choose_models(config)?;
    match session.set_agent_config(changed.clone()) {
        Ok(()) => {
            *config = changed;
            render::print_config(config);
        }
        Err(e) => print_error(&e),
    }
    Ok(())
}

/// Newest cycle, plus what changed when it is a revision
fn print_latest(session: &RefinementSession) {
    let history = session.history();
    let Some(cycle) = history.last() else {
        return;
    };
    render::print_cycle(cycle);
    if cycle.kind == CycleKind::Revised {
        if let Some(previous) = history.len().checked_sub(1).and_then(|i| history.get(i)) {
            render::print_revision_diff(&previous.artifact, &cycle.artifact);
        }
    }
}

fn print_error(error: &SessionError) {
    eprintln!("{} {}", "Error:".bright_red().bold(), error);
    if let SessionError::Completion(e) = error {
        let detail = e.provider_message();
        if !detail.is_empty() && !error.to_string().contains(&detail) {
            eprintln!("  {}", detail.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_order() {
        let labels: Vec<&str> = MenuChoice::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Accept feedback & revise",
                "Reject feedback & re-evaluate",
                "Change models",
                "Finish"
            ]
        );
        assert_eq!(RetryChoice::ALL[0], RetryChoice::Retry);
    }

    #[test]
    fn test_with_models_touches_only_target_roles() {
        let config = SessionConfig::default();

        let changed = with_models(&config, RoleTarget::Evaluator, ProviderKind::OpenAi, "gpt-4o");
        assert_eq!(changed.generator, config.generator);
        assert_eq!(changed.evaluator.provider, ProviderKind::OpenAi);
        assert_eq!(changed.evaluator.model, "gpt-4o");
        assert_eq!(changed.evaluator.temperature, config.evaluator.temperature);
        assert_eq!(changed.evaluator.max_tokens, config.evaluator.max_tokens);

        let both = with_models(&config, RoleTarget::Both, ProviderKind::Together, "m");
        assert_eq!(both.generator.provider, ProviderKind::Together);
        assert_eq!(both.evaluator.model, "m");
        assert_eq!(both.generator.temperature, config.generator.temperature);
    }

    #[test]
    fn test_model_index_falls_back_to_default() {
        for provider in ProviderKind::ALL {
            let models = ModelCatalog::models(provider);
            assert_eq!(models[model_index(provider, models[0])], models[0]);
            assert_eq!(
                models[model_index(provider, "not-a-model")],
                ModelCatalog::default_model(provider)
            );
        }
    }

    #[test]
    fn test_read_topic_prefers_argument() {
        assert_eq!(read_topic(Some("  ducks ".into())).unwrap(), "ducks");
    }
}
