//! `quiploops models`: the model catalog and which providers have keys.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use quiploops_agent::{ModelCatalog, ProviderKind};

#[derive(Debug, Serialize)]
struct ProviderListing {
    provider: ProviderKind,
    name: &'static str,
    api_key_env: &'static str,
    configured: bool,
    default_model: &'static str,
    models: &'static [&'static str],
    deprecated: &'static [&'static str],
}

impl ProviderListing {
    fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            name: provider.display_name(),
            api_key_env: provider.api_key_env(),
            configured: provider.api_key_from_env().is_some(),
            default_model: ModelCatalog::default_model(provider),
            models: ModelCatalog::models(provider),
            deprecated: ModelCatalog::deprecated(provider),
        }
    }
}

pub fn handle_models_command(provider: Option<String>, json: bool) -> Result<()> {
    let providers: Vec<ProviderKind> = match provider {
        Some(name) => vec![name.parse::<ProviderKind>().map_err(anyhow::Error::msg)?],
        None => ProviderKind::ALL.to_vec(),
    };
    let listings: Vec<ProviderListing> = providers.into_iter().map(ProviderListing::new).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    for listing in &listings {
        let status = if listing.configured {
            format!("{} {}", "✓".bright_green(), listing.api_key_env)
        } else {
            format!("{} {} not set", "✗".dimmed(), listing.api_key_env)
        };
        println!(
            "{} ({})  {}",
            listing.name.bold(),
            listing.provider,
            status
        );
        for model in listing.models {
            let marker = if *model == listing.default_model {
                " (default)".dimmed().to_string()
            } else {
                String::new()
            };
            println!("  {}{}", model, marker);
        }
        for model in listing.deprecated {
            println!("  {} {}", model.dimmed().strikethrough(), "deprecated".dimmed());
        }
        println!();
    }

    Ok(())
}
