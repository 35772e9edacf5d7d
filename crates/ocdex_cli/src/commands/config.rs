use miette::{IntoDiagnostic, Result};
use ocdex_core::BotConfig;
use ocdex_core::config;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::output::{Output, mask};

/// Show current configuration
pub async fn show(config: &BotConfig) -> Result<()> {
    let output = Output::new();

    output.section("Current Configuration");
    println!();

    // Never echo the token itself
    let mut shown = config.clone();
    shown.discord.token = shown.discord.token.as_deref().map(mask);

    let toml_str = toml::to_string_pretty(&shown).into_diagnostic()?;
    println!("{}", toml_str);

    if config.discord.submission_channel.is_none() {
        output.warning("discord.submission_channel is not set, /submit will refuse to run");
    }
    output.status(&format!(
        "Searched: {}",
        config::config_paths()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    ));

    Ok(())
}

/// Save current configuration to file
pub async fn save(config: &BotConfig, path: &PathBuf) -> Result<()> {
    let output = Output::new();

    output.info("💾", &format!("Saving configuration to: {}", path.display()));

    // Keep the token out of saved files
    let mut saved = config.clone();
    saved.discord.token = None;
    config::save_config(&saved, path).await?;

    output.success("Configuration saved successfully!");
    println!();
    println!("To use this configuration, run:");
    println!("  {} --config {} run", "ocdex".bright_green(), path.display());

    Ok(())
}
