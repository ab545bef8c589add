use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use ideaflow_cli::client::load_config;
use ideaflow_core::config::WarnLevel;
use ideaflow_core::redact::{self, REDACTED};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective config with secrets redacted
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let credential = |set: bool| if set { Some(REDACTED) } else { None };
    let llm_key = credential(config.llm.api_key.is_some());
    let search_key = credential(config.search.api_key.is_some());
    let env = redact::relevant_env();

    if json {
        print_json(&serde_json::json!({
            "config": config,
            "credentials": { "llm": llm_key, "search": search_key },
            "env": env,
        }))?;
        return Ok(());
    }

    let yaml = serde_yaml::to_string(&config).context("failed to render config")?;
    print!("{yaml}");
    println!("\ncredentials:");
    println!("  llm:    {}", llm_key.unwrap_or("(not set)"));
    println!("  search: {}", search_key.unwrap_or("(not set)"));
    if !env.is_empty() {
        println!("\nenvironment:");
        for (k, v) in &env {
            println!("  {k}={v}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
