//! Config inspection command.

use crate::ui;
use anyhow::Result;
use std::path::Path;

/// Config actions.
#[derive(Debug, Clone)]
pub enum ConfigAction {
    /// Print one value by dotted key.
    Get(String),
    /// Print the effective configuration.
    Show,
    /// Check the config file.
    Validate,
}

/// Run the config command.
pub fn run_config(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get(key) => get_config_value(key),
        ConfigAction::Show => show_config(),
        ConfigAction::Validate => validate_config(&ems_core::Config::default_path()),
    }
}

/// Effective configuration as JSON: file, defaults, then environment.
fn effective_config() -> Result<serde_json::Value> {
    let config = ems_core::Config::load_default()?;
    Ok(serde_json::to_value(&config)?)
}

/// Show the effective configuration.
fn show_config() -> Result<()> {
    let path = ems_core::Config::default_path();
    if !path.exists() {
        ui::info(&format!(
            "No config file at {}, showing defaults",
            path.display()
        ));
    }

    println!("{}", serde_json::to_string_pretty(&effective_config()?)?);
    Ok(())
}

/// Walk a dotted key (e.g. `routes.rules.0.prefix`).
fn lookup<'a>(root: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.').try_fold(root, |current, part| match current {
        serde_json::Value::Object(map) => map.get(part),
        serde_json::Value::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    })
}

/// Get a specific config value by path.
fn get_config_value(key: &str) -> Result<()> {
    let value = effective_config()?;

    let Some(current) = lookup(&value, key) else {
        ui::error(&format!("Key not found: {key}"));
        return Ok(());
    };

    match current {
        serde_json::Value::String(s) => println!("{s}"),
        serde_json::Value::Number(n) => println!("{n}"),
        serde_json::Value::Bool(b) => println!("{b}"),
        serde_json::Value::Null => println!("null"),
        _ => println!("{}", serde_json::to_string_pretty(current)?),
    }

    Ok(())
}

/// Validate the configuration file.
fn validate_config(config_path: &Path) -> Result<()> {
    ui::header("Validating Configuration");

    if !config_path.exists() {
        ui::warning(&format!("Config file not found: {}", config_path.display()));
        ui::info("Defaults will be used");
        return Ok(());
    }

    let content = std::fs::read_to_string(config_path)?;

    if let Err(e) = json5::from_str::<serde_json::Value>(&content) {
        ui::error(&format!("Syntax error: {e}"));
        return Ok(());
    }
    ui::success("Syntax: Valid JSON5");

    let config = match ems_core::Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("Schema error: {e}"));
            return Ok(());
        }
    };
    ui::success("Schema: Configuration is valid");

    match ems_gateway::RouteTable::from_config(&config.routes) {
        Ok(table) => ui::success(&format!(
            "Routes: {} protected prefixes, {} login pages",
            table.rules().len(),
            table.login_routes().len()
        )),
        Err(e) => ui::error(&format!("Routes: {e}")),
    }

    Ok(())
}
