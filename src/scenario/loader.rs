use crate::scenario::config::Config;
use crate::scenario::presets;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse a scenario from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading scenario from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open scenario file {:?}", config_path))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse scenario file {:?}", config_path))?;

    info!("Scenario defines {} flow(s)", config.flows.len());

    config.validate()?;

    Ok(config)
}

/// Look up a built-in scenario by name
pub fn load_preset(name: &str) -> Result<Config> {
    let config = presets::preset(name).ok_or_else(|| {
        eyre!(
            "Unknown preset '{}' (available: {})",
            name,
            presets::preset_names().join(", ")
        )
    })?;
    info!("Using built-in scenario '{}'", name);
    config.validate()?;
    Ok(config)
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub stop_time: Option<String>,
    pub trace: Option<bool>,
}

/// Apply CLI overrides to a scenario
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(stop_time) = &overrides.stop_time {
        info!(
            "Overriding stop_time: {} -> {}",
            config.general.stop_time, stop_time
        );
        config.general.stop_time = stop_time.clone();
    }

    if let Some(trace) = overrides.trace {
        info!("Overriding trace: {}", trace);
        config.general.trace = Some(trace);
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}
