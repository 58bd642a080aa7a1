use clap::Parser;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;

use pacesim::scenario::{self, presets, CliOverrides, Config, ScenarioDriver};

/// Rate-paced traffic generation in a discrete-event simulation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario YAML file
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Run a built-in scenario instead of a file
    #[arg(short, long)]
    preset: Option<String>,

    /// Output directory for the report and trace
    #[arg(short, long, default_value = "pacesim_output")]
    output: PathBuf,

    /// Override the scenario's stop time (e.g. "90s")
    #[arg(long)]
    stop_time: Option<String>,

    /// Write packets.tr regardless of the scenario setting
    #[arg(long)]
    trace: bool,

    /// List the built-in scenarios and exit
    #[arg(long)]
    list_presets: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            stop_time: self.stop_time.clone(),
            trace: self.trace.then_some(true),
        }
    }
}

/// A scenario resolved from the command line.
struct LoadedScenario {
    name: String,
    /// Where it came from, for the startup log.
    source: String,
    config: Config,
}

/// Resolve the scenario named on the command line.
fn load_scenario(args: &Args) -> Result<LoadedScenario> {
    match (&args.config, &args.preset) {
        (Some(path), _) => {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scenario".to_string());
            Ok(LoadedScenario {
                name,
                source: format!("file {:?}", path),
                config: scenario::load_config(path)?,
            })
        }
        (None, Some(preset)) => Ok(LoadedScenario {
            name: preset.clone(),
            source: format!("built-in scenario '{}'", preset),
            config: scenario::load_preset(preset)?,
        }),
        (None, None) => bail!("either --config or --preset is required (see --list-presets)"),
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    if args.list_presets {
        for (name, description) in presets::preset_descriptions() {
            println!("{:<14} {}", name, description);
        }
        return Ok(());
    }

    // The scenario may choose the default log level, so it is read before
    // the logger exists and summarised once it does
    let LoadedScenario {
        name,
        source,
        mut config,
    } = load_scenario(&args)?;
    let log_level = config.general.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("Starting PaceSim v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded {} as '{}' ({} flow(s))", source, name, config.flows.len());
    info!("Output directory: {:?}", args.output);

    scenario::apply_overrides(&mut config, &args.overrides())?;

    let outcome = ScenarioDriver::new(name, config.clone()).run()?;

    fs::create_dir_all(&args.output)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", args.output.display()))?;

    outcome.report.write_json(&args.output.join("report.json"))?;

    match &outcome.trace {
        Some(trace) => {
            let trace_path = args.output.join("packets.tr");
            trace
                .write_to(&trace_path)
                .wrap_err_with(|| format!("Failed to write trace '{}'", trace_path.display()))?;
        }
        None if config.trace_enabled() => warn!("Tracing was enabled but no trace was produced"),
        None => {}
    }

    outcome.report.log_summary();
    info!("Simulation completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["pacesim", "--config", "test.yaml"]);

        assert_eq!(args.config, Some(PathBuf::from("test.yaml")));
        assert_eq!(args.output, PathBuf::from("pacesim_output"));
        assert!(!args.trace);
        assert!(args.overrides().trace.is_none());
    }

    #[test]
    fn test_preset_args() {
        let args = Args::parse_from([
            "pacesim",
            "--preset",
            "tcp-variants",
            "--stop-time",
            "90s",
            "--trace",
        ]);

        assert_eq!(args.preset.as_deref(), Some("tcp-variants"));
        let overrides = args.overrides();
        assert_eq!(overrides.stop_time.as_deref(), Some("90s"));
        assert_eq!(overrides.trace, Some(true));
    }

    #[test]
    fn test_config_and_preset_conflict() {
        assert!(Args::try_parse_from(["pacesim", "--config", "a.yaml", "--preset", "rate-step"]).is_err());
    }

    #[test]
    fn test_loaded_scenario_names_its_source() {
        let args = Args::parse_from(["pacesim", "--preset", "rate-step"]);
        let loaded = load_scenario(&args).unwrap();
        assert_eq!(loaded.name, "rate-step");
        assert_eq!(loaded.source, "built-in scenario 'rate-step'");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steady.yaml");
        fs::write(
            &path,
            "general:\n  stop_time: \"1s\"\nflows:\n  - name: a\n    packet_size: 100\n    rate: \"1Mbps\"\n    start: \"0s\"\n",
        )
        .unwrap();
        let args = Args::parse_from(["pacesim", "--config", path.to_str().unwrap()]);
        let loaded = load_scenario(&args).unwrap();
        assert_eq!(loaded.name, "steady");
        assert_eq!(loaded.source, format!("file {:?}", path));
        assert_eq!(loaded.config.flows.len(), 1);
    }

    #[test]
    fn test_missing_scenario_is_an_error() {
        let args = Args::parse_from(["pacesim"]);
        assert!(load_scenario(&args).is_err());
    }
}
