//! Scenario driver: YAML scenarios, built-in presets, the run loop and
//! its outputs.

pub mod config;
pub mod driver;
pub mod loader;
pub mod presets;
pub mod recorder;
pub mod report;

// Re-export commonly used types
pub use config::{Config, FlowConfig, GeneralConfig, NetworkConfig, RateChangeConfig, SinkSpec, ValidationError};
pub use driver::{ScenarioDriver, ScenarioOutcome};
pub use loader::{apply_overrides, load_config, load_preset, CliOverrides};
pub use recorder::{FlowRecorder, FlowStats, TraceEvent, TraceLog, TraceRecord};
pub use report::{FlowReport, ScenarioReport};
