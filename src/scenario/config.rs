//! Scenario configuration structures and validation.
//!
//! A scenario is a YAML document with a `general` section, an optional
//! `network` section and a list of `flows`:
//!
//! ```yaml
//! general:
//!   stop_time: "60s"
//!   log_level: info
//!   seed: 42
//!   trace: true
//! network:
//!   base: "10.1.1.0"
//!   mask: "255.255.255.0"
//! flows:
//!   - name: udp-flow
//!     kind: udp
//!     sink: "10.1.1.4:8081"
//!     packet_size: 1040
//!     packet_budget: 1000
//!     rate: "5Mbps"
//!     start: "20s"
//!     stop: "60s"
//!     rate_change:
//!       at: "30s"
//!       rate: "10Mbps"
//! ```

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddrV4;
use std::str::FromStr;

use crate::app::DataRate;
use crate::net::{AddressAllocator, SocketKind};
use crate::sim::SimTime;
use crate::utils::duration::parse_sim_duration;

/// Port given to sinks whose address is assigned automatically.
pub const DEFAULT_SINK_PORT: u16 = 8080;

/// Complete scenario description
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub general: GeneralConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
    pub flows: Vec<FlowConfig>,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.stop_time()?;

        if let Some(level) = &self.general.log_level {
            if log::LevelFilter::from_str(level).is_err() {
                return Err(ValidationError::InvalidGeneral(format!(
                    "unknown log_level '{}'",
                    level
                )));
            }
        }

        if let Some(network) = &self.network {
            network.allocator()?;
        }

        if self.flows.is_empty() {
            return Err(ValidationError::InvalidFlow(
                "at least one flow must be defined".to_string(),
            ));
        }

        let mut names = HashSet::new();
        let mut sinks = HashSet::new();
        for flow in &self.flows {
            flow.validate()?;
            if !names.insert(flow.name.as_str()) {
                return Err(ValidationError::InvalidFlow(format!(
                    "duplicate flow name '{}'",
                    flow.name
                )));
            }
            if let SinkSpec::Addr(addr) = flow.sink_spec()? {
                if !sinks.insert(addr) {
                    return Err(ValidationError::InvalidNetwork(format!(
                        "sink address {} is used by more than one flow",
                        addr
                    )));
                }
            }
        }

        Ok(())
    }

    /// Absolute end of the run.
    pub fn stop_time(&self) -> Result<SimTime, ValidationError> {
        if self.general.stop_time.trim().is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "stop_time cannot be empty".to_string(),
            ));
        }
        parse_sim_duration(&self.general.stop_time)
            .map_err(|e| ValidationError::InvalidGeneral(format!("stop_time: {}", e)))
    }

    /// Allocator for automatically addressed sinks.
    pub fn allocator(&self) -> Result<AddressAllocator, ValidationError> {
        match &self.network {
            Some(network) => network.allocator(),
            None => Ok(AddressAllocator::default()),
        }
    }

    pub fn trace_enabled(&self) -> bool {
        self.general.trace.unwrap_or(false)
    }

    /// Find a flow by name
    pub fn flow(&self, name: &str) -> Option<&FlowConfig> {
        self.flows.iter().find(|flow| flow.name == name)
    }
}

/// Run-wide settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneralConfig {
    pub stop_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Seed for the loss models. Each flow derives its own stream from it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Write a per-packet trace next to the report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
}

/// Subnet used for sinks declared with `sink: auto`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NetworkConfig {
    pub base: String,
    pub mask: String,
}

impl NetworkConfig {
    pub fn allocator(&self) -> Result<AddressAllocator, ValidationError> {
        AddressAllocator::new(&self.base, &self.mask)
            .map_err(|e| ValidationError::InvalidNetwork(e.to_string()))
    }
}

/// One generator and the sink it feeds
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FlowConfig {
    pub name: String,
    #[serde(default)]
    pub kind: SocketKind,
    /// `ip:port`, or `auto` to take the next address from the network section
    #[serde(default = "default_sink")]
    pub sink: String,
    pub packet_size: u32,
    /// 0 means unbounded
    #[serde(default)]
    pub packet_budget: u64,
    pub rate: DataRate,
    pub start: String,
    /// Defaults to the end of the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_change: Option<RateChangeConfig>,
    /// Independent per-packet drop probability in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
}

/// A single deferred rate change
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RateChangeConfig {
    pub at: String,
    pub rate: DataRate,
}

/// Where a flow's sink lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkSpec {
    Auto,
    Addr(SocketAddrV4),
}

fn default_sink() -> String {
    "auto".to_string()
}

impl FlowConfig {
    /// Validate a single flow
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidFlow(
                "flow name cannot be empty".to_string(),
            ));
        }
        if self.packet_size == 0 {
            return Err(self.invalid("packet_size must be positive"));
        }

        let start = self.start_time()?;
        if let Some(stop) = self.stop_time()? {
            if stop <= start {
                return Err(self.invalid(&format!(
                    "stop ({}) must be later than start ({})",
                    stop, start
                )));
            }
        }

        if let Some(change) = &self.rate_change {
            let at = self.rate_change_time()?.unwrap_or(SimTime::ZERO);
            if change.rate.is_zero() {
                return Err(self.invalid("rate_change.rate must be positive"));
            }
            let after_stop = self.stop_time()?.is_some_and(|stop| at >= stop);
            if at < start || after_stop {
                warn!(
                    "Flow '{}': rate change at {} falls outside the flow's active window",
                    self.name, at
                );
            }
        }

        if let Some(loss) = self.loss {
            if !(0.0..=1.0).contains(&loss) {
                return Err(self.invalid(&format!("loss {} must be within [0, 1]", loss)));
            }
        }

        self.sink_spec()?;
        Ok(())
    }

    pub fn start_time(&self) -> Result<SimTime, ValidationError> {
        parse_sim_duration(&self.start).map_err(|e| self.invalid(&format!("start: {}", e)))
    }

    pub fn stop_time(&self) -> Result<Option<SimTime>, ValidationError> {
        self.stop
            .as_deref()
            .map(|stop| parse_sim_duration(stop).map_err(|e| self.invalid(&format!("stop: {}", e))))
            .transpose()
    }

    pub fn rate_change_time(&self) -> Result<Option<SimTime>, ValidationError> {
        self.rate_change
            .as_ref()
            .map(|change| {
                parse_sim_duration(&change.at)
                    .map_err(|e| self.invalid(&format!("rate_change.at: {}", e)))
            })
            .transpose()
    }

    pub fn sink_spec(&self) -> Result<SinkSpec, ValidationError> {
        let sink = self.sink.trim();
        if sink.eq_ignore_ascii_case("auto") {
            return Ok(SinkSpec::Auto);
        }
        SocketAddrV4::from_str(sink).map(SinkSpec::Addr).map_err(|_| {
            ValidationError::InvalidNetwork(format!(
                "flow '{}': sink '{}' is neither 'auto' nor ip:port",
                self.name, self.sink
            ))
        })
    }

    fn invalid(&self, reason: &str) -> ValidationError {
        ValidationError::InvalidFlow(format!("flow '{}': {}", self.name, reason))
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
    #[error("Invalid flow configuration: {0}")]
    InvalidFlow(String),
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            stop_time: "60s".to_string(),
            log_level: Some("info".to_string()),
            seed: None,
            trace: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base: "10.1.1.0".to_string(),
            mask: "255.255.255.0".to_string(),
        }
    }
}
