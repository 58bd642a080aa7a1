//! Run summary written as `report.json`.

use color_eyre::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome of one flow. Times are in seconds of simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowReport {
    pub name: String,
    pub kind: String,
    pub sink: String,
    pub packet_size: u32,
    pub packet_budget: u64,
    pub initial_rate: String,
    pub final_rate: String,
    /// Sends attempted during the last run, including failed ones
    pub packets_attempted: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub pacing_halts: u64,
    pub rate_changes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_exhausted_at_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_error: Option<String>,
    pub sink_rx_packets: u64,
    pub sink_rx_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_rx_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rx_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goodput_bps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub stop_time_s: f64,
    pub events_scheduled: u64,
    pub events_executed: u64,
    pub events_cancelled: u64,
    pub flows: Vec<FlowReport>,
}

impl ScenarioReport {
    pub fn flow(&self, name: &str) -> Option<&FlowReport> {
        self.flows.iter().find(|flow| flow.name == name)
    }

    /// Write the report as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Wrote report to {:?}", path);
        Ok(())
    }

    /// Log one summary line per flow
    pub fn log_summary(&self) {
        info!(
            "Scenario '{}' finished at {:.3}s ({} events executed, {} cancelled)",
            self.scenario, self.stop_time_s, self.events_executed, self.events_cancelled
        );
        for flow in &self.flows {
            let goodput = flow
                .goodput_bps
                .map(|bps| format!("{:.0} bps", bps))
                .unwrap_or_else(|| "n/a".to_string());
            info!(
                "  {} ({} -> {}): sent {} pkts / {} B, errors {}, sink received {} pkts, goodput {}",
                flow.name,
                flow.kind,
                flow.sink,
                flow.packets_sent,
                flow.bytes_sent,
                flow.send_errors,
                flow.sink_rx_packets,
                goodput
            );
        }
    }
}
