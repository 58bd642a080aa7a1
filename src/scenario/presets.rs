//! Built-in scenarios.
//!
//! `tcp-variants` reproduces the two-flow dumbbell run: a TCP flow from 1 s
//! to 20 s and a UDP flow from 20 s to 60 s whose rate is raised to 10 Mbps
//! at 30 s. `paced-single` is one 100 kbps flow, and `rate-step` exercises
//! a rate change landing between two sends.

use super::config::{Config, FlowConfig, GeneralConfig, NetworkConfig, RateChangeConfig};
use crate::app::DataRate;
use crate::net::SocketKind;

const PRESETS: &[(&str, &str)] = &[
    (
        "tcp-variants",
        "TCP 1040 B x 1000 @ 2Mbps (1s-20s) and UDP 1040 B x 1000 @ 5Mbps (20s-60s), UDP raised to 10Mbps at 30s",
    ),
    ("paced-single", "one UDP flow, 1040 B x 1000 @ 100kbps"),
    (
        "rate-step",
        "one unbounded UDP flow, 1000 B @ 250kbps raised to 500kbps at 40ms",
    ),
];

/// Names of all built-in scenarios.
pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|(name, _)| *name).collect()
}

/// `(name, description)` pairs for listing.
pub fn preset_descriptions() -> &'static [(&'static str, &'static str)] {
    PRESETS
}

pub fn preset(name: &str) -> Option<Config> {
    match name {
        "tcp-variants" => Some(tcp_variants()),
        "paced-single" => Some(paced_single()),
        "rate-step" => Some(rate_step()),
        _ => None,
    }
}

fn tcp_variants() -> Config {
    Config {
        general: GeneralConfig {
            stop_time: "60s".to_string(),
            ..GeneralConfig::default()
        },
        network: Some(NetworkConfig::default()),
        flows: vec![
            FlowConfig {
                name: "tcp".to_string(),
                kind: SocketKind::Tcp,
                sink: "10.1.1.3:8080".to_string(),
                packet_size: 1040,
                packet_budget: 1000,
                rate: DataRate::from_mbps(2),
                start: "1s".to_string(),
                stop: Some("20s".to_string()),
                rate_change: None,
                loss: None,
            },
            FlowConfig {
                name: "udp".to_string(),
                kind: SocketKind::Udp,
                sink: "10.1.1.4:8081".to_string(),
                packet_size: 1040,
                packet_budget: 1000,
                rate: DataRate::from_mbps(5),
                start: "20s".to_string(),
                stop: Some("60s".to_string()),
                rate_change: Some(RateChangeConfig {
                    at: "30s".to_string(),
                    rate: DataRate::from_mbps(10),
                }),
                loss: None,
            },
        ],
    }
}

fn paced_single() -> Config {
    Config {
        general: GeneralConfig {
            // 1000 packets at 83.2 ms end just past 83.1 s.
            stop_time: "90s".to_string(),
            ..GeneralConfig::default()
        },
        network: None,
        flows: vec![FlowConfig {
            name: "paced".to_string(),
            kind: SocketKind::Udp,
            sink: "auto".to_string(),
            packet_size: 1040,
            packet_budget: 1000,
            rate: DataRate::from_kbps(100),
            start: "0s".to_string(),
            stop: None,
            rate_change: None,
            loss: None,
        }],
    }
}

fn rate_step() -> Config {
    Config {
        general: GeneralConfig {
            stop_time: "100ms".to_string(),
            trace: Some(true),
            ..GeneralConfig::default()
        },
        network: None,
        flows: vec![FlowConfig {
            name: "step".to_string(),
            kind: SocketKind::Udp,
            sink: "auto".to_string(),
            packet_size: 1000,
            packet_budget: 0,
            rate: DataRate::from_kbps(250),
            start: "0s".to_string(),
            stop: None,
            rate_change: Some(RateChangeConfig {
                at: "40ms".to_string(),
                rate: DataRate::from_kbps(500),
            }),
            loss: None,
        }],
    }
}
