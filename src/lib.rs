//! # PaceSim - Rate-paced traffic generation for discrete-event simulations
//!
//! This library provides a self-pacing traffic generator that runs inside a
//! single-threaded discrete-event scheduler, together with the scenario
//! driver that wires generators to packet sinks and runs them.
//!
//! ## Overview
//!
//! A generator sends fixed-size packets to one destination and reschedules
//! its own next send from the packet size and its current bit rate. The
//! rate can be changed at any time: the send already queued keeps its
//! time, and the new rate shapes the gap computed when that send fires.
//! Stopping or dropping a generator cancels its queued send.
//!
//! ## Key Features
//!
//! - **Deterministic scheduling**: nanosecond clock, FIFO ordering for events due at the same instant
//! - **Lagged rate changes**: a rate change applies from the next scheduling decision
//! - **Packet budgets**: bounded or unbounded flows
//! - **Seeded loss**: optional per-flow drop probability for exercising send failures
//! - **Reports and traces**: JSON flow statistics and a tab-separated packet trace
//!
//! ## Architecture
//!
//! - `sim`: simulated time, event handles and the event loop
//! - `net`: packets, endpoints, in-memory sockets, sinks and address allocation
//! - `app`: data rates and the paced generator
//! - `scenario`: YAML scenarios, presets, the driver, statistics and reports
//! - `utils`: duration parsing
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pacesim::scenario::{load_config, ScenarioDriver};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scenario.yaml"))?;
//! let outcome = ScenarioDriver::new("scenario", config).run()?;
//! outcome.report.write_json(Path::new("report.json"))?;
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   stop_time: "60s"
//!   log_level: info
//!   trace: true
//!
//! flows:
//!   - name: udp
//!     kind: udp
//!     sink: "10.1.1.4:8081"   # or auto
//!     packet_size: 1040
//!     packet_budget: 1000     # 0 = unbounded
//!     rate: "5Mbps"
//!     start: "20s"
//!     stop: "60s"
//!     rate_change:
//!       at: "30s"
//!       rate: "10Mbps"
//! ```
//!
//! ## Error Handling
//!
//! Generator, transport and configuration errors are typed with `thiserror`.
//! The loader, driver and binary return `color_eyre::Result` with context.

pub mod app;
pub mod net;
pub mod scenario;
pub mod sim;
pub mod utils;
