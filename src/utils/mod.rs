//! Shared utilities.

pub mod duration;

pub use duration::parse_sim_duration;
