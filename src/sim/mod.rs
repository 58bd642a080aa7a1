//! Discrete-event simulation core.
//!
//! This module provides the clock and event queue that simulation
//! applications run on. Applications only see the [`Scheduler`] trait;
//! the [`Simulator`] is the concrete single-threaded implementation used
//! by the scenario driver and the tests.

pub mod event;
pub mod simulator;
pub mod time;

// Re-export commonly used types
pub use event::{EventId, EventState};
pub use simulator::{Callback, Scheduler, SimStats, Simulator};
pub use time::SimTime;
