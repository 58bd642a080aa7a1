//! Hook points for statistics and tracing collaborators.

use super::data_rate::DataRate;
use super::error::GeneratorError;
use crate::net::{Packet, TransportError};
use crate::sim::SimTime;

/// Lifecycle state of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Stopped,
    Running,
}

/// Receives notifications from a [`PacedGenerator`](super::PacedGenerator).
///
/// Every method defaults to a no-op. Hooks run after the generator has
/// released its state, so they may query it or change its rate; anything
/// they trigger is delivered once the current hook returns.
pub trait PacingObserver {
    /// A packet was accepted by the endpoint.
    fn on_packet_sent(&mut self, _at: SimTime, _packet: &Packet) {}

    /// The endpoint refused a packet. Pacing continues.
    fn on_send_error(&mut self, _at: SimTime, _packet: &Packet, _error: &TransportError) {}

    /// Self-rescheduling stopped for a reason other than budget exhaustion or `stop`.
    fn on_pacing_halted(&mut self, _at: SimTime, _reason: &GeneratorError) {}

    /// The packet budget was used up; no further sends are scheduled.
    fn on_budget_exhausted(&mut self, _at: SimTime, _packets_sent: u64) {}

    fn on_rate_changed(&mut self, _old: DataRate, _new: DataRate) {}

    fn on_state_changed(&mut self, _at: SimTime, _state: GeneratorState) {}
}
