//! Handles to scheduled events.

use super::time::SimTime;
use std::cell::Cell;
use std::rc::Rc;

/// Lifecycle of a queued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Pending,
    Fired,
    Cancelled,
}

/// Handle to an event sitting in a [`Simulator`](super::Simulator) queue.
///
/// The handle shares its state cell with the queue entry, so an owner can
/// cancel its event without holding the scheduler (e.g. from `Drop`).
/// Cancelling an event that already fired or was already cancelled does
/// nothing.
#[derive(Debug, Clone)]
pub struct EventId {
    id: u64,
    at: SimTime,
    state: Rc<Cell<EventState>>,
}

impl EventId {
    pub(crate) fn new(id: u64, at: SimTime) -> Self {
        Self {
            id,
            at,
            state: Rc::new(Cell::new(EventState::Pending)),
        }
    }

    pub(crate) fn shared_state(&self) -> Rc<Cell<EventState>> {
        Rc::clone(&self.state)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Absolute time the event is due.
    pub fn at(&self) -> SimTime {
        self.at
    }

    pub fn state(&self) -> EventState {
        self.state.get()
    }

    /// True until the event fires or is cancelled.
    pub fn is_pending(&self) -> bool {
        self.state.get() == EventState::Pending
    }

    /// Returns true if this call transitioned the event to cancelled.
    pub fn cancel(&self) -> bool {
        if self.is_pending() {
            self.state.set(EventState::Cancelled);
            true
        } else {
            false
        }
    }
}

impl PartialEq for EventId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventId {}
