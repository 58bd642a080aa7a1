//! Discrete-event scheduler.
//!
//! Events are boxed callbacks ordered by due time, with insertion order
//! breaking ties so that events scheduled for the same instant run FIFO.
//! Cancellation is lazy: cancelled entries stay in the heap and are
//! skipped when they reach the front.

use super::event::{EventId, EventState};
use super::time::SimTime;
use log::{debug, trace};
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::Rc;

/// Callback run when an event fires. It receives the scheduler so that it
/// can enqueue follow-up events.
pub type Callback = Box<dyn FnOnce(&mut dyn Scheduler)>;

/// The scheduling surface consumed by simulation applications.
pub trait Scheduler {
    /// Current simulated time.
    fn now(&self) -> SimTime;

    /// Schedule `callback` to run `delay` after [`now`](Scheduler::now).
    fn schedule(&mut self, delay: SimTime, callback: Callback) -> EventId;

    /// Schedule `callback` at an absolute time. Times in the past run at `now`.
    fn schedule_at(&mut self, at: SimTime, callback: Callback) -> EventId;

    /// Cancel a queued event. Fired or already cancelled events are ignored.
    /// Cancelling through [`EventId::cancel`] directly has the same effect.
    fn cancel(&mut self, event: &EventId);
}

struct QueuedEvent {
    at: SimTime,
    seq: u64,
    state: Rc<Cell<EventState>>,
    callback: Callback,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    // BinaryHeap is a max-heap; invert so the earliest (then oldest) event is on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Counters describing a run. `cancelled` counts every queue entry that
/// was cancelled before it fired, however the cancellation was made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub scheduled: u64,
    pub executed: u64,
    pub cancelled: u64,
}

/// Single-threaded event loop.
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    queue: BinaryHeap<QueuedEvent>,
    stats: SimStats,
    // Cancelled entries already popped and discarded.
    discarded: u64,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SimStats {
        let queued = self
            .queue
            .iter()
            .filter(|event| event.state.get() == EventState::Cancelled)
            .count() as u64;
        SimStats {
            cancelled: self.discarded + queued,
            ..self.stats
        }
    }

    /// Events still waiting to fire (cancelled entries excluded).
    pub fn pending_events(&self) -> usize {
        self.queue
            .iter()
            .filter(|event| event.state.get() == EventState::Pending)
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_events() == 0
    }

    /// Run until the queue drains.
    pub fn run(&mut self) {
        self.run_inner(None);
    }

    /// Run every event due at or before `limit`, then advance the clock to `limit`.
    pub fn run_until(&mut self, limit: SimTime) {
        self.run_inner(Some(limit));
        if self.now < limit {
            self.now = limit;
        }
    }

    fn run_inner(&mut self, limit: Option<SimTime>) {
        debug!("Simulator running from {} (limit: {:?})", self.now, limit.map(|t| t.to_string()));

        loop {
            let due = match self.queue.peek() {
                Some(next) => next.at,
                None => break,
            };
            if limit.is_some_and(|limit| due > limit) {
                break;
            }
            let Some(event) = self.queue.pop() else { break };

            if event.state.get() != EventState::Pending {
                trace!("Skipping cancelled event #{} at {}", event.seq, event.at);
                self.discarded += 1;
                continue;
            }

            self.now = event.at;
            event.state.set(EventState::Fired);
            self.stats.executed += 1;
            trace!("Executing event #{} at {}", event.seq, event.at);
            (event.callback)(self);
        }

        let stats = self.stats();
        debug!(
            "Simulator paused at {} ({} executed, {} cancelled, {} pending)",
            self.now,
            stats.executed,
            stats.cancelled,
            self.pending_events()
        );
    }
}

impl Scheduler for Simulator {
    fn now(&self) -> SimTime {
        self.now
    }

    fn schedule(&mut self, delay: SimTime, callback: Callback) -> EventId {
        let at = self.now.saturating_add(delay);
        self.schedule_at(at, callback)
    }

    fn schedule_at(&mut self, at: SimTime, callback: Callback) -> EventId {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq += 1;

        let event = EventId::new(seq, at);
        self.queue.push(QueuedEvent {
            at,
            seq,
            state: event.shared_state(),
            callback,
        });
        self.stats.scheduled += 1;
        trace!("Scheduled event #{} for {}", seq, at);
        event
    }

    fn cancel(&mut self, event: &EventId) {
        if event.cancel() {
            trace!("Cancelled event #{} due at {}", event.id(), event.at());
        }
    }
}
