//! The rate-paced traffic generator.
//!
//! A [`PacedGenerator`] sends fixed-size packets to one destination and
//! paces itself: every send computes the gap to the next one from the
//! packet size and the rate *in effect at that moment*, then schedules
//! itself again. A rate change therefore never touches the send that is
//! already queued; it shapes the gap computed when that send fires.
//!
//! The generator is a cheap cloneable handle over shared state. Queued
//! send events hold only a weak reference, and dropping the last handle
//! cancels the pending event, so the scheduler never runs a send for a
//! generator that no longer exists.
//!
//! Observer notifications are queued while the generator's state is
//! borrowed and delivered once it is released, so observers may read the
//! generator or change its rate from inside a hook.

use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddrV4;
use std::rc::{Rc, Weak};

use super::data_rate::DataRate;
use super::error::GeneratorError;
use super::observer::{GeneratorState, PacingObserver};
use crate::net::{Endpoint, Packet, TransportError};
use crate::sim::{EventId, Scheduler, SimTime};

/// Static parameters of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Bytes per packet. Must be positive.
    pub packet_size: u32,
    /// Maximum packets per run; 0 means unbounded.
    pub packet_budget: u64,
    /// Initial rate. Zero is accepted here but halts pacing after the first send.
    pub rate: DataRate,
}

impl GeneratorConfig {
    pub fn new(packet_size: u32, packet_budget: u64, rate: DataRate) -> Self {
        Self {
            packet_size,
            packet_budget,
            rate,
        }
    }

    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.packet_size == 0 {
            return Err(GeneratorError::InvalidConfig(
                "packet size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A notification waiting to be delivered to the observers.
enum Notice {
    PacketSent(SimTime, Packet),
    SendError(SimTime, Packet, TransportError),
    PacingHalted(SimTime, GeneratorError),
    BudgetExhausted(SimTime, u64),
    RateChanged(DataRate, DataRate),
    StateChanged(SimTime, GeneratorState),
}

impl Notice {
    fn deliver(&self, observer: &mut dyn PacingObserver) {
        match self {
            Notice::PacketSent(at, packet) => observer.on_packet_sent(*at, packet),
            Notice::SendError(at, packet, error) => observer.on_send_error(*at, packet, error),
            Notice::PacingHalted(at, reason) => observer.on_pacing_halted(*at, reason),
            Notice::BudgetExhausted(at, sent) => observer.on_budget_exhausted(*at, *sent),
            Notice::RateChanged(old, new) => observer.on_rate_changed(*old, *new),
            Notice::StateChanged(at, state) => observer.on_state_changed(*at, *state),
        }
    }
}

#[derive(Default)]
struct Observers {
    list: RefCell<Vec<Box<dyn PacingObserver>>>,
    backlog: RefCell<VecDeque<Notice>>,
}

impl Observers {
    fn publish(&self, notices: Vec<Notice>) {
        if notices.is_empty() {
            return;
        }
        self.backlog.borrow_mut().extend(notices);

        // A delivery further up the stack drains the backlog.
        let Ok(mut list) = self.list.try_borrow_mut() else {
            return;
        };
        loop {
            let next = self.backlog.borrow_mut().pop_front();
            let Some(notice) = next else { break };
            for observer in list.iter_mut() {
                notice.deliver(observer.as_mut());
            }
        }
    }
}

struct Inner {
    name: String,
    endpoint: Option<Box<dyn Endpoint>>,
    peer: Option<SocketAddrV4>,
    packet_size: u32,
    packet_budget: u64,
    rate: DataRate,
    packets_sent: u64,
    pending_event: Option<EventId>,
    state: GeneratorState,
    // Bumped on every start; send events from an earlier run are ignored.
    epoch: u64,
    observers: Rc<Observers>,
}

impl Inner {
    fn budget_exhausted(&self) -> bool {
        self.packet_budget != 0 && self.packets_sent >= self.packet_budget
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(event) = self.pending_event.take() {
            if event.cancel() {
                debug!("{} dropped; cancelled send due at {}", self.name, event.at());
            }
        }
        if let Some(endpoint) = self.endpoint.as_mut() {
            if endpoint.is_open() {
                endpoint.close();
            }
        }
    }
}

/// Handle to a rate-paced generator. Clones share the same generator.
#[derive(Clone)]
pub struct PacedGenerator {
    inner: Rc<RefCell<Inner>>,
}

impl PacedGenerator {
    /// Create an unconfigured, stopped generator.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                name: name.into(),
                endpoint: None,
                peer: None,
                packet_size: 0,
                packet_budget: 0,
                rate: DataRate::default(),
                packets_sent: 0,
                pending_event: None,
                state: GeneratorState::Stopped,
                epoch: 0,
                observers: Rc::new(Observers::default()),
            })),
        }
    }

    /// Register an observer. Must not be called from inside an observer hook.
    pub fn add_observer(&self, observer: Box<dyn PacingObserver>) {
        self.inner.borrow().observers.list.borrow_mut().push(observer);
    }

    /// Attach the endpoint and flow parameters.
    ///
    /// Fails with [`GeneratorError::InvalidState`] while running (including
    /// a run whose budget is spent but which has not been stopped) and with
    /// [`GeneratorError::InvalidConfig`] for a zero packet size. On failure
    /// the previous configuration is kept.
    pub fn configure(
        &self,
        endpoint: Box<dyn Endpoint>,
        peer: SocketAddrV4,
        config: GeneratorConfig,
    ) -> Result<(), GeneratorError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;

        if inner.state == GeneratorState::Running {
            return Err(GeneratorError::InvalidState(format!(
                "{} cannot be reconfigured while running",
                inner.name
            )));
        }
        config.validate()?;

        if let Some(previous) = inner.endpoint.as_mut() {
            if previous.is_open() {
                previous.close();
            }
        }

        inner.endpoint = Some(endpoint);
        inner.peer = Some(peer);
        inner.packet_size = config.packet_size;
        inner.packet_budget = config.packet_budget;
        inner.rate = config.rate;

        debug!(
            "Configured {}: {} B packets to {}, budget {}, rate {}",
            inner.name,
            inner.packet_size,
            peer,
            if inner.packet_budget == 0 {
                "unbounded".to_string()
            } else {
                inner.packet_budget.to_string()
            },
            inner.rate
        );
        Ok(())
    }

    /// Bind and connect the endpoint, send the first packet immediately and
    /// schedule the next one.
    ///
    /// A bind or connect failure is returned as [`GeneratorError::Transport`]
    /// and leaves the generator stopped.
    pub fn start(&self, sched: &mut dyn Scheduler) -> Result<(), GeneratorError> {
        let notices = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;

            if inner.state == GeneratorState::Running {
                return Err(GeneratorError::InvalidState(format!(
                    "{} is already running",
                    inner.name
                )));
            }
            let peer = inner.peer.ok_or_else(|| {
                GeneratorError::InvalidState(format!("{} has not been configured", inner.name))
            })?;
            let endpoint = inner.endpoint.as_mut().ok_or_else(|| {
                GeneratorError::InvalidState(format!("{} has no endpoint", inner.name))
            })?;

            endpoint.bind()?;
            if let Err(error) = endpoint.connect(peer) {
                endpoint.close();
                return Err(error.into());
            }

            inner.state = GeneratorState::Running;
            inner.packets_sent = 0;
            inner.epoch += 1;

            let now = sched.now();
            info!(
                "{} started at {}: {} B packets at {} to {}",
                inner.name, now, inner.packet_size, inner.rate, peer
            );
            vec![Notice::StateChanged(now, GeneratorState::Running)]
        };
        Self::publish(&self.inner, notices);

        Self::send_and_reschedule(&self.inner, sched);
        Ok(())
    }

    /// Cancel the pending send and close the endpoint. Idempotent, and a
    /// no-op on a generator that never started.
    pub fn stop(&self, sched: &mut dyn Scheduler) {
        let mut notices = Vec::new();
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            Self::stop_locked(inner, sched, &mut notices);
        }
        Self::publish(&self.inner, notices);
    }

    fn stop_locked(inner: &mut Inner, sched: &mut dyn Scheduler, notices: &mut Vec<Notice>) {
        if let Some(event) = inner.pending_event.take() {
            debug!("{} cancelling send due at {}", inner.name, event.at());
            sched.cancel(&event);
        }
        if let Some(endpoint) = inner.endpoint.as_mut() {
            if endpoint.is_open() {
                endpoint.close();
            }
        }

        if inner.state == GeneratorState::Running {
            inner.state = GeneratorState::Stopped;
            let now = sched.now();
            info!("{} stopped at {} after {} packets", inner.name, now, inner.packets_sent);
            notices.push(Notice::StateChanged(now, GeneratorState::Stopped));
        }
    }

    /// Replace the rate.
    ///
    /// The send already queued keeps the time it was scheduled for; the new
    /// rate applies from the gap computed when that send fires. Valid in any
    /// state, including after `stop`.
    pub fn set_rate(&self, rate: DataRate) -> Result<(), GeneratorError> {
        if rate.is_zero() {
            return Err(GeneratorError::InvalidConfig(
                "rate must be positive".to_string(),
            ));
        }

        let old = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.rate;
            inner.rate = rate;

            match &inner.pending_event {
                Some(event) => debug!(
                    "{} rate {} -> {}; send due at {} unchanged",
                    inner.name,
                    old,
                    rate,
                    event.at()
                ),
                None => debug!("{} rate {} -> {}", inner.name, old, rate),
            }
            old
        };
        Self::publish(&self.inner, vec![Notice::RateChanged(old, rate)]);
        Ok(())
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn packets_sent(&self) -> u64 {
        self.inner.borrow().packets_sent
    }

    pub fn rate(&self) -> DataRate {
        self.inner.borrow().rate
    }

    pub fn packet_size(&self) -> u32 {
        self.inner.borrow().packet_size
    }

    pub fn packet_budget(&self) -> u64 {
        self.inner.borrow().packet_budget
    }

    pub fn peer(&self) -> Option<SocketAddrV4> {
        self.inner.borrow().peer
    }

    pub fn state(&self) -> GeneratorState {
        self.inner.borrow().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == GeneratorState::Running
    }

    pub fn has_pending_event(&self) -> bool {
        self.inner
            .borrow()
            .pending_event
            .as_ref()
            .is_some_and(EventId::is_pending)
    }

    /// Due time of the queued send, if any.
    pub fn next_send_at(&self) -> Option<SimTime> {
        self.inner
            .borrow()
            .pending_event
            .as_ref()
            .filter(|event| event.is_pending())
            .map(EventId::at)
    }

    fn on_send_event(weak: &Weak<RefCell<Inner>>, epoch: u64, sched: &mut dyn Scheduler) {
        let Some(this) = weak.upgrade() else {
            debug!("Send event fired after its generator was dropped; ignoring");
            return;
        };
        {
            let inner = this.borrow();
            if inner.epoch != epoch || inner.state != GeneratorState::Running {
                debug!("{} ignoring stale send event", inner.name);
                return;
            }
        }
        Self::send_and_reschedule(&this, sched);
    }

    fn publish(this: &Rc<RefCell<Inner>>, notices: Vec<Notice>) {
        let observers = Rc::clone(&this.borrow().observers);
        observers.publish(notices);
    }

    fn send_and_reschedule(this: &Rc<RefCell<Inner>>, sched: &mut dyn Scheduler) {
        let mut notices = Vec::new();
        Self::send_next(this, sched, &mut notices);
        Self::publish(this, notices);
    }

    fn send_next(this: &Rc<RefCell<Inner>>, sched: &mut dyn Scheduler, notices: &mut Vec<Notice>) {
        let mut guard = this.borrow_mut();
        let inner = &mut *guard;

        if inner.state != GeneratorState::Running {
            return;
        }
        // Whatever brought us here has fired.
        inner.pending_event = None;

        let now = sched.now();
        let packet = Packet::new(inner.packets_sent, inner.packet_size, now);
        let result = match inner.endpoint.as_mut() {
            Some(endpoint) => endpoint.send(&packet),
            None => Err(TransportError::NotConnected),
        };
        inner.packets_sent += 1;
        match result {
            Ok(_) => notices.push(Notice::PacketSent(now, packet)),
            Err(error) => {
                warn!(
                    "{} failed to send packet {} at {}: {}",
                    inner.name, packet.seq, now, error
                );
                notices.push(Notice::SendError(now, packet, error));
            }
        }

        if inner.budget_exhausted() {
            let sent = inner.packets_sent;
            debug!("{} spent its budget of {} packets at {}", inner.name, sent, now);
            notices.push(Notice::BudgetExhausted(now, sent));
            return;
        }

        // The rate is read here and nowhere else.
        let Some(gap) = inner.rate.transmit_time(inner.packet_size) else {
            let reason = GeneratorError::InvalidConfig(format!(
                "{} has a zero rate; cannot schedule the next send",
                inner.name
            ));
            warn!("{} halted pacing at {}: {}", inner.name, now, reason);
            notices.push(Notice::PacingHalted(now, reason));
            return;
        };
        if now.checked_add(gap).is_none() {
            let reason = GeneratorError::InvalidConfig(format!(
                "{} next send falls past the end of simulated time ({} + {})",
                inner.name, now, gap
            ));
            warn!("{} halted pacing at {}: {}", inner.name, now, reason);
            notices.push(Notice::PacingHalted(now, reason));
            return;
        }

        let weak = Rc::downgrade(this);
        let epoch = inner.epoch;
        let event = sched.schedule(
            gap,
            Box::new(move |sched: &mut dyn Scheduler| Self::on_send_event(&weak, epoch, sched)),
        );
        debug!(
            "{} queued packet {} for {} (gap {} at {})",
            inner.name,
            inner.packets_sent,
            event.at(),
            gap,
            inner.rate
        );
        inner.pending_event = Some(event);
    }
}

impl fmt::Debug for PacedGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("PacedGenerator")
            .field("name", &inner.name)
            .field("peer", &inner.peer)
            .field("packet_size", &inner.packet_size)
            .field("packet_budget", &inner.packet_budget)
            .field("rate", &inner.rate)
            .field("packets_sent", &inner.packets_sent)
            .field("state", &inner.state)
            .field("next_send_at", &inner.pending_event.as_ref().map(EventId::at))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{MemorySocket, SharedSink, SinkRegistry, SocketKind};
    use crate::sim::Simulator;
    use std::net::Ipv4Addr;

    fn sink_addr() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 3), 8080)
    }

    fn wired(packet_size: u32, budget: u64, rate: DataRate) -> (PacedGenerator, SharedSink) {
        let registry = Rc::new(SinkRegistry::new());
        let sink = registry.install(sink_addr(), SocketKind::Udp).unwrap();
        let generator = PacedGenerator::new("flow");
        generator
            .configure(
                Box::new(MemorySocket::new(SocketKind::Udp, registry)),
                sink_addr(),
                GeneratorConfig::new(packet_size, budget, rate),
            )
            .unwrap();
        (generator, sink)
    }

    #[derive(Default)]
    struct Seen {
        sent: Vec<SimTime>,
        errors: usize,
        halts: usize,
        exhausted: Option<u64>,
        states: Vec<GeneratorState>,
    }

    struct Recorder(Rc<RefCell<Seen>>);

    impl PacingObserver for Recorder {
        fn on_packet_sent(&mut self, at: SimTime, _packet: &Packet) {
            self.0.borrow_mut().sent.push(at);
        }
        fn on_send_error(&mut self, _at: SimTime, _packet: &Packet, _error: &TransportError) {
            self.0.borrow_mut().errors += 1;
        }
        fn on_pacing_halted(&mut self, _at: SimTime, _reason: &GeneratorError) {
            self.0.borrow_mut().halts += 1;
        }
        fn on_budget_exhausted(&mut self, _at: SimTime, packets_sent: u64) {
            self.0.borrow_mut().exhausted = Some(packets_sent);
        }
        fn on_state_changed(&mut self, _at: SimTime, state: GeneratorState) {
            self.0.borrow_mut().states.push(state);
        }
    }

    fn observe(generator: &PacedGenerator) -> Rc<RefCell<Seen>> {
        let seen = Rc::new(RefCell::new(Seen::default()));
        generator.add_observer(Box::new(Recorder(Rc::clone(&seen))));
        seen
    }

    /// Endpoint whose behaviour is scripted per call.
    struct ScriptedEndpoint {
        fail_bind: bool,
        fail_connect: bool,
        fail_every_other_send: bool,
        sends: u64,
        open: bool,
        closes: Rc<RefCell<u32>>,
    }

    impl ScriptedEndpoint {
        fn new() -> Self {
            Self {
                fail_bind: false,
                fail_connect: false,
                fail_every_other_send: false,
                sends: 0,
                open: false,
                closes: Rc::new(RefCell::new(0)),
            }
        }
    }

    impl Endpoint for ScriptedEndpoint {
        fn kind(&self) -> SocketKind {
            SocketKind::Udp
        }
        fn bind(&mut self) -> Result<(), TransportError> {
            if self.fail_bind {
                return Err(TransportError::AlreadyBound);
            }
            self.open = true;
            Ok(())
        }
        fn connect(&mut self, peer: SocketAddrV4) -> Result<(), TransportError> {
            if self.fail_connect {
                return Err(TransportError::NoRoute(peer));
            }
            Ok(())
        }
        fn send(&mut self, packet: &Packet) -> Result<usize, TransportError> {
            self.sends += 1;
            if self.fail_every_other_send && self.sends % 2 == 0 {
                return Err(TransportError::Dropped { seq: packet.seq });
            }
            Ok(packet.size as usize)
        }
        fn close(&mut self) {
            self.open = false;
            *self.closes.borrow_mut() += 1;
        }
        fn is_open(&self) -> bool {
            self.open
        }
    }

    #[test]
    fn test_configure_rejects_zero_packet_size_and_keeps_previous() {
        let (generator, _sink) = wired(1040, 10, DataRate::from_kbps(100));
        let registry = Rc::new(SinkRegistry::new());
        let err = generator
            .configure(
                Box::new(MemorySocket::new(SocketKind::Udp, registry)),
                sink_addr(),
                GeneratorConfig::new(0, 5, DataRate::from_mbps(1)),
            )
            .unwrap_err();

        assert!(matches!(err, GeneratorError::InvalidConfig(_)));
        assert_eq!(generator.packet_size(), 1040);
        assert_eq!(generator.packet_budget(), 10);
        assert_eq!(generator.rate(), DataRate::from_kbps(100));
    }

    #[test]
    fn test_start_requires_configuration() {
        let mut sim = Simulator::new();
        let generator = PacedGenerator::new("bare");
        assert!(matches!(
            generator.start(&mut sim),
            Err(GeneratorError::InvalidState(_))
        ));
        assert!(!generator.is_running());
    }

    #[test]
    fn test_start_sends_immediately_and_schedules_next() {
        let mut sim = Simulator::new();
        let (generator, sink) = wired(1040, 1000, DataRate::from_kbps(100));

        generator.start(&mut sim).unwrap();

        assert!(generator.is_running());
        assert_eq!(generator.packets_sent(), 1);
        assert_eq!(sink.borrow().rx_packets, 1);
        assert_eq!(generator.next_send_at(), Some(SimTime::from_micros(83_200)));
        assert_eq!(sim.pending_events(), 1);
    }

    #[test]
    fn test_budget_bounds_total_sends() {
        let mut sim = Simulator::new();
        let (generator, sink) = wired(1040, 1000, DataRate::from_kbps(100));
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();
        sim.run();

        assert_eq!(generator.packets_sent(), 1000);
        assert_eq!(sink.borrow().rx_packets, 1000);
        assert_eq!(sink.borrow().last_rx, Some(SimTime::from_micros(83_200 * 999)));
        assert!(!generator.has_pending_event());
        // Budget exhaustion does not stop the generator.
        assert!(generator.is_running());
        assert_eq!(seen.borrow().exhausted, Some(1000));
        assert!(sim.is_idle());
    }

    #[test]
    fn test_budget_of_one_sends_only_the_immediate_packet() {
        let mut sim = Simulator::new();
        let (generator, sink) = wired(500, 1, DataRate::from_mbps(1));

        generator.start(&mut sim).unwrap();

        assert_eq!(generator.packets_sent(), 1);
        assert!(!generator.has_pending_event());
        assert!(sim.is_idle());
        sim.run();
        assert_eq!(sink.borrow().rx_packets, 1);
    }

    #[test]
    fn test_gaps_follow_rate() {
        let mut sim = Simulator::new();
        let (generator, _sink) = wired(1040, 4, DataRate::from_mbps(2));
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();
        sim.run();

        let expected: Vec<SimTime> = (0..4).map(|i| SimTime::from_micros(4_160 * i)).collect();
        assert_eq!(seen.borrow().sent, expected);
    }

    #[test]
    fn test_double_start_is_rejected() {
        let mut sim = Simulator::new();
        let (generator, _sink) = wired(1040, 0, DataRate::from_kbps(100));
        generator.start(&mut sim).unwrap();

        assert!(matches!(
            generator.start(&mut sim),
            Err(GeneratorError::InvalidState(_))
        ));
        assert_eq!(generator.packets_sent(), 1);
        assert_eq!(sim.pending_events(), 1);
    }

    #[test]
    fn test_configure_while_running_is_rejected() {
        let mut sim = Simulator::new();
        let (generator, _sink) = wired(1040, 0, DataRate::from_kbps(100));
        generator.start(&mut sim).unwrap();

        let registry = Rc::new(SinkRegistry::new());
        let err = generator
            .configure(
                Box::new(MemorySocket::new(SocketKind::Udp, registry)),
                sink_addr(),
                GeneratorConfig::new(64, 1, DataRate::from_mbps(1)),
            )
            .unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidState(_)));
        assert_eq!(generator.packet_size(), 1040);
        assert!(generator.has_pending_event());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut sim = Simulator::new();
        let (generator, _sink) = wired(1040, 0, DataRate::from_kbps(100));
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();
        sim.run_until(SimTime::from_millis(100));
        generator.stop(&mut sim);
        generator.stop(&mut sim);

        assert!(!generator.is_running());
        assert!(!generator.has_pending_event());
        assert!(sim.is_idle());
        assert_eq!(
            seen.borrow().states,
            vec![GeneratorState::Running, GeneratorState::Stopped]
        );

        sim.run_until(SimTime::from_secs(10));
        assert_eq!(generator.packets_sent(), 2);
    }

    #[test]
    fn test_stop_on_never_started_generator() {
        let mut sim = Simulator::new();
        let generator = PacedGenerator::new("idle");
        generator.stop(&mut sim);
        assert!(!generator.is_running());

        let (configured, _sink) = wired(100, 0, DataRate::from_mbps(1));
        configured.stop(&mut sim);
        assert_eq!(configured.packets_sent(), 0);
        assert!(sim.is_idle());
    }

    #[test]
    fn test_rate_change_applies_on_next_decision() {
        let mut sim = Simulator::new();
        // 1000 B: 32 ms at 250 kbps, 16 ms at 500 kbps.
        let (generator, _sink) = wired(1000, 0, DataRate::from_kbps(250));
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();
        sim.run_until(SimTime::from_millis(40));
        assert_eq!(generator.next_send_at(), Some(SimTime::from_millis(64)));

        generator.set_rate(DataRate::from_kbps(500)).unwrap();
        // The queued send keeps its time.
        assert_eq!(generator.next_send_at(), Some(SimTime::from_millis(64)));

        sim.run_until(SimTime::from_millis(64));
        assert_eq!(generator.next_send_at(), Some(SimTime::from_millis(80)));

        sim.run_until(SimTime::from_millis(100));
        assert_eq!(
            seen.borrow().sent,
            vec![
                SimTime::ZERO,
                SimTime::from_millis(32),
                SimTime::from_millis(64),
                SimTime::from_millis(80),
                SimTime::from_millis(96),
            ]
        );
    }

    #[test]
    fn test_set_rate_rejects_zero() {
        let (generator, _sink) = wired(1000, 0, DataRate::from_kbps(250));
        assert!(matches!(
            generator.set_rate(DataRate::from_bps(0)),
            Err(GeneratorError::InvalidConfig(_))
        ));
        assert_eq!(generator.rate(), DataRate::from_kbps(250));
    }

    #[test]
    fn test_set_rate_after_stop_only_stores() {
        let mut sim = Simulator::new();
        let (generator, _sink) = wired(1000, 0, DataRate::from_kbps(250));
        generator.start(&mut sim).unwrap();
        generator.stop(&mut sim);

        generator.set_rate(DataRate::from_mbps(1)).unwrap();
        assert_eq!(generator.rate(), DataRate::from_mbps(1));
        assert!(!generator.has_pending_event());
        assert!(sim.is_idle());
    }

    #[test]
    fn test_zero_initial_rate_halts_after_first_send() {
        let mut sim = Simulator::new();
        let (generator, sink) = wired(1000, 0, DataRate::from_bps(0));
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();

        assert_eq!(generator.packets_sent(), 1);
        assert_eq!(sink.borrow().rx_packets, 1);
        assert!(!generator.has_pending_event());
        assert!(sim.is_idle());
        assert_eq!(seen.borrow().halts, 1);
        assert!(generator.is_running());
    }

    #[test]
    fn test_halts_when_next_send_would_pass_end_of_time() {
        let mut sim = Simulator::new();
        // 9.6e9 bits at 1 bps: a 9.6e18 ns gap, so the third send overflows the clock.
        let (generator, sink) = wired(1_200_000_000, 0, DataRate::from_bps(1));
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();
        sim.run();

        let second = SimTime::from_nanos(9_600_000_000_000_000_000);
        assert_eq!(generator.packets_sent(), 2);
        assert_eq!(sink.borrow().rx_packets, 2);
        assert_eq!(seen.borrow().sent, vec![SimTime::ZERO, second]);
        assert_eq!(seen.borrow().halts, 1);
        assert_eq!(sim.now(), second);
        assert!(!generator.has_pending_event());
        assert!(sim.is_idle());
    }

    /// Observer that reads the generator back from inside its hooks.
    struct ReadBack {
        generator: PacedGenerator,
        counts: Rc<RefCell<Vec<u64>>>,
        rates: Rc<RefCell<Vec<DataRate>>>,
    }

    impl PacingObserver for ReadBack {
        fn on_packet_sent(&mut self, _at: SimTime, _packet: &Packet) {
            self.counts.borrow_mut().push(self.generator.packets_sent());
        }
        fn on_budget_exhausted(&mut self, _at: SimTime, _packets_sent: u64) {
            self.generator.set_rate(DataRate::from_mbps(2)).unwrap();
        }
        fn on_rate_changed(&mut self, _old: DataRate, new: DataRate) {
            self.rates.borrow_mut().push(new);
            assert_eq!(self.generator.rate(), new);
        }
    }

    #[test]
    fn test_observers_can_call_back_into_generator() {
        let mut sim = Simulator::new();
        let (generator, _sink) = wired(1250, 3, DataRate::from_mbps(1));
        let counts = Rc::new(RefCell::new(Vec::new()));
        let rates = Rc::new(RefCell::new(Vec::new()));
        generator.add_observer(Box::new(ReadBack {
            generator: generator.clone(),
            counts: Rc::clone(&counts),
            rates: Rc::clone(&rates),
        }));
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();
        sim.run();

        assert_eq!(*counts.borrow(), vec![1, 2, 3]);
        assert_eq!(*rates.borrow(), vec![DataRate::from_mbps(2)]);
        assert_eq!(generator.rate(), DataRate::from_mbps(2));
        // Notices raised from a hook still reach every observer.
        assert_eq!(seen.borrow().exhausted, Some(3));
        assert_eq!(seen.borrow().sent.len(), 3);
    }

    #[test]
    fn test_connect_failure_leaves_generator_stopped() {
        let mut sim = Simulator::new();
        let registry = Rc::new(SinkRegistry::new());
        let generator = PacedGenerator::new("nowhere");
        generator
            .configure(
                Box::new(MemorySocket::new(SocketKind::Tcp, registry)),
                sink_addr(),
                GeneratorConfig::new(1040, 0, DataRate::from_mbps(1)),
            )
            .unwrap();

        let err = generator.start(&mut sim).unwrap_err();
        assert_eq!(err, GeneratorError::Transport(TransportError::NoRoute(sink_addr())));
        assert!(!generator.is_running());
        assert_eq!(generator.packets_sent(), 0);
        assert!(sim.is_idle());
    }

    #[test]
    fn test_bind_failure_leaves_generator_stopped() {
        let mut sim = Simulator::new();
        let generator = PacedGenerator::new("unbindable");
        let mut endpoint = ScriptedEndpoint::new();
        endpoint.fail_bind = true;
        generator
            .configure(
                Box::new(endpoint),
                sink_addr(),
                GeneratorConfig::new(100, 0, DataRate::from_mbps(1)),
            )
            .unwrap();

        assert!(matches!(
            generator.start(&mut sim),
            Err(GeneratorError::Transport(TransportError::AlreadyBound))
        ));
        assert!(!generator.is_running());
    }

    #[test]
    fn test_connect_failure_closes_endpoint() {
        let mut sim = Simulator::new();
        let generator = PacedGenerator::new("refused");
        let mut endpoint = ScriptedEndpoint::new();
        endpoint.fail_connect = true;
        let closes = Rc::clone(&endpoint.closes);
        generator
            .configure(
                Box::new(endpoint),
                sink_addr(),
                GeneratorConfig::new(100, 0, DataRate::from_mbps(1)),
            )
            .unwrap();

        assert!(generator.start(&mut sim).is_err());
        assert_eq!(*closes.borrow(), 1);
    }

    #[test]
    fn test_send_failures_do_not_stop_pacing() {
        let mut sim = Simulator::new();
        let generator = PacedGenerator::new("lossy");
        let mut endpoint = ScriptedEndpoint::new();
        endpoint.fail_every_other_send = true;
        generator
            .configure(
                Box::new(endpoint),
                sink_addr(),
                GeneratorConfig::new(100, 10, DataRate::from_mbps(1)),
            )
            .unwrap();
        let seen = observe(&generator);

        generator.start(&mut sim).unwrap();
        sim.run();

        assert_eq!(generator.packets_sent(), 10);
        assert_eq!(seen.borrow().errors, 5);
        assert_eq!(seen.borrow().sent.len(), 5);
    }

    #[test]
    fn test_drop_cancels_pending_event() {
        let mut sim = Simulator::new();
        let (generator, sink) = wired(1040, 0, DataRate::from_kbps(100));
        generator.start(&mut sim).unwrap();
        assert_eq!(sim.pending_events(), 1);

        drop(generator);
        assert!(sim.is_idle());
        assert_eq!(sim.stats().cancelled, 1);
        sim.run_until(SimTime::from_secs(1));
        assert_eq!(sink.borrow().rx_packets, 1);
    }

    #[test]
    fn test_restart_resets_counter() {
        let mut sim = Simulator::new();
        let (generator, sink) = wired(1000, 3, DataRate::from_mbps(1));

        generator.start(&mut sim).unwrap();
        sim.run();
        assert_eq!(generator.packets_sent(), 3);

        generator.stop(&mut sim);
        generator.start(&mut sim).unwrap();
        assert_eq!(generator.packets_sent(), 1);
        sim.run();
        assert_eq!(generator.packets_sent(), 3);
        assert_eq!(sink.borrow().rx_packets, 6);
    }

    #[test]
    fn test_unbounded_budget_runs_until_horizon() {
        let mut sim = Simulator::new();
        // 1250 B at 1 Mbps: 10 ms gap.
        let (generator, _sink) = wired(1250, 0, DataRate::from_mbps(1));
        generator.start(&mut sim).unwrap();
        sim.run_until(SimTime::from_secs(10));

        assert_eq!(generator.packets_sent(), 1001);
        assert!(generator.has_pending_event());
        assert_eq!(generator.next_send_at(), Some(SimTime::from_millis(10_010)));
    }
}
