//! Receiving applications and the address table that routes to them.

use log::debug;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::rc::Rc;

use super::endpoint::SocketKind;
use super::error::AddressError;
use super::packet::Packet;
use crate::sim::SimTime;

/// A sink shared between the registry, the sockets delivering into it and
/// whoever reports on it.
pub type SharedSink = Rc<RefCell<PacketSink>>;

/// Counts everything delivered to one address.
#[derive(Debug, Clone, Serialize)]
pub struct PacketSink {
    pub local: SocketAddrV4,
    pub kind: SocketKind,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub first_rx: Option<SimTime>,
    pub last_rx: Option<SimTime>,
}

impl PacketSink {
    pub fn new(local: SocketAddrV4, kind: SocketKind) -> Self {
        Self {
            local,
            kind,
            rx_packets: 0,
            rx_bytes: 0,
            first_rx: None,
            last_rx: None,
        }
    }

    pub fn receive(&mut self, packet: &Packet) {
        self.rx_packets += 1;
        self.rx_bytes += u64::from(packet.size);
        self.first_rx.get_or_insert(packet.created_at);
        self.last_rx = Some(packet.created_at);
    }

    /// Mean receive rate between the first and last packet, in bits per second.
    pub fn goodput_bps(&self) -> Option<f64> {
        let (first, last) = (self.first_rx?, self.last_rx?);
        let span = (last - first).as_secs_f64();
        if span > 0.0 {
            Some(self.rx_bytes as f64 * 8.0 / span)
        } else {
            None
        }
    }
}

/// Address table of installed sinks.
#[derive(Debug, Default)]
pub struct SinkRegistry {
    sinks: RefCell<HashMap<SocketAddrV4, SharedSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a sink on `addr`. Each address hosts at most one sink.
    pub fn install(&self, addr: SocketAddrV4, kind: SocketKind) -> Result<SharedSink, AddressError> {
        let mut sinks = self.sinks.borrow_mut();
        if sinks.contains_key(&addr) {
            return Err(AddressError::SinkInUse(addr));
        }
        let sink = Rc::new(RefCell::new(PacketSink::new(addr, kind)));
        sinks.insert(addr, Rc::clone(&sink));
        debug!("Installed {} sink on {}", kind, addr);
        Ok(sink)
    }

    pub fn lookup(&self, addr: &SocketAddrV4) -> Option<SharedSink> {
        self.sinks.borrow().get(addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.sinks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.borrow().is_empty()
    }
}
