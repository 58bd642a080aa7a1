//! In-memory sockets delivering straight into a [`PacketSink`](super::PacketSink).

use log::trace;
use std::net::SocketAddrV4;
use std::rc::Rc;

use super::endpoint::{Endpoint, SocketKind};
use super::error::TransportError;
use super::error_model::ErrorModel;
use super::packet::Packet;
use super::sink::{SharedSink, SinkRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Idle,
    Bound,
    Connected,
    Closed,
}

/// Zero-delay endpoint: a successful send is counted by the peer sink
/// before `send` returns.
pub struct MemorySocket {
    kind: SocketKind,
    registry: Rc<SinkRegistry>,
    state: SocketState,
    peer: Option<SharedSink>,
    error_model: Option<ErrorModel>,
    tx_packets: u64,
    tx_bytes: u64,
}

impl MemorySocket {
    pub fn new(kind: SocketKind, registry: Rc<SinkRegistry>) -> Self {
        Self {
            kind,
            registry,
            state: SocketState::Idle,
            peer: None,
            error_model: None,
            tx_packets: 0,
            tx_bytes: 0,
        }
    }

    pub fn with_error_model(mut self, model: ErrorModel) -> Self {
        self.error_model = Some(model);
        self
    }

    pub fn state(&self) -> SocketState {
        self.state
    }

    pub fn tx_packets(&self) -> u64 {
        self.tx_packets
    }

    pub fn tx_bytes(&self) -> u64 {
        self.tx_bytes
    }
}

impl Endpoint for MemorySocket {
    fn kind(&self) -> SocketKind {
        self.kind
    }

    fn bind(&mut self) -> Result<(), TransportError> {
        match self.state {
            SocketState::Idle | SocketState::Closed => {
                self.state = SocketState::Bound;
                Ok(())
            }
            SocketState::Bound | SocketState::Connected => Err(TransportError::AlreadyBound),
        }
    }

    fn connect(&mut self, peer: SocketAddrV4) -> Result<(), TransportError> {
        match self.state {
            SocketState::Bound => {}
            SocketState::Connected => return Err(TransportError::AlreadyBound),
            SocketState::Idle => return Err(TransportError::NotBound),
            SocketState::Closed => return Err(TransportError::Closed),
        }

        let sink = self.registry.lookup(&peer).ok_or(TransportError::NoRoute(peer))?;
        let expected = sink.borrow().kind;
        if expected != self.kind {
            return Err(TransportError::ProtocolMismatch {
                addr: peer,
                expected,
                actual: self.kind,
            });
        }

        self.peer = Some(sink);
        self.state = SocketState::Connected;
        Ok(())
    }

    fn send(&mut self, packet: &Packet) -> Result<usize, TransportError> {
        let sink = match (self.state, &self.peer) {
            (SocketState::Connected, Some(sink)) => sink,
            (SocketState::Closed, _) => return Err(TransportError::Closed),
            _ => return Err(TransportError::NotConnected),
        };

        if let Some(model) = self.error_model.as_mut() {
            if model.should_drop() {
                trace!("Dropping packet {} at {}", packet.seq, packet.created_at);
                return Err(TransportError::Dropped { seq: packet.seq });
            }
        }

        sink.borrow_mut().receive(packet);
        self.tx_packets += 1;
        self.tx_bytes += u64::from(packet.size);
        Ok(packet.size as usize)
    }

    fn close(&mut self) {
        self.peer = None;
        if self.state != SocketState::Idle {
            self.state = SocketState::Closed;
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.state, SocketState::Bound | SocketState::Connected)
    }
}
