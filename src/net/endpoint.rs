//! The transport surface a traffic generator writes into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddrV4;

use super::error::TransportError;
use super::packet::Packet;

/// Socket flavour of an endpoint.
///
/// Kept for labelling and sink matching only: no congestion control or
/// retransmission is modelled for either kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketKind {
    #[default]
    Tcp,
    Udp,
}

impl SocketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketKind::Tcp => "tcp",
            SocketKind::Udp => "udp",
        }
    }
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A send path to a single destination.
///
/// An endpoint is owned by exactly one application between its start and
/// stop. Implementations must make `close` idempotent.
pub trait Endpoint {
    fn kind(&self) -> SocketKind;

    fn bind(&mut self) -> Result<(), TransportError>;

    fn connect(&mut self, peer: SocketAddrV4) -> Result<(), TransportError>;

    /// Hand one packet to the transport. Returns the number of bytes accepted.
    fn send(&mut self, packet: &Packet) -> Result<usize, TransportError>;

    fn close(&mut self);

    /// True while bound or connected.
    fn is_open(&self) -> bool;
}
