//! Transport and addressing errors.

use std::net::{Ipv4Addr, SocketAddrV4};
use thiserror::Error;

use super::endpoint::SocketKind;

/// Failures reported by transport endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("endpoint is already bound")]
    AlreadyBound,
    #[error("endpoint is not bound")]
    NotBound,
    #[error("endpoint is not connected")]
    NotConnected,
    #[error("endpoint is closed")]
    Closed,
    #[error("no sink listening on {0}")]
    NoRoute(SocketAddrV4),
    #[error("sink on {addr} expects {expected} traffic, endpoint is {actual}")]
    ProtocolMismatch {
        addr: SocketAddrV4,
        expected: SocketKind,
        actual: SocketKind,
    },
    #[error("packet {seq} dropped by the error model")]
    Dropped { seq: u64 },
}

/// Address allocation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid network base '{0}'")]
    InvalidBase(String),
    #[error("invalid network mask '{0}'")]
    InvalidMask(String),
    #[error("address pool {network}/{prefix} is exhausted")]
    Exhausted { network: Ipv4Addr, prefix: u32 },
    #[error("address {0} is outside {1}/{2}")]
    OutOfSubnet(Ipv4Addr, Ipv4Addr, u32),
    #[error("address {0} is already assigned")]
    Conflict(Ipv4Addr),
    #[error("sink address {0} is already in use")]
    SinkInUse(SocketAddrV4),
}
