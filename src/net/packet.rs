//! Packets handed from applications to transport endpoints.

use crate::sim::SimTime;

/// An opaque payload of `size` bytes. Only the size matters to pacing and
/// to the sinks; the contents are never materialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number within the sending flow, starting at 0 on every start.
    pub seq: u64,
    pub size: u32,
    pub created_at: SimTime,
}

impl Packet {
    pub fn new(seq: u64, size: u32, created_at: SimTime) -> Self {
        Self { seq, size, created_at }
    }

    pub fn size_bits(&self) -> u64 {
        u64::from(self.size) * 8
    }
}
