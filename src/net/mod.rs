//! Transport-side collaborators.
//!
//! Generators write into an [`Endpoint`]; the in-memory implementation
//! ([`MemorySocket`]) delivers into [`PacketSink`]s looked up by address
//! in a [`SinkRegistry`]. No link, queue or protocol behaviour is modelled.

pub mod address;
pub mod endpoint;
pub mod error;
pub mod error_model;
pub mod packet;
pub mod sink;
pub mod socket;

// Re-export commonly used types
pub use address::AddressAllocator;
pub use endpoint::{Endpoint, SocketKind};
pub use error::{AddressError, TransportError};
pub use error_model::ErrorModel;
pub use packet::Packet;
pub use sink::{PacketSink, SharedSink, SinkRegistry};
pub use socket::{MemorySocket, SocketState};
