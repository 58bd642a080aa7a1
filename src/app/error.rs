//! Generator error taxonomy.

use thiserror::Error;

use crate::net::TransportError;

/// Errors returned synchronously by generator operations.
///
/// A failed operation leaves the generator in the state it was in before
/// the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeneratorError {
    /// Bad static parameters (zero packet size, non-positive rate, unparsable rate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Operation not allowed in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Endpoint bind, connect or send failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
