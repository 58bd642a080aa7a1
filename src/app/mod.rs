//! Traffic-generating applications.
//!
//! [`PacedGenerator`] is the rate-paced sender. [`DataRate`] converts a
//! packet size into the gap to the next send, and [`PacingObserver`] lets
//! statistics and tracing code follow a generator without owning it.

pub mod data_rate;
pub mod error;
pub mod generator;
pub mod observer;

// Re-export commonly used types
pub use data_rate::DataRate;
pub use error::GeneratorError;
pub use generator::{GeneratorConfig, PacedGenerator};
pub use observer::{GeneratorState, PacingObserver};
