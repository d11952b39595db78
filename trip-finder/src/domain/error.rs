//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the domain layer. They are distinct from API/IO errors.

use super::Iata;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Price is negative or not a finite number
    #[error("invalid price: {0}")]
    InvalidPrice(f64),

    /// Closed path is malformed
    #[error("invalid closed path: {0}")]
    InvalidPath(&'static str),

    /// Closed path string could not be parsed
    #[error("invalid closed path {0:?}")]
    UnparsablePath(String),

    /// Night window is inverted
    #[error("min nights ({min}) exceeds max nights ({max})")]
    InvertedNightWindow { min: u32, max: u32 },

    /// Trip has no legs
    #[error("trip must have at least one leg")]
    EmptyTrip,

    /// Consecutive legs don't share an airport
    #[error("leg arriving at {0} is followed by a leg departing {1}")]
    Disconnected(Iata, Iata),

    /// Gap between consecutive legs violates the connection rule
    #[error("connection at {0} violates the connection rule")]
    InfeasibleConnection(Iata),

    /// Last leg does not return to the first leg's origin
    #[error("trip starting at {0} ends at {1}")]
    NotClosed(Iata, Iata),
}
