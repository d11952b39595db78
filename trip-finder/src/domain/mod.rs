//! Domain types for the trip finder.
//!
//! This module contains the core domain model types that represent
//! validated airline data. All types enforce their invariants at construction
//! time, so code that receives these types can trust their validity.

mod airport;
mod connection;
mod error;
mod flight;
mod path;
mod trip;

pub use airport::{Airport, Iata, InvalidIata};
pub use connection::{ConnectionRule, MIN_TURNAROUND};
pub use error::DomainError;
pub use flight::{Flight, FlightKey, SEATS_UNKNOWN};
pub use path::{ClosedPath, MIN_CLOSED_PATH_EDGES};
pub use trip::{Stay, Trip};
