//! Priced, timed flight instances.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{DomainError, Iata};

/// Seats-remaining value used when the fare source does not report seats.
pub const SEATS_UNKNOWN: i32 = -1;

/// Identity of a real-world flight instance.
///
/// Two flights with the same key are the same flight, regardless of the
/// price or seat count reported for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlightKey {
    pub origin: Iata,
    pub departure: NaiveDateTime,
    pub destination: Iata,
    pub arrival: NaiveDateTime,
}

impl fmt::Display for FlightKey {
    /// Formats as `TRS(2024-03-15 10:00:00):BGY(2024-03-15 11:10:00)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}):{}({})",
            self.origin, self.departure, self.destination, self.arrival
        )
    }
}

/// A one-way flight with its fare.
///
/// Times are local airport times as published by the fare source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub origin: Iata,
    pub destination: Iata,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub price: f64,
    /// Seats left at this fare, or [`SEATS_UNKNOWN`].
    pub seats_left: i32,
    pub currency: String,
}

impl Flight {
    /// Creates a flight, rejecting negative or non-finite prices.
    pub fn new(
        origin: Iata,
        destination: Iata,
        departure: NaiveDateTime,
        arrival: NaiveDateTime,
        price: f64,
        seats_left: i32,
        currency: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if !price.is_finite() || price < 0.0 {
            return Err(DomainError::InvalidPrice(price));
        }

        Ok(Self {
            origin,
            destination,
            departure,
            arrival,
            price,
            seats_left,
            currency: currency.into(),
        })
    }

    /// Returns the identity key of this flight.
    pub fn key(&self) -> FlightKey {
        FlightKey {
            origin: self.origin,
            departure: self.departure,
            destination: self.destination,
            arrival: self.arrival,
        }
    }

    /// Returns true if the fare source reports no seats left.
    pub fn is_sold_out(&self) -> bool {
        self.seats_left == 0
    }
}
