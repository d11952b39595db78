//! Trip types.
//!
//! A `Trip` is a complete closed itinerary: a sequence of flights leaving
//! the origin, stopping at intermediate airports and returning home, with
//! the time spent at each stop.

use chrono::{Duration, NaiveDateTime};

use super::{ConnectionRule, DomainError, Flight, FlightKey, Iata};

/// Time spent at an intermediate stop between two legs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stay {
    pub location: Iata,
    pub duration: Duration,
}

/// A fully timed closed itinerary.
///
/// # Invariants
///
/// - At least one leg
/// - Consecutive legs connect (arrival airport of one = departure airport of next)
/// - Every adjacent leg pair satisfies the [`ConnectionRule`] it was built with
/// - The last leg lands at the first leg's origin
/// - `stays.len() == flights.len() - 1`
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    flights: Vec<Flight>,
    total_cost: f64,
    total_duration: Duration,
    stays: Vec<Stay>,
}

impl Trip {
    /// Builds a trip from its legs, checking every invariant.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no legs, if two consecutive legs don't
    /// connect or violate the connection rule, or if the trip doesn't return
    /// to its origin.
    pub fn new(flights: Vec<Flight>, rule: &ConnectionRule) -> Result<Self, DomainError> {
        let (first, last) = match (flights.first(), flights.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(DomainError::EmptyTrip),
        };

        if last.destination != first.origin {
            return Err(DomainError::NotClosed(first.origin, last.destination));
        }

        let mut stays = Vec::with_capacity(flights.len() - 1);
        for pair in flights.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.destination != next.origin {
                return Err(DomainError::Disconnected(prev.destination, next.origin));
            }
            if !rule.allows(prev.arrival, next.departure) {
                return Err(DomainError::InfeasibleConnection(prev.destination));
            }
            stays.push(Stay {
                location: prev.destination,
                duration: next.departure - prev.arrival,
            });
        }

        let total_cost = flights.iter().map(|f| f.price).sum();
        let total_duration = last.arrival - first.departure;

        Ok(Self {
            flights,
            total_cost,
            total_duration,
            stays,
        })
    }

    /// The legs in travel order.
    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    /// Number of legs.
    pub fn leg_count(&self) -> usize {
        self.flights.len()
    }

    /// Sum of leg prices.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Last arrival minus first departure.
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Time spent at each intermediate stop, in travel order.
    pub fn stays(&self) -> &[Stay] {
        &self.stays
    }

    pub fn origin(&self) -> Iata {
        self.flights[0].origin
    }

    pub fn departure_time(&self) -> NaiveDateTime {
        self.flights[0].departure
    }

    pub fn return_time(&self) -> NaiveDateTime {
        self.flights[self.flights.len() - 1].arrival
    }

    /// Currency of the first leg; fares are not converted.
    pub fn currency(&self) -> &str {
        &self.flights[0].currency
    }

    /// Airports visited, starting and ending at the origin.
    pub fn route(&self) -> Vec<Iata> {
        std::iter::once(self.origin())
            .chain(self.flights.iter().map(|f| f.destination))
            .collect()
    }

    /// Identity keys of the legs, in travel order.
    pub fn flight_keys(&self) -> Vec<FlightKey> {
        self.flights.iter().map(Flight::key).collect()
    }
}
