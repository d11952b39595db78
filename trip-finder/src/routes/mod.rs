//! Route and fare collaborator.
//!
//! The planner only ever talks to a [`RouteService`]: the live Ryanair
//! client, the static fixture service, or a cache wrapped around either.
//!
//! Key characteristics of the fare source:
//! - Times are local airport times without an offset
//! - Seats remaining are not reported; every fare carries [`SEATS_UNKNOWN`]
//! - The fare finder answers one departure day at a time
//!
//! [`SEATS_UNKNOWN`]: crate::domain::SEATS_UNKNOWN

mod client;
mod convert;
mod error;
mod links;
mod mock;
mod types;

use chrono::NaiveDate;

use crate::domain::{Airport, Flight, Iata};

pub use client::{RyanairClient, RyanairConfig};
pub use convert::{ConversionError, parse_local_time};
pub use error::ServiceError;
pub use links::{BookingLinks, DEFAULT_FLIGHT_PAGE_URL};
pub use mock::StaticRouteService;
pub use types::{AirportDto, FareDto, OneWayFaresResponse, OutboundDto, RouteDto};

/// Source of airports, direct routes and one-way fares.
///
/// Implementations must be safe to call concurrently; the planner fans
/// requests out over many airports at once.
#[allow(async_fn_in_trait)]
pub trait RouteService {
    /// All active airports.
    async fn list_airports(&self) -> Result<Vec<Airport>, ServiceError>;

    /// Codes directly reachable from `origin`.
    async fn list_destinations(&self, origin: &Iata) -> Result<Vec<Iata>, ServiceError>;

    /// One-way fares from `origin` to any of `destinations`, departing
    /// between `from` and `to` inclusive.
    async fn list_fares(
        &self,
        origin: &Iata,
        destinations: &[Iata],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError>;
}

impl<T: RouteService> RouteService for &T {
    async fn list_airports(&self) -> Result<Vec<Airport>, ServiceError> {
        (**self).list_airports().await
    }

    async fn list_destinations(&self, origin: &Iata) -> Result<Vec<Iata>, ServiceError> {
        (**self).list_destinations(origin).await
    }

    async fn list_fares(
        &self,
        origin: &Iata,
        destinations: &[Iata],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError> {
        (**self).list_fares(origin, destinations, from, to).await
    }
}
