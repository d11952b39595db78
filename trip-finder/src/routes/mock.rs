//! Static route service for testing and offline runs.
//!
//! Serves airports, routes and fares from memory, either built up in code or
//! loaded from a JSON fixture file.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{Airport, Flight, Iata};

use super::RouteService;
use super::error::ServiceError;

/// On-disk fixture layout.
///
/// ```json
/// {
///   "airports": [{"code": "TRS", "latitude": 45.8, "longitude": 13.4, "name": "Trieste"}],
///   "routes": {"TRS": ["BGY", "STN"]},
///   "fares": [{"origin": "TRS", "destination": "BGY", "departure": "2024-07-01T08:00:00", ...}]
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    airports: Vec<Airport>,
    #[serde(default)]
    routes: BTreeMap<Iata, Vec<Iata>>,
    #[serde(default)]
    fares: Vec<Flight>,
}

/// Route service that answers from in-memory data.
#[derive(Debug, Default)]
pub struct StaticRouteService {
    airports: Vec<Airport>,
    routes: BTreeMap<Iata, Vec<Iata>>,
    fares: BTreeMap<Iata, Vec<Flight>>,
    /// Airports whose destination and fare lookups fail.
    failing: HashSet<Iata>,
    airport_calls: AtomicUsize,
    destination_calls: AtomicUsize,
    fare_calls: AtomicUsize,
}

impl StaticRouteService {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture file.
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    /// Parse fixture JSON.
    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        let fixture: Fixture = serde_json::from_str(json).map_err(|e| ServiceError::Json {
            message: e.to_string(),
            body: None,
        })?;

        let mut service = Self {
            airports: fixture.airports,
            routes: fixture.routes,
            ..Self::default()
        };
        for flight in fixture.fares {
            if !flight.price.is_finite() || flight.price < 0.0 {
                return Err(ServiceError::Malformed(format!(
                    "fixture fare {} has invalid price {}",
                    flight.key(),
                    flight.price
                )));
            }
            service = service.with_flight(flight);
        }
        Ok(service)
    }

    pub fn with_airport(mut self, airport: Airport) -> Self {
        self.airports.push(airport);
        self
    }

    /// Add a direct route `from -> to`.
    pub fn with_route(mut self, from: Iata, to: Iata) -> Self {
        let destinations = self.routes.entry(from).or_default();
        if !destinations.contains(&to) {
            destinations.push(to);
        }
        self
    }

    pub fn with_flight(mut self, flight: Flight) -> Self {
        self.fares.entry(flight.origin).or_default().push(flight);
        self
    }

    /// Make destination and fare lookups for `code` fail.
    pub fn with_failure(mut self, code: Iata) -> Self {
        self.failing.insert(code);
        self
    }

    /// Calls made to `list_airports` so far.
    pub fn airport_calls(&self) -> usize {
        self.airport_calls.load(Ordering::Relaxed)
    }

    /// Calls made to `list_destinations` so far.
    pub fn destination_calls(&self) -> usize {
        self.destination_calls.load(Ordering::Relaxed)
    }

    /// Calls made to `list_fares` so far.
    pub fn fare_calls(&self) -> usize {
        self.fare_calls.load(Ordering::Relaxed)
    }

    fn check(&self, code: &Iata) -> Result<(), ServiceError> {
        if self.failing.contains(code) {
            return Err(ServiceError::Api {
                status: 503,
                message: format!("configured failure for {code}"),
            });
        }
        Ok(())
    }
}

impl RouteService for StaticRouteService {
    async fn list_airports(&self) -> Result<Vec<Airport>, ServiceError> {
        self.airport_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.airports.clone())
    }

    async fn list_destinations(&self, origin: &Iata) -> Result<Vec<Iata>, ServiceError> {
        self.destination_calls.fetch_add(1, Ordering::Relaxed);
        self.check(origin)?;
        Ok(self.routes.get(origin).cloned().unwrap_or_default())
    }

    async fn list_fares(
        &self,
        origin: &Iata,
        destinations: &[Iata],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError> {
        self.fare_calls.fetch_add(1, Ordering::Relaxed);
        self.check(origin)?;

        let Some(flights) = self.fares.get(origin) else {
            return Ok(Vec::new());
        };
        Ok(flights
            .iter()
            .filter(|f| destinations.contains(&f.destination))
            .filter(|f| {
                let day = f.departure.date();
                from <= day && day <= to
            })
            .cloned()
            .collect())
    }
}
