//! Fare collection for the routes that closed paths actually use.

use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{ClosedPath, Flight, Iata};
use crate::routes::RouteService;

use super::adjacency::AdjacencyMap;
use super::backtrack::LegSource;
use super::config::{DateWindow, SearchConfig};

/// Directed city pairs used by any of `paths`. Only these need fares.
pub fn required_routes(paths: &[ClosedPath]) -> AdjacencyMap {
    paths.iter().flat_map(ClosedPath::hops).collect()
}

/// Collected fares, bucketed `origin -> destination -> flights`.
///
/// Each bucket holds at most one flight per identity key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FareTable(BTreeMap<Iata, BTreeMap<Iata, Vec<Flight>>>);

impl FareTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flight. Returns false if a flight with the same key is present.
    pub fn insert(&mut self, flight: Flight) -> bool {
        let bucket = self
            .0
            .entry(flight.origin)
            .or_default()
            .entry(flight.destination)
            .or_default();
        let key = flight.key();
        if bucket.iter().any(|f| f.key() == key) {
            return false;
        }
        bucket.push(flight);
        true
    }

    /// All flights, grouped by origin then destination.
    pub fn flights(&self) -> impl Iterator<Item = &Flight> + '_ {
        self.0.values().flat_map(|d| d.values()).flatten()
    }

    pub fn len(&self) -> usize {
        self.0.values().flat_map(|d| d.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every fare priced above `max_price`. Returns the removed count.
    pub fn retain_max_price(&mut self, max_price: f64) -> usize {
        let before = self.len();
        for destinations in self.0.values_mut() {
            for bucket in destinations.values_mut() {
                bucket.retain(|f| f.price <= max_price);
            }
            destinations.retain(|_, bucket| !bucket.is_empty());
        }
        self.0.retain(|_, destinations| !destinations.is_empty());
        before - self.len()
    }
}

impl FromIterator<Flight> for FareTable {
    fn from_iter<T: IntoIterator<Item = Flight>>(iter: T) -> Self {
        let mut table = Self::new();
        for flight in iter {
            table.insert(flight);
        }
        table
    }
}

impl LegSource for FareTable {
    fn legs(&self, from: &Iata, to: &Iata) -> &[Flight] {
        self.0
            .get(from)
            .and_then(|d| d.get(to))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Fetches fares for a set of routes, one request per origin.
pub struct FareCollector<'a, S> {
    service: &'a S,
    config: &'a SearchConfig,
}

impl<'a, S: RouteService> FareCollector<'a, S> {
    pub fn new(service: &'a S, config: &'a SearchConfig) -> Self {
        Self { service, config }
    }

    /// Collect fares departing within `window` for every edge of `routes`.
    ///
    /// Fares for destinations that weren't asked for are discarded, as are
    /// sold-out fares. A failed request for one origin is logged and
    /// contributes nothing.
    pub async fn collect(&self, routes: &AdjacencyMap, window: DateWindow) -> FareTable {
        let requests: Vec<(Iata, Vec<Iata>)> = routes
            .iter()
            .map(|(origin, destinations)| (*origin, destinations.iter().copied().collect()))
            .collect();
        let workers = self.config.io_workers(requests.len());
        info!(
            origins = requests.len(),
            days = window.days(),
            workers,
            "collecting fares"
        );

        let service = self.service;
        let results: Vec<(Iata, Vec<Iata>, Vec<Flight>)> = stream::iter(requests)
            .map(|(origin, destinations)| async move {
                match service
                    .list_fares(&origin, &destinations, window.from(), window.to())
                    .await
                {
                    Ok(flights) => (origin, destinations, flights),
                    Err(e) => {
                        warn!(%origin, error = %e, "fare lookup failed");
                        (origin, destinations, Vec::new())
                    }
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut table = FareTable::new();
        let mut sold_out = 0usize;
        let mut duplicates = 0usize;
        for (origin, destinations, flights) in results {
            let wanted: BTreeSet<Iata> = destinations.into_iter().collect();
            for flight in flights {
                if flight.origin != origin || !wanted.contains(&flight.destination) {
                    continue;
                }
                if flight.is_sold_out() {
                    sold_out += 1;
                    continue;
                }
                if !table.insert(flight) {
                    duplicates += 1;
                }
            }
        }

        info!(fares = table.len(), sold_out, duplicates, "fares collected");
        table
    }
}
