//! Path-driven itinerary expansion.
//!
//! Given closed paths computed up front, pick one flight per hop by
//! backtracking, checking each choice against the previous leg. Paths are
//! independent, so they are expanded in parallel.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{ClosedPath, ConnectionRule, Flight, Iata, Trip};

use super::config::cpu_count;
use super::error::PlannerError;

/// Lookup of the flights available between two airports.
pub trait LegSource: Sync {
    /// Flights from `from` to `to`; empty if there are none.
    fn legs(&self, from: &Iata, to: &Iata) -> &[Flight];
}

/// Expands closed paths into every feasible timed trip.
pub struct PathExpander<'a, L> {
    legs: &'a L,
    rule: ConnectionRule,
}

impl<'a, L: LegSource> PathExpander<'a, L> {
    pub fn new(legs: &'a L, rule: ConnectionRule) -> Self {
        Self { legs, rule }
    }

    /// All trips along a single path.
    pub fn expand(&self, path: &ClosedPath) -> Vec<Trip> {
        let codes = path.codes();
        let mut chosen: Vec<&Flight> = Vec::with_capacity(path.edge_count());
        let mut trips = Vec::new();
        self.choose(codes, &mut chosen, &mut trips);
        trips
    }

    /// All trips along every path, expanded in parallel.
    pub fn expand_all(&self, paths: &[ClosedPath]) -> Result<Vec<Trip>, PlannerError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let workers = cpu_count().min(paths.len());
        info!(paths = paths.len(), workers, "expanding closed paths");

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("expand-{i}"))
            .build()?;

        let trips: Vec<Trip> =
            pool.install(|| paths.par_iter().flat_map_iter(|p| self.expand(p)).collect());

        info!(trips = trips.len(), "paths expanded");
        Ok(trips)
    }

    /// Choose a flight for hop `chosen.len()`, then recurse.
    fn choose(&self, codes: &[Iata], chosen: &mut Vec<&'a Flight>, trips: &mut Vec<Trip>) {
        let i = chosen.len();
        if i + 1 == codes.len() {
            let flights = chosen.iter().map(|f| (*f).clone()).collect();
            match Trip::new(flights, &self.rule) {
                Ok(trip) => trips.push(trip),
                Err(e) => debug!(error = %e, "discarding expanded trip"),
            }
            return;
        }

        let legs: &'a L = self.legs;
        for flight in legs.legs(&codes[i], &codes[i + 1]) {
            if let Some(prev) = chosen.last() {
                if !self.rule.allows(prev.arrival, flight.departure) {
                    continue;
                }
            }
            chosen.push(flight);
            self.choose(codes, chosen, trips);
            chosen.pop();
        }
    }
}
