//! Direct itinerary search over the priced flight graph.
//!
//! No closed paths are needed up front: starting from each flight out of
//! the origin, the walk extends through successor flights that satisfy the
//! connection rule, and records a trip whenever a flight lands back at the
//! origin. Each first flight is an independent unit of work.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{ConnectionRule, Flight, Iata, MIN_CLOSED_PATH_EDGES, Trip};

use super::config::{ConfigError, cpu_count};
use super::error::PlannerError;
use super::graph::FareGraph;

/// Bounded depth-first walker over a [`FareGraph`].
pub struct GraphWalker<'a> {
    graph: &'a FareGraph,
    origin: Iata,
    rule: ConnectionRule,
    cutoff: usize,
}

impl<'a> GraphWalker<'a> {
    /// # Errors
    ///
    /// Rejects a zero cutoff.
    pub fn new(
        graph: &'a FareGraph,
        origin: Iata,
        rule: ConnectionRule,
        cutoff: usize,
    ) -> Result<Self, ConfigError> {
        if cutoff == 0 {
            return Err(ConfigError::ZeroCutoff);
        }
        Ok(Self {
            graph,
            origin,
            rule,
            cutoff,
        })
    }

    /// Flights leaving the origin, excluding self-loops.
    fn first_legs(&self) -> Vec<&'a Flight> {
        let graph: &'a FareGraph = self.graph;
        graph
            .outgoing(&self.origin)
            .filter(|f| f.destination != self.origin)
            .collect()
    }

    /// Collect every trip.
    pub fn find_trips(&self) -> Result<Vec<Trip>, PlannerError> {
        let first = self.first_legs();
        if first.is_empty() {
            info!(origin = %self.origin, "no flights leave the origin");
            return Ok(Vec::new());
        }

        let pool = self.pool(first.len())?;
        let trips: Vec<Trip> = pool.install(|| {
            first
                .par_iter()
                .flat_map_iter(|leg| {
                    let mut found = Vec::new();
                    self.walk_from(*leg, None, &mut |trip| found.push(trip));
                    found
                })
                .collect()
        });

        info!(origin = %self.origin, trips = trips.len(), "graph walk finished");
        Ok(trips)
    }

    /// Hand each trip to `emit` as soon as it is found.
    ///
    /// `stop` is checked before every extension; once it is set, workers
    /// return without exploring further. Returns the number of trips emitted.
    pub fn stream(
        &self,
        stop: &AtomicBool,
        emit: &(dyn Fn(Trip) + Sync),
    ) -> Result<usize, PlannerError> {
        let first = self.first_legs();
        if first.is_empty() {
            info!(origin = %self.origin, "no flights leave the origin");
            return Ok(0);
        }

        let emitted = AtomicUsize::new(0);
        let pool = self.pool(first.len())?;
        pool.install(|| {
            first.par_iter().for_each(|leg| {
                let mut local = 0usize;
                self.walk_from(*leg, Some(stop), &mut |trip| {
                    local += 1;
                    emit(trip);
                });
                emitted.fetch_add(local, Ordering::Relaxed);
                debug!(first = %leg.key(), trips = local, "first leg done");
            });
        });

        let emitted = emitted.into_inner();
        info!(
            origin = %self.origin,
            trips = emitted,
            stopped = stop.load(Ordering::Relaxed),
            "graph walk stream finished"
        );
        Ok(emitted)
    }

    fn pool(&self, units: usize) -> Result<rayon::ThreadPool, PlannerError> {
        let workers = cpu_count().min(units);
        info!(
            origin = %self.origin,
            first_legs = units,
            workers,
            cutoff = self.cutoff,
            "walking fare graph"
        );
        Ok(ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("walk-{i}"))
            .build()?)
    }

    fn walk_from(&self, first: &'a Flight, stop: Option<&AtomicBool>, sink: &mut dyn FnMut(Trip)) {
        let mut legs = vec![first];
        self.extend(&mut legs, stop, sink);
    }

    /// Try every successor of the last leg. `legs` is owned by one worker.
    fn extend(
        &self,
        legs: &mut Vec<&'a Flight>,
        stop: Option<&AtomicBool>,
        sink: &mut dyn FnMut(Trip),
    ) {
        let Some(&last) = legs.last() else {
            return;
        };
        let graph: &'a FareGraph = self.graph;

        for next in graph.outgoing(&last.destination) {
            if stop.is_some_and(|s| s.load(Ordering::Relaxed)) {
                return;
            }

            let closes = next.destination == self.origin;
            if !closes && self.visited(legs, &next.destination) {
                continue;
            }
            if !self.rule.allows(last.arrival, next.departure) {
                continue;
            }

            if closes {
                // An out-and-back is not a multi-city trip.
                if legs.len() + 1 < MIN_CLOSED_PATH_EDGES {
                    continue;
                }
                let flights = legs
                    .iter()
                    .chain(std::iter::once(&next))
                    .map(|f| (*f).clone())
                    .collect();
                match Trip::new(flights, &self.rule) {
                    Ok(trip) => sink(trip),
                    Err(e) => debug!(error = %e, "discarding walked trip"),
                }
                continue;
            }

            // Leaves no room for a closing leg.
            if legs.len() + 1 >= self.cutoff {
                continue;
            }

            legs.push(next);
            self.extend(legs, stop, sink);
            legs.pop();
        }
    }

    fn visited(&self, legs: &[&Flight], code: &Iata) -> bool {
        *code == self.origin || legs.iter().any(|l| l.destination == *code)
    }
}
