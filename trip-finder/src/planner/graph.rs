//! Priced, time-stamped flight multigraph.
//!
//! Nodes are airport codes. Each edge is one concrete flight, so the same
//! city pair may carry many parallel edges. Within a city pair edges are
//! kept sorted by identity key, which is also how duplicates are found.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Flight, Iata};

use super::adjacency::AdjacencyMap;
use super::backtrack::LegSource;
use super::fares::FareTable;

/// Directed multigraph of flights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FareGraph {
    nodes: BTreeSet<Iata>,
    edges: BTreeMap<Iata, BTreeMap<Iata, Vec<Flight>>>,
}

impl FareGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from collected fares.
    pub fn from_table(table: &FareTable) -> Self {
        let mut graph = Self::new();
        for flight in table.flights() {
            graph.add_flight(flight.clone());
        }
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "fare graph built"
        );
        graph
    }

    /// Add one flight as an edge. Returns false if an edge with the same
    /// identity key already exists.
    pub fn add_flight(&mut self, flight: Flight) -> bool {
        self.nodes.insert(flight.origin);
        self.nodes.insert(flight.destination);

        let bucket = self
            .edges
            .entry(flight.origin)
            .or_default()
            .entry(flight.destination)
            .or_default();
        let key = flight.key();
        match bucket.binary_search_by_key(&key, Flight::key) {
            Ok(_) => false,
            Err(pos) => {
                bucket.insert(pos, flight);
                true
            }
        }
    }

    /// Every edge leaving `from`, grouped by destination.
    pub fn outgoing(&self, from: &Iata) -> impl Iterator<Item = &Flight> + '_ {
        self.edges
            .get(from)
            .into_iter()
            .flat_map(|d| d.values())
            .flatten()
    }

    /// Every edge in the graph.
    pub fn flights(&self) -> impl Iterator<Item = &Flight> + '_ {
        self.edges.values().flat_map(|d| d.values()).flatten()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Iata> + '_ {
        self.nodes.iter()
    }

    pub fn contains_node(&self, code: &Iata) -> bool {
        self.nodes.contains(code)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of flights (parallel edges counted separately).
    pub fn edge_count(&self) -> usize {
        self.edges
            .values()
            .flat_map(|d| d.values())
            .map(Vec::len)
            .sum()
    }

    /// Remove every edge priced above `max_price`. Returns the number of
    /// edges removed. Nodes are kept.
    pub fn prune(&mut self, max_price: f64) -> usize {
        let before = self.edge_count();
        for destinations in self.edges.values_mut() {
            for bucket in destinations.values_mut() {
                bucket.retain(|f| f.price <= max_price);
            }
            destinations.retain(|_, bucket| !bucket.is_empty());
        }
        self.edges.retain(|_, destinations| !destinations.is_empty());
        let removed = before - self.edge_count();
        info!(max_price, removed, remaining = self.edge_count(), "pruned fare graph");
        removed
    }

    /// City pairs with at least one flight.
    pub fn topology(&self) -> AdjacencyMap {
        self.edges
            .iter()
            .flat_map(|(from, destinations)| destinations.keys().map(move |to| (*from, *to)))
            .collect()
    }
}

impl LegSource for FareGraph {
    fn legs(&self, from: &Iata, to: &Iata) -> &[Flight] {
        self.edges
            .get(from)
            .and_then(|d| d.get(to))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn code(s: &str) -> Iata {
        Iata::parse(s).unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn flight(from: &str, to: &str, day: u32, hour: u32, price: f64) -> Flight {
        Flight::new(code(from), code(to), at(day, hour), at(day, hour + 1), price, -1, "EUR").unwrap()
    }

    #[test]
    fn parallel_edges_and_dedup() {
        let mut graph = FareGraph::new();
        assert!(graph.add_flight(flight("TRS", "BGY", 1, 10, 20.0)));
        assert!(graph.add_flight(flight("TRS", "BGY", 1, 6, 15.0)));
        assert!(!graph.add_flight(flight("TRS", "BGY", 1, 10, 99.0)));

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.node_count(), 2);
        let legs = graph.legs(&code("TRS"), &code("BGY"));
        assert_eq!(legs[0].departure, at(1, 6));
        assert_eq!(legs[1].price, 20.0);
    }

    #[test]
    fn topology_and_outgoing() {
        let table: FareTable = [
            flight("TRS", "BGY", 1, 8, 10.0),
            flight("TRS", "STN", 1, 8, 10.0),
            flight("BGY", "STN", 2, 8, 10.0),
        ]
        .into_iter()
        .collect();
        let graph = FareGraph::from_table(&table);

        assert_eq!(graph.outgoing(&code("TRS")).count(), 2);
        assert_eq!(graph.outgoing(&code("STN")).count(), 0);
        assert!(graph.contains_node(&code("STN")));
        let topology = graph.topology();
        assert_eq!(topology.edge_count(), 3);
        assert!(topology.contains_edge(&code("BGY"), &code("STN")));
    }

    #[test]
    fn serde_round_trip() {
        let mut graph = FareGraph::new();
        graph.add_flight(flight("TRS", "BGY", 1, 8, 10.1));
        graph.add_flight(flight("BGY", "TRS", 3, 8, 0.1 + 0.2));
        let json = serde_json::to_string(&graph).unwrap();
        let back: FareGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back, graph);
    }

    proptest! {
        #[test]
        fn prune_removes_exactly_expensive_edges(
            prices in prop::collection::vec(0.0..100.0f64, 0..40),
            max_price in 0.0..100.0f64,
        ) {
            let mut graph = FareGraph::new();
            for (i, price) in prices.iter().enumerate() {
                let (from, to) = if i % 2 == 0 { ("TRS", "BGY") } else { ("BGY", "TRS") };
                let day = 1 + (i / 20) as u32;
                let hour = (i % 20) as u32;
                graph.add_flight(flight(from, to, day, hour, *price));
            }
            let before = graph.edge_count();
            let expected = prices.iter().filter(|p| **p > max_price).count();

            let removed = graph.prune(max_price);

            prop_assert_eq!(removed, expected);
            prop_assert_eq!(graph.edge_count(), before - removed);
            prop_assert!(graph.flights().all(|f| f.price <= max_price));
        }
    }
}
