//! Trip planner.
//!
//! This module implements the search pipeline that answers: "starting from
//! this airport, which cheap multi-city round trips can I fly?"
//!
//! Phases, in order:
//! 1. Topology: who flies where ([`AdjacencyMap`])
//! 2. Closed paths: every simple cycle through the origin within the cutoff
//! 3. Fares: one-way fares for the routes those paths use ([`FareTable`])
//! 4. Fare graph: flights as parallel edges, pruned by price ([`FareGraph`])
//! 5. Expansion into timed [`Trip`](crate::domain::Trip)s, either by walking
//!    the fare graph or by backtracking along closed paths
//! 6. Ranking by total cost
//!
//! Direct one-way and out-and-back searches reuse fare collection only.

mod adjacency;
mod backtrack;
mod config;
mod cycles;
mod direct;
mod error;
mod fares;
mod graph;
mod rank;
mod search;
mod walk;

#[cfg(test)]
mod expander_tests;

pub use adjacency::{AdjacencyMap, build_adjacency, fetch_adjacency};
pub use backtrack::{LegSource, PathExpander};
pub use config::{
    ConfigError, DEFAULT_CUTOFF, DEFAULT_PARALLEL_FACTOR, DateWindow, SearchConfig, cpu_count,
};
pub use cycles::find_closed_paths;
pub use direct::{RoundTripFare, pair_round_trips, rank_one_way, return_window};
pub use error::PlannerError;
pub use fares::{FareCollector, FareTable, required_routes};
pub use graph::FareGraph;
pub use rank::{cost_range, rank_trips};
pub use search::{Discovery, Planner, Strategy};
pub use walk::GraphWalker;
