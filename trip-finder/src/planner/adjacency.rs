//! Route topology: who flies where.
//!
//! The adjacency map is built once per run from per-airport destination
//! lookups and is read-only afterwards. It carries no price or time.

use std::collections::{BTreeMap, BTreeSet};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::Iata;
use crate::routes::{RouteService, ServiceError};

use super::config::SearchConfig;

/// Directed topology `code -> set of directly reachable codes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjacencyMap(BTreeMap<Iata, BTreeSet<Iata>>);

impl AdjacencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the edge `from -> to`. Returns false if it was already present.
    pub fn insert(&mut self, from: Iata, to: Iata) -> bool {
        self.0.entry(from).or_default().insert(to)
    }

    /// Direct destinations of `code`; empty if the code is unknown.
    pub fn neighbors(&self, code: &Iata) -> impl Iterator<Item = &Iata> + '_ {
        self.0.get(code).into_iter().flatten()
    }

    pub fn contains_edge(&self, from: &Iata, to: &Iata) -> bool {
        self.0.get(from).is_some_and(|s| s.contains(to))
    }

    /// Codes with at least one outgoing edge.
    pub fn node_count(&self) -> usize {
        self.0.len()
    }

    pub fn edge_count(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Iata, &BTreeSet<Iata>)> + '_ {
        self.0.iter()
    }
}

impl FromIterator<(Iata, Iata)> for AdjacencyMap {
    fn from_iter<T: IntoIterator<Item = (Iata, Iata)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (from, to) in iter {
            map.insert(from, to);
        }
        map
    }
}

/// Build the topology around `origin` from the service's airport list.
///
/// With an allow-list, only allowed airports and the origin are looked up
/// and only edges between them are kept.
///
/// # Errors
///
/// Fails only if the airport list itself cannot be fetched; per-airport
/// lookup failures are logged and leave that airport without routes.
pub async fn build_adjacency<S: RouteService>(
    service: &S,
    origin: Iata,
    allow: Option<&BTreeSet<Iata>>,
    config: &SearchConfig,
) -> Result<AdjacencyMap, ServiceError> {
    let airports = service.list_airports().await?;
    info!(airports = airports.len(), "fetched airport list");

    let mut candidates: BTreeSet<Iata> = airports
        .iter()
        .map(|a| a.code)
        .filter(|code| allow.is_none_or(|allow| allow.contains(code)))
        .collect();
    candidates.insert(origin);

    Ok(fetch_adjacency(service, &candidates, origin, allow, config).await)
}

/// Look up destinations for every candidate concurrently.
///
/// Candidates whose destination set ends up empty are dropped.
pub async fn fetch_adjacency<S: RouteService>(
    service: &S,
    candidates: &BTreeSet<Iata>,
    origin: Iata,
    allow: Option<&BTreeSet<Iata>>,
    config: &SearchConfig,
) -> AdjacencyMap {
    let workers = config.io_workers(candidates.len());
    info!(
        candidates = candidates.len(),
        workers, "fetching destinations"
    );

    let keep = |code: &Iata| *code == origin || allow.is_none_or(|allow| allow.contains(code));

    let results: Vec<(Iata, Vec<Iata>)> = stream::iter(candidates.iter().copied())
        .map(|code| async move {
            match service.list_destinations(&code).await {
                Ok(destinations) => (code, destinations),
                Err(e) => {
                    warn!(%code, error = %e, "destination lookup failed");
                    (code, Vec::new())
                }
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut map = AdjacencyMap::new();
    for (from, destinations) in results {
        for to in destinations.into_iter().filter(|to| *to != from && keep(to)) {
            map.insert(from, to);
        }
    }

    info!(
        nodes = map.node_count(),
        edges = map.edge_count(),
        "adjacency built"
    );
    map
}
