//! Phase orchestration for trip search.
//!
//! Discovery runs the I/O-heavy phases once (topology, closed paths, fares,
//! fare graph); trip search then runs either expansion strategy over the
//! result. Each discovery phase consults the artifact store first when one
//! is configured.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifacts::{ArtifactKind, ArtifactStore};
use crate::domain::{ClosedPath, ConnectionRule, Flight, Iata, Trip};
use crate::routes::RouteService;

use super::adjacency::{AdjacencyMap, build_adjacency};
use super::backtrack::PathExpander;
use super::config::{DateWindow, SearchConfig};
use super::cycles::find_closed_paths;
use super::direct::{
    RoundTripFare, inbound_routes, outbound_routes, pair_round_trips, rank_one_way, return_window,
};
use super::error::PlannerError;
use super::fares::{FareCollector, FareTable, required_routes};
use super::graph::FareGraph;
use super::rank::{cost_range, rank_trips};
use super::walk::GraphWalker;

/// Itinerary expansion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Bounded DFS directly over the fare graph.
    #[default]
    GraphWalk,
    /// Backtracking over flights along precomputed closed paths.
    PathBacktrack,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphWalk => f.write_str("walk"),
            Self::PathBacktrack => f.write_str("backtrack"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "walk" => Ok(Self::GraphWalk),
            "backtrack" => Ok(Self::PathBacktrack),
            other => Err(format!("unknown strategy '{other}' (expected walk or backtrack)")),
        }
    }
}

/// Everything discovery produced for one origin and date window.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub origin: Iata,
    pub window: DateWindow,
    pub adjacency: AdjacencyMap,
    pub closed_paths: Vec<ClosedPath>,
    /// Fares as collected, before the price filter.
    pub fares: FareTable,
    /// Priced graph after the price filter and pruning.
    pub graph: FareGraph,
    /// Fares removed by the price filter and graph pruning.
    pub pruned: usize,
}

/// The fare graph artifact: the pruned graph and how much was pruned.
#[derive(Debug, Serialize, Deserialize)]
struct PricedGraph {
    graph: FareGraph,
    pruned: usize,
}

/// Trip planner over a route service.
pub struct Planner<'a, S> {
    service: &'a S,
    config: SearchConfig,
    rule: ConnectionRule,
    artifacts: Option<ArtifactStore>,
}

impl<'a, S: RouteService> Planner<'a, S> {
    /// # Errors
    ///
    /// Rejects an invalid configuration before any work is done.
    pub fn new(service: &'a S, config: SearchConfig) -> Result<Self, PlannerError> {
        config.validate()?;
        let rule = config.connection_rule()?;
        Ok(Self {
            service,
            config,
            rule,
            artifacts: None,
        })
    }

    /// Cache phase outputs in `store`.
    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(store);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run topology, closed path, fare and graph phases for `origin`.
    ///
    /// # Errors
    ///
    /// Fails if the airport list cannot be fetched, the worker pool cannot be
    /// built, or an artifact cannot be written.
    pub async fn discover(
        &self,
        origin: Iata,
        allow: Option<&BTreeSet<Iata>>,
        window: DateWindow,
    ) -> Result<Discovery, PlannerError> {
        let allow_scope = match allow {
            Some(codes) => codes.iter().map(Iata::as_str).collect::<Vec<_>>().join("|"),
            None => "*".to_string(),
        };
        let adjacency_scope = format!("{origin};{allow_scope}");
        let paths_scope = format!("{adjacency_scope};cutoff={}", self.config.cutoff);
        let fares_scope = format!("{paths_scope};{}..{}", window.from(), window.to());
        let graph_scope = match self.config.max_price {
            Some(max) => format!("{fares_scope};max={max}"),
            None => fares_scope.clone(),
        };

        let adjacency = match self.load(ArtifactKind::Adjacency, &adjacency_scope) {
            Some(adjacency) => adjacency,
            None => {
                let adjacency = build_adjacency(self.service, origin, allow, &self.config).await?;
                self.save(ArtifactKind::Adjacency, &adjacency_scope, &adjacency)?;
                adjacency
            }
        };

        let closed_paths: Vec<ClosedPath> = match self.load(ArtifactKind::ClosedPaths, &paths_scope) {
            Some(paths) => paths,
            None => {
                let paths = find_closed_paths(&adjacency, origin, self.config.cutoff)?;
                self.save(ArtifactKind::ClosedPaths, &paths_scope, &paths)?;
                paths
            }
        };

        let routes = required_routes(&closed_paths);
        info!(
            closed_paths = closed_paths.len(),
            routes = routes.edge_count(),
            "routes needing fares"
        );

        let fares = match self.load(ArtifactKind::Fares, &fares_scope) {
            Some(fares) => fares,
            None => {
                let fares = FareCollector::new(self.service, &self.config)
                    .collect(&routes, window)
                    .await;
                self.save(ArtifactKind::Fares, &fares_scope, &fares)?;
                fares
            }
        };

        let PricedGraph { graph, pruned } = match self.load(ArtifactKind::FareGraph, &graph_scope) {
            Some(priced) => priced,
            None => {
                let mut affordable = fares.clone();
                let mut pruned = 0;
                if let Some(max) = self.config.max_price {
                    pruned += affordable.retain_max_price(max);
                    info!(max_price = max, removed = pruned, "filtered fares by price");
                }
                let mut graph = FareGraph::from_table(&affordable);
                if let Some(max) = self.config.max_price {
                    pruned += graph.prune(max);
                }
                let priced = PricedGraph { graph, pruned };
                self.save(ArtifactKind::FareGraph, &graph_scope, &priced)?;
                priced
            }
        };

        info!(
            %origin,
            adjacency_nodes = adjacency.node_count(),
            closed_paths = closed_paths.len(),
            fares = fares.len(),
            graph_nodes = graph.node_count(),
            graph_edges = graph.edge_count(),
            pruned,
            "discovery complete"
        );

        Ok(Discovery {
            origin,
            window,
            adjacency,
            closed_paths,
            fares,
            graph,
            pruned,
        })
    }

    /// Expand discovery results into ranked trips, cheapest first.
    pub fn find_trips(
        &self,
        discovery: &Discovery,
        strategy: Strategy,
    ) -> Result<Vec<Trip>, PlannerError> {
        let trips = match strategy {
            Strategy::GraphWalk => {
                GraphWalker::new(&discovery.graph, discovery.origin, self.rule, self.config.cutoff)?
                    .find_trips()?
            }
            Strategy::PathBacktrack => {
                PathExpander::new(&discovery.graph, self.rule).expand_all(&discovery.closed_paths)?
            }
        };

        let mut ranked = rank_trips(trips);
        match cost_range(&ranked) {
            Some((cheapest, dearest)) => info!(
                %strategy,
                trips = ranked.len(),
                cheapest,
                dearest,
                "trips ranked"
            ),
            None => info!(%strategy, "no trips found"),
        }

        if let Some(max) = self.config.max_results {
            ranked.truncate(max);
        }
        Ok(ranked)
    }

    /// Stream trips from the fare graph to `emit` until done or `stop` is set.
    pub fn stream_trips(
        &self,
        discovery: &Discovery,
        stop: &AtomicBool,
        emit: &(dyn Fn(Trip) + Sync),
    ) -> Result<usize, PlannerError> {
        GraphWalker::new(&discovery.graph, discovery.origin, self.rule, self.config.cutoff)?
            .stream(stop, emit)
    }

    /// Cheapest one-way fares from `origin`, departing within `window`.
    ///
    /// Destinations are the allow-list, or every route out of `origin`.
    ///
    /// # Errors
    ///
    /// Fails only if the destination list for `origin` cannot be fetched.
    pub async fn one_way_fares(
        &self,
        origin: Iata,
        allow: Option<&BTreeSet<Iata>>,
        window: DateWindow,
    ) -> Result<Vec<Flight>, PlannerError> {
        let destinations = self.direct_destinations(origin, allow).await?;
        let mut fares = FareCollector::new(self.service, &self.config)
            .collect(&outbound_routes(origin, &destinations), window)
            .await;
        if let Some(max) = self.config.max_price {
            fares.retain_max_price(max);
        }

        let mut ranked = rank_one_way(fares.flights().cloned().collect());
        info!(%origin, fares = ranked.len(), "one-way fares ranked");
        if let Some(max) = self.config.max_results {
            ranked.truncate(max);
        }
        Ok(ranked)
    }

    /// Cheapest out-and-back pairs from `origin`, leaving within `window` and
    /// returning after the configured number of nights.
    ///
    /// The price limit applies to each flight, not the pair.
    ///
    /// # Errors
    ///
    /// Fails only if the destination list for `origin` cannot be fetched.
    pub async fn round_trip_fares(
        &self,
        origin: Iata,
        allow: Option<&BTreeSet<Iata>>,
        window: DateWindow,
    ) -> Result<Vec<RoundTripFare>, PlannerError> {
        let destinations = self.direct_destinations(origin, allow).await?;
        let collector = FareCollector::new(self.service, &self.config);
        let out_routes = outbound_routes(origin, &destinations);
        let back_routes = inbound_routes(origin, &destinations);
        let back_window = return_window(window, self.rule.max_nights());
        let (mut outbound, mut inbound) = futures::join!(
            collector.collect(&out_routes, window),
            collector.collect(&back_routes, back_window)
        );
        if let Some(max) = self.config.max_price {
            outbound.retain_max_price(max);
            inbound.retain_max_price(max);
        }

        let outbound: Vec<Flight> = outbound.flights().cloned().collect();
        let inbound: Vec<Flight> = inbound.flights().cloned().collect();
        let mut pairs = pair_round_trips(
            &outbound,
            &inbound,
            self.rule.min_nights(),
            self.rule.max_nights(),
        );
        info!(
            %origin,
            outbound = outbound.len(),
            inbound = inbound.len(),
            pairs = pairs.len(),
            "round-trip fares ranked"
        );
        if let Some(max) = self.config.max_results {
            pairs.truncate(max);
        }
        Ok(pairs)
    }

    async fn direct_destinations(
        &self,
        origin: Iata,
        allow: Option<&BTreeSet<Iata>>,
    ) -> Result<Vec<Iata>, PlannerError> {
        match allow {
            Some(codes) => Ok(codes.iter().copied().collect()),
            None => Ok(self.service.list_destinations(&origin).await?),
        }
    }

    fn load<T: serde::de::DeserializeOwned>(&self, kind: ArtifactKind, scope: &str) -> Option<T> {
        self.artifacts.as_ref()?.load(kind, scope)
    }

    fn save<T: serde::Serialize>(
        &self,
        kind: ArtifactKind,
        scope: &str,
        data: &T,
    ) -> Result<(), PlannerError> {
        if let Some(store) = &self.artifacts {
            store.save(kind, scope, data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Airport, Flight};
    use crate::planner::ConfigError;
    use crate::routes::StaticRouteService;
    use chrono::{NaiveDate, NaiveDateTime};

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

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 7).unwrap(),
        )
        .unwrap()
    }

    fn network() -> StaticRouteService {
        let mut service = StaticRouteService::new();
        for c in ["TRS", "BGY", "STN", "CIA"] {
            service = service.with_airport(Airport::new(code(c), 0.0, 0.0, c));
        }
        service
            .with_route(code("TRS"), code("BGY"))
            .with_route(code("BGY"), code("STN"))
            .with_route(code("STN"), code("TRS"))
            .with_route(code("BGY"), code("CIA"))
            .with_route(code("CIA"), code("TRS"))
            .with_route(code("BGY"), code("TRS"))
            .with_flight(flight("TRS", "BGY", 1, 8, 10.0))
            .with_flight(flight("BGY", "STN", 2, 8, 12.0))
            .with_flight(flight("STN", "TRS", 3, 8, 14.0))
            .with_flight(flight("BGY", "CIA", 2, 9, 5.0))
            .with_flight(flight("CIA", "TRS", 3, 9, 50.0))
            .with_flight(flight("BGY", "TRS", 2, 12, 1.0))
    }

    #[test]
    fn strategy_parse() {
        assert_eq!("walk".parse::<Strategy>(), Ok(Strategy::GraphWalk));
        assert_eq!("backtrack".parse::<Strategy>(), Ok(Strategy::PathBacktrack));
        assert!("dijkstra".parse::<Strategy>().is_err());
        assert_eq!(Strategy::PathBacktrack.to_string(), "backtrack");
    }

    #[test]
    fn invalid_config_rejected() {
        let service = StaticRouteService::new();
        let result = Planner::new(&service, SearchConfig::default().with_cutoff(0));
        assert!(matches!(
            result,
            Err(PlannerError::InvalidConfig(ConfigError::ZeroCutoff))
        ));
    }

    #[tokio::test]
    async fn discover_and_find() {
        let service = network();
        let planner = Planner::new(&service, SearchConfig::default()).unwrap();

        let discovery = planner.discover(code("TRS"), None, window()).await.unwrap();
        assert_eq!(discovery.closed_paths.len(), 2);
        // The out-and-back BGY-TRS fare is never requested; CIA-TRS is over the limit.
        assert_eq!(discovery.fares.len(), 5);
        assert_eq!(discovery.pruned, 1);
        assert_eq!(discovery.graph.edge_count(), 4);

        for strategy in [Strategy::GraphWalk, Strategy::PathBacktrack] {
            let trips = planner.find_trips(&discovery, strategy).unwrap();
            assert_eq!(trips.len(), 1, "{strategy}");
            assert!((trips[0].total_cost() - 36.0).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn max_results_truncates() {
        let service = network();
        let config = SearchConfig::default()
            .with_max_price(None)
            .with_max_results(Some(1));
        let planner = Planner::new(&service, config).unwrap();

        let discovery = planner.discover(code("TRS"), None, window()).await.unwrap();
        let trips = planner.find_trips(&discovery, Strategy::GraphWalk).unwrap();
        assert_eq!(trips.len(), 1);
        assert!((trips[0].total_cost() - 36.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn artifacts_reused_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let service = network();
        let planner = Planner::new(&service, SearchConfig::default())
            .unwrap()
            .with_artifacts(ArtifactStore::new(dir.path()));

        let first = planner.discover(code("TRS"), None, window()).await.unwrap();
        let calls = (service.destination_calls(), service.fare_calls());

        let second = planner.discover(code("TRS"), None, window()).await.unwrap();
        assert_eq!((service.destination_calls(), service.fare_calls()), calls);
        assert_eq!(second.adjacency, first.adjacency);
        assert_eq!(second.graph, first.graph);
        assert_eq!(second.pruned, 1);

        // A different allow-list is a different scope.
        let allow: BTreeSet<Iata> = [code("BGY"), code("STN")].into_iter().collect();
        let third = planner.discover(code("TRS"), Some(&allow), window()).await.unwrap();
        assert!(service.destination_calls() > calls.0);
        assert_eq!(third.closed_paths.len(), 1);
    }

    fn direct_network() -> StaticRouteService {
        let mut service = StaticRouteService::new();
        for c in ["TRS", "BGY", "STN"] {
            service = service.with_airport(Airport::new(code(c), 0.0, 0.0, c));
        }
        service
            .with_route(code("TRS"), code("BGY"))
            .with_route(code("TRS"), code("STN"))
            .with_route(code("BGY"), code("TRS"))
            .with_route(code("STN"), code("TRS"))
            .with_flight(flight("TRS", "BGY", 1, 8, 10.0))
            .with_flight(flight("TRS", "STN", 1, 9, 8.0))
            .with_flight(flight("STN", "TRS", 3, 8, 5.0))
            .with_flight(flight("BGY", "TRS", 2, 8, 40.0))
            // Eight nights after the outbound: inside the return window,
            // outside the night limit.
            .with_flight(flight("BGY", "TRS", 9, 8, 1.0))
    }

    #[tokio::test]
    async fn one_way_fares_ranked() {
        let service = direct_network();
        let planner = Planner::new(&service, SearchConfig::default()).unwrap();

        let fares = planner.one_way_fares(code("TRS"), None, window()).await.unwrap();
        let prices: Vec<f64> = fares.iter().map(|f| f.price).collect();
        assert_eq!(prices, vec![8.0, 10.0]);
        assert_eq!(service.destination_calls(), 1);

        let allow: BTreeSet<Iata> = [code("BGY")].into_iter().collect();
        let fares = planner.one_way_fares(code("TRS"), Some(&allow), window()).await.unwrap();
        assert_eq!(fares.len(), 1);
        assert_eq!(fares[0].destination, code("BGY"));
        assert_eq!(service.destination_calls(), 1);
    }

    #[tokio::test]
    async fn round_trip_fares_paired_by_nights() {
        let service = direct_network();
        let planner = Planner::new(&service, SearchConfig::default()).unwrap();

        let pairs = planner.round_trip_fares(code("TRS"), None, window()).await.unwrap();
        // BGY's 40.00 return is over the price limit, its 1.00 return is
        // eight nights out.
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].destination(), code("STN"));
        assert_eq!(pairs[0].nights(), 2);
        assert!((pairs[0].total_cost() - 13.0).abs() < 1e-9);
        // One outbound request, one inbound request per destination.
        assert_eq!(service.fare_calls(), 3);

        let unlimited = Planner::new(&service, SearchConfig::default().with_max_price(None)).unwrap();
        let pairs = unlimited.round_trip_fares(code("TRS"), None, window()).await.unwrap();
        let costs: Vec<f64> = pairs.iter().map(RoundTripFare::total_cost).collect();
        assert_eq!(costs, vec![13.0, 50.0]);
    }

    #[tokio::test]
    async fn direct_fares_need_destinations() {
        let service = direct_network().with_failure(code("TRS"));
        let planner = Planner::new(&service, SearchConfig::default()).unwrap();
        let result = planner.one_way_fares(code("TRS"), None, window()).await;
        assert!(matches!(result, Err(PlannerError::Service(_))));
    }

    #[tokio::test]
    async fn stream_trips_emits() {
        let service = network();
        let planner = Planner::new(&service, SearchConfig::default()).unwrap();
        let discovery = planner.discover(code("TRS"), None, window()).await.unwrap();

        let stop = AtomicBool::new(false);
        let count = std::sync::atomic::AtomicUsize::new(0);
        let emitted = planner
            .stream_trips(&discovery, &stop, &|_| {
                count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(emitted, 1);
        assert_eq!(count.into_inner(), 1);
    }
}
