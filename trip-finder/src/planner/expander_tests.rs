//! Contract tests shared by both itinerary expansion strategies.
//!
//! The graph walk and path backtracking must produce the same trips from
//! the same fares; every test here runs both and compares.

use super::Strategy as Expansion;
use super::{
    DateWindow, FareGraph, GraphWalker, PathExpander, Planner, SearchConfig, find_closed_paths,
    rank_trips,
};
use crate::domain::{Airport, ConnectionRule, Flight, FlightKey, Iata, Trip};
use crate::routes::StaticRouteService;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use std::collections::BTreeSet;

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

fn graph_of(flights: impl IntoIterator<Item = Flight>) -> FareGraph {
    let mut graph = FareGraph::new();
    for f in flights {
        graph.add_flight(f);
    }
    graph
}

/// Run both strategies over `graph`.
fn both(graph: &FareGraph, origin: Iata, rule: ConnectionRule, cutoff: usize) -> [Vec<Trip>; 2] {
    let walked = GraphWalker::new(graph, origin, rule, cutoff)
        .unwrap()
        .find_trips()
        .unwrap();

    let paths = find_closed_paths(&graph.topology(), origin, cutoff).unwrap();
    let expanded = PathExpander::new(graph, rule).expand_all(&paths).unwrap();

    [walked, expanded]
}

/// Trips as comparable leg-key sequences.
fn keys(trips: &[Trip]) -> BTreeSet<Vec<FlightKey>> {
    trips.iter().map(Trip::flight_keys).collect()
}

fn assert_trip_invariants(trip: &Trip, origin: Iata, rule: &ConnectionRule, cutoff: usize) {
    let flights = trip.flights();
    assert!(flights.len() >= 3 && flights.len() <= cutoff);
    assert_eq!(flights[0].origin, origin);
    assert_eq!(flights[flights.len() - 1].destination, origin);

    for pair in flights.windows(2) {
        assert_eq!(pair[0].destination, pair[1].origin);
        assert!(pair[1].departure > pair[0].arrival);
        assert!(rule.allows(pair[0].arrival, pair[1].departure));
    }

    let sum: f64 = flights.iter().map(|f| f.price).sum();
    assert!((trip.total_cost() - sum).abs() < 1e-6);
    assert_eq!(
        trip.total_duration(),
        flights[flights.len() - 1].arrival - flights[0].departure
    );
    assert_eq!(trip.stays().len(), flights.len() - 1);

    let stops: BTreeSet<Iata> = flights[..flights.len() - 1]
        .iter()
        .map(|f| f.destination)
        .collect();
    assert_eq!(stops.len(), flights.len() - 1);
    assert!(!stops.contains(&origin));
}

#[test]
fn three_city_round_trip() {
    let graph = graph_of([
        flight("TRS", "BBB", 1, 8, 19.99),
        flight("BBB", "CCC", 2, 10, 7.5),
        flight("CCC", "TRS", 3, 18, 12.25),
    ]);
    let rule = ConnectionRule::new(0, 3).unwrap();

    for trips in both(&graph, code("TRS"), rule, 4) {
        assert_eq!(trips.len(), 1);
        let trip = &trips[0];
        assert_eq!(trip.leg_count(), 3);
        assert!((trip.total_cost() - (19.99 + 7.5 + 12.25)).abs() < 1e-6);
        assert_eq!(trip.stays().len(), 2);
        assert_eq!(trip.stays()[0].location, code("BBB"));
        assert_eq!(trip.stays()[1].location, code("CCC"));
        assert_eq!(trip.stays()[0].duration, Duration::hours(25));
        assert_eq!(trip.total_duration(), at(3, 19) - at(1, 8));
    }
}

#[test]
fn out_and_back_never_returned() {
    let graph = graph_of([
        flight("TRS", "BBB", 1, 8, 5.0),
        flight("BBB", "TRS", 2, 8, 5.0),
    ]);
    let rule = ConnectionRule::new(0, 3).unwrap();
    for trips in both(&graph, code("TRS"), rule, 4) {
        assert!(trips.is_empty());
    }
}

#[test]
fn turnaround_floor_when_no_nights() {
    // Lands 09:00; a 10:30 departure is under two hours, 11:00 is exactly two.
    let graph = graph_of([
        flight("TRS", "BBB", 1, 8, 5.0),
        Flight::new(
            code("BBB"),
            code("CCC"),
            at(1, 10) + Duration::minutes(30),
            at(1, 12),
            5.0,
            -1,
            "EUR",
        )
        .unwrap(),
        flight("BBB", "CCC", 1, 11, 6.0),
        flight("CCC", "TRS", 1, 20, 5.0),
    ]);
    let rule = ConnectionRule::new(0, 0).unwrap();

    for trips in both(&graph, code("TRS"), rule, 3) {
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].flights()[1].departure, at(1, 11));
    }
}

#[test]
fn night_window_in_whole_days() {
    let graph = graph_of([
        flight("TRS", "BBB", 1, 8, 5.0),
        // Same day: zero nights.
        flight("BBB", "CCC", 1, 20, 5.0),
        // 47 hours later: one night by whole days.
        Flight::new(code("BBB"), code("CCC"), at(3, 8), at(3, 9), 5.0, -1, "EUR").unwrap(),
        flight("CCC", "TRS", 4, 10, 5.0),
        flight("CCC", "TRS", 6, 10, 5.0),
    ]);
    let rule = ConnectionRule::new(1, 2).unwrap();

    let [walked, expanded] = both(&graph, code("TRS"), rule, 3);
    assert_eq!(keys(&walked), keys(&expanded));
    // BBB day 3 then CCC day 4 (1 night) or day 6 (3 nights, too many).
    assert_eq!(walked.len(), 1);
    assert_eq!(walked[0].flights()[2].departure, at(4, 10));
}

#[test]
fn parallel_edges_multiply() {
    let graph = graph_of([
        flight("TRS", "BBB", 1, 6, 5.0),
        flight("TRS", "BBB", 1, 8, 6.0),
        flight("BBB", "CCC", 2, 8, 5.0),
        flight("BBB", "CCC", 2, 14, 4.0),
        flight("CCC", "TRS", 3, 8, 5.0),
    ]);
    let rule = ConnectionRule::new(0, 3).unwrap();

    let [walked, expanded] = both(&graph, code("TRS"), rule, 3);
    assert_eq!(walked.len(), 4);
    assert_eq!(keys(&walked), keys(&expanded));

    let ranked = rank_trips(walked);
    assert!((ranked[0].total_cost() - 14.0).abs() < 1e-6);
    assert!((ranked[3].total_cost() - 16.0).abs() < 1e-6);
}

#[tokio::test]
async fn end_to_end_through_planner() {
    let service = StaticRouteService::new()
        .with_airport(Airport::new(code("TRS"), 45.8, 13.4, "Trieste"))
        .with_airport(Airport::new(code("BBB"), 0.0, 0.0, "B"))
        .with_airport(Airport::new(code("CCC"), 0.0, 0.0, "C"))
        .with_route(code("TRS"), code("BBB"))
        .with_route(code("BBB"), code("CCC"))
        .with_route(code("CCC"), code("TRS"))
        .with_flight(flight("TRS", "BBB", 1, 8, 10.0))
        .with_flight(flight("BBB", "CCC", 2, 8, 11.0))
        .with_flight(flight("CCC", "TRS", 3, 8, 12.0));
    let config = SearchConfig::default().with_nights(0, 3);
    let planner = Planner::new(&service, config).unwrap();
    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
    )
    .unwrap();

    let discovery = planner.discover(code("TRS"), None, window).await.unwrap();

    for strategy in [Expansion::GraphWalk, Expansion::PathBacktrack] {
        let trips = planner.find_trips(&discovery, strategy).unwrap();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].leg_count(), 3);
        assert!((trips[0].total_cost() - 33.0).abs() < 1e-6);
        let stays: Vec<Iata> = trips[0].stays().iter().map(|s| s.location).collect();
        assert_eq!(stays, vec![code("BBB"), code("CCC")]);
    }
}

#[tokio::test]
async fn bundled_fixture() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/trieste.json");
    let service = StaticRouteService::from_fixture(path).unwrap();
    let planner = Planner::new(&service, SearchConfig::default()).unwrap();
    let window = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 7, 6).unwrap(),
    )
    .unwrap();

    let discovery = planner.discover(code("TRS"), None, window).await.unwrap();

    for strategy in [Expansion::GraphWalk, Expansion::PathBacktrack] {
        let trips = planner.find_trips(&discovery, strategy).unwrap();
        let costs: Vec<f64> = trips.iter().map(Trip::total_cost).collect();
        let expected = [38.98, 58.98, 61.98, 69.46];
        assert_eq!(costs.len(), expected.len(), "{strategy}");
        for (cost, want) in costs.iter().zip(expected) {
            assert!((cost - want).abs() < 1e-6, "{strategy}: {cost} != {want}");
        }
        assert_eq!(
            trips[0].route(),
            vec![code("TRS"), code("BGY"), code("CIA"), code("TRS")]
        );
    }
}

const CODES: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];

fn arb_flights() -> impl Strategy<Value = Vec<Flight>> {
    prop::collection::vec(
        (0..4usize, 0..4usize, 1..6u32, 0..20u32, 0..100u32),
        0..25,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .filter(|(from, to, ..)| from != to)
            .map(|(from, to, day, hour, cents)| {
                flight(CODES[from], CODES[to], day, hour, f64::from(cents) / 4.0)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn strategies_agree(
        flights in arb_flights(),
        min_nights in 0..2u32,
        extra_nights in 0..3u32,
        cutoff in 3..6usize,
    ) {
        let graph = graph_of(flights);
        let rule = ConnectionRule::new(min_nights, min_nights + extra_nights).unwrap();
        let origin = code(CODES[0]);

        let [walked, expanded] = both(&graph, origin, rule, cutoff);

        for trip in walked.iter().chain(&expanded) {
            assert_trip_invariants(trip, origin, &rule, cutoff);
        }
        prop_assert_eq!(walked.len(), expanded.len());
        prop_assert_eq!(keys(&walked), keys(&expanded));
    }
}
