//! Direct fares: cheapest one-way flights and out-and-back pairs.
//!
//! These searches skip the multi-city phases entirely. They ask for fares
//! between the origin and each destination and rank what comes back.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{Flight, Iata};

use super::adjacency::AdjacencyMap;
use super::config::DateWindow;

/// An outbound flight and the matching flight home.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTripFare {
    pub outbound: Flight,
    pub inbound: Flight,
}

impl RoundTripFare {
    pub fn total_cost(&self) -> f64 {
        self.outbound.price + self.inbound.price
    }

    /// Calendar days between the two departures.
    pub fn nights(&self) -> i64 {
        (self.inbound.departure.date() - self.outbound.departure.date()).num_days()
    }

    pub fn destination(&self) -> Iata {
        self.outbound.destination
    }
}

/// Routes `origin -> destinations`.
pub fn outbound_routes(origin: Iata, destinations: &[Iata]) -> AdjacencyMap {
    destinations
        .iter()
        .filter(|&&d| d != origin)
        .map(|&d| (origin, d))
        .collect()
}

/// Routes `destination -> origin` for every destination.
pub fn inbound_routes(origin: Iata, destinations: &[Iata]) -> AdjacencyMap {
    destinations
        .iter()
        .filter(|&&d| d != origin)
        .map(|&d| (d, origin))
        .collect()
}

/// The window for return departures: the outbound window stretched by
/// `max_nights` days.
pub fn return_window(window: DateWindow, max_nights: u32) -> DateWindow {
    let to = window
        .to()
        .checked_add_days(chrono::Days::new(u64::from(max_nights)))
        .unwrap_or(NaiveDate::MAX);
    // `to` never moves before `from`.
    DateWindow::new(window.from(), to).unwrap_or(window)
}

/// Cheapest first; stable for equal prices.
pub fn rank_one_way(mut flights: Vec<Flight>) -> Vec<Flight> {
    flights.sort_by(|a, b| a.price.total_cmp(&b.price));
    flights
}

/// Pair every outbound flight with every inbound flight back from the same
/// airport whose departure falls `min_nights..=max_nights` calendar days
/// later, cheapest pair first.
///
/// The return must also leave after the outbound lands, which matters for
/// same-day pairs.
pub fn pair_round_trips(
    outbound: &[Flight],
    inbound: &[Flight],
    min_nights: u32,
    max_nights: u32,
) -> Vec<RoundTripFare> {
    let nights = i64::from(min_nights)..=i64::from(max_nights);
    let mut pairs: Vec<RoundTripFare> = outbound
        .iter()
        .flat_map(|out| {
            inbound
                .iter()
                .filter(move |back| {
                    back.origin == out.destination && back.destination == out.origin
                })
                .filter(move |back| back.departure > out.arrival)
                .map(move |back| RoundTripFare {
                    outbound: out.clone(),
                    inbound: back.clone(),
                })
        })
        .filter(|pair| nights.contains(&pair.nights()))
        .collect();

    pairs.sort_by(|a, b| a.total_cost().total_cmp(&b.total_cost()));
    pairs
}
