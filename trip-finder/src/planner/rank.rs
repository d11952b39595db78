//! Trip ranking for search results.

use crate::domain::Trip;

/// Rank trips by total cost, cheapest first.
///
/// The sort is stable: trips of equal cost keep the order they were found
/// in, which under parallel search is itself unspecified.
pub fn rank_trips(mut trips: Vec<Trip>) -> Vec<Trip> {
    trips.sort_by(|a, b| a.total_cost().total_cmp(&b.total_cost()));
    trips
}

/// Cheapest and most expensive total cost, if there are any trips.
pub fn cost_range(trips: &[Trip]) -> Option<(f64, f64)> {
    trips.iter().map(Trip::total_cost).fold(None, |range, cost| match range {
        None => Some((cost, cost)),
        Some((lo, hi)) => Some((lo.min(cost), hi.max(cost))),
    })
}
