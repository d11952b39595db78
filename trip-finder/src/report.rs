//! Serializable summaries for batch output.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::{Flight, Stay, Trip};
use crate::planner::RoundTripFare;
use crate::routes::BookingLinks;

/// A ranked trip as written to the output file.
#[derive(Debug, Serialize)]
pub struct TripSummary {
    /// Airports in order, e.g. "TRS-BGY-STN-TRS"
    pub route: String,

    pub total_cost: f64,

    pub currency: String,

    /// First departure
    pub departure: String,

    /// Arrival back at the origin
    pub return_arrival: String,

    /// Door-to-door duration in minutes
    pub duration_minutes: i64,

    pub flight_count: usize,

    /// One entry per intermediate stop
    pub stays: Vec<StaySummary>,

    pub flights: Vec<FlightSummary>,
}

/// Time spent at an intermediate airport.
#[derive(Debug, Serialize)]
pub struct StaySummary {
    pub airport: String,
    pub hours: f64,
}

/// One leg of a trip.
#[derive(Debug, Serialize)]
pub struct FlightSummary {
    /// Identity key, e.g. "TRS(2024-07-01 08:00:00):BGY(2024-07-01 09:10:00)"
    pub key: String,
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub price: f64,
}

impl TripSummary {
    pub fn from_trip(trip: &Trip) -> Self {
        let route = trip
            .route()
            .iter()
            .map(|code| code.as_str())
            .collect::<Vec<_>>()
            .join("-");

        Self {
            route,
            total_cost: round_cents(trip.total_cost()),
            currency: trip.currency().to_string(),
            departure: format_time(trip.departure_time()),
            return_arrival: format_time(trip.return_time()),
            duration_minutes: trip.total_duration().num_minutes(),
            flight_count: trip.leg_count(),
            stays: trip.stays().iter().map(StaySummary::from_stay).collect(),
            flights: trip.flights().iter().map(FlightSummary::from_flight).collect(),
        }
    }
}

impl StaySummary {
    fn from_stay(stay: &Stay) -> Self {
        // Minute precision is all the fare source publishes.
        let hours = stay.duration.num_minutes() as f64 / 60.0;
        Self {
            airport: stay.location.to_string(),
            hours: (hours * 100.0).round() / 100.0,
        }
    }
}

impl FlightSummary {
    fn from_flight(flight: &Flight) -> Self {
        Self {
            key: flight.key().to_string(),
            origin: flight.origin.to_string(),
            destination: flight.destination.to_string(),
            departure: format_time(flight.departure),
            arrival: format_time(flight.arrival),
            price: flight.price,
        }
    }
}

/// Summaries for already-ranked trips.
pub fn summarize(trips: &[Trip]) -> Vec<TripSummary> {
    trips.iter().map(TripSummary::from_trip).collect()
}

/// A direct one-way fare with its booking link.
#[derive(Debug, Serialize)]
pub struct FareSummary {
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub price: f64,
    pub currency: String,
    pub link: String,
}

/// An out-and-back pair with its booking link.
#[derive(Debug, Serialize)]
pub struct RoundTripSummary {
    pub origin: String,
    pub destination: String,
    pub outbound_departure: String,
    pub outbound_arrival: String,
    pub return_departure: String,
    pub return_arrival: String,
    pub outbound_price: f64,
    pub return_price: f64,
    pub total_cost: f64,
    pub nights: i64,
    pub currency: String,
    pub link: String,
}

/// Summaries for already-ranked one-way fares.
pub fn summarize_one_way(flights: &[Flight], links: &BookingLinks) -> Vec<FareSummary> {
    flights
        .iter()
        .map(|f| FareSummary {
            origin: f.origin.to_string(),
            destination: f.destination.to_string(),
            departure: format_time(f.departure),
            arrival: format_time(f.arrival),
            price: f.price,
            currency: f.currency.clone(),
            link: links.one_way(f.origin, f.destination, f.departure.date()),
        })
        .collect()
}

/// Summaries for already-ranked round-trip pairs.
pub fn summarize_round_trips(
    pairs: &[RoundTripFare],
    links: &BookingLinks,
) -> Vec<RoundTripSummary> {
    pairs
        .iter()
        .map(|pair| {
            let (out, back) = (&pair.outbound, &pair.inbound);
            RoundTripSummary {
                origin: out.origin.to_string(),
                destination: out.destination.to_string(),
                outbound_departure: format_time(out.departure),
                outbound_arrival: format_time(out.arrival),
                return_departure: format_time(back.departure),
                return_arrival: format_time(back.arrival),
                outbound_price: out.price,
                return_price: back.price,
                total_cost: round_cents(pair.total_cost()),
                nights: pair.nights(),
                currency: out.currency.clone(),
                link: links.round_trip(
                    out.origin,
                    out.destination,
                    out.departure.date(),
                    back.departure.date(),
                ),
            }
        })
        .collect()
}

fn format_time(time: NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
