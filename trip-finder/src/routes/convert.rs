//! Conversion from fare API DTOs to domain types.
//!
//! Entries missing a required field are logged and skipped rather than
//! failing the whole response, so one malformed fare never costs the rest of
//! a day's results.

use chrono::NaiveDateTime;
use tracing::warn;

use crate::domain::{Airport, Flight, Iata, SEATS_UNKNOWN};

use super::types::{AirportDto, OneWayFaresResponse, OutboundDto, RouteDto};

/// Error during DTO to domain conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    /// Failed to parse an IATA code
    #[error("invalid IATA code: {0}")]
    InvalidIata(String),

    /// Failed to parse a timestamp
    #[error("invalid time: {0}")]
    InvalidTime(String),

    /// Missing required field
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Price rejected by the domain
    #[error("invalid price: {0}")]
    InvalidPrice(f64),
}

/// Convert the active airports list, skipping malformed entries.
pub fn convert_airports(dtos: &[AirportDto]) -> Vec<Airport> {
    dtos.iter()
        .filter_map(|dto| match convert_airport(dto) {
            Ok(airport) => Some(airport),
            Err(e) => {
                warn!(code = ?dto.code, error = %e, "skipping airport");
                None
            }
        })
        .collect()
}

fn convert_airport(dto: &AirportDto) -> Result<Airport, ConversionError> {
    let code = dto.code.as_deref().ok_or(ConversionError::MissingField("code"))?;
    let code = parse_iata(code)?;
    let coordinates = dto
        .coordinates
        .as_ref()
        .ok_or(ConversionError::MissingField("coordinates"))?;
    let latitude = coordinates
        .latitude
        .ok_or(ConversionError::MissingField("coordinates.latitude"))?;
    let longitude = coordinates
        .longitude
        .ok_or(ConversionError::MissingField("coordinates.longitude"))?;
    let name = dto.name.clone().unwrap_or_else(|| code.to_string());

    Ok(Airport::new(code, latitude, longitude, name))
}

/// Convert a routes list into destination codes, skipping malformed entries.
pub fn convert_routes(origin: &Iata, dtos: &[RouteDto]) -> Vec<Iata> {
    dtos.iter()
        .filter_map(|dto| {
            let code = dto.arrival_airport.as_ref().and_then(|a| a.code.as_deref());
            match code.map(parse_iata) {
                Some(Ok(code)) => Some(code),
                Some(Err(e)) => {
                    warn!(%origin, error = %e, "skipping route");
                    None
                }
                None => {
                    warn!(%origin, "skipping route without arrival airport");
                    None
                }
            }
        })
        .collect()
}

/// Convert a one-way fares response into flights departing `origin`.
pub fn convert_fares(origin: &Iata, response: &OneWayFaresResponse) -> Vec<Flight> {
    response
        .fares
        .iter()
        .filter_map(|fare| {
            let outbound = match fare.outbound.as_ref() {
                Some(outbound) => outbound,
                None => {
                    warn!(%origin, "skipping fare without outbound leg");
                    return None;
                }
            };
            match convert_outbound(origin, outbound) {
                Ok(flight) => Some(flight),
                Err(e) => {
                    warn!(%origin, error = %e, "skipping fare");
                    None
                }
            }
        })
        .collect()
}

fn convert_outbound(origin: &Iata, dto: &OutboundDto) -> Result<Flight, ConversionError> {
    let destination = dto
        .arrival_airport
        .as_ref()
        .and_then(|a| a.iata_code.as_deref())
        .ok_or(ConversionError::MissingField("arrivalAirport.iataCode"))?;
    let destination = parse_iata(destination)?;

    // The finder only returns fares from the requested airport, but trust the
    // payload when it says otherwise.
    let departure_airport = match dto.departure_airport.as_ref().and_then(|a| a.iata_code.as_deref()) {
        Some(code) => parse_iata(code)?,
        None => *origin,
    };

    let departure = dto
        .departure_date
        .as_deref()
        .ok_or(ConversionError::MissingField("departureDate"))?;
    let departure = parse_local_time(departure)?;

    let arrival = dto
        .arrival_date
        .as_deref()
        .ok_or(ConversionError::MissingField("arrivalDate"))?;
    let arrival = parse_local_time(arrival)?;

    let price = dto.price.as_ref().ok_or(ConversionError::MissingField("price"))?;
    let value = price.value.ok_or(ConversionError::MissingField("price.value"))?;
    let currency = price
        .currency_code
        .clone()
        .ok_or(ConversionError::MissingField("price.currencyCode"))?;

    Flight::new(
        departure_airport,
        destination,
        departure,
        arrival,
        value,
        SEATS_UNKNOWN,
        currency,
    )
    .map_err(|_| ConversionError::InvalidPrice(value))
}

fn parse_iata(code: &str) -> Result<Iata, ConversionError> {
    Iata::parse(code).map_err(|_| ConversionError::InvalidIata(code.to_string()))
}

/// Parse `2024-07-03T06:25:00`, tolerating a missing seconds field or a
/// trailing fractional part.
pub fn parse_local_time(s: &str) -> Result<NaiveDateTime, ConversionError> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ConversionError::InvalidTime(s.to_string()))
}
