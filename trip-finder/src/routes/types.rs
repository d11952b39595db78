//! Fare API response DTOs.
//!
//! These types map directly to the JSON returned by the carrier's public
//! endpoints. Fields are `Option` wherever the API has been seen to omit
//! them; conversion decides what is required.

use serde::Deserialize;

/// Entry of the active airports list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirportDto {
    pub code: Option<String>,
    pub name: Option<String>,
    pub coordinates: Option<CoordinatesDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatesDto {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Entry of the routes-per-airport list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    pub arrival_airport: Option<RouteAirportDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteAirportDto {
    pub code: Option<String>,
}

/// Response of the one-way fare finder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneWayFaresResponse {
    #[serde(default)]
    pub fares: Vec<FareDto>,

    /// Non-null when results are paginated; the finder is queried one day at
    /// a time so this is expected to be null.
    pub next_page: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FareDto {
    pub outbound: Option<OutboundDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundDto {
    pub departure_airport: Option<FareAirportDto>,
    pub arrival_airport: Option<FareAirportDto>,
    /// Local departure time, ISO 8601 without offset.
    pub departure_date: Option<String>,
    /// Local arrival time, ISO 8601 without offset.
    pub arrival_date: Option<String>,
    pub price: Option<PriceDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareAirportDto {
    pub iata_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDto {
    pub value: Option<f64>,
    pub currency_code: Option<String>,
}
