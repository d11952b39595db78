//! Ryanair public API client.
//!
//! Provides async methods for the airport list, per-airport route list and
//! the one-way fare finder. Concurrency is limited with a semaphore; session
//! bootstrapping and proxy rotation are left to whatever sits in front of
//! the base URLs.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::domain::{Airport, Flight, Iata};

use super::RouteService;
use super::convert::{convert_airports, convert_fares, convert_routes};
use super::error::ServiceError;
use super::types::{AirportDto, OneWayFaresResponse, RouteDto};

/// Default base URL for the airport and route views.
const DEFAULT_BASE_URL: &str = "https://www.ryanair.com/api";

/// Default base URL for the fare finder.
const DEFAULT_SERVICES_URL: &str = "https://services-api.ryanair.com";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default market, which fixes the fare currency.
const DEFAULT_MARKET: &str = "it-it";

/// Configuration for the Ryanair client.
#[derive(Debug, Clone)]
pub struct RyanairConfig {
    /// Base URL for airport and route lookups
    pub base_url: String,
    /// Base URL for the fare finder
    pub services_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Market code sent with fare requests
    pub market: String,
    /// Optional promo code sent with fare requests
    pub promo_code: Option<String>,
}

impl Default for RyanairConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            services_url: DEFAULT_SERVICES_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 60,
            market: DEFAULT_MARKET.to_string(),
            promo_code: None,
        }
    }
}

impl RyanairConfig {
    /// Point both endpoints at the same host (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.services_url = url.clone();
        self.base_url = url;
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the fare market.
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    /// Set a promo code for fare requests.
    pub fn with_promo_code(mut self, code: impl Into<String>) -> Self {
        self.promo_code = Some(code.into());
        self
    }
}

/// Ryanair public API client.
#[derive(Debug, Clone)]
pub struct RyanairClient {
    http: reqwest::Client,
    base_url: String,
    services_url: String,
    market: String,
    promo_code: Option<String>,
    semaphore: Arc<Semaphore>,
}

impl RyanairClient {
    /// Create a new client with the given configuration.
    pub fn new(config: RyanairConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            services_url: config.services_url.trim_end_matches('/').to_string(),
            market: config.market,
            promo_code: config.promo_code,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// GET `url` with `query` and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ServiceError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ServiceError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let response = self.http.get(url).query(query).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ServiceError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| ServiceError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }

    /// Query the fare finder for a single departure day.
    async fn fares_on(
        &self,
        origin: &Iata,
        destinations: &[Iata],
        day: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError> {
        let url = format!("{}/farfnd/v4/oneWayFares", self.services_url);
        let day = day.format("%Y-%m-%d").to_string();

        let mut query = vec![
            ("departureAirportIataCode", origin.to_string()),
            ("outboundDepartureDateFrom", day.clone()),
            ("outboundDepartureDateTo", day),
            ("outboundDepartureTimeFrom", "00:00".to_string()),
            ("outboundDepartureTimeTo", "23:59".to_string()),
            ("adultPaxCount", "1".to_string()),
            ("market", self.market.clone()),
            (
                "promoCode",
                self.promo_code.clone().unwrap_or_default(),
            ),
        ];
        query.extend(
            destinations
                .iter()
                .map(|d| ("arrivalAirportIataCodes", d.to_string())),
        );

        let response: OneWayFaresResponse = self.get_json(&url, &query).await?;
        if response.next_page.as_ref().is_some_and(|p| !p.is_null()) {
            debug!(%origin, "fare finder reported a further page; ignoring");
        }

        Ok(convert_fares(origin, &response))
    }
}

impl RouteService for RyanairClient {
    async fn list_airports(&self) -> Result<Vec<Airport>, ServiceError> {
        let url = format!("{}/views/locate/5/airports/en/active", self.base_url);
        let dtos: Vec<AirportDto> = self.get_json(&url, &[]).await?;
        Ok(convert_airports(&dtos))
    }

    async fn list_destinations(&self, origin: &Iata) -> Result<Vec<Iata>, ServiceError> {
        let url = format!(
            "{}/views/locate/searchWidget/routes/en/airport/{}",
            self.base_url, origin
        );
        let dtos: Vec<RouteDto> = self.get_json(&url, &[]).await?;
        Ok(convert_routes(origin, &dtos))
    }

    /// One fare request per departure day, with every destination in each.
    ///
    /// Days that fail are logged and skipped; the call fails only when every
    /// day failed.
    async fn list_fares(
        &self,
        origin: &Iata,
        destinations: &[Iata],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Flight>, ServiceError> {
        if destinations.is_empty() || from > to {
            return Ok(Vec::new());
        }

        let days: Vec<NaiveDate> = std::iter::successors(Some(from), |d| {
            d.checked_add_days(Days::new(1)).filter(|next| *next <= to)
        })
        .collect();

        let results = join_all(days.iter().map(|day| self.fares_on(origin, destinations, *day))).await;

        let mut flights = Vec::new();
        let mut first_error = None;
        let mut failed = 0;
        for (day, result) in days.iter().zip(results) {
            match result {
                Ok(mut day_flights) => flights.append(&mut day_flights),
                Err(e) => {
                    warn!(%origin, %day, error = %e, "fare request failed");
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if failed == days.len() => Err(e),
            _ => Ok(flights),
        }
    }
}
