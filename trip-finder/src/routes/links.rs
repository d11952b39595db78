//! Booking page links for direct fares.

use chrono::NaiveDate;
use reqwest::Url;

use crate::domain::Iata;

use super::ServiceError;

/// Flight selection page on the carrier's site.
pub const DEFAULT_FLIGHT_PAGE_URL: &str = "https://www.ryanair.com/en/us/trip/flights/select";

/// Builds links that open the carrier's flight selection page for a fare,
/// one adult passenger.
#[derive(Debug, Clone)]
pub struct BookingLinks {
    base: Url,
    promo_code: String,
}

impl BookingLinks {
    pub fn new(base: &str) -> Result<Self, ServiceError> {
        let base = Url::parse(base).map_err(|e| ServiceError::InvalidUrl {
            url: base.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            base,
            promo_code: String::new(),
        })
    }

    pub fn with_promo_code(mut self, code: impl Into<String>) -> Self {
        self.promo_code = code.into();
        self
    }

    /// Link for a single flight departing on `date_out`.
    pub fn one_way(&self, origin: Iata, destination: Iata, date_out: NaiveDate) -> String {
        self.build(origin, destination, date_out, None)
    }

    /// Link for an out-and-back pair.
    pub fn round_trip(
        &self,
        origin: Iata,
        destination: Iata,
        date_out: NaiveDate,
        date_in: NaiveDate,
    ) -> String {
        self.build(origin, destination, date_out, Some(date_in))
    }

    fn build(
        &self,
        origin: Iata,
        destination: Iata,
        date_out: NaiveDate,
        date_in: Option<NaiveDate>,
    ) -> String {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("adults", "1")
                .append_pair("teens", "0")
                .append_pair("children", "0")
                .append_pair("infants", "0")
                .append_pair("dateOut", &date_out.to_string());
            if let Some(date_in) = date_in {
                query.append_pair("dateIn", &date_in.to_string());
            }
            query
                .append_pair("isConnectedFlight", "false")
                .append_pair("discount", "0")
                .append_pair("promoCode", &self.promo_code)
                .append_pair("isReturn", if date_in.is_some() { "true" } else { "false" })
                .append_pair("originIata", origin.as_str())
                .append_pair("destinationIata", destination.as_str());
        }
        url.into()
    }
}
