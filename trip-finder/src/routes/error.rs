//! Route/fare collaborator error types.

/// Errors from a [`RouteService`](super::RouteService) implementation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization failed
    #[error("JSON parse error: {message}{}", format_body(.body))]
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API
    #[error("rate limited by fare API")]
    RateLimited,

    /// Response was well-formed JSON but not the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The service has no data for the requested airport
    #[error("no data for airport {0}")]
    UnknownAirport(String),

    /// A configured URL does not parse
    #[error("invalid URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Fixture file could not be read
    #[error("fixture error: {0}")]
    Fixture(#[from] std::io::Error),
}

fn format_body(body: &Option<String>) -> String {
    match body {
        Some(body) => format!(" (body: {body})"),
        None => String::new(),
    }
}
