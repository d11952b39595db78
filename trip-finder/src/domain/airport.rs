//! Airport code and airport metadata types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid IATA code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid IATA code {input:?}: {reason}")]
pub struct InvalidIata {
    input: String,
    reason: &'static str,
}

/// Airport code: three uppercase ASCII letters such as `TRS`.
///
/// `Copy` and ordered, so it serves directly as a map key and path element.
/// Serialized as the bare code.
///
/// ```
/// use trip_finder::domain::Iata;
///
/// let code: Iata = "BGY".parse().unwrap();
/// assert_eq!(code.to_string(), "BGY");
/// assert!("bgy".parse::<Iata>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iata([u8; 3]);

impl Iata {
    pub fn parse(s: &str) -> Result<Self, InvalidIata> {
        let reject = |reason| InvalidIata {
            input: s.to_owned(),
            reason,
        };
        let letters: [u8; 3] = s
            .as_bytes()
            .try_into()
            .map_err(|_| reject("expected three letters"))?;
        if letters.iter().any(|b| !b.is_ascii_uppercase()) {
            return Err(reject("only A-Z allowed"));
        }
        Ok(Self(letters))
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for Iata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Iata").field(&format_args!("{self}")).finish()
    }
}

impl fmt::Display for Iata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl TryFrom<String> for Iata {
    type Error = InvalidIata;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Iata::parse(&value)
    }
}

impl From<Iata> for String {
    fn from(code: Iata) -> Self {
        code.as_str().to_string()
    }
}

impl std::str::FromStr for Iata {
    type Err = InvalidIata;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Iata::parse(s)
    }
}

/// An active airport served by the carrier.
///
/// Immutable once fetched; the collaborator layer caches the list for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub code: Iata,
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
}

impl Airport {
    pub fn new(code: Iata, latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self {
            code,
            latitude,
            longitude,
            name: name.into(),
        }
    }
}
