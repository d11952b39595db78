//! Closed city sequences.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DomainError, Iata};

/// Shortest closed path that counts as a multi-city trip, in edges.
///
/// Two edges would be a plain out-and-back to a single city.
pub const MIN_CLOSED_PATH_EDGES: usize = 3;

/// A simple cycle of airport codes beginning and ending at the origin.
///
/// # Invariants
///
/// - First code equals last code (the origin)
/// - No other code repeats
/// - At least [`MIN_CLOSED_PATH_EDGES`] edges
///
/// Paths serialize as dash-joined codes, e.g. `"TRS-BGY-STN-TRS"`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClosedPath(Vec<Iata>);

impl ClosedPath {
    /// Validates and wraps a sequence of codes.
    pub fn new(codes: Vec<Iata>) -> Result<Self, DomainError> {
        let (first, last) = match (codes.first(), codes.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(DomainError::InvalidPath("path is empty")),
        };

        if first != last {
            return Err(DomainError::InvalidPath("path must end at its origin"));
        }

        if codes.len() - 1 < MIN_CLOSED_PATH_EDGES {
            return Err(DomainError::InvalidPath("path must have at least 3 edges"));
        }

        let mut seen = HashSet::with_capacity(codes.len());
        if !codes[..codes.len() - 1].iter().all(|c| seen.insert(*c)) {
            return Err(DomainError::InvalidPath("path revisits an airport"));
        }

        Ok(Self(codes))
    }

    /// The airport the path starts and ends at.
    pub fn origin(&self) -> Iata {
        self.0[0]
    }

    /// All codes including the closing origin.
    pub fn codes(&self) -> &[Iata] {
        &self.0
    }

    /// Number of edges (flights) in the path.
    pub fn edge_count(&self) -> usize {
        self.0.len() - 1
    }

    /// Consecutive `(from, to)` pairs along the path.
    pub fn hops(&self) -> impl Iterator<Item = (Iata, Iata)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }
}

impl fmt::Debug for ClosedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClosedPath({self})")
    }
}

impl fmt::Display for ClosedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            f.write_str(code.as_str())?;
        }
        Ok(())
    }
}

impl TryFrom<String> for ClosedPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let codes = value
            .split('-')
            .map(Iata::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DomainError::UnparsablePath(value.clone()))?;
        ClosedPath::new(codes)
    }
}

impl From<ClosedPath> for String {
    fn from(path: ClosedPath) -> Self {
        path.to_string()
    }
}
