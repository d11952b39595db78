//! Search configuration for the trip planner.

use chrono::NaiveDate;

use crate::domain::ConnectionRule;

/// Default maximum number of legs in a closed itinerary.
pub const DEFAULT_CUTOFF: usize = 4;

/// Default fan-out multiplier for I/O-bound phases.
pub const DEFAULT_PARALLEL_FACTOR: usize = 3;

/// Invalid search parameters, rejected before any search begins.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("cutoff must be at least 1")]
    ZeroCutoff,

    #[error("min nights {min} exceeds max nights {max}")]
    InvertedNights { min: u32, max: u32 },

    #[error("max price must be a non-negative number, got {0}")]
    InvalidMaxPrice(f64),

    #[error("parallel factor must be at least 1")]
    ZeroParallelFactor,

    #[error("date window starts {from} after it ends {to}")]
    InvertedWindow { from: NaiveDate, to: NaiveDate },
}

/// Number of available CPU cores.
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Configuration parameters for trip search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum number of legs (edges) in a closed itinerary.
    pub cutoff: usize,

    /// Minimum nights between legs. Zero means same-day connections with a
    /// two hour turnaround.
    pub min_nights: u32,

    /// Maximum nights between legs. Ignored when `min_nights` is zero.
    pub max_nights: u32,

    /// Fares above this price are dropped before the graph is built.
    pub max_price: Option<f64>,

    /// I/O fan-out is `cpu_count() * parallel_factor`.
    pub parallel_factor: usize,

    /// Truncate ranked results to this many trips.
    pub max_results: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            min_nights: 0,
            max_nights: 7,
            max_price: Some(30.0),
            parallel_factor: DEFAULT_PARALLEL_FACTOR,
            max_results: None,
        }
    }
}

impl SearchConfig {
    pub fn with_cutoff(mut self, cutoff: usize) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn with_nights(mut self, min: u32, max: u32) -> Self {
        self.min_nights = min;
        self.max_nights = max;
        self
    }

    pub fn with_max_price(mut self, max_price: Option<f64>) -> Self {
        self.max_price = max_price;
        self
    }

    pub fn with_parallel_factor(mut self, factor: usize) -> Self {
        self.parallel_factor = factor;
        self
    }

    pub fn with_max_results(mut self, n: Option<usize>) -> Self {
        self.max_results = n;
        self
    }

    /// Check every parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cutoff == 0 {
            return Err(ConfigError::ZeroCutoff);
        }
        if self.min_nights > self.max_nights {
            return Err(ConfigError::InvertedNights {
                min: self.min_nights,
                max: self.max_nights,
            });
        }
        if let Some(price) = self.max_price {
            if !price.is_finite() || price < 0.0 {
                return Err(ConfigError::InvalidMaxPrice(price));
            }
        }
        if self.parallel_factor == 0 {
            return Err(ConfigError::ZeroParallelFactor);
        }
        Ok(())
    }

    /// The leg connection rule implied by the night bounds.
    pub fn connection_rule(&self) -> Result<ConnectionRule, ConfigError> {
        ConnectionRule::new(self.min_nights, self.max_nights).map_err(|_| {
            ConfigError::InvertedNights {
                min: self.min_nights,
                max: self.max_nights,
            }
        })
    }

    /// Worker count for an I/O-bound phase over `units` independent items.
    pub fn io_workers(&self, units: usize) -> usize {
        (cpu_count() * self.parallel_factor).min(units).max(1)
    }
}

/// Inclusive range of departure dates for fare collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ConfigError> {
        if from > to {
            return Err(ConfigError::InvertedWindow { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Number of days covered, inclusive.
    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    #[test]
    fn default_config() {
        let config = SearchConfig::default();

        assert_eq!(config.cutoff, 4);
        assert_eq!(config.min_nights, 0);
        assert_eq!(config.max_nights, 7);
        assert_eq!(config.max_price, Some(30.0));
        assert_eq!(config.parallel_factor, 3);
        assert_eq!(config.max_results, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_cutoff() {
        let config = SearchConfig::default().with_cutoff(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCutoff));
    }

    #[test]
    fn rejects_inverted_nights() {
        let config = SearchConfig::default().with_nights(3, 1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedNights { min: 3, max: 1 })
        );
        assert!(config.connection_rule().is_err());
    }

    #[test]
    fn rejects_bad_max_price() {
        let config = SearchConfig::default().with_max_price(Some(-1.0));
        assert_eq!(config.validate(), Err(ConfigError::InvalidMaxPrice(-1.0)));

        let config = SearchConfig::default().with_max_price(Some(f64::INFINITY));
        assert!(config.validate().is_err());

        let config = SearchConfig::default().with_max_price(None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_parallel_factor() {
        let config = SearchConfig::default().with_parallel_factor(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroParallelFactor));
    }

    #[test]
    fn io_workers_bounded_by_units() {
        let config = SearchConfig::default();
        assert_eq!(config.io_workers(1), 1);
        assert_eq!(config.io_workers(0), 1);
        assert!(config.io_workers(10_000) <= cpu_count() * 3);
    }

    #[test]
    fn date_window() {
        let window = DateWindow::new(date(1), date(7)).unwrap();
        assert_eq!(window.from(), date(1));
        assert_eq!(window.to(), date(7));
        assert_eq!(window.days(), 7);

        assert_eq!(DateWindow::new(date(3), date(3)).unwrap().days(), 1);
        assert_eq!(
            DateWindow::new(date(5), date(1)),
            Err(ConfigError::InvertedWindow {
                from: date(5),
                to: date(1)
            })
        );
    }
}
