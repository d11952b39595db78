//! Connection feasibility between consecutive legs.

use chrono::{Duration, NaiveDateTime};

use super::DomainError;

/// Minimum same-day turnaround between two legs when no overnight stay is
/// required.
pub const MIN_TURNAROUND: Duration = Duration::seconds(2 * 60 * 60);

/// Rule deciding whether one leg can follow another.
///
/// The next leg must depart strictly after the previous one arrives. With
/// `min_nights == 0` the gap must be at least [`MIN_TURNAROUND`] and
/// `max_nights` is not consulted; otherwise the gap, in whole days, must lie
/// in `min_nights..=max_nights`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionRule {
    min_nights: u32,
    max_nights: u32,
}

impl ConnectionRule {
    pub fn new(min_nights: u32, max_nights: u32) -> Result<Self, DomainError> {
        if min_nights > max_nights {
            return Err(DomainError::InvertedNightWindow {
                min: min_nights,
                max: max_nights,
            });
        }
        Ok(Self {
            min_nights,
            max_nights,
        })
    }

    pub fn min_nights(&self) -> u32 {
        self.min_nights
    }

    pub fn max_nights(&self) -> u32 {
        self.max_nights
    }

    /// Returns true if a leg departing at `next_departure` may follow a leg
    /// arriving at `arrival`.
    pub fn allows(&self, arrival: NaiveDateTime, next_departure: NaiveDateTime) -> bool {
        if next_departure <= arrival {
            return false;
        }

        let gap = next_departure - arrival;

        if self.min_nights == 0 {
            return gap >= MIN_TURNAROUND;
        }

        // Whole days, truncated; the gap is positive here.
        let days = gap.num_days();
        days >= i64::from(self.min_nights) && days <= i64::from(self.max_nights)
    }
}
