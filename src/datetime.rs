/// UTC date-time value type used by every persisted record
///
/// Timestamps are stored as integer Unix microseconds; the zero value is a
/// sentinel meaning "never" (no expiry, not set). Wrapping chrono keeps
/// that sentinel explicit instead of scattering `Option<DateTime<Utc>>`
/// through every query.
use chrono::{DateTime as ChronoDateTime, Duration, TimeZone, Utc};
use std::fmt;

/// Millisecond-precision layout used by [`DateTime::to_string`]; feeds the
/// CSRF token preimage, so it must stay stable.
const DATE_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DateTime(Option<ChronoDateTime<Utc>>);

impl DateTime {
    /// The current instant, truncated to microsecond precision so the
    /// in-memory value compares equal to what a stored row reads back.
    pub fn now() -> Self {
        Self::from_unix_micros(Utc::now().timestamp_micros())
    }

    /// The "never" sentinel.
    pub fn zero() -> Self {
        Self(None)
    }

    /// Reconstruct from a stored unix-microsecond value; 0 maps back to the
    /// zero sentinel.
    pub fn from_unix_micros(micros: i64) -> Self {
        if micros == 0 {
            return Self(None);
        }
        Self(Utc.timestamp_micros(micros).single())
    }

    /// Unix microseconds for storage; the zero sentinel stores as 0.
    pub fn unix_micros(&self) -> i64 {
        self.0.map(|t| t.timestamp_micros()).unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    /// True if this instant is set and lies in the past. The zero sentinel
    /// never counts as past, which is what gives eternal sessions and
    /// tokens their semantics.
    pub fn is_past(&self) -> bool {
        match self.0 {
            Some(t) => t < Utc::now(),
            None => false,
        }
    }

    /// This instant shifted by `duration`. Adding to the zero sentinel
    /// yields the zero sentinel.
    pub fn add(&self, duration: Duration) -> Self {
        Self(self.0.map(|t| t + duration))
    }
}

impl fmt::Display for DateTime {
    /// The zero sentinel formats as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{}", t.format(DATE_LAYOUT)),
            None => Ok(()),
        }
    }
}
