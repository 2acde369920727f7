//! # Time Utilities
//!
//! Utilities for time formatting and manipulation using chrono.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Get current UTC time.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Format time as RFC3339 string with microsecond precision.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Convert microseconds since the Unix epoch back to a UTC DateTime.
pub fn from_micros(micros: i64) -> Result<DateTime<Utc>, Error> {
    Utc.timestamp_micros(micros)
        .single()
        .ok_or(Error::OutOfRange(micros))
}

/// Clock that hands out strictly increasing microsecond timestamps.
///
/// Wall-clock time is used when it has moved forward; otherwise the previous
/// value plus one microsecond is issued, so two calls never share an instant.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp in microseconds since the Unix epoch.
    pub fn next_micros(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    /// Ensure every later timestamp is strictly greater than `floor_micros`.
    pub fn advance_to(&self, floor_micros: i64) {
        self.last_micros.fetch_max(floor_micros, Ordering::SeqCst);
    }
}

// region:    --- Error
#[derive(Debug)]
pub enum Error {
    OutOfRange(i64),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}
// endregion: --- Error
