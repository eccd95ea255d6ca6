//! Validity windows.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use trigger_core::error::ParseError;

/// Daily time-of-day window plus an absolute expiry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchWindow {
    pub valid_from: NaiveTime,
    pub valid_until_time: NaiveTime,
    pub valid_until_date: NaiveDate,
}

impl WatchWindow {
    pub fn new(valid_from: NaiveTime, valid_until_time: NaiveTime, valid_until_date: NaiveDate) -> Self {
        Self {
            valid_from,
            valid_until_time,
            valid_until_date,
        }
    }

    /// Whole day, never expiring.
    pub fn all_day() -> Self {
        Self {
            valid_from: NaiveTime::MIN,
            // Leap-second nanos make this the last representable instant
            valid_until_time: NaiveTime::from_hms_nano_opt(23, 59, 59, 1_999_999_999).unwrap_or(NaiveTime::MIN),
            valid_until_date: NaiveDate::MAX,
        }
    }

    /// Parse the three textual columns of a rule record.
    pub fn parse(valid_from: &str, valid_until_time: &str, valid_until_date: &str) -> Result<Self, ParseError> {
        Ok(Self {
            valid_from: parse_time(valid_from)?,
            valid_until_time: parse_time(valid_until_time)?,
            valid_until_date: parse_date(valid_until_date)?,
        })
    }

    pub fn not_yet_open(&self, now: NaiveDateTime) -> bool {
        now.time() < self.valid_from
    }

    pub fn closed_for_today(&self, now: NaiveDateTime) -> bool {
        now.time() > self.valid_until_time
    }

    pub fn expired(&self, now: NaiveDateTime) -> bool {
        now.date() > self.valid_until_date
    }
}

impl Default for WatchWindow {
    fn default() -> Self {
        Self::all_day()
    }
}

fn parse_time(text: &str) -> Result<NaiveTime, ParseError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| ParseError::InvalidTime(text.to_string()))
}

fn parse_date(text: &str) -> Result<NaiveDate, ParseError> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| ParseError::InvalidDate(text.to_string()))
}
