//! Calendar month bucketing for trend charts.
//!
//! Buckets render as `MM-YYYY` but order chronologically (year first),
//! never lexicographically.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthBucket {
    year: i32,
    month: u32,
}

impl MonthBucket {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(MonthBucket { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        MonthBucket {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Advances by `months` calendar months, rolling December into January.
    pub fn advance(&self, months: u32) -> Self {
        let zero_based = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        MonthBucket {
            year: zero_based.div_euclid(12) as i32,
            month: zero_based.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn next(&self) -> Self {
        self.advance(1)
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

impl FromStr for MonthBucket {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || AnalyticsError::malformed(value, "expected MM-YYYY month label");
        let (month, year) = value.trim().split_once('-').ok_or_else(malformed)?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        let year: i32 = year.parse().map_err(|_| malformed())?;
        MonthBucket::new(year, month).ok_or_else(malformed)
    }
}

/// Parses the timestamp formats the backend services emit: RFC 3339,
/// `YYYY-MM-DD HH:MM:SS` and a bare `YYYY-MM-DD`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(value) {
        return Some(stamp.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(value, format) {
            return Some(stamp);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Month bucket of a raw timestamp, or `None` when it cannot be parsed.
pub fn month_key(value: &str) -> Option<MonthBucket> {
    parse_timestamp(value).map(|stamp| MonthBucket::from_date(stamp.date()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_uses_calendar_month() {
        assert_eq!(
            month_key("2025-03-14T09:30:00Z").map(|m| m.to_string()),
            Some("03-2025".to_string())
        );
        assert_eq!(
            month_key("2024-11-02 18:00:00").map(|m| m.to_string()),
            Some("11-2024".to_string())
        );
        assert_eq!(month_key("2024-07-01").map(|m| m.month()), Some(7));
        assert_eq!(month_key("not a date"), None);
    }

    #[test]
    fn advance_rolls_over_year() {
        let december = MonthBucket::new(2024, 12).unwrap();
        assert_eq!(december.next(), MonthBucket::new(2025, 1).unwrap());
        assert_eq!(december.advance(14), MonthBucket::new(2026, 2).unwrap());
        assert_eq!(december.advance(0), december);
    }

    #[test]
    fn ordering_is_chronological() {
        let late_2024: MonthBucket = "12-2024".parse().unwrap();
        let early_2025: MonthBucket = "01-2025".parse().unwrap();
        assert!(late_2024 < early_2025);
        // Lexicographic order of the labels would say the opposite.
        assert!(late_2024.to_string() > early_2025.to_string());
    }

    #[test]
    fn rejects_malformed_labels() {
        assert!("13-2024".parse::<MonthBucket>().is_err());
        assert!("2024".parse::<MonthBucket>().is_err());
        assert!("ab-2024".parse::<MonthBucket>().is_err());
    }
}
