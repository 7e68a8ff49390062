//! Calendar periods used to bucket samples for rolling averages.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A rolling averaging period. All windows are computed in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::Hour,
        Period::Day,
        Period::Week,
        Period::Month,
        Period::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Hour => "hour",
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// Returns the `[start, end)` window of this period that contains `as_of`.
    ///
    /// Weeks start on Monday.
    pub fn window(&self, as_of: DateTime<Utc>) -> PeriodWindow {
        let date = as_of.date_naive();
        let (start, end) = match self {
            Period::Hour => {
                let start = midnight(date) + TimeDelta::hours(i64::from(as_of.hour()));
                (start, start + TimeDelta::hours(1))
            }
            Period::Day => {
                let start = midnight(date);
                (start, start + TimeDelta::days(1))
            }
            Period::Week => {
                let monday = date - Days::new(u64::from(date.weekday().num_days_from_monday()));
                let start = midnight(monday);
                (start, start + TimeDelta::days(7))
            }
            Period::Month => {
                let first = date - Days::new(u64::from(date.day0()));
                (midnight(first), midnight(add_months(first, 1)))
            }
            Period::Year => {
                let first = date - Days::new(u64::from(date.ordinal0()));
                (midnight(first), midnight(add_months(first, 12)))
            }
        };

        PeriodWindow { start, end }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Period::Hour),
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            other => Err(format!(
                "unknown period '{other}', expected one of hour, day, week, month, year"
            )),
        }
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_hour_window() {
        let w = Period::Hour.window(at(2024, 3, 5, 10, 42, 7));
        assert_eq!(w.start, at(2024, 3, 5, 10, 0, 0));
        assert_eq!(w.end, at(2024, 3, 5, 11, 0, 0));
        assert!(w.contains(at(2024, 3, 5, 10, 0, 0)));
        assert!(!w.contains(at(2024, 3, 5, 11, 0, 0)));
    }

    #[test]
    fn test_week_starts_on_monday() {
        // 2024-03-07 is a Thursday
        let w = Period::Week.window(at(2024, 3, 7, 8, 0, 0));
        assert_eq!(w.start, at(2024, 3, 4, 0, 0, 0));
        assert_eq!(w.end, at(2024, 3, 11, 0, 0, 0));
    }

    #[test]
    fn test_month_and_year_windows() {
        let m = Period::Month.window(at(2024, 2, 29, 23, 59, 59));
        assert_eq!(m.start, at(2024, 2, 1, 0, 0, 0));
        assert_eq!(m.end, at(2024, 3, 1, 0, 0, 0));

        let y = Period::Year.window(at(2024, 12, 31, 12, 0, 0));
        assert_eq!(y.start, at(2024, 1, 1, 0, 0, 0));
        assert_eq!(y.end, at(2025, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_parse_period() {
        assert_eq!("Hour".parse::<Period>().unwrap(), Period::Hour);
        assert_eq!(" year ".parse::<Period>().unwrap(), Period::Year);
        assert!("fortnight".parse::<Period>().is_err());
    }
}
