//! Reporting period resolution.

use std::fmt;

use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Tz;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Half-open reporting window `[start, end)`. Invariant: `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

/// An explicit period override from the invocation input, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodOverride {
    pub start_date: String,
    pub end_date: String,
}

impl Period {
    /// Construct a period, enforcing `start < end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start >= end {
            return Err(PeriodError::EmptyWindow {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse a period from `YYYY-MM-DD` date strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, PeriodError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// The default window when no explicit period is given: yesterday
    /// through today, as calendar dates in `tz`. The window deliberately
    /// covers a single day; daily extraction runs are expected to fire
    /// once per day.
    pub fn default_window(tz: Tz) -> Self {
        let today = Utc::now().with_timezone(&tz).date_naive();
        Self {
            start: today - Duration::days(1),
            end: today,
        }
    }

    /// Resolve the reporting window: an explicit override if present,
    /// otherwise the default window in `tz`.
    pub fn resolve(explicit: Option<&PeriodOverride>, tz: Tz) -> Result<Self, PeriodError> {
        match explicit {
            Some(range) => Self::parse(&range.start_date, &range.end_date),
            None => Ok(Self::default_window(tz)),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Window start as `YYYY-MM-DD`.
    pub fn start_string(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    /// Window end as `YYYY-MM-DD`.
    pub fn end_string(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_string(), self.end_string())
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, PeriodError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| PeriodError::InvalidDate {
        value: value.to_string(),
    })
}

/// Period validation errors.
#[derive(Debug, thiserror::Error)]
pub enum PeriodError {
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("invalid period {start}..{end}: start must precede end")]
    EmptyWindow { start: String, end: String },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn override_of(start: &str, end: &str) -> PeriodOverride {
        PeriodOverride {
            start_date: start.to_string(),
            end_date: end.to_string(),
        }
    }

    #[test]
    fn test_explicit_override_resolves() {
        let period = Period::resolve(
            Some(&override_of("2026-07-01", "2026-08-01")),
            chrono_tz::UTC,
        )
        .unwrap();
        assert_eq!(period.start_string(), "2026-07-01");
        assert_eq!(period.end_string(), "2026-08-01");
        assert_eq!(period.to_string(), "2026-07-01..2026-08-01");
    }

    #[rstest]
    #[case("2026-08-32", "2026-09-01")]
    #[case("08/01/2026", "2026-09-01")]
    #[case("2026-08-01", "not-a-date")]
    #[case("", "2026-09-01")]
    fn test_malformed_dates_rejected(#[case] start: &str, #[case] end: &str) {
        let result = Period::resolve(Some(&override_of(start, end)), chrono_tz::UTC);
        assert!(matches!(result, Err(PeriodError::InvalidDate { .. })));
    }

    #[rstest]
    #[case("2026-08-01", "2026-08-01")]
    #[case("2026-08-02", "2026-08-01")]
    fn test_inverted_or_empty_window_rejected(#[case] start: &str, #[case] end: &str) {
        let result = Period::resolve(Some(&override_of(start, end)), chrono_tz::UTC);
        assert!(matches!(result, Err(PeriodError::EmptyWindow { .. })));
    }

    #[test]
    fn test_default_window_is_one_day() {
        let period = Period::default_window(chrono_tz::America::Sao_Paulo);
        assert_eq!(period.end() - period.start(), Duration::days(1));
    }

    #[test]
    fn test_default_window_ends_today_in_zone() {
        let tz = chrono_tz::Pacific::Auckland;
        let period = Period::default_window(tz);
        // Re-derive "today" the same way; tolerate a midnight rollover
        // between the two clock reads.
        let today = Utc::now().with_timezone(&tz).date_naive();
        assert!(period.end() == today || period.end() == today - Duration::days(1));
    }
}
