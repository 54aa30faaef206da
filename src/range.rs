use std::fmt;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc,
};
use serde::Serialize;

use crate::error::EngineError;

/// Inclusive UTC interval; `from <= to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, EngineError> {
        if to < from {
            return Err(EngineError::InvalidRange(format!(
                "end {} precedes start {}",
                format_instant(to),
                format_instant(from)
            )));
        }
        Ok(Self { from, to })
    }

    /// First to last millisecond of a calendar month.
    pub fn month(year: i32, month: u32) -> Result<Self, EngineError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            EngineError::InvalidRange(format!("{year:04}-{month:02} is not a calendar month"))
        })?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let next_start = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
            EngineError::InvalidRange(format!("{year:04}-{month:02} is out of range"))
        })?;

        Ok(Self {
            from: midnight(start),
            to: midnight(next_start) - Duration::milliseconds(1),
        })
    }

    pub fn current_month(now: DateTime<Utc>) -> Result<Self, EngineError> {
        Self::month(now.year(), now.month())
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// Whether a session held on `date` falls inside the range, comparing its midnight.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        let instant = midnight(date);
        self.from <= instant && instant <= self.to
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            format_instant(self.from),
            format_instant(self.to)
        )
    }
}

/// Resolve user-supplied range parameters against the current clock.
pub fn resolve(
    from: Option<&str>,
    to: Option<&str>,
    year_month: Option<&str>,
) -> Result<DateRange, EngineError> {
    resolve_at(from, to, year_month, Utc::now())
}

/// `year_month` wins over explicit bounds; explicit bounds need both ends;
/// otherwise the month containing `now` is used.
pub fn resolve_at(
    from: Option<&str>,
    to: Option<&str>,
    year_month: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateRange, EngineError> {
    if let Some(value) = year_month {
        let (year, month) = parse_year_month(value)?;
        return DateRange::month(year, month);
    }

    if let (Some(from), Some(to)) = (from, to) {
        return DateRange::new(parse_instant(from)?, parse_instant(to)?);
    }

    DateRange::current_month(now)
}

fn parse_year_month(value: &str) -> Result<(i32, u32), EngineError> {
    let invalid = || EngineError::InvalidRange(format!("month '{value}' must look like YYYY-MM"));

    let (year, month) = value.split_once('-').ok_or_else(invalid)?;
    let well_formed = year.len() == 4
        && month.len() == 2
        && year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(invalid());
    }

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    Ok((year, month))
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, EngineError> {
    let trimmed = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }
    // Without an offset the instant is read as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(instant) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(instant.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(midnight)
        .map_err(|_| EngineError::InvalidRange(format!("'{value}' is not a valid date")))
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
