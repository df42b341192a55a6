//! US Eastern time handling for due dates.
//!
//! The inference capability returns naive wall-clock times that are
//! implicitly Eastern. They are annotated with `America/New_York` here and
//! never pass through any other zone on the way.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;

pub const EASTERN: Tz = chrono_tz::America::New_York;

/// Wall-clock time used when a date has no time of day.
pub const END_OF_DAY: (u32, u32, u32) = (23, 59, 0);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    #[error("due date '{0}' carries a UTC offset; expected naive Eastern time")]
    OffsetNotAllowed(String),
    #[error("due date '{0}' is not an ISO-8601 date or date-time")]
    Unparseable(String),
}

/// Parse a naive ISO-8601 value as returned by the model.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM` and a bare
/// `YYYY-MM-DD` (which becomes end of day). Values with an offset or `Z`
/// are rejected.
pub fn parse_naive(raw: &str) -> Result<NaiveDateTime, DateError> {
    let value = raw.trim();

    if DateTime::parse_from_rfc3339(value).is_ok() {
        return Err(DateError::OffsetNotAllowed(raw.to_string()));
    }

    if let Ok(dt) = value.parse::<NaiveDateTime>() {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let (h, m, s) = END_OF_DAY;
        if let Some(dt) = date.and_hms_opt(h, m, s) {
            return Ok(dt);
        }
    }

    Err(DateError::Unparseable(raw.to_string()))
}

/// Attach the Eastern zone to a naive wall-clock time.
///
/// Ambiguous times in the November fall-back hour resolve to the earlier
/// (EDT) instant. Times inside the March spring-forward gap do not exist and
/// are moved forward by the length of the gap, so 02:30 becomes 03:30 EDT.
pub fn annotate_eastern(naive: NaiveDateTime) -> DateTime<Tz> {
    match EASTERN.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            // Offset in force just before the gap starts.
            let before = EASTERN.offset_from_utc_datetime(&naive).fix();
            let utc = naive - Duration::seconds(i64::from(before.local_minus_utc()));
            EASTERN.from_utc_datetime(&utc)
        }
    }
}

/// Parse and annotate in one step.
pub fn parse_eastern(raw: &str) -> Result<DateTime<Tz>, DateError> {
    parse_naive(raw).map(annotate_eastern)
}
