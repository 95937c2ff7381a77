//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table
//! family. All public functions are re-exported here.

mod division;
mod event;
mod forecast;
mod imported;

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

pub use division::*;
pub use event::*;
pub use forecast::*;
pub use imported::*;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn parse_date(idx: usize, s: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_datetime(idx: usize, s: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_uuid(idx: usize, s: &str) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(s).map_err(|e| conversion_error(idx, e))
}

/// Parse a `str_enum!` column, surfacing unknown values as conversion failures.
pub(crate) fn parse_enum<T>(idx: usize, s: &str) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = super::DatabaseError>,
{
    T::from_str(s).map_err(|e| conversion_error(idx, e))
}

/// `?N, ?N+1, ...` placeholder list for dynamic `IN (...)` clauses.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_first() {
        assert_eq!(placeholders(5, 3), "?5, ?6, ?7");
        assert_eq!(placeholders(1, 0), "");
    }

    #[test]
    fn malformed_date_is_conversion_failure() {
        let err = parse_date(3, "2024-13-01").unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(3, _, _)));
    }

    #[test]
    fn datetime_round_trip_format() {
        let dt = NaiveDateTime::parse_from_str("2024-05-01 08:30:00", DATETIME_FORMAT).unwrap();
        assert_eq!(parse_datetime(0, &format_datetime(dt)).unwrap(), dt);
    }
}
