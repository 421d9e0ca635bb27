use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::types::Type;
use duckdb::{Result as DuckResult, Row};
use std::str::FromStr;

/// Formats a timestamp for storage. Fixed-width UTC text, so text order is
/// time order.
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Reads a stored timestamp column back into a `DateTime<Utc>`.
pub fn timestamp_at(row: &Row<'_>, idx: usize) -> DuckResult<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a text column that holds one of a closed set of values.
pub fn enum_at<T>(row: &Row<'_>, idx: usize) -> DuckResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        duckdb::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamps_sort_as_text() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(1);

        let a = to_db_timestamp(&earlier);
        let b = to_db_timestamp(&later);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(a, "2024-01-01T09:00:00.000000Z");
    }
}
