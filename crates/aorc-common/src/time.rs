//! Time helpers for month-granularity enumeration and hour-granularity grids.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::error::{AorcError, AorcResult};

/// First month with data in the AORC repository.
pub fn first_record_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1979, 2, 1).expect("valid constant date")
}

/// Format a date as the `YYYYMM` string used in archive filenames.
pub fn year_month(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

/// Snap a date to the first of its month.
pub fn month_floor(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("first of month is valid")
}

fn next_month(date: NaiveDate) -> NaiveDate {
    if date.month() < 12 {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    }
    .expect("first of month is valid")
}

/// All first-of-month dates from `start` through `end`, ascending.
///
/// Both bounds are snapped to the first of their month and the end month is
/// inclusive, so a range within a single month yields exactly one entry.
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = month_floor(start);
    let last = month_floor(end);
    while current <= last {
        months.push(current);
        current = next_month(current);
    }
    months
}

/// Format an hour timestamp as the `YYYYMMDDHH` key used in grid filenames
/// and composite store names.
pub fn hour_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d%H").to_string()
}

/// Parse a `YYYYMMDDHH` string into an hour-granularity UTC timestamp.
pub fn parse_hour_suffix(digits: &str) -> AorcResult<DateTime<Utc>> {
    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AorcError::InvalidTime(format!(
            "expected 10-digit YYYYMMDDHH, got {:?}",
            digits
        )));
    }
    let date = NaiveDate::parse_from_str(&digits[..8], "%Y%m%d")
        .map_err(|e| AorcError::InvalidTime(format!("bad date in {:?}: {}", digits, e)))?;
    let hour: u32 = digits[8..10]
        .parse()
        .map_err(|_| AorcError::InvalidTime(format!("bad hour in {:?}", digits)))?;
    let naive = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| AorcError::InvalidTime(format!("hour out of range in {:?}", digits)))?;
    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_range_within_year() {
        let start = NaiveDate::from_ymd_opt(1979, 2, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(1979, 4, 1).unwrap();
        let months = month_range(start, end);
        assert_eq!(
            months,
            vec![
                NaiveDate::from_ymd_opt(1979, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(1979, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(1979, 4, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_month_range_across_year_boundary() {
        let start = NaiveDate::from_ymd_opt(1979, 11, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(1980, 2, 28).unwrap();
        let months = month_range(start, end);
        assert_eq!(months.len(), 4);
        assert_eq!(months[2], NaiveDate::from_ymd_opt(1980, 1, 1).unwrap());
    }

    #[test]
    fn test_month_range_single_month() {
        let day = NaiveDate::from_ymd_opt(1979, 2, 10).unwrap();
        assert_eq!(month_range(day, day).len(), 1);
    }

    #[test]
    fn test_hour_suffix_roundtrip() {
        let ts = parse_hour_suffix("1979020100").unwrap();
        assert_eq!(hour_key(ts), "1979020100");
        assert_eq!(ts, Utc.with_ymd_and_hms(1979, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_hour_suffix_rejects_garbage() {
        assert!(parse_hour_suffix("197902010").is_err());
        assert!(parse_hour_suffix("1979assume").is_err());
        assert!(parse_hour_suffix("1979023100").is_err()); // Feb 31
        assert!(parse_hour_suffix("1979020125").is_err()); // hour 25
    }
}
