//! Scan request and response shapes

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use super::discovery::SourceKind;
use crate::errors::{AppError, Result};

/// Date format the arXiv query language expects for `submittedDate`
pub const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Inclusive submission-date window, always `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    #[serde(serialize_with = "compact_date")]
    from: NaiveDate,
    #[serde(serialize_with = "compact_date")]
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(AppError::InvalidDateRange {
                message: format!(
                    "from ({}) is after to ({})",
                    from.format(COMPACT_DATE_FORMAT),
                    to.format(COMPACT_DATE_FORMAT)
                ),
            });
        }
        Ok(Self { from, to })
    }

    /// Parse two `YYYYMMDD` strings.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        Self::new(parse_compact(from)?, parse_compact(to)?)
    }

    /// The `days`-long window ending at `today`.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let from = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { from, to: today }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn from_compact(&self) -> String {
        self.from.format(COMPACT_DATE_FORMAT).to_string()
    }

    pub fn to_compact(&self) -> String {
        self.to.format(COMPACT_DATE_FORMAT).to_string()
    }
}

fn parse_compact(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidDateRange {
            message: format!("'{}' is not a YYYYMMDD date", value),
        });
    }
    NaiveDate::parse_from_str(value, COMPACT_DATE_FORMAT).map_err(|e| AppError::InvalidDateRange {
        message: format!("'{}' is not a valid date: {}", value, e),
    })
}

fn compact_date<S: Serializer>(date: &NaiveDate, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(COMPACT_DATE_FORMAT))
}

/// Outcome of one scan invocation, returned to the trigger caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub source: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_searched: Option<usize>,
    /// Unique candidates after intra-batch dedup
    pub total_found: usize,
    pub new_discoveries: usize,
    pub total_stored: usize,
    pub sample_titles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_compact_range() {
        let range = DateRange::parse("20220101", "20261231").unwrap();
        assert_eq!(range.from(), date(2022, 1, 1));
        assert_eq!(range.to_compact(), "20261231");
    }

    #[test]
    fn test_single_day_range_is_valid() {
        assert!(DateRange::parse("20240229", "20240229").is_ok());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let err = DateRange::parse("20250101", "20240101").unwrap_err();
        assert!(matches!(err, AppError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_rejects_malformed_dates() {
        assert!(DateRange::parse("2024-01-01", "20240102").is_err());
        assert!(DateRange::parse("20241301", "20241302").is_err());
        assert!(DateRange::parse("", "20240102").is_err());
    }

    #[test]
    fn test_last_days() {
        let range = DateRange::last_days(date(2025, 3, 3), 7);
        assert_eq!(range.from(), date(2025, 2, 24));
        assert_eq!(range.to(), date(2025, 3, 3));
    }

    #[test]
    fn test_serializes_compact() {
        let range = DateRange::parse("20240101", "20240131").unwrap();
        let json = serde_json::to_value(range).unwrap();
        assert_eq!(json, serde_json::json!({"from": "20240101", "to": "20240131"}));
    }
}
