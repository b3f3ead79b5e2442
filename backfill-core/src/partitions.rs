//! Partitions definitions
//!
//! A partitions definition describes the ordered key space of a partitioned
//! asset. Two families are supported:
//!
//! - **Time window**: consecutive windows of a fixed granularity starting at a
//!   start instant, optionally bounded by an exclusive end. A window only
//!   exists once it has fully elapsed relative to the `as_of` instant.
//! - **Static**: an explicit, ordered list of keys.
//!
//! # Key formats
//!
//! | Granularity | Format                | Example               |
//! |-------------|-----------------------|-----------------------|
//! | Hourly      | `%Y-%m-%d %H:%M:%S`   | `2024-01-15 13:00:00` |
//! | Daily       | `%Y-%m-%d`            | `2024-01-15`          |
//! | Weekly      | `%Y-%m-%d` (Sunday)   | `2024-01-14`          |
//! | Monthly     | `%Y-%m`               | `2024-01`             |
//! | Yearly      | `%Y`                  | `2024`                |
//!
//! Weekly windows start on Sunday unless the definition names another week
//! start day. Keys are stored in the formats above; lenient spellings such as
//! `2024-1-5` are accepted on input and normalized with
//! [`PartitionsDefinition::canonical_key`].

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Error types for partition key space operations
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Invalid partition key format: '{key}' (expected {expected_format})")]
    InvalidKeyFormat {
        key: String,
        expected_format: &'static str,
    },

    #[error("Partition key '{0}' does not start a partition window")]
    UnalignedKey(String),

    #[error("Partition key '{0}' is not part of the partitions definition")]
    UnknownKey(String),

    #[error("Invalid partition range: '{start}' is after '{end}'")]
    InvalidRange { start: String, end: String },

    #[error("Duplicate static partition key: {0}")]
    DuplicateKey(String),
}

/// Time granularity for time-window partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    /// Hourly partitions
    Hourly,

    /// Daily partitions
    Daily,

    /// Weekly partitions, windows start on the definition's week start day
    Weekly,

    /// Monthly partitions
    Monthly,

    /// Yearly partitions
    Yearly,
}

impl TimeGranularity {
    /// Human-readable key format for error messages
    pub fn expected_format(&self) -> &'static str {
        match self {
            TimeGranularity::Hourly => "YYYY-MM-DD HH:00:00",
            TimeGranularity::Daily => "YYYY-MM-DD",
            TimeGranularity::Weekly => "YYYY-MM-DD (week start)",
            TimeGranularity::Monthly => "YYYY-MM",
            TimeGranularity::Yearly => "YYYY",
        }
    }

    /// Latest window boundary at or before `t`
    pub fn floor(&self, t: NaiveDateTime, week_start: Weekday) -> NaiveDateTime {
        match self {
            TimeGranularity::Hourly => {
                let into_hour = i64::from(t.minute()) * 60 + i64::from(t.second());
                t - Duration::seconds(into_hour) - Duration::nanoseconds(i64::from(t.nanosecond()))
            }
            TimeGranularity::Daily => midnight(t.date()),
            TimeGranularity::Weekly => {
                let into_week = i64::from(
                    (t.weekday().num_days_from_sunday() + 7 - week_start.num_days_from_sunday()) % 7,
                );
                midnight(t.date() - Duration::days(into_week))
            }
            TimeGranularity::Monthly => midnight(t.date() - Duration::days(i64::from(t.day0()))),
            TimeGranularity::Yearly => {
                midnight(t.date() - Duration::days(i64::from(t.ordinal0())))
            }
        }
    }

    /// Earliest window boundary at or after `t`
    pub fn ceil(&self, t: NaiveDateTime, week_start: Weekday) -> Option<NaiveDateTime> {
        let floor = self.floor(t, week_start);
        if floor == t {
            Some(t)
        } else {
            self.advance(floor)
        }
    }

    /// Boundary one window after the aligned boundary `t`
    pub fn advance(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeGranularity::Hourly => t.checked_add_signed(Duration::hours(1)),
            TimeGranularity::Daily => t.checked_add_signed(Duration::days(1)),
            TimeGranularity::Weekly => t.checked_add_signed(Duration::days(7)),
            TimeGranularity::Monthly => t.checked_add_months(Months::new(1)),
            TimeGranularity::Yearly => t.checked_add_months(Months::new(12)),
        }
    }

    /// Format a window start as a partition key
    pub fn format_key(&self, t: NaiveDateTime) -> String {
        match self {
            TimeGranularity::Hourly => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            TimeGranularity::Daily | TimeGranularity::Weekly => t.format("%Y-%m-%d").to_string(),
            TimeGranularity::Monthly => t.format("%Y-%m").to_string(),
            TimeGranularity::Yearly => t.format("%Y").to_string(),
        }
    }

    /// Parse a partition key into its window start, rejecting unaligned keys
    pub fn parse_key(&self, key: &str, week_start: Weekday) -> Result<NaiveDateTime, PartitionError> {
        let parsed = match self {
            TimeGranularity::Hourly => NaiveDateTime::parse_from_str(key, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(key, "%Y-%m-%dT%H:%M:%S"))
                .ok(),
            TimeGranularity::Daily | TimeGranularity::Weekly => {
                NaiveDate::parse_from_str(key, "%Y-%m-%d").ok().map(midnight)
            }
            TimeGranularity::Monthly => NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d")
                .ok()
                .filter(|_| key.len() == 7)
                .map(midnight),
            TimeGranularity::Yearly => key
                .parse::<i32>()
                .ok()
                .filter(|_| key.len() == 4)
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
                .map(midnight),
        };

        let start = parsed.ok_or_else(|| PartitionError::InvalidKeyFormat {
            key: key.to_string(),
            expected_format: self.expected_format(),
        })?;

        if self.floor(start, week_start) != start {
            return Err(PartitionError::UnalignedKey(key.to_string()));
        }
        Ok(start)
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    NaiveDateTime::new(date, NaiveTime::MIN)
}

/// Time-window partitions of a fixed granularity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindowPartitions {
    /// Window granularity
    pub granularity: TimeGranularity,

    /// Instant the key space starts at; the first window begins at the first
    /// boundary at or after it
    pub start: NaiveDateTime,

    /// Exclusive end; windows ending after it do not exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,

    /// First day of a weekly window
    #[serde(default = "default_week_start", skip_serializing_if = "is_default_week_start")]
    pub week_start: Weekday,
}

fn default_week_start() -> Weekday {
    Weekday::Sun
}

fn is_default_week_start(week_start: &Weekday) -> bool {
    *week_start == default_week_start()
}

impl TimeWindowPartitions {
    /// Create time-window partitions starting at midnight of `start`
    pub fn new(granularity: TimeGranularity, start: NaiveDate) -> Self {
        Self {
            granularity,
            start: midnight(start),
            end: None,
            week_start: default_week_start(),
        }
    }

    /// Start weekly windows on `week_start` instead of Sunday
    pub fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    /// Set an exclusive end date
    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end = Some(midnight(end));
        self
    }

    /// Start of the first window
    pub fn first_window_start(&self) -> Option<NaiveDateTime> {
        self.granularity.ceil(self.start, self.week_start)
    }

    /// Parse a key of this definition into its window start
    pub fn parse_key(&self, key: &str) -> Result<NaiveDateTime, PartitionError> {
        self.granularity.parse_key(key, self.week_start)
    }

    /// The key of the window `key` names, in the stored key format
    pub fn canonical_key(&self, key: &str) -> Result<String, PartitionError> {
        Ok(self.granularity.format_key(self.parse_key(key)?))
    }

    /// Latest instant a window may end at, given `as_of`
    fn window_limit(&self, as_of: NaiveDateTime) -> NaiveDateTime {
        match self.end {
            Some(end) => end.min(as_of),
            None => as_of,
        }
    }

    /// Window `[start, end)` covered by a partition key
    pub fn window(&self, key: &str) -> Result<(NaiveDateTime, NaiveDateTime), PartitionError> {
        let start = self.parse_key(key)?;
        let end = self
            .granularity
            .advance(start)
            .ok_or_else(|| PartitionError::UnknownKey(key.to_string()))?;
        Ok((start, end))
    }

    /// All keys whose windows have fully elapsed as of `as_of`
    pub fn keys(&self, as_of: NaiveDateTime) -> Vec<String> {
        let limit = self.window_limit(as_of);
        let mut keys = Vec::new();
        let mut current = self.first_window_start();
        while let Some(start) = current {
            match self.granularity.advance(start) {
                Some(end) if end <= limit => {
                    keys.push(self.granularity.format_key(start));
                    current = Some(end);
                }
                _ => break,
            }
        }
        keys
    }

    /// Whether `key` is a complete window of this definition as of `as_of`
    pub fn has_key(&self, key: &str, as_of: NaiveDateTime) -> bool {
        let Ok((start, end)) = self.window(key) else {
            return false;
        };
        let Some(first) = self.first_window_start() else {
            return false;
        };
        start >= first && end <= self.window_limit(as_of)
    }

    /// Ordered keys between `start` and `end`, both inclusive
    pub fn keys_in_range(&self, start: &str, end: &str) -> Result<Vec<String>, PartitionError> {
        let range_start = self.parse_key(start)?;
        let range_end = self.parse_key(end)?;
        if range_start > range_end {
            return Err(PartitionError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let mut keys = Vec::new();
        let mut current = Some(range_start);
        while let Some(window_start) = current {
            if window_start > range_end {
                break;
            }
            keys.push(self.granularity.format_key(window_start));
            current = self.granularity.advance(window_start);
        }
        Ok(keys)
    }

    /// Keys of this definition whose windows overlap `[start, end)`
    pub fn keys_overlapping(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<String> {
        let mut keys = Vec::new();
        let mut current = Some(self.granularity.floor(start, self.week_start));
        while let Some(window_start) = current {
            if window_start >= end {
                break;
            }
            keys.push(self.granularity.format_key(window_start));
            current = self.granularity.advance(window_start);
        }
        keys
    }
}

/// Explicit ordered list of partition keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StaticPartitions {
    keys: Vec<String>,
}

impl StaticPartitions {
    /// Create static partitions, rejecting duplicate keys
    pub fn new<I, S>(keys: I) -> Result<Self, PartitionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key.as_str()) {
                return Err(PartitionError::DuplicateKey(key.clone()));
            }
        }
        Ok(Self { keys })
    }

    /// Keys in declaration order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Position of a key in declaration order
    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }
}

impl TryFrom<Vec<String>> for StaticPartitions {
    type Error = PartitionError;

    fn try_from(keys: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(keys)
    }
}

impl From<StaticPartitions> for Vec<String> {
    fn from(partitions: StaticPartitions) -> Self {
        partitions.keys
    }
}

/// Ordered key space of a partitioned asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionsDefinition {
    /// Consecutive time windows
    TimeWindow(TimeWindowPartitions),

    /// Explicit key list
    Static { keys: StaticPartitions },
}

impl PartitionsDefinition {
    /// Hourly partitions starting at midnight of `start`
    pub fn hourly(start: NaiveDate) -> Self {
        PartitionsDefinition::TimeWindow(TimeWindowPartitions::new(TimeGranularity::Hourly, start))
    }

    /// Daily partitions starting at `start`
    pub fn daily(start: NaiveDate) -> Self {
        PartitionsDefinition::TimeWindow(TimeWindowPartitions::new(TimeGranularity::Daily, start))
    }

    /// Weekly partitions starting at the first Sunday on or after `start`
    pub fn weekly(start: NaiveDate) -> Self {
        PartitionsDefinition::TimeWindow(TimeWindowPartitions::new(TimeGranularity::Weekly, start))
    }

    /// Monthly partitions starting at the first month boundary on or after `start`
    pub fn monthly(start: NaiveDate) -> Self {
        PartitionsDefinition::TimeWindow(TimeWindowPartitions::new(
            TimeGranularity::Monthly,
            start,
        ))
    }

    /// Static partitions over an explicit key list
    pub fn static_keys<I, S>(keys: I) -> Result<Self, PartitionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(PartitionsDefinition::Static {
            keys: StaticPartitions::new(keys)?,
        })
    }

    /// All keys in canonical order as of `as_of`
    pub fn keys(&self, as_of: NaiveDateTime) -> Vec<String> {
        match self {
            PartitionsDefinition::TimeWindow(windows) => windows.keys(as_of),
            PartitionsDefinition::Static { keys } => keys.keys().to_vec(),
        }
    }

    /// Number of keys as of `as_of`
    pub fn count(&self, as_of: NaiveDateTime) -> usize {
        match self {
            PartitionsDefinition::TimeWindow(windows) => windows.keys(as_of).len(),
            PartitionsDefinition::Static { keys } => keys.keys().len(),
        }
    }

    /// Whether `key` exists in this key space as of `as_of`
    pub fn has_key(&self, key: &str, as_of: NaiveDateTime) -> bool {
        match self {
            PartitionsDefinition::TimeWindow(windows) => windows.has_key(key, as_of),
            PartitionsDefinition::Static { keys } => keys.position(key).is_some(),
        }
    }

    /// Ordered keys between `start` and `end`, both inclusive
    pub fn keys_in_range(&self, start: &str, end: &str) -> Result<Vec<String>, PartitionError> {
        match self {
            PartitionsDefinition::TimeWindow(windows) => windows.keys_in_range(start, end),
            PartitionsDefinition::Static { keys } => {
                let first = keys
                    .position(start)
                    .ok_or_else(|| PartitionError::UnknownKey(start.to_string()))?;
                let last = keys
                    .position(end)
                    .ok_or_else(|| PartitionError::UnknownKey(end.to_string()))?;
                if first > last {
                    return Err(PartitionError::InvalidRange {
                        start: start.to_string(),
                        end: end.to_string(),
                    });
                }
                Ok(keys.keys()[first..=last].to_vec())
            }
        }
    }

    /// Canonical sort position of a key
    ///
    /// Time windows order by window start (seconds since the epoch), static
    /// keys by declaration position.
    pub fn ordinal(&self, key: &str) -> Result<i64, PartitionError> {
        match self {
            PartitionsDefinition::TimeWindow(windows) => windows
                .parse_key(key)
                .map(|start| start.and_utc().timestamp()),
            PartitionsDefinition::Static { keys } => keys
                .position(key)
                .map(|idx| idx as i64)
                .ok_or_else(|| PartitionError::UnknownKey(key.to_string())),
        }
    }

    /// Stored form of `key`
    ///
    /// Time-window keys are reformatted from their window start, so `2023-1-5`
    /// becomes `2023-01-05`. Static keys must match a declared key exactly.
    pub fn canonical_key(&self, key: &str) -> Result<String, PartitionError> {
        match self {
            PartitionsDefinition::TimeWindow(windows) => windows.canonical_key(key),
            PartitionsDefinition::Static { keys } => keys
                .position(key)
                .map(|_| key.to_string())
                .ok_or_else(|| PartitionError::UnknownKey(key.to_string())),
        }
    }

    /// Sort keys into canonical order, normalizing each to its stored form
    pub fn sort_keys<'a, I>(&self, keys: I) -> Result<Vec<String>, PartitionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ordered = keys
            .into_iter()
            .map(|key| Ok((self.ordinal(key)?, self.canonical_key(key)?)))
            .collect::<Result<Vec<_>, PartitionError>>()?;
        ordered.sort();
        ordered.dedup();
        Ok(ordered.into_iter().map(|(_, key)| key).collect())
    }

    /// Time-window view of this definition, if it is one
    pub fn as_time_window(&self) -> Option<&TimeWindowPartitions> {
        match self {
            PartitionsDefinition::TimeWindow(windows) => Some(windows),
            PartitionsDefinition::Static { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_keys_only_include_elapsed_windows() {
        let daily = PartitionsDefinition::daily(date(2023, 1, 1));
        let keys = daily.keys(at(2023, 1, 4, 12));

        assert_eq!(keys, vec!["2023-01-01", "2023-01-02", "2023-01-03"]);
        assert_eq!(daily.count(at(2023, 1, 4, 12)), 3);
        assert!(daily.has_key("2023-01-03", at(2023, 1, 4, 12)));
        assert!(!daily.has_key("2023-01-04", at(2023, 1, 4, 12)));
        assert!(!daily.has_key("2022-12-31", at(2023, 1, 4, 12)));
    }

    #[test]
    fn test_daily_end_is_exclusive() {
        let daily = PartitionsDefinition::TimeWindow(
            TimeWindowPartitions::new(TimeGranularity::Daily, date(2023, 1, 1))
                .with_end(date(2023, 8, 11)),
        );
        let keys = daily.keys(at(2024, 1, 1, 0));

        assert_eq!(keys.first().unwrap(), "2023-01-01");
        assert_eq!(keys.last().unwrap(), "2023-08-10");
        assert_eq!(keys.len(), 222);
    }

    #[test]
    fn test_weekly_aligns_to_sunday() {
        // 2023-01-01 is a Sunday
        let weekly = PartitionsDefinition::weekly(date(2023, 1, 1));
        let keys = weekly.keys(at(2023, 1, 23, 0));

        assert_eq!(keys, vec!["2023-01-01", "2023-01-08", "2023-01-15"]);
        assert!(matches!(
            weekly.ordinal("2023-01-02"),
            Err(PartitionError::UnalignedKey(_))
        ));
    }

    #[test]
    fn test_weekly_with_monday_week_start() {
        let weekly = PartitionsDefinition::TimeWindow(
            TimeWindowPartitions::new(TimeGranularity::Weekly, date(2023, 1, 1))
                .with_week_start(Weekday::Mon),
        );
        assert_eq!(
            weekly.keys(at(2023, 1, 23, 0)),
            vec!["2023-01-02", "2023-01-09", "2023-01-16"]
        );

        let json = serde_json::to_string(&weekly).unwrap();
        let restored: PartitionsDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, weekly);
    }

    #[test]
    fn test_canonical_key_normalizes_lenient_spellings() {
        let daily = PartitionsDefinition::daily(date(2023, 1, 1));
        assert_eq!(daily.canonical_key("2023-1-5").unwrap(), "2023-01-05");
        assert_eq!(
            daily.sort_keys(["2023-01-06", "2023-1-5", "2023-01-05"]).unwrap(),
            vec!["2023-01-05", "2023-01-06"]
        );

        let hourly = PartitionsDefinition::hourly(date(2023, 1, 1));
        assert_eq!(
            hourly.canonical_key("2023-01-01T03:00:00").unwrap(),
            "2023-01-01 03:00:00"
        );

        let regions = PartitionsDefinition::static_keys(["us", "eu"]).unwrap();
        assert_eq!(regions.canonical_key("eu").unwrap(), "eu");
        assert!(regions.canonical_key("EU").is_err());
    }

    #[test]
    fn test_monthly_and_hourly_formats() {
        let monthly = PartitionsDefinition::monthly(date(2023, 1, 15));
        assert_eq!(monthly.keys(at(2023, 4, 1, 0)), vec!["2023-02", "2023-03"]);

        let hourly = PartitionsDefinition::hourly(date(2023, 1, 1));
        let keys = hourly.keys(at(2023, 1, 1, 3));
        assert_eq!(
            keys,
            vec![
                "2023-01-01 00:00:00",
                "2023-01-01 01:00:00",
                "2023-01-01 02:00:00"
            ]
        );
    }

    #[test]
    fn test_keys_in_range_inclusive() {
        let daily = PartitionsDefinition::daily(date(2023, 1, 1));
        let keys = daily.keys_in_range("2023-01-30", "2023-02-02").unwrap();
        assert_eq!(
            keys,
            vec!["2023-01-30", "2023-01-31", "2023-02-01", "2023-02-02"]
        );

        let err = daily.keys_in_range("2023-02-02", "2023-01-30").unwrap_err();
        assert!(matches!(err, PartitionError::InvalidRange { .. }));
    }

    #[test]
    fn test_invalid_key_format() {
        let daily = PartitionsDefinition::daily(date(2023, 1, 1));
        let err = daily.ordinal("not-a-date").unwrap_err();
        assert_eq!(
            err,
            PartitionError::InvalidKeyFormat {
                key: "not-a-date".to_string(),
                expected_format: "YYYY-MM-DD",
            }
        );
    }

    #[test]
    fn test_static_partitions_preserve_declaration_order() {
        let regions = PartitionsDefinition::static_keys(["us", "eu", "apac"]).unwrap();
        assert_eq!(regions.keys(at(2023, 1, 1, 0)), vec!["us", "eu", "apac"]);
        assert_eq!(regions.keys_in_range("eu", "apac").unwrap(), vec!["eu", "apac"]);
        assert_eq!(
            regions.sort_keys(["apac", "us"]).unwrap(),
            vec!["us", "apac"]
        );
        assert!(regions.keys_in_range("apac", "us").is_err());
    }

    #[test]
    fn test_static_partitions_reject_duplicates() {
        let err = PartitionsDefinition::static_keys(["a", "b", "a"]).unwrap_err();
        assert_eq!(err, PartitionError::DuplicateKey("a".to_string()));
    }

    #[test]
    fn test_sort_keys_uses_time_order() {
        let monthly = PartitionsDefinition::monthly(date(2023, 1, 1));
        let sorted = monthly
            .sort_keys(["2023-11", "2023-02", "2023-11", "2023-10"])
            .unwrap();
        assert_eq!(sorted, vec!["2023-02", "2023-10", "2023-11"]);
    }

    #[test]
    fn test_keys_overlapping_daily_window_into_weekly() {
        let weekly = TimeWindowPartitions::new(TimeGranularity::Weekly, date(2023, 1, 1));
        let keys = weekly.keys_overlapping(at(2023, 1, 11, 0), at(2023, 1, 12, 0));
        assert_eq!(keys, vec!["2023-01-08"]);

        let daily = TimeWindowPartitions::new(TimeGranularity::Daily, date(2023, 1, 1));
        let keys = daily.keys_overlapping(at(2023, 1, 9, 0), at(2023, 1, 16, 0));
        assert_eq!(keys.len(), 7);
        assert_eq!(keys[0], "2023-01-09");
        assert_eq!(keys[6], "2023-01-15");
    }

    #[test]
    fn test_definition_round_trips_through_json() {
        let def = PartitionsDefinition::static_keys(["a", "b"]).unwrap();
        let json = serde_json::to_string(&def).unwrap();
        assert_eq!(json, r#"{"type":"static","keys":["a","b"]}"#);

        let daily: PartitionsDefinition = serde_json::from_str(
            r#"{"type":"time_window","granularity":"daily","start":"2023-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(daily, PartitionsDefinition::daily(date(2023, 1, 1)));
    }
}
