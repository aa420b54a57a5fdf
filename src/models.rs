use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Gender substituted for records whose source cell is null.
pub const UNKNOWN_GENDER: &str = "Unknown";

/// One row of the source file, before cleaning and derivation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(deserialize_with = "nullable_string")]
    pub gender: Option<String>,
    pub age: u32,
    pub dob_year: i32,
    pub dob_month: u32,
    pub dob_day: u32,
    pub friend_count: u64,
    pub likes: u64,
    pub likes_received: u64,
    pub mobile_likes: u64,
    #[serde(deserialize_with = "nullable_f64")]
    pub tenure: Option<f64>,
}

/// One cleaned row with its derived fields. `dob` is `None` when the
/// source date parts do not form a valid calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub gender: String,
    pub age: u32,
    pub dob: Option<NaiveDate>,
    pub friend_count: u64,
    pub likes: u64,
    pub likes_received: u64,
    pub mobile_likes: u64,
    pub tenure: f64,
    pub engagement_rate: f64,
    pub click_through_rate: f64,
}

/// Ordered collection of records, immutable after the clean/derive pass.
/// Filtering produces a fresh `Dataset` and never touches the source.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Dataset { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest defined date of birth, if any record has one.
    pub fn dob_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
        for dob in self.records.iter().filter_map(|r| r.dob) {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(dob), hi.max(dob)),
                None => (dob, dob),
            });
        }
        bounds
    }

    /// Observed minimum and maximum age.
    pub fn age_bounds(&self) -> Option<(u32, u32)> {
        let mut bounds: Option<(u32, u32)> = None;
        for record in &self.records {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(record.age), hi.max(record.age)),
                None => (record.age, record.age),
            });
        }
        bounds
    }

    /// Sorted set of distinct gender labels present in the data.
    pub fn genders(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.gender.clone()).collect()
    }
}

/// A date range, gender set, and age range selecting a subset of records.
/// `None` ranges and an empty gender set place no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub genders: BTreeSet<String>,
    pub age_range: Option<(u32, u32)>,
}

/// A single grouping key value. Numeric keys order numerically so that
/// age groups do not sort as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupValue {
    Text(String),
    Number(i64),
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Text(s) => write!(f, "{s}"),
            GroupValue::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub keys: Vec<GroupValue>,
    pub value: f64,
}

/// Grouped-and-reduced table, ordered by group key. Carries its column
/// names so exports reproduce the in-memory headers.
#[derive(Debug, Clone)]
pub struct AggregateTable {
    pub key_columns: Vec<String>,
    pub value_column: String,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|row| row.value).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PivotRow {
    pub key: i64,
    pub cells: Vec<Option<f64>>,
}

/// Two-dimensional summary: one row per `row_column` value, one column
/// per label, empty cells where no records fall.
#[derive(Debug, Clone)]
pub struct PivotTable {
    pub row_column: String,
    pub column_labels: Vec<String>,
    pub rows: Vec<PivotRow>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct Histogram {
    pub value_column: String,
    pub bins: Vec<HistogramBin>,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty() && s != "NA" && s != "NaN"))
}

fn nullable_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") | Some("NA") | Some("NaN") => Ok(None),
        Some(text) => text
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
