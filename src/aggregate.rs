use std::collections::BTreeMap;

use chrono::Datelike;

use crate::models::{
    AggregateRow, AggregateTable, Dataset, GroupValue, Histogram, HistogramBin, PivotRow,
    PivotTable, Record,
};

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Columns a table can be grouped by. Date-derived keys skip records
/// with an undefined dob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyColumn {
    Gender,
    Age,
    BirthMonthYear,
    BirthMonth,
}

impl KeyColumn {
    pub fn name(self) -> &'static str {
        match self {
            KeyColumn::Gender => "gender",
            KeyColumn::Age => "age",
            KeyColumn::BirthMonthYear => "month_year",
            KeyColumn::BirthMonth => "month",
        }
    }

    fn extract(self, record: &Record) -> Option<GroupValue> {
        match self {
            KeyColumn::Gender => Some(GroupValue::Text(record.gender.clone())),
            KeyColumn::Age => Some(GroupValue::Number(i64::from(record.age))),
            KeyColumn::BirthMonthYear => record
                .dob
                .map(|dob| GroupValue::Text(dob.format("%Y-%m").to_string())),
            KeyColumn::BirthMonth => record
                .dob
                .map(|dob| GroupValue::Number(i64::from(dob.month()))),
        }
    }
}

/// Columns a table can reduce over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueColumn {
    FriendCount,
    Likes,
    LikesReceived,
    MobileLikes,
    Tenure,
    Age,
    EngagementRate,
    ClickThroughRate,
}

impl ValueColumn {
    pub fn name(self) -> &'static str {
        match self {
            ValueColumn::FriendCount => "friend_count",
            ValueColumn::Likes => "likes",
            ValueColumn::LikesReceived => "likes_received",
            ValueColumn::MobileLikes => "mobile_likes",
            ValueColumn::Tenure => "tenure",
            ValueColumn::Age => "age",
            ValueColumn::EngagementRate => "engagement_rate",
            ValueColumn::ClickThroughRate => "click_through_rate",
        }
    }

    pub fn of(self, record: &Record) -> f64 {
        match self {
            ValueColumn::FriendCount => record.friend_count as f64,
            ValueColumn::Likes => record.likes as f64,
            ValueColumn::LikesReceived => record.likes_received as f64,
            ValueColumn::MobileLikes => record.mobile_likes as f64,
            ValueColumn::Tenure => record.tenure,
            ValueColumn::Age => f64::from(record.age),
            ValueColumn::EngagementRate => record.engagement_rate,
            ValueColumn::ClickThroughRate => record.click_through_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Sum,
    Mean,
    Count,
}

/// Group the dataset by the key columns and reduce the value column.
/// Output rows are ordered by group key; an empty dataset yields an
/// empty table.
pub fn aggregate(
    dataset: &Dataset,
    keys: &[KeyColumn],
    value: ValueColumn,
    op: AggOp,
) -> AggregateTable {
    let mut groups: BTreeMap<Vec<GroupValue>, (f64, usize)> = BTreeMap::new();

    for record in dataset.records() {
        let key: Option<Vec<GroupValue>> = keys.iter().map(|k| k.extract(record)).collect();
        let key = match key {
            Some(key) => key,
            None => continue,
        };
        let entry = groups.entry(key).or_insert((0.0, 0));
        entry.0 += value.of(record);
        entry.1 += 1;
    }

    let rows = groups
        .into_iter()
        .map(|(group, (sum, count))| AggregateRow {
            keys: group,
            value: match op {
                AggOp::Sum => sum,
                AggOp::Mean => sum / count as f64,
                AggOp::Count => count as f64,
            },
        })
        .collect();

    AggregateTable {
        key_columns: keys.iter().map(|k| k.name().to_string()).collect(),
        value_column: value.name().to_string(),
        rows,
    }
}

/// Friend-count total per gender.
pub fn gender_totals(dataset: &Dataset) -> AggregateTable {
    aggregate(
        dataset,
        &[KeyColumn::Gender],
        ValueColumn::FriendCount,
        AggOp::Sum,
    )
}

/// Friend-count total per age.
pub fn age_totals(dataset: &Dataset) -> AggregateTable {
    aggregate(
        dataset,
        &[KeyColumn::Age],
        ValueColumn::FriendCount,
        AggOp::Sum,
    )
}

/// Friend-count time series over birth month, keyed `YYYY-MM`.
pub fn monthly_series(dataset: &Dataset) -> AggregateTable {
    aggregate(
        dataset,
        &[KeyColumn::BirthMonthYear],
        ValueColumn::FriendCount,
        AggOp::Sum,
    )
}

/// Friend-count totals over the gender then age hierarchy.
pub fn gender_age_totals(dataset: &Dataset) -> AggregateTable {
    aggregate(
        dataset,
        &[KeyColumn::Gender, KeyColumn::Age],
        ValueColumn::FriendCount,
        AggOp::Sum,
    )
}

/// Mean friend count with one row per age and one column per calendar
/// birth month. Only months present in the data become columns; cells
/// with no records stay empty.
pub fn month_pivot(dataset: &Dataset) -> PivotTable {
    let mut cells: BTreeMap<u32, BTreeMap<u32, (f64, usize)>> = BTreeMap::new();
    for record in dataset.records() {
        let month = match record.dob {
            Some(dob) => dob.month(),
            None => continue,
        };
        let entry = cells
            .entry(record.age)
            .or_default()
            .entry(month)
            .or_insert((0.0, 0));
        entry.0 += record.friend_count as f64;
        entry.1 += 1;
    }

    let months: Vec<u32> = cells
        .values()
        .flat_map(|by_month| by_month.keys().copied())
        .collect::<std::collections::BTreeSet<u32>>()
        .into_iter()
        .collect();

    let rows = cells
        .iter()
        .map(|(age, by_month)| PivotRow {
            key: i64::from(*age),
            cells: months
                .iter()
                .map(|month| by_month.get(month).map(|(sum, count)| sum / *count as f64))
                .collect(),
        })
        .collect();

    PivotTable {
        row_column: "age".to_string(),
        column_labels: months
            .iter()
            .map(|month| MONTH_NAMES[(month - 1) as usize].to_string())
            .collect(),
        rows,
    }
}

/// Equal-width binned counts of a value column. The upper edge of the
/// last bin is closed so the maximum value is counted.
pub fn histogram(dataset: &Dataset, value: ValueColumn, bins: usize) -> Histogram {
    let values: Vec<f64> = dataset.records().iter().map(|r| value.of(r)).collect();
    let mut histogram = Histogram {
        value_column: value.name().to_string(),
        bins: Vec::new(),
    };
    if values.is_empty() || bins == 0 {
        return histogram;
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        histogram.bins.push(HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        });
        return histogram;
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let index = (((v - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    histogram.bins = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + i as f64 * width,
            upper: if i + 1 == bins {
                max
            } else {
                min + (i + 1) as f64 * width
            },
            count,
        })
        .collect();
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawRecord, UNKNOWN_GENDER};
    use crate::pipeline::{clean, derive};

    fn raw(gender: Option<&str>, age: u32, friend_count: u64) -> RawRecord {
        RawRecord {
            gender: gender.map(str::to_string),
            age,
            dob_year: 1990,
            dob_month: 6,
            dob_day: 15,
            friend_count,
            likes: 4,
            likes_received: 9,
            mobile_likes: 2,
            tenure: Some(100.0),
        }
    }

    fn sample_dataset() -> Dataset {
        derive(clean(vec![
            raw(Some("male"), 20, 10),
            raw(Some("female"), 30, 5),
            raw(None, 25, 3),
        ]))
    }

    #[test]
    fn gender_sums_match_the_worked_example() {
        let table = gender_totals(&sample_dataset());
        let rows: Vec<(String, f64)> = table
            .rows
            .iter()
            .map(|r| (r.keys[0].to_string(), r.value))
            .collect();
        assert_eq!(
            rows,
            vec![
                (UNKNOWN_GENDER.to_string(), 3.0),
                ("female".to_string(), 5.0),
                ("male".to_string(), 10.0),
            ]
        );
    }

    #[test]
    fn group_sums_partition_the_total() {
        let dataset = sample_dataset();
        let whole: f64 = dataset
            .records()
            .iter()
            .map(|r| r.friend_count as f64)
            .sum();
        assert_eq!(gender_totals(&dataset).total(), whole);
        assert_eq!(age_totals(&dataset).total(), whole);
        assert_eq!(gender_age_totals(&dataset).total(), whole);
    }

    #[test]
    fn age_groups_order_numerically() {
        let dataset = derive(clean(vec![
            raw(Some("male"), 100, 1),
            raw(Some("male"), 9, 1),
            raw(Some("male"), 10, 1),
        ]));
        let table = age_totals(&dataset);
        let ages: Vec<String> = table.rows.iter().map(|r| r.keys[0].to_string()).collect();
        assert_eq!(ages, vec!["9", "10", "100"]);
    }

    #[test]
    fn mean_and_count_ops_reduce_per_group() {
        let dataset = derive(clean(vec![
            raw(Some("male"), 20, 10),
            raw(Some("male"), 20, 20),
        ]));
        let mean = aggregate(
            &dataset,
            &[KeyColumn::Gender],
            ValueColumn::FriendCount,
            AggOp::Mean,
        );
        assert_eq!(mean.rows[0].value, 15.0);
        let count = aggregate(
            &dataset,
            &[KeyColumn::Gender],
            ValueColumn::FriendCount,
            AggOp::Count,
        );
        assert_eq!(count.rows[0].value, 2.0);
    }

    #[test]
    fn monthly_series_skips_undefined_dob_and_orders_chronologically() {
        let mut march = raw(Some("male"), 20, 4);
        march.dob_year = 1991;
        march.dob_month = 3;
        let mut undated = raw(Some("male"), 20, 100);
        undated.dob_day = 99;
        let june = raw(Some("female"), 30, 7);

        let dataset = derive(clean(vec![march, undated, june]));
        let table = monthly_series(&dataset);
        let rows: Vec<(String, f64)> = table
            .rows
            .iter()
            .map(|r| (r.keys[0].to_string(), r.value))
            .collect();
        assert_eq!(
            rows,
            vec![("1990-06".to_string(), 7.0), ("1991-03".to_string(), 4.0)]
        );
    }

    #[test]
    fn month_pivot_averages_per_cell() {
        let mut a = raw(Some("male"), 20, 10);
        a.dob_month = 1;
        let mut b = raw(Some("male"), 20, 20);
        b.dob_month = 1;
        let mut c = raw(Some("female"), 30, 7);
        c.dob_month = 6;

        let dataset = derive(clean(vec![a, b, c]));
        let pivot = month_pivot(&dataset);
        assert_eq!(pivot.column_labels, vec!["January", "June"]);
        assert_eq!(pivot.rows.len(), 2);
        assert_eq!(pivot.rows[0].key, 20);
        assert_eq!(pivot.rows[0].cells, vec![Some(15.0), None]);
        assert_eq!(pivot.rows[1].cells, vec![None, Some(7.0)]);
    }

    #[test]
    fn histogram_counts_every_value_once() {
        let dataset = derive(clean(
            (0..10).map(|i| raw(Some("male"), 20, i)).collect(),
        ));
        let hist = histogram(&dataset, ValueColumn::FriendCount, 3);
        assert_eq!(hist.bins.len(), 3);
        let total: usize = hist.bins.iter().map(|b| b.count).sum();
        assert_eq!(total, 10);
        // The maximum value lands in the closed last bin.
        assert!(hist.bins[2].count >= 1);
        assert_eq!(hist.bins[2].upper, 9.0);
    }

    #[test]
    fn empty_dataset_aggregates_to_empty_tables() {
        let dataset = Dataset::default();
        assert!(gender_totals(&dataset).rows.is_empty());
        assert!(month_pivot(&dataset).rows.is_empty());
        assert!(histogram(&dataset, ValueColumn::Age, 30).bins.is_empty());
    }
}
