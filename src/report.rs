use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate;
use crate::models::Dataset;

#[derive(Debug, Clone, Serialize)]
pub struct GenderSlice {
    pub gender: String,
    pub records: usize,
    pub friend_count: f64,
}

/// The numbers behind the overview, shared by the text and JSON
/// renderings.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub filtered_records: usize,
    pub dob_span: Option<(NaiveDate, NaiveDate)>,
    pub total_friend_count: f64,
    pub gender_mix: Vec<GenderSlice>,
    pub mean_engagement_rate: Option<f64>,
    pub mean_click_through_rate: Option<f64>,
    pub recent_birth_dates: Vec<NaiveDate>,
}

pub fn summarize(source: &Dataset, filtered: &Dataset) -> SummaryStats {
    let counts = aggregate::aggregate(
        filtered,
        &[aggregate::KeyColumn::Gender],
        aggregate::ValueColumn::FriendCount,
        aggregate::AggOp::Count,
    );
    let totals = aggregate::gender_totals(filtered);
    let total_friend_count = totals.total();
    let gender_mix = totals
        .rows
        .iter()
        .zip(counts.rows.iter())
        .map(|(total, count)| GenderSlice {
            gender: total.keys[0].to_string(),
            records: count.value as usize,
            friend_count: total.value,
        })
        .collect();

    let mean_of = |column| {
        if filtered.is_empty() {
            None
        } else {
            let sum: f64 = filtered
                .records()
                .iter()
                .map(|r| aggregate::ValueColumn::of(column, r))
                .sum();
            Some(sum / filtered.len() as f64)
        }
    };

    let mut birth_dates: Vec<NaiveDate> = filtered.records().iter().filter_map(|r| r.dob).collect();
    birth_dates.sort_unstable_by(|a, b| b.cmp(a));
    birth_dates.truncate(5);

    SummaryStats {
        total_records: source.len(),
        filtered_records: filtered.len(),
        dob_span: filtered.dob_bounds(),
        total_friend_count,
        gender_mix,
        mean_engagement_rate: mean_of(aggregate::ValueColumn::EngagementRate),
        mean_click_through_rate: mean_of(aggregate::ValueColumn::ClickThroughRate),
        recent_birth_dates: birth_dates,
    }
}

pub fn build_summary(stats: &SummaryStats) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Audience Summary");
    let _ = writeln!(
        output,
        "{} of {} records match the active filters",
        stats.filtered_records, stats.total_records
    );
    if let Some((start, end)) = stats.dob_span {
        let _ = writeln!(output, "Birth dates span {} to {}", start, end);
    }
    let _ = writeln!(
        output,
        "Friend count total {:.0}",
        stats.total_friend_count
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Gender Mix");
    if stats.gender_mix.is_empty() {
        let _ = writeln!(output, "No records match the active filters.");
    } else {
        for slice in &stats.gender_mix {
            let _ = writeln!(
                output,
                "- {}: {} records, {:.0} friends total",
                slice.gender, slice.records, slice.friend_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Engagement");
    match (stats.mean_engagement_rate, stats.mean_click_through_rate) {
        (Some(engagement), Some(click_through)) => {
            let _ = writeln!(output, "- mean engagement rate {:.4}", engagement);
            let _ = writeln!(output, "- mean click-through rate {:.4}", click_through);
        }
        _ => {
            let _ = writeln!(output, "No records match the active filters.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Recent Birth Dates");
    if stats.recent_birth_dates.is_empty() {
        let _ = writeln!(output, "No records with a defined birth date.");
    } else {
        for dob in &stats.recent_birth_dates {
            let _ = writeln!(output, "- {}", dob);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;
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

    #[test]
    fn summary_counts_source_and_filtered_records() {
        let dataset = derive(clean(vec![
            raw(Some("male"), 20, 10),
            raw(Some("female"), 30, 5),
        ]));
        let filtered = Dataset::new(dataset.records()[..1].to_vec());
        let stats = summarize(&dataset, &filtered);
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.filtered_records, 1);
        assert_eq!(stats.gender_mix.len(), 1);
        assert_eq!(stats.gender_mix[0].gender, "male");
        assert_eq!(stats.gender_mix[0].friend_count, 10.0);
    }

    #[test]
    fn empty_view_renders_fallback_lines_instead_of_failing() {
        let stats = summarize(&Dataset::default(), &Dataset::default());
        let text = build_summary(&stats);
        assert!(text.contains("0 of 0 records"));
        assert!(text.contains("No records match the active filters."));
        assert!(text.contains("No records with a defined birth date."));
    }
}
