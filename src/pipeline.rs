use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::warn;

use crate::models::{Dataset, FilterCriteria, RawRecord, Record, UNKNOWN_GENDER};

/// Replace null genders with "Unknown" and null tenures with the median
/// of the non-null tenures. The median is a snapshot of the pre-clean
/// data and is never recomputed after filtering.
pub fn clean(mut records: Vec<RawRecord>) -> Vec<RawRecord> {
    let tenures: Vec<f64> = records.iter().filter_map(|r| r.tenure).collect();
    let fallback = median(&tenures).unwrap_or_else(|| {
        if !records.is_empty() {
            warn!("tenure column has no non-null values, substituting 0");
        }
        0.0
    });

    for record in &mut records {
        if record.gender.is_none() {
            record.gender = Some(UNKNOWN_GENDER.to_string());
        }
        if record.tenure.is_none() {
            record.tenure = Some(fallback);
        }
    }
    records
}

/// Median of the given values; the even-count median is the mean of the
/// two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Compute the derived fields once and freeze the dataset.
///
/// Invalid date-of-birth parts yield an undefined `dob` rather than an
/// error; both rate denominators carry a +1 offset so the division is
/// always defined.
pub fn derive(records: Vec<RawRecord>) -> Dataset {
    let mut undated = 0usize;
    let derived: Vec<Record> = records
        .into_iter()
        .map(|raw| {
            let dob = NaiveDate::from_ymd_opt(raw.dob_year, raw.dob_month, raw.dob_day);
            if dob.is_none() {
                undated += 1;
            }
            Record {
                gender: raw.gender.unwrap_or_else(|| UNKNOWN_GENDER.to_string()),
                age: raw.age,
                dob,
                friend_count: raw.friend_count,
                likes: raw.likes,
                likes_received: raw.likes_received,
                mobile_likes: raw.mobile_likes,
                tenure: raw.tenure.unwrap_or(0.0),
                engagement_rate: raw.likes_received as f64 / (raw.friend_count + 1) as f64,
                click_through_rate: raw.mobile_likes as f64 / (raw.likes + 1) as f64,
            }
        })
        .collect();

    if undated > 0 {
        warn!("{undated} records have invalid date-of-birth parts; their dob is undefined");
    }
    Dataset::new(derived)
}

/// Select the subsequence of records satisfying the criteria. Pure and
/// idempotent; an empty result is a valid dataset.
pub fn filter(dataset: &Dataset, criteria: &FilterCriteria) -> Dataset {
    Dataset::new(
        dataset
            .records()
            .iter()
            .filter(|record| matches(record, criteria))
            .cloned()
            .collect(),
    )
}

fn matches(record: &Record, criteria: &FilterCriteria) -> bool {
    if let Some((start, end)) = criteria.date_range {
        // An active date filter excludes records with an undefined dob.
        match record.dob {
            Some(dob) if dob >= start && dob <= end => {}
            _ => return false,
        }
    }
    if !criteria.genders.is_empty() && !criteria.genders.contains(&record.gender) {
        return false;
    }
    if let Some((min, max)) = criteria.age_range {
        if record.age < min || record.age > max {
            return false;
        }
    }
    true
}

/// Build criteria from partially-supplied bounds. Missing ends of a
/// range default to the observed bounds, resolved in stage order: the
/// date range comes from the whole dataset, the age range from the
/// subset already narrowed by the date and gender stages.
pub fn resolve_criteria(
    dataset: &Dataset,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    genders: Vec<String>,
    min_age: Option<u32>,
    max_age: Option<u32>,
) -> FilterCriteria {
    let date_range = match (start, end) {
        (None, None) => None,
        (start, end) => match dataset.dob_bounds() {
            Some((lo, hi)) => Some((start.unwrap_or(lo), end.unwrap_or(hi))),
            None => Some((
                start.unwrap_or(NaiveDate::MIN),
                end.unwrap_or(NaiveDate::MAX),
            )),
        },
    };
    let genders: BTreeSet<String> = genders.into_iter().collect();
    let known = dataset.genders();
    for gender in genders.difference(&known) {
        warn!("gender '{gender}' does not appear in the dataset");
    }

    let age_range = match (min_age, max_age) {
        (None, None) => None,
        (min_age, max_age) => {
            let staged = FilterCriteria {
                date_range,
                genders: genders.clone(),
                age_range: None,
            };
            let (lo, hi) = filter(dataset, &staged).age_bounds().unwrap_or((0, u32::MAX));
            Some((min_age.unwrap_or(lo), max_age.unwrap_or(hi)))
        }
    };

    FilterCriteria {
        date_range,
        genders,
        age_range,
    }
}
