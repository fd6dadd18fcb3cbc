//! Record-to-chart transforms: aggregation, categorical counts and
//! time-series buckets

use crate::extract::extract;
use crate::record::Record;
use crate::{Aggregation, ChartDataPoint, Granularity, TransformOptions};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Groups keyed by first appearance. The index map records each key's
/// first-seen sequence number so output order never depends on hashing.
struct Groups<T> {
    index: HashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T: Default> Groups<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: String) -> &mut T {
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.index.insert(key.clone(), slot);
                self.entries.push((key, T::default()));
                slot
            }
        };
        &mut self.entries[slot].1
    }

    fn into_entries(self) -> Vec<(String, T)> {
        self.entries
    }
}

/// Round to the nearest 0.01
fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

/// Pin overflowed totals to the largest finite value of the same sign
fn saturate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(f64::MIN, f64::MAX)
    }
}

/// Group records by the X property and reduce Y values per group
pub fn aggregate(records: &[Record], options: &TransformOptions) -> Vec<ChartDataPoint> {
    let mut groups: Groups<Vec<f64>> = Groups::new();

    for record in records {
        let Some(x) = extract(record, &options.x_property) else {
            continue;
        };
        let y = extract(record, &options.y_property)
            .and_then(|v| v.as_number())
            .unwrap_or(0.0);

        groups.entry(x.to_key()).push(y);
    }

    groups
        .into_entries()
        .into_iter()
        .map(|(name, values)| {
            let sum: f64 = values.iter().sum();
            let value = match options.aggregation {
                Aggregation::Count => values.len() as f64,
                Aggregation::Average => sum / values.len() as f64,
                Aggregation::Sum => sum,
            };
            ChartDataPoint::new(name, round2(saturate(value)))
        })
        .collect()
}

/// Count records per distinct value of one property
pub fn count_by_property(records: &[Record], property_name: &str) -> Vec<ChartDataPoint> {
    let mut groups: Groups<u64> = Groups::new();

    for record in records {
        if let Some(value) = extract(record, property_name) {
            *groups.entry(value.to_key()) += 1;
        }
    }

    groups
        .into_entries()
        .into_iter()
        .map(|(name, count)| ChartDataPoint::new(name, count as f64))
        .collect()
}

/// Sum a value property per date bucket, sorted by bucket key.
///
/// Records with a missing value count as 1 so a bare date column yields
/// activity counts.
pub fn bucket_time_series(
    records: &[Record],
    date_property: &str,
    value_property: &str,
    granularity: Granularity,
    tz: Tz,
) -> Vec<ChartDataPoint> {
    let mut buckets: BTreeMap<String, f64> = BTreeMap::new();

    for record in records {
        let Some(scalar) = extract(record, date_property) else {
            continue;
        };
        let Some(raw) = scalar.as_str() else {
            continue;
        };
        let Some(date) = parse_date_in(raw, tz) else {
            debug!(record = %record.id, value = %raw, "Skipping unparseable date");
            continue;
        };

        let value = extract(record, value_property)
            .and_then(|v| v.as_number())
            .unwrap_or(1.0);

        *buckets.entry(bucket_key(date, granularity)).or_insert(0.0) += value;
    }

    buckets
        .into_iter()
        .map(|(name, value)| ChartDataPoint::new(name, saturate(value)))
        .collect()
}

/// The bucket a date falls into
pub fn bucket_key(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => {
            let sunday = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
            sunday.format("%Y-%m-%d").to_string()
        }
        Granularity::Month => date.format("%Y-%m").to_string(),
    }
}

/// Resolve a Notion date string to a calendar date in `tz`.
///
/// Date-only values are taken as-is, offset timestamps are converted into
/// `tz`, and naive timestamps are read as wall-clock time in `tz`.
pub fn parse_date_in(raw: &str, tz: Tz) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&tz).date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.date())
}

/// Chart data as served to embeds: aggregate when a Y property is given,
/// otherwise count by X
pub fn chart_data(
    records: &[Record],
    x_property: &str,
    y_property: Option<&str>,
    aggregation: Aggregation,
) -> Vec<ChartDataPoint> {
    match y_property.filter(|y| !y.is_empty()) {
        Some(y) => aggregate(
            records,
            &TransformOptions {
                x_property: x_property.to_string(),
                y_property: y.to_string(),
                aggregation,
            },
        ),
        None => count_by_property(records, x_property),
    }
}
