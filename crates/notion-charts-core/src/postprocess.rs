//! Filtering, sorting and limiting of aggregated chart points

use crate::ChartDataPoint;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

static ISO_DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid date prefix pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Keep aggregation order
    #[default]
    None,
    /// By point name
    #[serde(alias = "name")]
    X,
    /// By point value
    #[serde(alias = "value")]
    Y,
    /// By position in an explicit order list
    Manual,
}

impl SortBy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Some(SortBy::None),
            "x" | "name" => Some(SortBy::X),
            "y" | "value" => Some(SortBy::Y),
            "manual" => Some(SortBy::Manual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::None => "none",
            SortBy::X => "x",
            SortBy::Y => "y",
            SortBy::Manual => "manual",
        }
    }
}

/// Sort direction; there is no default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Some(SortOrder::Asc),
            "desc" | "descending" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostProcessOptions {
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    #[serde(default)]
    pub manual_order: Vec<String>,
    /// `None` or `Some(0)` keeps every point
    #[serde(default)]
    pub limit: Option<usize>,
}

impl PostProcessOptions {
    /// Options that leave points untouched apart from the given direction
    pub fn passthrough(sort_order: SortOrder) -> Self {
        Self {
            excluded: Vec::new(),
            sort_by: SortBy::None,
            sort_order,
            manual_order: Vec::new(),
            limit: None,
        }
    }
}

/// Filter excluded names, sort, then truncate to the limit
pub fn post_process(points: Vec<ChartDataPoint>, options: &PostProcessOptions) -> Vec<ChartDataPoint> {
    let mut points: Vec<ChartDataPoint> = points
        .into_iter()
        .filter(|p| !options.excluded.contains(&p.name))
        .collect();

    match options.sort_by {
        SortBy::None => {}
        SortBy::Manual => {
            let ranks: HashMap<&str, usize> = options
                .manual_order
                .iter()
                .enumerate()
                .rev()
                .map(|(i, name)| (name.as_str(), i))
                .collect();
            let unseen = options.manual_order.len();
            // sort_by_key is stable, so unseen names keep their relative order
            points.sort_by_key(|p| ranks.get(p.name.as_str()).copied().unwrap_or(unseen));
        }
        SortBy::X => {
            let mut keyed: Vec<(NameKey, ChartDataPoint)> = points
                .into_iter()
                .map(|p| (NameKey::of(&p.name), p))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| options.sort_order.apply(a.compare(b)));
            points = keyed.into_iter().map(|(_, p)| p).collect();
        }
        SortBy::Y => {
            points.sort_by(|a, b| options.sort_order.apply(a.value.total_cmp(&b.value)));
        }
    }

    if let Some(limit) = options.limit.filter(|&l| l > 0) {
        points.truncate(limit);
    }

    points
}

/// Sort key for point names. Numbers come first, then dates, then any other
/// text; within a class numbers and dates compare by value, text by bytes
#[derive(Debug, Clone, PartialEq)]
enum NameKey {
    Number(f64),
    Date(i64),
    Text(String),
}

impl NameKey {
    fn of(name: &str) -> Self {
        if ISO_DATE_PREFIX.is_match(name) {
            // "2024-13-01" looks like a date but is not one
            return match parse_timestamp(name) {
                Some(ts) => NameKey::Date(ts),
                None => NameKey::Text(name.to_string()),
            };
        }
        match parse_number(name) {
            Some(n) => NameKey::Number(n),
            None => NameKey::Text(name.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            NameKey::Number(_) => 0,
            NameKey::Date(_) => 1,
            NameKey::Text(_) => 2,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (NameKey::Number(a), NameKey::Number(b)) => a.total_cmp(b),
            (NameKey::Date(a), NameKey::Date(b)) => a.cmp(b),
            (NameKey::Text(a), NameKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Milliseconds since the epoch, reading zoneless values as UTC
fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Merge freshly seen category names into a stored manual order: an empty
/// order takes the current names, otherwise new names are appended
pub fn merge_manual_order(current: &[String], names: &[String]) -> Vec<String> {
    if current.is_empty() {
        return names.to_vec();
    }

    let mut merged = current.to_vec();
    for name in names {
        if !merged.contains(name) {
            merged.push(name.clone());
        }
    }
    merged
}
