//! notion-charts Core Library
//!
//! Turns Notion database records into chart-ready data: property extraction,
//! aggregation, time-series bucketing, post-processing, colors and the
//! contribution calendar. Also owns the saved-chart store and export.

pub mod calendar;
pub mod colors;
pub mod config;
pub mod db;
pub mod embed;
pub mod export;
pub mod extract;
pub mod postprocess;
pub mod query;
pub mod record;
pub mod transform;

pub use calendar::{build_calendar, CalendarMode, CalendarOptions, ContributionCalendar};
pub use colors::{ColorScheme, ColoredPoint};
pub use config::Config;
pub use db::{ChartStore, Database};
pub use export::{ExportFormat, Exporter};
pub use extract::{extract, extract_contributions};
pub use postprocess::{post_process, PostProcessOptions, SortBy, SortOrder};
pub use record::{PropertyValue, Record, Scalar};
pub use transform::{aggregate, bucket_time_series, chart_data, count_by_property};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One aggregated point handed to the chart renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataPoint {
    pub name: String,
    pub value: f64,
}

impl ChartDataPoint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A dated activity entry for the contribution calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionEntry {
    /// `YYYY-MM-DD`
    pub date: String,
    pub subject: String,
    pub description: String,
}

/// How duplicate X values are reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Count,
    Average,
}

impl Aggregation {
    /// Parse from a query string; anything unrecognised falls back to sum
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "count" => Aggregation::Count,
            "average" | "avg" => Aggregation::Average,
            _ => Aggregation::Sum,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Average => "average",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which properties feed the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOptions {
    pub x_property: String,
    pub y_property: String,
    #[serde(default)]
    pub aggregation: Aggregation,
}

/// Time-series bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Some(Granularity::Day),
            "week" | "weekly" => Some(Granularity::Week),
            "month" | "monthly" => Some(Granularity::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
    Area,
    Contribution,
}

impl ChartType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Some(ChartType::Bar),
            "line" => Some(ChartType::Line),
            "pie" => Some(ChartType::Pie),
            "area" => Some(ChartType::Area),
            "contribution" | "calendar" => Some(ChartType::Contribution),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Area => "area",
            ChartType::Contribution => "contribution",
        }
    }
}

/// A database property as shown in property pickers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub is_numeric: bool,
    pub is_category: bool,
    pub is_date: bool,
    pub is_text: bool,
}

impl PropertySchema {
    pub fn new(name: impl Into<String>, property_type: impl Into<String>) -> Self {
        let property_type = property_type.into();
        let t = property_type.as_str();
        Self {
            name: name.into(),
            is_numeric: matches!(t, "number" | "formula" | "rollup"),
            is_category: matches!(t, "select" | "multi_select" | "status" | "checkbox"),
            is_date: t == "date",
            is_text: matches!(t, "title" | "rich_text"),
            property_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub title: String,
    pub properties: Vec<PropertySchema>,
}

/// Get the data directory for notion-charts
pub fn data_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("com", "notion-charts", "notion-charts")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            directories::BaseDirs::new()
                .map(|d| d.home_dir().join(".notion-charts"))
                .unwrap_or_else(|| std::path::PathBuf::from(".notion-charts"))
        })
}

/// Get the default saved-charts database path
pub fn db_path() -> std::path::PathBuf {
    data_dir().join("charts.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_schema_hints() {
        let number = PropertySchema::new("Amount", "number");
        assert!(number.is_numeric);
        assert!(!number.is_category);

        let status = PropertySchema::new("Status", "status");
        assert!(status.is_category);

        let title = PropertySchema::new("Name", "title");
        assert!(title.is_text);
        assert!(!title.is_date);
    }

    #[test]
    fn test_aggregation_parse_falls_back_to_sum() {
        assert_eq!(Aggregation::parse("count"), Aggregation::Count);
        assert_eq!(Aggregation::parse("AVERAGE"), Aggregation::Average);
        assert_eq!(Aggregation::parse("median"), Aggregation::Sum);
    }

    #[test]
    fn test_chart_data_point_serializes_plainly() {
        let json = serde_json::to_string(&ChartDataPoint::new("a", 1.5)).unwrap();
        assert_eq!(json, r#"{"name":"a","value":1.5}"#);
    }
}
