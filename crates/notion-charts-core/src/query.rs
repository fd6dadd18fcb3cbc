//! Request parameters and their validation
//!
//! Query strings arrive as loose optional strings; `validate` turns them into
//! typed requests or a message naming what is missing or malformed.

use crate::calendar::CalendarMode;
use crate::colors::{self, ColorScheme, ColoredPoint};
use crate::db::SavedChart;
use crate::postprocess::{merge_manual_order, post_process, PostProcessOptions, SortBy, SortOrder};
use crate::transform::chart_data;
use crate::{Aggregation, ChartDataPoint, ChartType, Granularity, Record};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Notion ids are 32 hex characters, optionally hyphenated
pub const DATABASE_ID_HEX_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    Missing(String),
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingMany(Vec<String>),
    #[error("Invalid database ID format")]
    DatabaseId,
    #[error("Invalid value for {field}: {value}")]
    Invalid { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

fn invalid(field: &str, value: &str) -> ValidationError {
    ValidationError::Invalid {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn split_list(value: &Option<String>) -> Vec<String> {
    non_empty(value)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

pub fn validate_database_id(id: &str) -> Result<&str> {
    let id = id.trim();
    let mut digits = 0;
    for c in id.chars() {
        match c {
            '-' => {}
            c if c.is_ascii_hexdigit() => digits += 1,
            _ => return Err(ValidationError::DatabaseId),
        }
    }
    if digits != DATABASE_ID_HEX_LEN {
        return Err(ValidationError::DatabaseId);
    }
    Ok(id)
}

/// Query parameters of the chart data endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartQuery {
    pub x: Option<String>,
    pub y: Option<String>,
    pub agg: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub manual_order: Option<String>,
    pub excluded: Option<String>,
    pub limit: Option<String>,
    pub palette: Option<String>,
    pub colors: Option<String>,
    pub cat_colors: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub x_property: String,
    pub y_property: Option<String>,
    pub aggregation: Aggregation,
    pub post: PostProcessOptions,
    pub colors: ColorScheme,
}

impl ChartQuery {
    pub fn validate(&self) -> Result<ChartRequest> {
        let x_property = non_empty(&self.x)
            .ok_or_else(|| ValidationError::Missing("x (X axis property)".to_string()))?
            .to_string();

        let aggregation = non_empty(&self.agg)
            .map(Aggregation::parse)
            .unwrap_or_default();

        Ok(ChartRequest {
            x_property,
            y_property: non_empty(&self.y).map(String::from),
            aggregation,
            post: self.post_process_options()?,
            colors: self.color_scheme()?,
        })
    }

    fn post_process_options(&self) -> Result<PostProcessOptions> {
        let sort_by = match non_empty(&self.sort_by) {
            Some(raw) => SortBy::parse(raw).ok_or_else(|| invalid("sortBy", raw))?,
            None => SortBy::None,
        };

        let sort_order = match non_empty(&self.sort_order) {
            Some(raw) => SortOrder::parse(raw).ok_or_else(|| invalid("sortOrder", raw))?,
            None if matches!(sort_by, SortBy::X | SortBy::Y) => {
                return Err(ValidationError::Missing("sortOrder".to_string()));
            }
            // direction is unused without an x/y sort
            None => SortOrder::Asc,
        };

        let limit = match non_empty(&self.limit) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| invalid("limit", raw))?),
            None => None,
        };

        Ok(PostProcessOptions {
            excluded: split_list(&self.excluded),
            sort_by,
            sort_order,
            manual_order: split_list(&self.manual_order),
            limit,
        })
    }

    fn color_scheme(&self) -> Result<ColorScheme> {
        let scheme = match (non_empty(&self.colors), non_empty(&self.palette)) {
            (Some(_), _) => ColorScheme::custom(split_list(&self.colors)),
            (None, Some(name)) => match colors::palette(name) {
                Some(palette) => ColorScheme {
                    palette,
                    category_colors: HashMap::new(),
                },
                None => return Err(invalid("palette", name)),
            },
            (None, None) => ColorScheme::default(),
        };

        let category_colors = match non_empty(&self.cat_colors) {
            Some(raw) => serde_json::from_str::<HashMap<String, String>>(raw)
                .map_err(|_| invalid("catColors", raw))?,
            None => HashMap::new(),
        };

        Ok(scheme.with_category_colors(category_colors))
    }
}

impl ChartRequest {
    /// Aggregate, post-process and color `records`
    pub fn render(&self, records: &[Record]) -> Vec<ColoredPoint> {
        let points = chart_data(
            records,
            &self.x_property,
            self.y_property.as_deref(),
            self.aggregation,
        );
        self.colors.resolve(&post_process(points, &self.post))
    }

    /// Rebuild the request a saved chart was created from
    pub fn from_saved(chart: &SavedChart) -> Result<Self> {
        let display = DisplayOptions::from_value(&chart.advanced)?;
        let config = &chart.config;
        if config.x_property.trim().is_empty() {
            return Err(ValidationError::Missing("x (X axis property)".to_string()));
        }

        let y_property = Some(config.y_property.trim())
            .filter(|y| !y.is_empty())
            .map(String::from);

        Ok(Self {
            x_property: config.x_property.clone(),
            y_property,
            aggregation: config.aggregation,
            post: display.post_process_options()?,
            colors: display.color_scheme(),
        })
    }
}

/// Display options stored alongside a saved chart
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayOptions {
    pub color_palette: Option<String>,
    pub custom_colors: Vec<String>,
    pub category_colors: HashMap<String, String>,
    pub excluded: Vec<String>,
    pub sort_by: SortBy,
    pub sort_order: Option<SortOrder>,
    pub manual_order: Vec<String>,
    pub limit: Option<usize>,
    /// Calendar charts keep their date property in `x_property`
    pub subject_property: Option<String>,
    pub description_property: Option<String>,
    pub calendar_mode: Option<CalendarMode>,
}

impl DisplayOptions {
    pub fn from_value(advanced: &serde_json::Value) -> Result<Self> {
        if advanced.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(advanced.clone())
            .map_err(|e| invalid("advanced", &e.to_string()))
    }

    pub fn post_process_options(&self) -> Result<PostProcessOptions> {
        let sort_order = match (self.sort_order, self.sort_by) {
            (Some(order), _) => order,
            (None, SortBy::X | SortBy::Y) => {
                return Err(ValidationError::Missing("sortOrder".to_string()));
            }
            (None, _) => SortOrder::Asc,
        };

        Ok(PostProcessOptions {
            excluded: self.excluded.clone(),
            sort_by: self.sort_by,
            sort_order,
            manual_order: self.manual_order.clone(),
            limit: self.limit,
        })
    }

    /// Manual order extended with any category of `points` it lacks
    pub fn merged_manual_order(&self, points: &[ChartDataPoint]) -> Vec<String> {
        let names: Vec<String> = points.iter().map(|p| p.name.clone()).collect();
        merge_manual_order(&self.manual_order, &names)
    }

    pub fn color_scheme(&self) -> ColorScheme {
        let scheme = if !self.custom_colors.is_empty() {
            ColorScheme::custom(&self.custom_colors)
        } else {
            self.color_palette
                .as_deref()
                .map(ColorScheme::named)
                .unwrap_or_default()
        };
        scheme.with_category_colors(self.category_colors.clone())
    }
}

/// Query parameters of the time-series endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSeriesQuery {
    pub date: Option<String>,
    pub value: Option<String>,
    pub granularity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TimeSeriesRequest {
    pub date_property: String,
    pub value_property: String,
    pub granularity: Granularity,
}

impl TimeSeriesQuery {
    pub fn validate(&self) -> Result<TimeSeriesRequest> {
        let date_property = non_empty(&self.date)
            .ok_or_else(|| ValidationError::Missing("date".to_string()))?
            .to_string();

        let granularity = match non_empty(&self.granularity) {
            Some(raw) => Granularity::parse(raw).ok_or_else(|| invalid("granularity", raw))?,
            None => Granularity::default(),
        };

        Ok(TimeSeriesRequest {
            date_property,
            value_property: non_empty(&self.value).unwrap_or_default().to_string(),
            granularity,
        })
    }
}

/// Query parameters of the contribution endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContributionQuery {
    pub date: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ContributionRequest {
    pub date_property: String,
    pub subject_property: String,
    pub description_property: String,
    pub mode: CalendarMode,
}

impl ContributionQuery {
    pub fn validate(&self) -> Result<ContributionRequest> {
        let fields = [
            ("date", &self.date),
            ("subject", &self.subject),
            ("description", &self.description),
        ];
        let missing: Vec<String> = fields
            .iter()
            .filter(|(_, value)| non_empty(value).is_none())
            .map(|(name, _)| name.to_string())
            .collect();

        match missing.len() {
            0 => {}
            1 => return Err(ValidationError::Missing(missing[0].clone())),
            _ => return Err(ValidationError::MissingMany(missing)),
        }

        let mode = match non_empty(&self.mode) {
            Some(raw) => CalendarMode::parse(raw).ok_or_else(|| invalid("mode", raw))?,
            None => CalendarMode::default(),
        };

        Ok(ContributionRequest {
            date_property: non_empty(&self.date).unwrap_or_default().to_string(),
            subject_property: non_empty(&self.subject).unwrap_or_default().to_string(),
            description_property: non_empty(&self.description).unwrap_or_default().to_string(),
            mode,
        })
    }
}

impl ContributionRequest {
    /// Calendar settings of a saved contribution chart
    pub fn from_saved(chart: &SavedChart) -> Result<Self> {
        if chart.config.chart_type != ChartType::Contribution {
            return Err(invalid("chartType", chart.config.chart_type.as_str()));
        }
        let display = DisplayOptions::from_value(&chart.advanced)?;

        ContributionQuery {
            date: Some(chart.config.x_property.clone()),
            subject: display.subject_property,
            description: display.description_property,
            mode: None,
        }
        .validate()
        .map(|request| Self {
            mode: display.calendar_mode.unwrap_or(request.mode),
            ..request
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_database_id() {
        assert_eq!(validate_database_id("short"), Err(ValidationError::DatabaseId));
        let id = "0123456789abcdef0123456789abcdef";
        assert_eq!(validate_database_id(id), Ok(id));
        assert_eq!(validate_database_id(&format!(" {} ", id)), Ok(id));

        let hyphenated = "01234567-89ab-cdef-0123-456789ABCDEF";
        assert_eq!(validate_database_id(hyphenated), Ok(hyphenated));
    }

    #[test]
    fn test_database_id_rejects_path_characters() {
        let traversal = format!("../../users/{}", "a".repeat(32));
        assert_eq!(validate_database_id(&traversal), Err(ValidationError::DatabaseId));
        assert_eq!(
            validate_database_id(&format!("{}/query", "a".repeat(32))),
            Err(ValidationError::DatabaseId)
        );
        assert_eq!(
            validate_database_id(&format!("{}.json", "a".repeat(32))),
            Err(ValidationError::DatabaseId)
        );
        assert_eq!(validate_database_id(&"g".repeat(32)), Err(ValidationError::DatabaseId));
        assert_eq!(validate_database_id(&"a".repeat(33)), Err(ValidationError::DatabaseId));
    }

    #[test]
    fn test_missing_x() {
        let err = ChartQuery::default().validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: x (X axis property)");
    }

    #[test]
    fn test_chart_query_defaults() {
        let query = ChartQuery {
            x: some("Status"),
            ..Default::default()
        };
        let request = query.validate().unwrap();
        assert_eq!(request.aggregation, Aggregation::Sum);
        assert!(request.y_property.is_none());
        assert_eq!(request.post.sort_by, SortBy::None);
        assert_eq!(request.colors, ColorScheme::default());
    }

    #[test]
    fn test_sort_requires_order() {
        let query = ChartQuery {
            x: some("Status"),
            sort_by: some("y"),
            ..Default::default()
        };
        assert_eq!(
            query.validate().unwrap_err(),
            ValidationError::Missing("sortOrder".to_string())
        );

        let manual = ChartQuery {
            x: some("Status"),
            sort_by: some("manual"),
            manual_order: some("Done, Todo"),
            ..Default::default()
        };
        let request = manual.validate().unwrap();
        assert_eq!(request.post.manual_order, vec!["Done", "Todo"]);
    }

    #[test]
    fn test_full_chart_query() {
        let query = ChartQuery {
            x: some("Status"),
            y: some("Points"),
            agg: some("average"),
            sort_by: some("x"),
            sort_order: some("asc"),
            excluded: some("Archived,,Backlog"),
            limit: some("3"),
            palette: some("ocean"),
            cat_colors: some(r##"{"Done":"#0f0"}"##),
            ..Default::default()
        };
        let request = query.validate().unwrap();
        assert_eq!(request.y_property.as_deref(), Some("Points"));
        assert_eq!(request.aggregation, Aggregation::Average);
        assert_eq!(request.post.excluded, vec!["Archived", "Backlog"]);
        assert_eq!(request.post.limit, Some(3));
        assert_eq!(request.colors.palette[0], "#0ea5e9");
        assert_eq!(request.colors.category_colors["Done"], "#0f0");
    }

    #[test]
    fn test_bad_values() {
        let bad_limit = ChartQuery {
            x: some("x"),
            limit: some("-1"),
            ..Default::default()
        };
        assert!(matches!(bad_limit.validate(), Err(ValidationError::Invalid { .. })));

        let bad_colors = ChartQuery {
            x: some("x"),
            cat_colors: some("not json"),
            ..Default::default()
        };
        assert!(matches!(bad_colors.validate(), Err(ValidationError::Invalid { .. })));

        let bad_palette = ChartQuery {
            x: some("x"),
            palette: some("neon"),
            ..Default::default()
        };
        assert!(matches!(bad_palette.validate(), Err(ValidationError::Invalid { .. })));
    }

    #[test]
    fn test_contribution_missing_fields() {
        let err = ContributionQuery {
            date: some("Date"),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required parameters: subject, description"
        );

        let ok = ContributionQuery {
            date: some("Date"),
            subject: some("Name"),
            description: some("Notes"),
            mode: some("trailing52"),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.mode, CalendarMode::Trailing52);
    }

    #[test]
    fn test_time_series_query() {
        assert!(TimeSeriesQuery::default().validate().is_err());

        let request = TimeSeriesQuery {
            date: some("When"),
            value: None,
            granularity: some("week"),
        }
        .validate()
        .unwrap();
        assert_eq!(request.granularity, Granularity::Week);
        assert_eq!(request.value_property, "");
    }

    fn saved(chart_type: ChartType, advanced: serde_json::Value) -> SavedChart {
        let now = chrono::Utc::now();
        SavedChart {
            id: "c1".into(),
            name: "Saved".into(),
            created_at: now,
            updated_at: now,
            embed_url: String::new(),
            config: crate::db::ChartConfig {
                database_id: "a".repeat(32),
                x_property: "Status".into(),
                y_property: String::new(),
                chart_type,
                aggregation: Aggregation::Count,
                title: String::new(),
            },
            advanced,
        }
    }

    #[test]
    fn test_render_saved_chart() {
        use crate::PropertyValue;

        let chart = saved(
            ChartType::Bar,
            serde_json::json!({
                "colorPalette": "mono",
                "categoryColors": { "Todo": "#ff0000" },
                "sortBy": "y",
                "sortOrder": "desc",
                "excluded": ["Archived"]
            }),
        );
        let request = ChartRequest::from_saved(&chart).unwrap();

        let records: Vec<Record> = ["Todo", "Done", "Done", "Archived"]
            .iter()
            .enumerate()
            .map(|(i, s)| Record::new(i.to_string()).with_property("Status", PropertyValue::status(s)))
            .collect();

        let points = request.render(&records);
        let names: Vec<&str> = points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Done", "Todo"]);
        assert_eq!(points[0].value, 2.0);
        assert_eq!(points[1].color, "#ff0000");
    }

    #[test]
    fn test_saved_chart_without_display_options() {
        let request = ChartRequest::from_saved(&saved(ChartType::Pie, serde_json::Value::Null)).unwrap();
        assert_eq!(request.post.sort_by, SortBy::None);
        assert_eq!(request.colors, ColorScheme::default());

        let missing_order = saved(ChartType::Pie, serde_json::json!({ "sortBy": "x" }));
        assert!(ChartRequest::from_saved(&missing_order).is_err());
    }

    #[test]
    fn test_saved_contribution_chart() {
        let chart = saved(
            ChartType::Contribution,
            serde_json::json!({
                "subjectProperty": "Name",
                "descriptionProperty": "Notes",
                "calendarMode": "trailing52"
            }),
        );
        let request = ContributionRequest::from_saved(&chart).unwrap();
        assert_eq!(request.date_property, "Status");
        assert_eq!(request.mode, CalendarMode::Trailing52);

        assert!(ContributionRequest::from_saved(&saved(ChartType::Bar, serde_json::Value::Null)).is_err());
    }

    #[test]
    fn test_display_sort_accepts_query_spellings() {
        let display = DisplayOptions::from_value(&serde_json::json!({
            "sortBy": "name",
            "sortOrder": "asc"
        }))
        .unwrap();
        assert_eq!(display.sort_by, SortBy::X);

        let display = DisplayOptions::from_value(&serde_json::json!({
            "sortBy": "value",
            "sortOrder": "desc"
        }))
        .unwrap();
        assert_eq!(display.sort_by, SortBy::Y);
    }

    #[test]
    fn test_merged_manual_order_appends_new_categories() {
        let display = DisplayOptions {
            sort_by: SortBy::Manual,
            manual_order: vec!["Done".into(), "Gone".into()],
            ..Default::default()
        };
        let points = vec![
            ChartDataPoint::new("Todo", 1.0),
            ChartDataPoint::new("Done", 2.0),
            ChartDataPoint::new("Doing", 3.0),
        ];
        assert_eq!(
            display.merged_manual_order(&points),
            vec!["Done", "Gone", "Todo", "Doing"]
        );
        assert_eq!(
            DisplayOptions::default().merged_manual_order(&points),
            vec!["Todo", "Done", "Doing"]
        );
    }
}
