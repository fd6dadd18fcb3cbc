//! Shareable embed links for charts and contribution calendars

use crate::calendar::CalendarMode;
use crate::colors::ColorScheme;
use crate::db::ChartConfig;
use crate::postprocess::{PostProcessOptions, SortBy};
use crate::query::{self, DisplayOptions};
use crate::ChartType;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Invalid base URL: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Options(#[from] query::ValidationError),
}

/// Parameters of a contribution calendar embed
#[derive(Debug, Clone)]
pub struct CalendarEmbed<'a> {
    pub database_id: &'a str,
    pub date_property: &'a str,
    pub subject_property: &'a str,
    pub description_property: &'a str,
    pub title: Option<&'a str>,
    pub mode: Option<CalendarMode>,
}

/// Link for a bar/line/pie/area chart
pub fn chart_url(
    base: &str,
    config: &ChartConfig,
    post: &PostProcessOptions,
    colors: &ColorScheme,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?.join(&format!("charts/{}", config.chart_type.as_str()))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("db", &config.database_id);
        query.append_pair("x", &config.x_property);
        if !config.y_property.is_empty() {
            query.append_pair("y", &config.y_property);
        }
        query.append_pair("agg", config.aggregation.as_str());
        if !config.title.is_empty() {
            query.append_pair("title", &config.title);
        }
        query.append_pair("colors", &colors.palette.join(","));
        if post.sort_by != SortBy::None {
            query.append_pair("sortBy", post.sort_by.as_str());
            query.append_pair("sortOrder", post.sort_order.as_str());
        }
        if !post.manual_order.is_empty() {
            query.append_pair("manualOrder", &post.manual_order.join(","));
        }
        if !post.excluded.is_empty() {
            query.append_pair("excluded", &post.excluded.join(","));
        }
        if let Some(limit) = post.limit.filter(|&l| l > 0) {
            query.append_pair("limit", &limit.to_string());
        }
        if !colors.category_colors.is_empty() {
            // serializing a map of strings cannot fail
            if let Ok(json) = serde_json::to_string(&colors.category_colors) {
                query.append_pair("catColors", &json);
            }
        }
    }

    Ok(url)
}

/// Link for a contribution calendar
pub fn calendar_url(base: &str, embed: &CalendarEmbed<'_>) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?.join(&format!("charts/{}", ChartType::Contribution.as_str()))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("db", embed.database_id);
        query.append_pair("date", embed.date_property);
        query.append_pair("subject", embed.subject_property);
        query.append_pair("description", embed.description_property);
        if let Some(title) = embed.title.filter(|t| !t.is_empty()) {
            query.append_pair("title", title);
        }
        if let Some(mode) = embed.mode {
            query.append_pair("mode", mode.as_str());
        }
    }

    Ok(url)
}

/// Link for a saved chart of any type, from its config and display options
pub fn embed_url_for(
    base: &str,
    config: &ChartConfig,
    display: &DisplayOptions,
) -> Result<Url, EmbedError> {
    if config.chart_type == ChartType::Contribution {
        let embed = CalendarEmbed {
            database_id: &config.database_id,
            date_property: &config.x_property,
            subject_property: display.subject_property.as_deref().unwrap_or_default(),
            description_property: display.description_property.as_deref().unwrap_or_default(),
            title: Some(config.title.as_str()),
            mode: display.calendar_mode,
        };
        return Ok(calendar_url(base, &embed)?);
    }

    let post = display.post_process_options()?;
    Ok(chart_url(base, config, &post, &display.color_scheme())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::SortOrder;
    use crate::Aggregation;
    use std::collections::HashMap;

    fn config() -> ChartConfig {
        ChartConfig {
            database_id: "db123".into(),
            x_property: "Status".into(),
            y_property: String::new(),
            chart_type: ChartType::Pie,
            aggregation: Aggregation::Count,
            title: "My Tasks".into(),
        }
    }

    #[test]
    fn test_chart_url() {
        let post = PostProcessOptions {
            excluded: vec!["Archived".into()],
            sort_by: SortBy::Y,
            sort_order: SortOrder::Desc,
            manual_order: vec![],
            limit: Some(5),
        };
        let mut overrides = HashMap::new();
        overrides.insert("Done".to_string(), "#00ff00".to_string());
        let colors = ColorScheme::custom(["#111111", "#222222"]).with_category_colors(overrides);

        let url = chart_url("https://charts.example.com", &config(), &post, &colors).unwrap();
        assert_eq!(url.path(), "/charts/pie");

        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["db"], "db123");
        assert_eq!(pairs["agg"], "count");
        assert_eq!(pairs["title"], "My Tasks");
        assert_eq!(pairs["colors"], "#111111,#222222");
        assert_eq!(pairs["sortBy"], "y");
        assert_eq!(pairs["sortOrder"], "desc");
        assert_eq!(pairs["excluded"], "Archived");
        assert_eq!(pairs["limit"], "5");
        assert_eq!(pairs["catColors"], r##"{"Done":"#00ff00"}"##);
        assert!(!pairs.contains_key("y"));
        assert!(!pairs.contains_key("manualOrder"));
    }

    #[test]
    fn test_calendar_url() {
        let url = calendar_url(
            "http://127.0.0.1:7890/",
            &CalendarEmbed {
                database_id: "db123",
                date_property: "Date",
                subject_property: "Name",
                description_property: "Notes",
                title: Some(""),
                mode: None,
            },
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:7890/charts/contribution?db=db123&date=Date&subject=Name&description=Notes"
        );
    }

    #[test]
    fn test_embed_url_for_saved_chart() {
        let display: DisplayOptions = serde_json::from_value(serde_json::json!({
            "colorPalette": "mono",
            "sortBy": "x",
            "sortOrder": "asc"
        }))
        .unwrap();
        let url = embed_url_for("http://localhost:7890", &config(), &display).unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["sortBy"], "x");
        assert!(pairs["colors"].starts_with("#1f2937"));

        let mut calendar = config();
        calendar.chart_type = ChartType::Contribution;
        calendar.x_property = "Date".into();
        let url = embed_url_for("http://localhost:7890", &calendar, &DisplayOptions::default()).unwrap();
        assert_eq!(url.path(), "/charts/contribution");
        assert!(!url.query_pairs().any(|(k, _)| k == "mode"));

        let trailing = DisplayOptions {
            calendar_mode: Some(CalendarMode::Trailing52),
            ..Default::default()
        };
        let url = embed_url_for("http://localhost:7890", &calendar, &trailing).unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["mode"], "trailing52");
        assert_eq!(CalendarMode::parse(&pairs["mode"]), Some(CalendarMode::Trailing52));
    }
}
