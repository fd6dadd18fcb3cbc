//! Runtime configuration read from the environment

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_ADDR: &str = "127.0.0.1:7890";
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown timezone '{0}'")]
    Timezone(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone)]
pub struct Config {
    /// Notion integration token; None means the source is not configured
    pub notion_token: Option<String>,
    pub notion_api_url: String,
    pub bind_addr: String,
    /// Reference timezone for date bucketing and "today"
    pub timezone: Tz,
    pub db_path: PathBuf,
    /// Origin used when building embed links
    pub public_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notion_token: None,
            notion_api_url: DEFAULT_NOTION_API_URL.to_string(),
            bind_addr: DEFAULT_ADDR.to_string(),
            timezone: Tz::UTC,
            db_path: crate::db_path(),
            public_url: format!("http://{}", DEFAULT_ADDR),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read `NOTION_*` variables
    pub fn from_env() -> Result<Self> {
        if dotenv::dotenv().is_err() {
            tracing::debug!("No .env file loaded");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let timezone = match get("NOTION_CHARTS_TZ") {
            Some(name) => parse_timezone(&name)?,
            None => defaults.timezone,
        };

        let bind_addr = get("NOTION_CHARTS_ADDR").unwrap_or(defaults.bind_addr);
        let public_url = get("NOTION_CHARTS_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{}", bind_addr));

        let notion_token = get("NOTION_TOKEN");
        if notion_token.is_none() {
            warn!("NOTION_TOKEN is not set; Notion requests will fail");
        }

        Ok(Self {
            notion_token,
            notion_api_url: get("NOTION_API_URL").unwrap_or(defaults.notion_api_url),
            bind_addr,
            timezone,
            db_path: get("NOTION_CHARTS_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Today's date in the configured timezone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::Timezone(name.to_string()))
}
