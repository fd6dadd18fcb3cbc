//! Notion REST client

use crate::{RecordSource, Result, SourceError};
use async_trait::async_trait;
use notion_charts_core::record::RichText;
use notion_charts_core::{Config, DatabaseSchema, PropertySchema, Record};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const NOTION_API_VERSION: &str = "2022-06-28";

/// Largest page the query endpoint returns
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: Option<String>,
    pub base_url: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: notion_charts_core::config::DEFAULT_NOTION_API_URL.to_string(),
            api_version: NOTION_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl NotionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            token: config.notion_token.clone(),
            base_url: config.notion_api_url.clone(),
            ..Default::default()
        }
    }
}

pub struct NotionClient {
    http: reqwest::Client,
    token: String,
    base_url: Url,
    api_version: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatabaseResponse {
    #[serde(default)]
    title: Vec<RichText>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self> {
        let token = config
            .token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(SourceError::NotConfigured)?;

        let base_url = Url::parse(config.base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;

        Ok(Self {
            http,
            token,
            base_url,
            api_version: config.api_version,
        })
    }

    /// API endpoint under `/v1`; each segment is percent-encoded on its own
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let error = map_http_error(status, &body);
            warn!(status = status.as_u16(), %error, "Notion request failed");
            return Err(error);
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

/// Translate a non-success response into a `SourceError`
pub fn map_http_error(status: StatusCode, body: &[u8]) -> SourceError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .message
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    if status == StatusCode::NOT_FOUND || parsed.code.as_deref() == Some("object_not_found") {
        return SourceError::NotFound(message);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized(message),
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited,
        _ => SourceError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RecordSource for NotionClient {
    async fn fetch_all_records(&self, database_id: &str) -> Result<Vec<Record>> {
        let url = self.url(&["databases", database_id, "query"])?;
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let page: QueryResponse = self.send(self.http.post(url.clone()).json(&body)).await?;
            pages += 1;

            let returned = page.results.len();
            records.extend(page.results.into_iter().filter_map(Record::from_page));
            debug!(database_id, page = pages, returned, "Fetched query page");

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!(database_id, records = records.len(), pages, "Fetched database records");
        Ok(records)
    }

    async fn fetch_schema(&self, database_id: &str) -> Result<DatabaseSchema> {
        let url = self.url(&["databases", database_id])?;
        let database: DatabaseResponse = self.send(self.http.get(url)).await?;

        let properties = database
            .properties
            .iter()
            .map(|(name, prop)| {
                let kind = prop.get("type").and_then(Value::as_str).unwrap_or("unknown");
                PropertySchema::new(name.as_str(), kind)
            })
            .collect();

        Ok(DatabaseSchema {
            title: database.title.iter().map(|t| t.plain_text.as_str()).collect(),
            properties,
        })
    }
}
