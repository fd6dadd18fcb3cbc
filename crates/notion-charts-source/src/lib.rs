//! Record sources for notion-charts
//!
//! `NotionClient` talks to the Notion REST API. `MemorySource` serves fixed
//! records and is used wherever a live workspace is not wanted.

pub mod memory;
pub mod notion;

use async_trait::async_trait;
use notion_charts_core::{DatabaseSchema, Record};
use thiserror::Error;

pub use memory::MemorySource;
pub use notion::{NotionClient, NotionConfig, NOTION_API_VERSION};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Notion token not configured")]
    NotConfigured,
    #[error("Database not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Rate limited by Notion")]
    RateLimited,
    #[error("Notion returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid Notion API URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Anything that can list the rows and properties of a database
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Every record of the database, across all result pages
    async fn fetch_all_records(&self, database_id: &str) -> Result<Vec<Record>>;

    async fn fetch_schema(&self, database_id: &str) -> Result<DatabaseSchema>;
}
