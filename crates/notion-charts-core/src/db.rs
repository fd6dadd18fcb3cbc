//! Saved chart storage
//!
//! Charts are kept in a local SQLite file. Config and display options are
//! stored as JSON columns so the schema never needs migrating when the
//! embed options grow.

use crate::{Aggregation, ChartType};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid timestamp in stored chart: {0}")]
    Timestamp(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// What a saved chart queries and how it is drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub database_id: String,
    pub x_property: String,
    #[serde(default)]
    pub y_property: String,
    #[serde(default)]
    pub chart_type: ChartType,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedChart {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub embed_url: String,
    pub config: ChartConfig,
    /// Free-form display options (palette, sorting, sizes, ...)
    pub advanced: Value,
}

/// A chart about to be saved; id and timestamps are assigned on create
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChart {
    pub name: String,
    pub embed_url: String,
    pub config: ChartConfig,
    #[serde(default)]
    pub advanced: Value,
}

/// Partial update; absent fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartUpdate {
    pub name: Option<String>,
    pub embed_url: Option<String>,
    pub config: Option<ChartConfig>,
    pub advanced: Option<Value>,
}

/// CRUD over saved charts
pub trait ChartStore {
    fn list(&self) -> Result<Vec<SavedChart>>;
    fn get(&self, id: &str) -> Result<Option<SavedChart>>;
    fn create(&self, chart: NewChart) -> Result<SavedChart>;
    /// Returns None when no chart has this id
    fn update(&self, id: &str, update: ChartUpdate) -> Result<Option<SavedChart>>;
    /// Returns false when no chart has this id
    fn delete(&self, id: &str) -> Result<bool>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS saved_charts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                embed_url TEXT NOT NULL,
                config TEXT NOT NULL,
                advanced TEXT NOT NULL DEFAULT 'null'
            );

            CREATE INDEX IF NOT EXISTS idx_saved_charts_created ON saved_charts(created_at);
            "#,
        )?;

        Ok(())
    }

    fn row_to_chart(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
        Ok(StoredRow {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            embed_url: row.get(4)?,
            config: row.get(5)?,
            advanced: row.get(6)?,
        })
    }

    fn write(&self, chart: &SavedChart) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO saved_charts (id, name, created_at, updated_at, embed_url, config, advanced)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                updated_at = excluded.updated_at,
                embed_url = excluded.embed_url,
                config = excluded.config,
                advanced = excluded.advanced
            "#,
            params![
                chart.id,
                chart.name,
                chart.created_at.to_rfc3339(),
                chart.updated_at.to_rfc3339(),
                chart.embed_url,
                serde_json::to_string(&chart.config)?,
                serde_json::to_string(&chart.advanced)?,
            ],
        )?;
        Ok(())
    }
}

/// Raw column values before JSON and timestamp decoding
struct StoredRow {
    id: String,
    name: String,
    created_at: String,
    updated_at: String,
    embed_url: String,
    config: String,
    advanced: String,
}

impl StoredRow {
    fn decode(self) -> Result<SavedChart> {
        let parse_ts = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| StoreError::Timestamp(s.to_string()))
        };

        Ok(SavedChart {
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            config: serde_json::from_str(&self.config)?,
            advanced: serde_json::from_str(&self.advanced)?,
            id: self.id,
            name: self.name,
            embed_url: self.embed_url,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, created_at, updated_at, embed_url, config, advanced FROM saved_charts";

impl ChartStore for Database {
    fn list(&self) -> Result<Vec<SavedChart>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY created_at, rowid", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], Self::row_to_chart)?;

        rows.map(|row| row.map_err(StoreError::from).and_then(StoredRow::decode))
            .collect()
    }

    fn get(&self, id: &str) -> Result<Option<SavedChart>> {
        let row = self
            .conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                Self::row_to_chart,
            )
            .optional()?;

        row.map(StoredRow::decode).transpose()
    }

    fn create(&self, chart: NewChart) -> Result<SavedChart> {
        let now = Utc::now();
        let saved = SavedChart {
            id: Uuid::new_v4().to_string(),
            name: chart.name,
            created_at: now,
            updated_at: now,
            embed_url: chart.embed_url,
            config: chart.config,
            advanced: chart.advanced,
        };

        self.write(&saved)?;
        info!(id = %saved.id, name = %saved.name, "Saved chart");
        Ok(saved)
    }

    fn update(&self, id: &str, update: ChartUpdate) -> Result<Option<SavedChart>> {
        let Some(mut chart) = self.get(id)? else {
            debug!(id, "Update for unknown chart");
            return Ok(None);
        };

        if let Some(name) = update.name {
            chart.name = name;
        }
        if let Some(embed_url) = update.embed_url {
            chart.embed_url = embed_url;
        }
        if let Some(config) = update.config {
            chart.config = config;
        }
        if let Some(advanced) = update.advanced {
            chart.advanced = advanced;
        }
        chart.updated_at = Utc::now();

        self.write(&chart)?;
        Ok(Some(chart))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM saved_charts WHERE id = ?1", params![id])?;
        if removed > 0 {
            info!(id, "Deleted chart");
        }
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_chart(name: &str) -> NewChart {
        NewChart {
            name: name.to_string(),
            embed_url: "http://localhost/charts/bar?db=abc".to_string(),
            config: ChartConfig {
                database_id: "a".repeat(32),
                x_property: "Status".to_string(),
                y_property: String::new(),
                chart_type: ChartType::Bar,
                aggregation: Aggregation::Count,
                title: "Tasks".to_string(),
            },
            advanced: json!({ "colorPalette": "ocean", "sortBy": "y", "sortOrder": "desc" }),
        }
    }

    #[test]
    fn test_database_creation() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.list().unwrap().is_empty());
    }

    #[test]
    fn test_create_and_get() {
        let db = Database::open(":memory:").unwrap();

        let saved = db.create(new_chart("Tasks by status")).unwrap();
        assert!(Uuid::parse_str(&saved.id).is_ok());
        assert_eq!(saved.created_at, saved.updated_at);

        let loaded = db.get(&saved.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Tasks by status");
        assert_eq!(loaded.config.aggregation, Aggregation::Count);
        assert_eq!(loaded.advanced["colorPalette"], "ocean");
        assert!(db.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_in_creation_order() {
        let db = Database::open(":memory:").unwrap();
        let first = db.create(new_chart("one")).unwrap();
        let second = db.create(new_chart("two")).unwrap();

        let ids: Vec<String> = db.list().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_partial_update() {
        let db = Database::open(":memory:").unwrap();
        let saved = db.create(new_chart("before")).unwrap();

        let updated = db
            .update(
                &saved.id,
                ChartUpdate {
                    name: Some("after".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "after");
        assert_eq!(updated.embed_url, saved.embed_url);
        assert_eq!(updated.created_at, saved.created_at);
        assert!(updated.updated_at >= saved.updated_at);
        assert_eq!(db.get(&saved.id).unwrap().unwrap().name, "after");

        assert!(db.update("missing", ChartUpdate::default()).unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let db = Database::open(":memory:").unwrap();
        let saved = db.create(new_chart("doomed")).unwrap();

        assert!(db.delete(&saved.id).unwrap());
        assert!(!db.delete(&saved.id).unwrap());
        assert!(db.list().unwrap().is_empty());
    }

    #[test]
    fn test_saved_chart_wire_format() {
        let db = Database::open(":memory:").unwrap();
        let saved = db.create(new_chart("wire")).unwrap();
        let json = serde_json::to_value(&saved).unwrap();

        assert!(json.get("createdAt").is_some());
        assert!(json.get("embedUrl").is_some());
        assert_eq!(json["config"]["databaseId"], "a".repeat(32));
        assert_eq!(json["config"]["chartType"], "bar");
    }
}
