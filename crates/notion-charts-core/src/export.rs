//! Export of chart data and contribution entries as CSV or JSON

use crate::colors::ColoredPoint;
use crate::{ChartDataPoint, ContributionEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// JSON envelope around exported rows
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportData<'a, T> {
    exported_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    count: usize,
    data: &'a [T],
}

/// Writes chart rows in the chosen format
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    /// Export aggregated points
    pub fn export_points<W: Write>(
        &self,
        writer: W,
        points: &[ChartDataPoint],
        title: Option<&str>,
    ) -> Result<()> {
        match self.format {
            ExportFormat::Csv => write_csv(
                writer,
                &["name", "value"],
                points.iter().map(|p| vec![p.name.clone(), p.value.to_string()]),
            ),
            ExportFormat::Json => write_json(writer, points, title),
        }
    }

    /// Export points with their resolved colors
    pub fn export_colored<W: Write>(
        &self,
        writer: W,
        points: &[ColoredPoint],
        title: Option<&str>,
    ) -> Result<()> {
        match self.format {
            ExportFormat::Csv => write_csv(
                writer,
                &["name", "value", "color"],
                points
                    .iter()
                    .map(|p| vec![p.name.clone(), p.value.to_string(), p.color.clone()]),
            ),
            ExportFormat::Json => write_json(writer, points, title),
        }
    }

    /// Export raw contribution entries
    pub fn export_entries<W: Write>(
        &self,
        writer: W,
        entries: &[ContributionEntry],
        title: Option<&str>,
    ) -> Result<()> {
        match self.format {
            ExportFormat::Csv => write_csv(
                writer,
                &["date", "subject", "description"],
                entries
                    .iter()
                    .map(|e| vec![e.date.clone(), e.subject.clone(), e.description.clone()]),
            ),
            ExportFormat::Json => write_json(writer, entries, title),
        }
    }
}

fn write_csv<W, I>(writer: W, header: &[&str], rows: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = Vec<String>>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(header)?;
    for row in rows {
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn write_json<W: Write, T: Serialize>(mut writer: W, data: &[T], title: Option<&str>) -> Result<()> {
    let export = ExportData {
        exported_at: Utc::now(),
        title,
        count: data.len(),
        data,
    };
    let json = serde_json::to_string_pretty(&export)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}
