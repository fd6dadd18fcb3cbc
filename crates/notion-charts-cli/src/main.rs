//! notion-charts CLI
//!
//! Query Notion databases as charts from the terminal and manage saved charts.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use notion_charts_core::{
    build_calendar, bucket_time_series,
    colors::{palette, palette_names},
    config::parse_timezone,
    db::{ChartConfig, NewChart, SavedChart},
    embed,
    export::{ExportFormat, Exporter},
    extract_contributions,
    query::{
        validate_database_id, ChartQuery, ChartRequest, ContributionQuery, ContributionRequest,
        DisplayOptions, TimeSeriesQuery, TimeSeriesRequest,
    },
    Aggregation, CalendarMode, CalendarOptions, ChartDataPoint, ChartStore, ChartType, ColoredPoint,
    Config, ContributionCalendar, ContributionEntry, Database, Record, SortBy, SortOrder,
};
use notion_charts_source::{NotionClient, NotionConfig, RecordSource};
use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "notion-charts")]
#[command(about = "Turn Notion databases into charts")]
#[command(version)]
struct Cli {
    /// Saved-chart database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Timezone for date bucketing (e.g. Europe/Madrid)
    #[arg(long, global = true)]
    tz: Option<String>,

    /// Notion integration token (overrides NOTION_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a database into chart points
    Chart {
        database_id: String,
        #[command(flatten)]
        chart: ChartArgs,
    },

    /// Count records per value of a property
    Count {
        database_id: String,
        property: String,
    },

    /// Bucket records by date
    Timeseries {
        database_id: String,
        #[command(flatten)]
        series: SeriesArgs,
    },

    /// Print a contribution calendar
    Contribution {
        database_id: String,
        #[command(flatten)]
        calendar: CalendarArgs,
    },

    /// List the properties of a database
    Schema { database_id: String },

    /// Manage saved charts
    Saved {
        #[command(subcommand)]
        command: SavedCommands,
    },

    /// Export chart data or contribution entries to CSV or JSON
    Export {
        #[command(subcommand)]
        target: ExportTarget,

        /// Output format (csv or json)
        #[arg(short, long, default_value = "json", global = true)]
        format: String,

        /// Output file (defaults to stdout); the format's extension is added
        /// when the path has none
        #[arg(short, long, global = true)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SavedCommands {
    /// List saved charts
    List,
    /// Show one saved chart
    Show { id: String },
    /// Fetch and print the data of a saved chart
    Data { id: String },
    /// Delete a saved chart
    Delete { id: String },
    /// Save a new chart
    Create(CreateArgs),
}

#[derive(Subcommand)]
enum ExportTarget {
    /// Chart points with their colors
    Chart {
        database_id: String,
        #[command(flatten)]
        chart: ChartArgs,
    },
    /// Record counts per value of a property
    Count {
        database_id: String,
        property: String,
    },
    /// Date buckets
    Timeseries {
        database_id: String,
        #[command(flatten)]
        series: SeriesArgs,
    },
    /// Raw contribution entries
    Contribution {
        database_id: String,
        #[command(flatten)]
        calendar: CalendarArgs,
    },
}

#[derive(Args, Clone, Default)]
struct ChartArgs {
    /// Property for labels / X axis
    #[arg(short, long)]
    x: String,
    /// Numeric property for values (defaults to counting)
    #[arg(short, long)]
    y: Option<String>,
    /// sum, count or average
    #[arg(long)]
    agg: Option<String>,
    /// none, x, y or manual
    #[arg(long)]
    sort_by: Option<String>,
    /// asc or desc
    #[arg(long)]
    sort_order: Option<String>,
    /// Comma-separated label order for manual sorting
    #[arg(long)]
    manual_order: Option<String>,
    /// Comma-separated labels to drop
    #[arg(long)]
    exclude: Option<String>,
    #[arg(long)]
    limit: Option<String>,
    /// Named palette
    #[arg(long)]
    palette: Option<String>,
    /// Comma-separated custom colors
    #[arg(long)]
    colors: Option<String>,
    /// JSON object of per-label colors
    #[arg(long)]
    cat_colors: Option<String>,
}

impl ChartArgs {
    fn to_query(&self) -> ChartQuery {
        ChartQuery {
            x: Some(self.x.clone()),
            y: self.y.clone(),
            agg: self.agg.clone(),
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_order.clone(),
            manual_order: self.manual_order.clone(),
            excluded: self.exclude.clone(),
            limit: self.limit.clone(),
            palette: self.palette.clone(),
            colors: self.colors.clone(),
            cat_colors: self.cat_colors.clone(),
        }
    }
}

#[derive(Args, Clone)]
struct SeriesArgs {
    #[arg(long)]
    date: String,
    /// Numeric property to sum (defaults to counting records)
    #[arg(long)]
    value: Option<String>,
    /// day, week or month
    #[arg(short, long, default_value = "day")]
    granularity: String,
}

impl SeriesArgs {
    fn to_query(&self) -> TimeSeriesQuery {
        TimeSeriesQuery {
            date: Some(self.date.clone()),
            value: self.value.clone(),
            granularity: Some(self.granularity.clone()),
        }
    }
}

#[derive(Args, Clone)]
struct CalendarArgs {
    #[arg(long)]
    date: String,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    description: String,
    /// year or trailing52
    #[arg(long)]
    mode: Option<String>,
}

impl CalendarArgs {
    fn to_query(&self) -> ContributionQuery {
        ContributionQuery {
            date: Some(self.date.clone()),
            subject: Some(self.subject.clone()),
            description: Some(self.description.clone()),
            mode: self.mode.clone(),
        }
    }
}

#[derive(Args)]
struct CreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long = "database")]
    database_id: String,
    /// X property, or the date property of a contribution chart
    #[arg(short, long)]
    x: String,
    #[arg(short, long, default_value = "")]
    y: String,
    /// bar, line, pie, area or contribution
    #[arg(long = "type", default_value = "bar")]
    chart_type: String,
    #[arg(long, default_value = "sum")]
    agg: String,
    #[arg(long, default_value = "")]
    title: String,
    /// Named palette
    #[arg(long)]
    palette: Option<String>,
    /// Comma-separated custom colors, used instead of the palette
    #[arg(long)]
    colors: Option<String>,
    /// JSON object of per-label colors
    #[arg(long)]
    cat_colors: Option<String>,
    /// none, x, y or manual
    #[arg(long)]
    sort_by: Option<String>,
    /// asc or desc
    #[arg(long)]
    sort_order: Option<String>,
    /// Comma-separated label order for manual sorting
    #[arg(long)]
    manual_order: Option<String>,
    /// Comma-separated labels to drop
    #[arg(long)]
    exclude: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
    /// Subject property of a contribution chart
    #[arg(long)]
    subject: Option<String>,
    /// Description property of a contribution chart
    #[arg(long)]
    description: Option<String>,
    /// Calendar range of a contribution chart: year or trailing52
    #[arg(long)]
    mode: Option<String>,
}

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Label")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "")]
    bar: String,
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Use as")]
    hint: String,
}

#[derive(Tabled)]
struct SavedRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    chart_type: String,
    #[tabled(rename = "X")]
    x: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

const BAR_WIDTH: usize = 30;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notion_charts=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(tz) = cli.tz.as_deref() {
        config.timezone = parse_timezone(tz)?;
    }
    if cli.token.is_some() {
        config.notion_token = cli.token;
    }
    debug!(db = %config.db_path.display(), tz = %config.timezone, "Loaded configuration");

    match cli.command {
        Commands::Chart { database_id, chart } => {
            let request = chart.to_query().validate()?;
            let records = fetch_records(&config, &database_id).await?;
            show_points(&request.render(&records), &format!("{} by {}", database_id, chart.x));
            Ok(())
        }

        Commands::Count { database_id, property } => {
            let records = fetch_records(&config, &database_id).await?;
            let points = notion_charts_core::count_by_property(&records, &property);
            show_plain_points(&points, &format!("Count by {}", property));
            Ok(())
        }

        Commands::Timeseries { database_id, series } => {
            let request = series.to_query().validate()?;
            let records = fetch_records(&config, &database_id).await?;
            let points = time_series(&config, &request, &records);
            show_plain_points(&points, &format!("{} over time", request.date_property));
            Ok(())
        }

        Commands::Contribution {
            database_id,
            calendar,
        } => {
            let request = calendar.to_query().validate()?;
            let records = fetch_records(&config, &database_id).await?;
            show_contribution(&config, &request, &records);
            Ok(())
        }

        Commands::Schema { database_id } => show_schema(&config, &database_id).await,

        Commands::Saved { command } => {
            let db = Database::open(&config.db_path)?;
            run_saved(&config, &db, command).await
        }

        Commands::Export {
            target,
            format,
            output,
        } => {
            let export_format = ExportFormat::parse(&format)
                .with_context(|| format!("Unknown export format '{}'", format))?;
            let exporter = Exporter::new(export_format);

            let writer: Box<dyn Write> = match output {
                Some(path) => {
                    let path = output_path(path, export_format);
                    let file = File::create(&path)
                        .with_context(|| format!("Cannot create {}", path.display()))?;
                    Box::new(file)
                }
                None => Box::new(io::stdout()),
            };

            match target {
                ExportTarget::Chart { database_id, chart } => {
                    let request = chart.to_query().validate()?;
                    let records = fetch_records(&config, &database_id).await?;
                    exporter.export_colored(writer, &request.render(&records), Some(chart.x.as_str()))?;
                }
                ExportTarget::Count {
                    database_id,
                    property,
                } => {
                    let records = fetch_records(&config, &database_id).await?;
                    let points = notion_charts_core::count_by_property(&records, &property);
                    exporter.export_points(writer, &points, Some(property.as_str()))?;
                }
                ExportTarget::Timeseries { database_id, series } => {
                    let request = series.to_query().validate()?;
                    let records = fetch_records(&config, &database_id).await?;
                    let points = time_series(&config, &request, &records);
                    exporter.export_points(writer, &points, Some(request.date_property.as_str()))?;
                }
                ExportTarget::Contribution {
                    database_id,
                    calendar,
                } => {
                    let request = calendar.to_query().validate()?;
                    let records = fetch_records(&config, &database_id).await?;
                    exporter.export_entries(writer, &contributions(&request, &records), None)?;
                }
            }

            Ok(())
        }
    }
}

fn source(config: &Config) -> Result<NotionClient> {
    NotionClient::new(NotionConfig::from_config(config))
        .context("Set NOTION_TOKEN or pass --token to query Notion")
}

async fn fetch_records(config: &Config, database_id: &str) -> Result<Vec<Record>> {
    let database_id = validate_database_id(database_id)?;
    let records = source(config)?.fetch_all_records(database_id).await?;
    debug!(database_id, count = records.len(), "Fetched records");
    Ok(records)
}

fn time_series(config: &Config, request: &TimeSeriesRequest, records: &[Record]) -> Vec<ChartDataPoint> {
    bucket_time_series(
        records,
        &request.date_property,
        &request.value_property,
        request.granularity,
        config.timezone,
    )
}

fn output_path(mut path: PathBuf, format: ExportFormat) -> PathBuf {
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }
    path
}

fn contributions(request: &ContributionRequest, records: &[Record]) -> Vec<ContributionEntry> {
    extract_contributions(
        records,
        &request.date_property,
        &request.subject_property,
        &request.description_property,
    )
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let width = ((value / max) * BAR_WIDTH as f64).round().max(1.0) as usize;
    "█".repeat(width.min(BAR_WIDTH))
}

fn header(title: &str) {
    println!("\n{}", title.bold().cyan());
    println!("{}", "─".repeat(50));
}

fn show_points(points: &[ColoredPoint], title: &str) {
    if points.is_empty() {
        println!("\n{}", "No data found".yellow());
        return;
    }

    header(title);
    let max = points.iter().map(|p| p.value).fold(0.0, f64::max);
    let rows: Vec<PointRow> = points
        .iter()
        .map(|p| PointRow {
            name: p.name.clone(),
            value: format_value(p.value),
            color: p.color.clone(),
            bar: bar(p.value, max),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
}

fn show_plain_points(points: &[ChartDataPoint], title: &str) {
    let colored: Vec<ColoredPoint> = notion_charts_core::ColorScheme::default().resolve(points);
    show_points(&colored, title);
}

fn show_contribution(config: &Config, request: &ContributionRequest, records: &[Record]) {
    let entries = contributions(request, records);
    let calendar = build_calendar(
        &entries,
        &CalendarOptions {
            mode: request.mode,
            today: config.today(),
        },
    );

    let title = match calendar.year {
        Some(year) => format!("{} contributions in {}", calendar.total_contributions, year),
        None => format!("{} contributions in the last year", calendar.total_contributions),
    };
    header(&title);
    println!("{}", render_calendar(&calendar));
    println!(
        "{} {}",
        "Less".dimmed(),
        ["·", "░", "▒", "▓", "█"].join(" ").green()
    );
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const LEVELS: [&str; 5] = ["·", "░", "▒", "▓", "█"];

/// Plain-text grid: one row per weekday, one column (two chars) per week
fn render_calendar(calendar: &ContributionCalendar) -> String {
    let width = calendar.weeks.len() * 2;
    let mut months = vec![' '; width];
    for label in &calendar.month_labels {
        let start = label.col * 2;
        if start + label.label.len() > width || months[start..start + label.label.len()].iter().any(|c| *c != ' ') {
            continue;
        }
        for (i, ch) in label.label.chars().enumerate() {
            months[start + i] = ch;
        }
    }

    let mut out = format!("    {}\n", months.iter().collect::<String>().trim_end());
    for (day, name) in WEEKDAYS.iter().enumerate() {
        let row: String = calendar
            .weeks
            .iter()
            .map(|week| match week.get(day) {
                Some(cell) if cell.in_range => format!("{} ", LEVELS[cell.intensity.level() as usize]),
                _ => "  ".to_string(),
            })
            .collect();
        out.push_str(&format!("{} {}\n", name, row.trim_end()));
    }
    out
}

async fn show_schema(config: &Config, database_id: &str) -> Result<()> {
    let database_id = validate_database_id(database_id)?;
    let schema = source(config)?.fetch_schema(database_id).await?;

    header(&format!("{} ({} properties)", schema.title, schema.properties.len()));
    let rows: Vec<PropertyRow> = schema
        .properties
        .into_iter()
        .map(|p| {
            let hint = match (p.is_numeric, p.is_category, p.is_date, p.is_text) {
                (true, ..) => "value",
                (_, true, ..) => "category",
                (_, _, true, _) => "date",
                (.., true) => "label",
                _ => "-",
            };
            PropertyRow {
                name: p.name,
                kind: p.property_type,
                hint: hint.to_string(),
            }
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    Ok(())
}

async fn run_saved(config: &Config, db: &Database, command: SavedCommands) -> Result<()> {
    match command {
        SavedCommands::List => {
            let charts = db.list()?;
            if charts.is_empty() {
                println!("\n{}", "No saved charts.".yellow());
                return Ok(());
            }

            header("Saved charts");
            let rows: Vec<SavedRow> = charts
                .into_iter()
                .map(|c| SavedRow {
                    id: c.id,
                    name: c.name,
                    chart_type: c.config.chart_type.as_str().to_string(),
                    x: c.config.x_property,
                    updated: c.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()).to_string());
            Ok(())
        }

        SavedCommands::Show { id } => {
            let chart = find_saved(db, &id)?;
            show_saved(&chart);
            Ok(())
        }

        SavedCommands::Data { id } => {
            let chart = find_saved(db, &id)?;
            let records = fetch_records(config, &chart.config.database_id).await?;

            if chart.config.chart_type == ChartType::Contribution {
                let request = ContributionRequest::from_saved(&chart)?;
                show_contribution(config, &request, &records);
            } else {
                let request = ChartRequest::from_saved(&chart)?;
                show_points(&request.render(&records), &chart.name);
            }
            Ok(())
        }

        SavedCommands::Delete { id } => {
            if db.delete(&id)? {
                println!("{}", format!("✓ Deleted {}", id).green());
            } else {
                println!("{}", format!("No saved chart {}", id).yellow());
            }
            Ok(())
        }

        SavedCommands::Create(args) => {
            let chart = new_chart(config, args)?;
            let saved = db.create(chart)?;
            println!("{}", format!("✓ Saved {}", saved.id).green());
            println!("{}", saved.embed_url);
            Ok(())
        }
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn find_saved(db: &Database, id: &str) -> Result<SavedChart> {
    db.get(id)?
        .with_context(|| format!("No saved chart {}", id))
}

fn show_saved(chart: &SavedChart) {
    header(&chart.name);
    let c = &chart.config;
    let rows = vec![
        ("ID", chart.id.clone()),
        ("Database", c.database_id.clone()),
        ("Type", c.chart_type.as_str().to_string()),
        ("X", c.x_property.clone()),
        ("Y", c.y_property.clone()),
        ("Aggregation", c.aggregation.to_string()),
        ("Title", c.title.clone()),
        ("Created", chart.created_at.to_rfc3339()),
        ("Updated", chart.updated_at.to_rfc3339()),
        ("Options", chart.advanced.to_string()),
    ];
    let rows: Vec<FieldRow> = rows
        .into_iter()
        .map(|(field, value)| FieldRow {
            field: field.to_string(),
            value,
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()).to_string());
    println!("{} {}", "Embed:".bold(), chart.embed_url);
}

fn new_chart(config: &Config, args: CreateArgs) -> Result<NewChart> {
    validate_database_id(&args.database_id)?;
    let Some(chart_type) = ChartType::parse(&args.chart_type) else {
        bail!("Unknown chart type '{}'", args.chart_type);
    };

    if let Some(name) = args.palette.as_deref() {
        if palette(name).is_none() {
            let known: Vec<&str> = palette_names().collect();
            bail!("Unknown palette '{}' (choose from {})", name, known.join(", "));
        }
    }

    let sort_by = match args.sort_by.as_deref() {
        Some(raw) => SortBy::parse(raw).with_context(|| format!("Unknown sort '{}'", raw))?,
        None => SortBy::None,
    };
    let sort_order = match args.sort_order.as_deref() {
        Some(raw) => Some(
            SortOrder::parse(raw).with_context(|| format!("Unknown sort order '{}'", raw))?,
        ),
        None => None,
    };
    let calendar_mode = match args.mode.as_deref() {
        Some(raw) => Some(
            CalendarMode::parse(raw).with_context(|| format!("Unknown calendar mode '{}'", raw))?,
        ),
        None => None,
    };
    let category_colors: HashMap<String, String> = match args.cat_colors.as_deref() {
        Some(raw) => serde_json::from_str(raw)
            .context("--cat-colors must be a JSON object of label to color")?,
        None => HashMap::new(),
    };

    let advanced = json!({
        "colorPalette": args.palette,
        "customColors": split_list(args.colors.as_deref()),
        "categoryColors": category_colors,
        "sortBy": sort_by,
        "sortOrder": sort_order,
        "manualOrder": split_list(args.manual_order.as_deref()),
        "excluded": split_list(args.exclude.as_deref()),
        "limit": args.limit,
        "subjectProperty": args.subject,
        "descriptionProperty": args.description,
        "calendarMode": calendar_mode,
    });
    let display = DisplayOptions::from_value(&advanced)?;

    let chart_config = ChartConfig {
        database_id: args.database_id.trim().to_string(),
        x_property: args.x,
        y_property: args.y,
        chart_type,
        aggregation: Aggregation::parse(&args.agg),
        title: args.title,
    };
    let embed_url = embed::embed_url_for(&config.public_url, &chart_config, &display)?;

    Ok(NewChart {
        name: args.name,
        embed_url: embed_url.into(),
        config: chart_config,
        advanced,
    })
}
