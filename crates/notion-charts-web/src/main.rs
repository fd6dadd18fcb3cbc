//! notion-charts web API
//!
//! Serves chart data computed from Notion databases, plus CRUD for saved
//! charts. Responses may be framed from any origin so charts can be embedded.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use notion_charts_core::{
    build_calendar, bucket_time_series, chart_data,
    db::{ChartUpdate, NewChart, SavedChart, StoreError},
    embed::{self, EmbedError},
    extract_contributions,
    query::{
        validate_database_id, ChartQuery, ChartRequest, ContributionQuery, ContributionRequest,
        DisplayOptions, TimeSeriesQuery, ValidationError,
    },
    CalendarOptions, ChartDataPoint, ChartStore, ChartType, ColoredPoint, Config,
    ContributionCalendar, ContributionEntry, Database, PropertySchema, Record, SortBy,
};
use notion_charts_source::{NotionClient, NotionConfig, RecordSource, SourceError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Database>>,
    /// None when no Notion token is configured
    source: Option<Arc<dyn RecordSource>>,
    config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("notion_charts=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::open(&config.db_path)?;
    info!(path = %config.db_path.display(), "Opened chart store");

    let source: Option<Arc<dyn RecordSource>> =
        match NotionClient::new(NotionConfig::from_config(&config)) {
            Ok(client) => Some(Arc::new(client)),
            Err(SourceError::NotConfigured) => None,
            Err(e) => return Err(e.into()),
        };

    let addr = config.bind_addr.clone();
    let state = AppState {
        store: Arc::new(Mutex::new(db)),
        source,
        config: Arc::new(config),
    };

    info!("Starting notion-charts API at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/notion/:database_id", get(chart_handler))
        .route("/api/notion/:database_id/timeseries", get(timeseries_handler))
        .route("/api/notion/schema/:database_id", get(schema_handler))
        .route("/api/notion/contribution/:database_id", get(contribution_handler))
        .route("/api/charts", get(list_charts_handler).post(create_chart_handler))
        .route(
            "/api/charts/:id",
            get(get_chart_handler)
                .put(update_chart_handler)
                .delete(delete_chart_handler),
        )
        .route("/api/charts/:id/data", get(saved_chart_data_handler))
        .route("/charts/:chart_type", get(embed_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("frame-ancestors *"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug)]
enum ApiError {
    Validation(ValidationError),
    Source(SourceError),
    Store(StoreError),
    ChartNotFound(String),
    Internal,
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        ApiError::Source(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<EmbedError> for ApiError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::Options(e) => ApiError::Validation(e),
            EmbedError::Url(e) => {
                error!(error = %e, "Public URL is not a valid base");
                ApiError::Internal
            }
        }
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Source(SourceError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                "Database not found. Check the ID and integration permissions.".to_string(),
            ),
            ApiError::Source(SourceError::NotConfigured) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Notion token not configured".to_string(),
            ),
            ApiError::Source(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch data from Notion".to_string(),
            ),
            ApiError::Store(_) | ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to access saved charts".to_string(),
            ),
            ApiError::ChartNotFound(id) => (StatusCode::NOT_FOUND, format!("Chart not found: {}", id)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        match &self {
            ApiError::Source(e) => warn!(error = %e, "Notion request failed"),
            ApiError::Store(e) => error!(error = %e, "Chart store failed"),
            _ => {}
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

impl AppState {
    fn source(&self) -> ApiResult<&dyn RecordSource> {
        self.source
            .as_deref()
            .ok_or(ApiError::Source(SourceError::NotConfigured))
    }

    async fn records(&self, database_id: &str) -> ApiResult<Vec<Record>> {
        let database_id = validate_database_id(database_id)?;
        Ok(self.source()?.fetch_all_records(database_id).await?)
    }

    /// Run `f` against the store; the lock is never held across an await
    fn with_store<T>(&self, f: impl FnOnce(&Database) -> notion_charts_core::db::Result<T>) -> ApiResult<T> {
        let db = self.store.lock().map_err(|_| ApiError::Internal)?;
        Ok(f(&db)?)
    }

    fn saved_chart(&self, id: &str) -> ApiResult<SavedChart> {
        self.with_store(|db| db.get(id))?
            .ok_or_else(|| ApiError::ChartNotFound(id.to_string()))
    }

    fn calendar_options(&self, request: &ContributionRequest) -> CalendarOptions {
        CalendarOptions {
            mode: request.mode,
            today: self.config.today(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChartResponse {
    data: Vec<ColoredPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    count: usize,
}

impl ChartResponse {
    fn render(request: &ChartRequest, records: &[Record]) -> Self {
        if records.is_empty() {
            return Self {
                data: Vec::new(),
                title: Some("No data found".to_string()),
                count: 0,
            };
        }
        Self {
            data: request.render(records),
            title: None,
            count: records.len(),
        }
    }
}

async fn chart_handler(
    State(state): State<AppState>,
    Path(database_id): Path<String>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<Json<ChartResponse>> {
    let request = query.validate()?;
    let records = state.records(&database_id).await?;
    Ok(Json(ChartResponse::render(&request, &records)))
}

#[derive(Debug, Serialize)]
struct TimeSeriesResponse {
    data: Vec<ChartDataPoint>,
    count: usize,
}

async fn timeseries_handler(
    State(state): State<AppState>,
    Path(database_id): Path<String>,
    Query(query): Query<TimeSeriesQuery>,
) -> ApiResult<Json<TimeSeriesResponse>> {
    let request = query.validate()?;
    let records = state.records(&database_id).await?;

    let data = bucket_time_series(
        &records,
        &request.date_property,
        &request.value_property,
        request.granularity,
        state.config.timezone,
    );

    Ok(Json(TimeSeriesResponse {
        data,
        count: records.len(),
    }))
}

#[derive(Debug, Serialize)]
struct SchemaResponse {
    title: String,
    properties: Vec<PropertySchema>,
    count: usize,
}

async fn schema_handler(
    State(state): State<AppState>,
    Path(database_id): Path<String>,
) -> ApiResult<Json<SchemaResponse>> {
    let database_id = validate_database_id(&database_id)?;
    let schema = state.source()?.fetch_schema(database_id).await?;

    Ok(Json(SchemaResponse {
        count: schema.properties.len(),
        title: schema.title,
        properties: schema.properties,
    }))
}

#[derive(Debug, Serialize)]
struct ContributionResponse {
    entries: Vec<ContributionEntry>,
    calendar: ContributionCalendar,
}

impl ContributionResponse {
    fn build(request: &ContributionRequest, records: &[Record], options: &CalendarOptions) -> Self {
        let entries = extract_contributions(
            records,
            &request.date_property,
            &request.subject_property,
            &request.description_property,
        );
        let calendar = build_calendar(&entries, options);
        Self { entries, calendar }
    }
}

async fn contribution_handler(
    State(state): State<AppState>,
    Path(database_id): Path<String>,
    Query(query): Query<ContributionQuery>,
) -> ApiResult<Json<ContributionResponse>> {
    let request = query.validate()?;
    let records = state.records(&database_id).await?;
    let options = state.calendar_options(&request);
    Ok(Json(ContributionResponse::build(&request, &records, &options)))
}

#[derive(Debug, Serialize)]
struct ChartsResponse {
    charts: Vec<SavedChart>,
    count: usize,
}

async fn list_charts_handler(State(state): State<AppState>) -> ApiResult<Json<ChartsResponse>> {
    let charts = state.with_store(|db| db.list())?;
    Ok(Json(ChartsResponse {
        count: charts.len(),
        charts,
    }))
}

async fn create_chart_handler(
    State(state): State<AppState>,
    Json(mut chart): Json<NewChart>,
) -> ApiResult<(StatusCode, Json<SavedChart>)> {
    validate_database_id(&chart.config.database_id)?;
    if chart.config.x_property.trim().is_empty() {
        return Err(ValidationError::Missing("x (X axis property)".to_string()).into());
    }

    let mut display = DisplayOptions::from_value(&chart.advanced)?;
    if display.sort_by == SortBy::Manual && chart.config.chart_type != ChartType::Contribution {
        let records = state.records(&chart.config.database_id).await?;
        let points = chart_data(
            &records,
            &chart.config.x_property,
            Some(chart.config.y_property.as_str()),
            chart.config.aggregation,
        );
        display.manual_order = display.merged_manual_order(&points);
        chart.advanced["manualOrder"] = json!(display.manual_order);
    }

    if chart.embed_url.trim().is_empty() {
        chart.embed_url = embed::embed_url_for(&state.config.public_url, &chart.config, &display)?.into();
    }

    let saved = state.with_store(|db| db.create(chart))?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_chart_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SavedChart>> {
    Ok(Json(state.saved_chart(&id)?))
}

async fn update_chart_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ChartUpdate>,
) -> ApiResult<Json<SavedChart>> {
    if let Some(config) = &update.config {
        validate_database_id(&config.database_id)?;
    }

    state
        .with_store(|db| db.update(&id, update))?
        .map(Json)
        .ok_or(ApiError::ChartNotFound(id))
}

async fn delete_chart_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.with_store(|db| db.delete(&id))? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::ChartNotFound(id))
    }
}

async fn saved_chart_data_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let chart = state.saved_chart(&id)?;
    let records = state.records(&chart.config.database_id).await?;

    if chart.config.chart_type == ChartType::Contribution {
        let request = ContributionRequest::from_saved(&chart)?;
        let options = state.calendar_options(&request);
        let response = ContributionResponse::build(&request, &records, &options);
        return Ok(Json(response).into_response());
    }

    let request = ChartRequest::from_saved(&chart)?;
    Ok(Json(ChartResponse::render(&request, &records)).into_response())
}

/// Database and title of an embed link; the remaining parameters depend
/// on the chart type
#[derive(Debug, Default, Deserialize)]
struct EmbedTarget {
    db: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbedResponse {
    Chart(ChartResponse),
    Contribution(ContributionResponse),
}

async fn embed_handler(
    State(state): State<AppState>,
    Path(chart_type): Path<String>,
    Query(target): Query<EmbedTarget>,
    Query(chart): Query<ChartQuery>,
    Query(calendar): Query<ContributionQuery>,
) -> ApiResult<Json<EmbedResponse>> {
    let chart_type = ChartType::parse(&chart_type).ok_or_else(|| ValidationError::Invalid {
        field: "chartType".to_string(),
        value: chart_type.clone(),
    })?;
    let database_id = target
        .db
        .filter(|db| !db.trim().is_empty())
        .ok_or_else(|| ValidationError::Missing("db".to_string()))?;

    if chart_type == ChartType::Contribution {
        let request = calendar.validate()?;
        let records = state.records(&database_id).await?;
        let options = state.calendar_options(&request);
        let response = ContributionResponse::build(&request, &records, &options);
        return Ok(Json(EmbedResponse::Contribution(response)));
    }

    let request = chart.validate()?;
    let records = state.records(&database_id).await?;
    let mut response = ChartResponse::render(&request, &records);
    response.title = response.title.or(target.title);
    Ok(Json(EmbedResponse::Chart(response)))
}
