//! Analytics handlers: dashboard reports, the generic grouped query and
//! the record-level freshness and quality reports.
//!
//! Every handler reads its query string into [`Params`], so all filter
//! parameters apply to every report.

use crate::api::errors::ApiError;
use crate::api::handlers::AppState;
use crate::api::metrics;
use axum::extract::{Query, State};
use axum::Json;
use catalogdb_core::analytics::{freshness, quality, reports, FreshnessReport, Matrix};
use catalogdb_core::analytics::{MatrixQuery, QualityReport};
use catalogdb_core::pipeline::query::QueryPage;
use catalogdb_core::pipeline::{AnalyticsQuery, Pipeline, Row};
use catalogdb_core::query::{FilterBuilder, Params};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Instant;

type ReportQuery = Query<HashMap<String, String>>;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Executes `pipeline` against the catalog and records the query metric.
fn run(state: &AppState, report: &str, pipeline: &Pipeline) -> Vec<Row> {
    let start = Instant::now();
    let rows = state.catalog.aggregate(pipeline);
    let elapsed = start.elapsed();
    metrics::record_analytics_query(report, elapsed);
    tracing::debug!(
        report,
        rows = rows.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Analytics query executed"
    );
    rows
}

fn data(rows: Vec<Row>) -> Json<Value> {
    Json(json!({ "data": rows }))
}

/// `GET /api/analytics/overview`
pub async fn overview(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    let rows = run(&state, "overview", &reports::overview(&params));
    Json(reports::summarize_overview(rows))
}

/// `GET /api/analytics/platforms`
pub async fn platforms(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    data(run(&state, "platforms", &reports::platforms(&params)))
}

/// `GET /api/analytics/genres`
pub async fn genres(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    data(run(&state, "genres", &reports::genres(&params)))
}

/// `GET /api/analytics/languages`
pub async fn languages(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    data(run(&state, "languages", &reports::languages(&params)))
}

/// `GET /api/analytics/formats`
pub async fn formats(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    data(run(&state, "formats", &reports::formats(&params)))
}

/// `GET /api/analytics/years`
pub async fn years(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    data(run(&state, "years", &reports::year_trends(&params)))
}

/// `GET /api/analytics/release-trends`
pub async fn release_trends(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    let today = today();
    let (start, end) = reports::release_window(&params, today);
    let rows = run(
        &state,
        "release_trends",
        &reports::release_trends(&params, today),
    );
    Json(json!({
        "window": { "startDate": start, "endDate": end },
        "data": rows,
    }))
}

/// `GET /api/analytics/dubbing`
pub async fn dubbing(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    let rows = run(&state, "dubbing", &reports::dubbing(&params));
    Json(reports::summarize_dubbing(rows))
}

/// `GET /api/analytics/duration`
pub async fn duration(
    State(state): State<AppState>,
    Query(q): ReportQuery,
) -> Result<Json<Value>, ApiError> {
    let params = Params::from(q);
    let pipeline = reports::duration(&params)?;
    let rows = run(&state, "duration", &pipeline);
    Ok(Json(reports::summarize_duration(rows)))
}

/// `GET /api/analytics/matrix?rows=genre&columns=platform&metric=count`
pub async fn matrix(
    State(state): State<AppState>,
    Query(q): ReportQuery,
) -> Result<Json<Matrix>, ApiError> {
    let params = Params::from(q);
    let query = MatrixQuery::from_params(&params)?;
    let rows = run(&state, "matrix", &query.pipeline(&params));
    Ok(Json(query.assemble(rows)))
}

/// `GET /api/analytics/facets?facets=type,genre,platform`
pub async fn facets(
    State(state): State<AppState>,
    Query(q): ReportQuery,
) -> Result<Json<Value>, ApiError> {
    let params = Params::from(q);
    let pipeline = reports::facets(&params)?;
    let row = run(&state, "facets", &pipeline)
        .into_iter()
        .next()
        .unwrap_or_default();
    Ok(Json(Value::Object(row)))
}

/// `GET /api/analytics/freshness`
pub async fn freshness_report(
    State(state): State<AppState>,
    Query(q): ReportQuery,
) -> Json<FreshnessReport> {
    let params = Params::from(q);
    let start = Instant::now();
    let records = state.catalog.select(&FilterBuilder::from_params(&params));
    let report = freshness::report(&records, today());
    metrics::record_analytics_query("freshness", start.elapsed());
    Json(report)
}

/// `GET /api/analytics/quality`
pub async fn quality_report(State(state): State<AppState>, Query(q): ReportQuery) -> Json<QualityReport> {
    let params = Params::from(q);
    let start = Instant::now();
    let records = state.catalog.select(&FilterBuilder::from_params(&params));
    let report = quality::report(&records);
    metrics::record_analytics_query("quality", start.elapsed());
    Json(report)
}

/// `GET /api/analytics/custom?groupBy=platform,year&metrics=count,avgDuration`
pub async fn custom(
    State(state): State<AppState>,
    Query(q): ReportQuery,
) -> Result<Json<QueryPage>, ApiError> {
    let params = Params::from(q);
    let query = AnalyticsQuery::from_params(&params)?;
    let rows = run(&state, "custom", &query.pipeline());
    Ok(Json(query.page(rows)))
}

/// `GET /api/analytics/filter-options`
pub async fn filter_options(State(state): State<AppState>, Query(q): ReportQuery) -> Json<Value> {
    let params = Params::from(q);
    let rows = run(&state, "filter_options", &reports::filter_options(&params));
    Json(reports::summarize_filter_options(rows))
}

/// `GET /api/analytics/explain`: the pipeline `custom` would run, without running it.
pub async fn explain(Query(q): ReportQuery) -> Result<Json<Value>, ApiError> {
    let params = Params::from(q);
    let query = AnalyticsQuery::from_params(&params)?;
    Ok(Json(query.pipeline().explain()))
}
