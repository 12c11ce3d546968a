//! HTTP request handlers for content CRUD, activity and admin operations,
//! plus the shared application state.

use crate::api::activity::ActivityContext;
use crate::api::errors::ApiError;
use crate::api::metrics;
use crate::api::models::*;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use catalogdb_core::activity::ActivityLog;
use catalogdb_core::content::{ContentPatch, ContentRecord, NewContent};
use catalogdb_core::pipeline::{Pagination, SortOrder};
use catalogdb_core::query::{Field, FilterBuilder, Params};
use catalogdb_core::storage::{save_catalog, snapshot_path, Catalog};
use catalogdb_core::CatalogError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub activity: ActivityLog,
    pub data_dir: PathBuf,
    pub prometheus_handle: PrometheusHandle,
    pub start_time: Instant,
}

/// Handlers accept the context as optional so they also work on a router
/// built without the activity middleware.
fn context(ctx: Option<Extension<ActivityContext>>) -> ActivityContext {
    ctx.map(|Extension(ctx)| ctx)
        .unwrap_or_else(ActivityContext::anonymous)
}

/// Logs the outcome of a catalog write to the activity log and passes the result through.
fn logged<T>(
    state: &AppState,
    ctx: &ActivityContext,
    action: &str,
    resource: &str,
    result: Result<T, CatalogError>,
) -> Result<T, ApiError> {
    match result {
        Ok(value) => {
            ctx.success(&state.activity, action, resource, "");
            Ok(value)
        }
        Err(e) => {
            ctx.failure(&state.activity, action, resource, &e.to_string());
            tracing::debug!(action, resource, error = %e, "Catalog write rejected");
            Err(e.into())
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        active_records: state.catalog.counts().active,
    })
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    metrics::update_catalog_metrics(&state.catalog, &state.activity);
    state.prometheus_handle.render()
}

/// `POST /api/content`
pub async fn create_content(
    State(state): State<AppState>,
    activity_ctx: Option<Extension<ActivityContext>>,
    Json(req): Json<NewContent>,
) -> Result<(StatusCode, Json<ContentRecord>), ApiError> {
    let ctx = context(activity_ctx);
    let title = req.title.clone();
    let record = logged(
        &state,
        &ctx,
        "content.create",
        &title,
        state.catalog.insert(req, ctx.created_by()),
    )?;
    metrics::record_write_operation("insert", 1);
    tracing::info!(id = %record.id, platform = %record.platform, "Content created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `POST /api/content/batch`
pub async fn batch_create_content(
    State(state): State<AppState>,
    activity_ctx: Option<Extension<ActivityContext>>,
    Json(req): Json<BatchInsertRequest>,
) -> Result<(StatusCode, Json<BatchInsertResponse>), ApiError> {
    let ctx = context(activity_ctx);
    let submitted = req.items.len();
    let records = logged(
        &state,
        &ctx,
        "content.batch_create",
        "batch",
        state.catalog.insert_batch(req.items, ctx.created_by()),
    )?;
    metrics::record_write_operation("batch_insert", records.len());
    tracing::info!(submitted, inserted = records.len(), "Batch inserted");
    Ok((
        StatusCode::CREATED,
        Json(BatchInsertResponse {
            inserted: records.len(),
            ids: records.into_iter().map(|r| r.id).collect(),
        }),
    ))
}

/// `GET /api/content`
///
/// Accepts every analytics filter plus `search`, `page`, `limit`, `sortBy`
/// and `sortOrder`. Without `sortBy` the newest records come first.
pub async fn list_content(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ContentListResponse>, ApiError> {
    let params = Params::from(query);
    let sort_by = match params.get("sortBy") {
        Some(name) => Some(
            Field::from_friendly(name)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown sort field '{}'", name)))?,
        ),
        None => None,
    };
    let page = state.catalog.list(
        &FilterBuilder::from_params(&params),
        sort_by,
        SortOrder::parse(params.get("sortOrder")),
        Pagination::from_params(&params),
    );
    Ok(Json(page.into()))
}

/// `GET /api/content/:id`
pub async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentRecord>, ApiError> {
    Ok(Json(state.catalog.get(id)?))
}

/// `PUT /api/content/:id`
pub async fn update_content(
    State(state): State<AppState>,
    activity_ctx: Option<Extension<ActivityContext>>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ContentPatch>,
) -> Result<Json<ContentRecord>, ApiError> {
    let ctx = context(activity_ctx);
    let record = logged(
        &state,
        &ctx,
        "content.update",
        &id.to_string(),
        state.catalog.update(id, patch),
    )?;
    metrics::record_write_operation("update", 1);
    tracing::info!(id = %id, "Content updated");
    Ok(Json(record))
}

/// `DELETE /api/content/:id` (soft delete)
pub async fn delete_content(
    State(state): State<AppState>,
    activity_ctx: Option<Extension<ActivityContext>>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let ctx = context(activity_ctx);
    logged(
        &state,
        &ctx,
        "content.delete",
        &id.to_string(),
        state.catalog.soft_delete(id),
    )?;
    metrics::record_write_operation("delete", 1);
    tracing::info!(id = %id, "Content deactivated");
    Ok(Json(MessageResponse {
        message: format!("Content '{}' deleted", id),
    }))
}

/// `POST /api/content/:id/restore`
pub async fn restore_content(
    State(state): State<AppState>,
    activity_ctx: Option<Extension<ActivityContext>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentRecord>, ApiError> {
    let ctx = context(activity_ctx);
    let record = logged(
        &state,
        &ctx,
        "content.restore",
        &id.to_string(),
        state.catalog.restore(id),
    )?;
    metrics::record_write_operation("restore", 1);
    tracing::info!(id = %id, "Content restored");
    Ok(Json(record))
}

/// `GET /api/activity?limit=&actor=`
pub async fn list_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Json<ActivityResponse> {
    let limit = query
        .limit
        .unwrap_or(catalogdb_core::config::DEFAULT_PAGE_LIMIT)
        .clamp(1, catalogdb_core::config::MAX_PAGE_LIMIT);
    let entries = state.activity.recent(limit, query.actor.as_deref());
    Json(ActivityResponse {
        count: entries.len(),
        entries,
    })
}

/// `POST /admin/snapshot`
pub async fn snapshot(
    State(state): State<AppState>,
    activity_ctx: Option<Extension<ActivityContext>>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let ctx = context(activity_ctx);
    let catalog = state.catalog.clone();
    let dir = state.data_dir.clone();
    let result = tokio::task::spawn_blocking(move || save_catalog(&catalog, &dir))
        .await
        .map_err(|e| {
            tracing::error!("Snapshot task failed: {}", e);
            ApiError::Internal("Snapshot failed".into())
        })?;

    match result {
        Ok(bytes) => {
            let path = snapshot_path(&state.data_dir);
            metrics::update_snapshot_metrics(&path);
            ctx.success(
                &state.activity,
                "admin.snapshot",
                "catalog",
                &format!("bytes={}", bytes),
            );
            Ok(Json(SnapshotResponse {
                path: path.display().to_string(),
                bytes,
                records: state.catalog.counts().total,
            }))
        }
        Err(e) => {
            tracing::error!("Failed to save catalog: {}", e);
            ctx.failure(&state.activity, "admin.snapshot", "catalog", &e.to_string());
            Err(ApiError::Internal("Snapshot failed".into()))
        }
    }
}

/// `GET /admin/stats`
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let snapshot_bytes = std::fs::metadata(snapshot_path(&state.data_dir))
        .map(|m| m.len())
        .ok();
    Json(StatsResponse {
        records: state.catalog.counts(),
        snapshot_bytes,
        activity_entries: state.activity.len(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
