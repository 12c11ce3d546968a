//! REST API layer built on Axum.
//!
//! Provides HTTP handlers for content CRUD, the analytics reports, the
//! activity log and admin operations. Includes middleware for request
//! timeouts, body size limits, metrics collection, request ID tracing and
//! actor context for the activity log.

/// Actor context extracted from request headers.
pub mod activity;
/// Analytics report handlers.
pub mod analytics;
/// API error types mapped to HTTP status codes.
pub mod errors;
/// Content, activity and admin handlers and application state.
pub mod handlers;
/// Prometheus metrics recording and background collection.
pub mod metrics;
/// Request and response data transfer objects.
pub mod models;

use activity::ActivityContext;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{DefaultBodyLimit, MatchedPath};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Router};
use catalogdb_core::config;
use handlers::AppState;
use std::time::{Duration, Instant};
use tower::buffer::BufferLayer;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

async fn activity_context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let ctx = ActivityContext::from_request(&req);
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

async fn request_id_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %request_id);
    async move {
        let mut response = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static("x-request-id"), value);
        }
        response
    }
    .instrument(span)
    .await
}

async fn security_headers_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    response
}

async fn metrics_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = req.method().to_string();
    // Route template keeps record ids out of the label set.
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::record_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(analytics::overview))
        .route("/platforms", get(analytics::platforms))
        .route("/genres", get(analytics::genres))
        .route("/languages", get(analytics::languages))
        .route("/formats", get(analytics::formats))
        .route("/years", get(analytics::years))
        .route("/release-trends", get(analytics::release_trends))
        .route("/dubbing", get(analytics::dubbing))
        .route("/duration", get(analytics::duration))
        .route("/matrix", get(analytics::matrix))
        .route("/facets", get(analytics::facets))
        .route("/freshness", get(analytics::freshness_report))
        .route("/quality", get(analytics::quality_report))
        .route("/custom", get(analytics::custom))
        .route("/filter-options", get(analytics::filter_options))
        .route("/explain", get(analytics::explain))
}

/// Builds the Axum router with all routes and middleware layers.
///
/// The middleware stack (outermost to innermost):
/// Concurrency limit → Timeout → Body limit → CORS → Trace → Compression →
/// Security headers → Request ID → Activity context → Metrics.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/content",
            get(handlers::list_content).post(handlers::create_content),
        )
        .route("/content/batch", post(handlers::batch_create_content))
        .route(
            "/content/:id",
            get(handlers::get_content)
                .put(handlers::update_content)
                .delete(handlers::delete_content),
        )
        .route("/content/:id/restore", post(handlers::restore_content))
        .route("/activity", get(handlers::list_activity))
        .nest("/analytics", analytics_routes());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/admin/snapshot", post(handlers::snapshot))
        .route("/admin/stats", get(handlers::stats))
        .nest("/api", api)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(activity_context_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config::MAX_REQUEST_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: tower::BoxError| async move {
                    if err.is::<tower::timeout::error::Elapsed>() {
                        StatusCode::REQUEST_TIMEOUT
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }))
                .layer(BufferLayer::new(1024))
                .layer(ConcurrencyLimitLayer::new(config::MAX_CONCURRENT_REQUESTS))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config::REQUEST_TIMEOUT_SECS,
                ))),
        )
        .with_state(state)
}
