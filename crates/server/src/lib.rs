//! catalogdb-server: HTTP server for catalogdb.
//!
//! Provides the REST API over the content catalog and its analytics engine.
//! Core catalog and pipeline logic lives in `catalogdb-core`.

/// REST API layer: Axum router, HTTP handlers, models, activity context, metrics.
pub mod api;
