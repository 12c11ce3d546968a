//! # catalogdb-core
//!
//! Embeddable in-memory content catalog with a generic analytics engine:
//! query parameters become a filter predicate and a multi-stage aggregation
//! pipeline (filter, group, sort, paginate, bucket, facet, project) executed
//! against the catalog.
//!
//! This is the core library crate with zero async dependencies.

/// Bounded activity log of write and admin actions.
pub mod activity;
/// Dashboard reports, release freshness and data-quality scoring.
pub mod analytics;
/// Global configuration constants: limits and defaults.
pub mod config;
/// Core content types: `ContentRecord`, dubbing languages, enums, inputs.
pub mod content;
/// Error types for catalog writes and pipeline construction.
pub mod error;
/// Aggregation pipeline types, builder and executor.
pub mod pipeline;
/// Query parameters, field catalogue and filter predicates.
pub mod query;
/// Storage layer: catalog and snapshot persistence.
pub mod storage;

pub use error::{CatalogError, PipelineError};
