//! Error types for the catalog store and the aggregation pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by [`Catalog`](crate::storage::Catalog) write operations.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// A record failed field validation.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Another active record already uses the same platform, title and year.
    #[error("an active record '{title}' ({year}) already exists on {platform}")]
    Duplicate {
        platform: String,
        title: String,
        year: i32,
    },

    /// No record with the given id exists.
    #[error("record '{0}' not found")]
    NotFound(Uuid),

    /// The record exists but has been soft-deleted.
    #[error("record '{0}' is inactive")]
    Inactive(Uuid),

    /// A batch write was rejected; `index` is the offending entry.
    #[error("batch entry {index}: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<CatalogError>,
    },
}

impl CatalogError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CatalogError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Errors raised while assembling an aggregation pipeline.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    /// Bucket boundaries were empty, non-finite or not strictly ascending.
    #[error("bucket boundaries must be finite and strictly ascending (got {0:?})")]
    InvalidBoundaries(Vec<f64>),

    /// A group key or facet named a dimension outside the friendly-name table.
    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    /// A composite key or facet list was empty or too long.
    #[error("{0}")]
    InvalidShape(String),
}
