//! Dashboard analytics: report pipelines plus record-level derived metrics
//! (release freshness and data-quality scoring).

pub mod freshness;
pub mod quality;
pub mod reports;

pub use freshness::{Freshness, FreshnessReport};
pub use quality::{QualityReport, QualityScore};
pub use reports::{Matrix, MatrixQuery};
