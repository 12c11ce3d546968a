//! Global configuration constants for catalogdb.
//!
//! All validation limits, analytics defaults, and server defaults are defined here.
//! These are compile-time constants; runtime configuration is handled via CLI arguments
//! and environment variables in the server's `main.rs`.

/// Minimum accepted release year for a content record.
pub const MIN_YEAR: i32 = 1900;

/// Maximum accepted release year for a content record.
pub const MAX_YEAR: i32 = 2030;

/// Maximum length of a content title in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum number of records per batch insert request.
pub const MAX_BATCH_SIZE: usize = 1_000;

/// Default page size for paginated listings and grouped analytics.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Upper bound for a requested page size. Larger values are clamped.
pub const MAX_PAGE_LIMIT: usize = 1_000;

/// Default `durationHours` histogram boundaries.
///
/// Bucket `i` spans `[b[i], b[i+1])`; values at or above the last boundary land in
/// the overflow bucket labelled [`DURATION_OVERFLOW_LABEL`].
pub const DEFAULT_DURATION_BOUNDARIES: [f64; 8] = [0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 50.0];

/// Label of the overflow bucket for the default duration histogram.
pub const DURATION_OVERFLOW_LABEL: &str = "50+";

/// Window used by release trends when neither `startDate` nor `endDate` is given.
pub const TREND_DEFAULT_MONTHS: u32 = 12;

/// Records scoring below this data-quality score are reported as low quality.
pub const LOW_QUALITY_THRESHOLD: u32 = 60;

/// Maximum number of low-quality records sampled in a quality report.
pub const LOW_QUALITY_SAMPLE_SIZE: usize = 10;

/// Number of most recent releases listed in a freshness report.
pub const RECENT_RELEASES_SAMPLE_SIZE: usize = 10;

/// Default number of entries kept by the in-memory activity log.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 1_000;

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 4000;

/// Default directory for catalog snapshots.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default interval (in seconds) between automatic snapshots. 0 = disabled.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 300;

/// Default graceful shutdown budget in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum HTTP request body size in bytes (10 MB).
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Maximum number of concurrent in-flight requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 512;
