//! Prometheus metrics recording and background collection.

use catalogdb_core::activity::ActivityLog;
use catalogdb_core::storage::Catalog;
use metrics::{counter, gauge, histogram};
use std::path::Path;
use std::time::Duration;

/// Records HTTP request metrics. `path` is the matched route template.
pub fn record_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];
    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Records a catalog write (`insert`, `batch_insert`, `update`, `delete`, `restore`).
pub fn record_write_operation(operation: &str, records: usize) {
    counter!(
        "catalogdb_operations_total",
        "operation" => operation.to_string()
    )
    .increment(records as u64);
}

/// Records one analytics report execution and its duration.
pub fn record_analytics_query(report: &str, duration: Duration) {
    counter!("catalogdb_analytics_queries_total", "report" => report.to_string()).increment(1);
    histogram!(
        "catalogdb_analytics_query_duration_seconds",
        "report" => report.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Updates catalog-level Prometheus gauges.
pub fn update_catalog_metrics(catalog: &Catalog, activity: &ActivityLog) {
    let counts = catalog.counts();
    gauge!("catalogdb_records_total").set(counts.total as f64);
    gauge!("catalogdb_records_active").set(counts.active as f64);
    gauge!("catalogdb_records_inactive").set(counts.inactive as f64);
    gauge!("catalogdb_activity_entries").set(activity.len() as f64);
}

/// Updates the `catalogdb_snapshot_size_bytes` gauge.
pub fn update_snapshot_metrics(snapshot: &Path) {
    if let Ok(meta) = std::fs::metadata(snapshot) {
        gauge!("catalogdb_snapshot_size_bytes").set(meta.len() as f64);
    }
}
