//! Request and response data transfer objects for the REST API.
//!
//! Record bodies reuse the core input types (`NewContent`, `ContentPatch`) so
//! that `totalDubbings` can never be supplied by a client.

use catalogdb_core::activity::ActivityEntry;
use catalogdb_core::content::{ContentRecord, NewContent};
use catalogdb_core::pipeline::Pagination;
use catalogdb_core::storage::{CatalogCounts, RecordPage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /api/content/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchInsertRequest {
    pub items: Vec<NewContent>,
}

/// Response body for batch insertion.
#[derive(Debug, Serialize)]
pub struct BatchInsertResponse {
    pub ids: Vec<Uuid>,
    pub inserted: usize,
}

/// Generic message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Page metadata shared by listings.
#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub pages: usize,
}

impl PageInfo {
    pub fn new(pagination: Pagination, total: usize) -> Self {
        Self {
            page: pagination.page,
            limit: pagination.limit,
            total,
            pages: pagination.pages(total),
        }
    }
}

/// Response body for `GET /api/content`.
#[derive(Debug, Serialize)]
pub struct ContentListResponse {
    pub data: Vec<ContentRecord>,
    pub pagination: PageInfo,
}

impl From<RecordPage> for ContentListResponse {
    fn from(page: RecordPage) -> Self {
        Self {
            pagination: PageInfo::new(page.pagination, page.total),
            data: page.items,
        }
    }
}

/// Query string for `GET /api/activity`.
#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
    pub actor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub entries: Vec<ActivityEntry>,
    pub count: usize,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_records: usize,
}

/// Response body for `POST /admin/snapshot`.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub path: String,
    pub bytes: usize,
    pub records: usize,
}

/// Response body for `GET /admin/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub records: CatalogCounts,
    pub snapshot_bytes: Option<u64>,
    pub activity_entries: usize,
    pub uptime_seconds: u64,
}
