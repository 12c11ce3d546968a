//! The in-memory content catalog.
//!
//! A [`Catalog`] is a cheap-to-clone handle over [`CatalogData`] behind a
//! `parking_lot::RwLock`. Writes validate, enforce the natural-key uniqueness of
//! active records and recompute derived fields; reads run filters and
//! aggregation pipelines under a shared lock.

use crate::config;
use crate::content::{ContentPatch, ContentRecord, NewContent};
use crate::error::CatalogError;
use crate::pipeline::{Pagination, Pipeline, Row, SortOrder};
use crate::query::{Field, Predicate};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// `(platform, title, year)`: unique among active records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub platform: String,
    pub title: String,
    pub year: i32,
}

impl NaturalKey {
    pub fn of(record: &ContentRecord) -> Self {
        Self {
            platform: record.platform.clone(),
            title: record.title.clone(),
            year: record.year,
        }
    }

    fn duplicate(&self) -> CatalogError {
        CatalogError::Duplicate {
            platform: self.platform.clone(),
            title: self.title.clone(),
            year: self.year,
        }
    }
}

/// Catalog contents, protected by a `RwLock`.
///
/// `records` and `order` are persisted; the natural-key index is rebuilt on load.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogData {
    pub records: HashMap<Uuid, ContentRecord>,
    /// Ids in insertion order.
    pub order: Vec<Uuid>,
    #[serde(skip)]
    active_keys: HashMap<NaturalKey, Uuid>,
}

impl CatalogData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the natural-key index from `records`.
    pub fn rebuild_index(&mut self) {
        self.active_keys = self
            .records
            .values()
            .filter(|r| r.is_active)
            .map(|r| (NaturalKey::of(r), r.id))
            .collect();
    }

    /// Validate internal invariants after deserialization.
    ///
    /// Every record must be stored under its own id, pass field validation,
    /// carry a consistent `totalDubbings`, and no two active records may share
    /// a natural key.
    pub fn validate(&self) -> Result<(), String> {
        if self.order.len() != self.records.len() {
            return Err(format!(
                "order length {} != record count {}",
                self.order.len(),
                self.records.len()
            ));
        }
        if let Some(missing) = self.order.iter().find(|id| !self.records.contains_key(id)) {
            return Err(format!("order references unknown record {}", missing));
        }
        let mut seen: HashSet<NaturalKey> = HashSet::new();
        for (id, record) in &self.records {
            if *id != record.id {
                return Err(format!("record stored under {} has id {}", id, record.id));
            }
            record
                .validate()
                .map_err(|e| format!("record {}: {}", id, e))?;
            let dubbed = record.dubbing.values().filter(|&&d| d).count() as u32;
            if dubbed != record.total_dubbings {
                return Err(format!(
                    "record {}: totalDubbings {} != dubbed languages {}",
                    id, record.total_dubbings, dubbed
                ));
            }
            if record.is_active && !seen.insert(NaturalKey::of(record)) {
                return Err(format!(
                    "duplicate active record '{}' ({}) on {}",
                    record.title, record.year, record.platform
                ));
            }
        }
        Ok(())
    }

    fn ensure_unique(&self, record: &ContentRecord) -> Result<(), CatalogError> {
        let key = NaturalKey::of(record);
        match self.active_keys.get(&key) {
            Some(holder) if *holder != record.id => Err(key.duplicate()),
            _ => Ok(()),
        }
    }

    fn reindex(&mut self, before: Option<&ContentRecord>, after: &ContentRecord) {
        if let Some(before) = before.filter(|b| b.is_active) {
            let key = NaturalKey::of(before);
            if self.active_keys.get(&key) == Some(&before.id) {
                self.active_keys.remove(&key);
            }
        }
        if after.is_active {
            self.active_keys.insert(NaturalKey::of(after), after.id);
        }
    }

    fn active(&self, id: Uuid) -> Result<&ContentRecord, CatalogError> {
        match self.records.get(&id) {
            None => Err(CatalogError::NotFound(id)),
            Some(r) if !r.is_active => Err(CatalogError::Inactive(id)),
            Some(r) => Ok(r),
        }
    }

    /// Records in insertion order, for deterministic pipeline input.
    fn ordered(&self) -> Vec<&ContentRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .collect()
    }

    fn push(&mut self, record: ContentRecord) {
        self.reindex(None, &record);
        self.order.push(record.id);
        self.records.insert(record.id, record);
    }
}

/// Record counts for the admin endpoint and metrics gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

/// A page of records from [`Catalog::list`].
#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub items: Vec<ContentRecord>,
    pub total: usize,
    pub pagination: Pagination,
}

/// A thread-safe content catalog.
///
/// Cloning a `Catalog` produces a new handle to the same shared data.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub data: Arc<RwLock<CatalogData>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps loaded data, rebuilding the natural-key index.
    pub fn from_data(mut data: CatalogData) -> Self {
        data.rebuild_index();
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    pub fn insert(
        &self,
        input: NewContent,
        created_by: Option<String>,
    ) -> Result<ContentRecord, CatalogError> {
        let record = ContentRecord::new(input, created_by)?;
        let mut data = self.data.write();
        data.ensure_unique(&record)?;
        data.push(record.clone());
        Ok(record)
    }

    /// Inserts every entry or none. Conflicts are checked against the store
    /// and within the batch; the error names the first offending index.
    pub fn insert_batch(
        &self,
        inputs: Vec<NewContent>,
        created_by: Option<String>,
    ) -> Result<Vec<ContentRecord>, CatalogError> {
        if inputs.is_empty() || inputs.len() > config::MAX_BATCH_SIZE {
            return Err(CatalogError::validation(
                "items",
                format!("batch must contain 1-{} records", config::MAX_BATCH_SIZE),
            ));
        }
        let mut records = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let record = ContentRecord::new(input, created_by.clone()).map_err(|e| {
                CatalogError::Batch {
                    index,
                    source: Box::new(e),
                }
            })?;
            records.push(record);
        }

        let mut data = self.data.write();
        let mut batch_keys: HashSet<NaturalKey> = HashSet::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let batch_error = |e: CatalogError| CatalogError::Batch {
                index,
                source: Box::new(e),
            };
            data.ensure_unique(record).map_err(batch_error)?;
            let key = NaturalKey::of(record);
            if !batch_keys.insert(key.clone()) {
                return Err(batch_error(key.duplicate()));
            }
        }
        for record in &records {
            data.push(record.clone());
        }
        Ok(records)
    }

    /// An active record. Soft-deleted records report [`CatalogError::Inactive`].
    pub fn get(&self, id: Uuid) -> Result<ContentRecord, CatalogError> {
        self.data.read().active(id).cloned()
    }

    pub fn update(&self, id: Uuid, patch: ContentPatch) -> Result<ContentRecord, CatalogError> {
        let mut data = self.data.write();
        let before = data.active(id)?.clone();
        let mut after = before.clone();
        after.apply(patch)?;
        data.ensure_unique(&after)?;
        data.reindex(Some(&before), &after);
        data.records.insert(id, after.clone());
        Ok(after)
    }

    /// Marks an active record inactive. The record is kept.
    pub fn soft_delete(&self, id: Uuid) -> Result<ContentRecord, CatalogError> {
        let mut data = self.data.write();
        let before = data.active(id)?.clone();
        let mut after = before.clone();
        after.is_active = false;
        after.updated_at = Utc::now();
        data.reindex(Some(&before), &after);
        data.records.insert(id, after.clone());
        Ok(after)
    }

    /// Reactivates a soft-deleted record unless an active record now holds
    /// its natural key. Restoring an active record is a no-op.
    pub fn restore(&self, id: Uuid) -> Result<ContentRecord, CatalogError> {
        let mut data = self.data.write();
        let before = data
            .records
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))?;
        if before.is_active {
            return Ok(before);
        }
        let mut after = before.clone();
        after.is_active = true;
        after.updated_at = Utc::now();
        data.ensure_unique(&after)?;
        data.reindex(Some(&before), &after);
        data.records.insert(id, after.clone());
        Ok(after)
    }

    /// Active records matching `predicate`, in insertion order.
    pub fn select(&self, predicate: &Predicate) -> Vec<ContentRecord> {
        let data = self.data.read();
        data.ordered()
            .into_iter()
            .filter(|r| predicate.matches(r))
            .cloned()
            .collect()
    }

    pub fn aggregate(&self, pipeline: &Pipeline) -> Vec<Row> {
        let data = self.data.read();
        pipeline.execute(data.ordered())
    }

    /// One page of matching records sorted by `sort_by`, or newest first.
    /// Records with a null sort value come last in either direction.
    pub fn list(
        &self,
        predicate: &Predicate,
        sort_by: Option<Field>,
        order: SortOrder,
        pagination: Pagination,
    ) -> RecordPage {
        let data = self.data.read();
        let mut matched: Vec<&ContentRecord> = data
            .ordered()
            .into_iter()
            .filter(|r| predicate.matches(r))
            .collect();

        match sort_by {
            Some(field) => matched.sort_by(|a, b| {
                match (field.value(a), field.value(b)) {
                    (Some(x), Some(y)) => {
                        let ord = x.compare(&y).unwrap_or(Ordering::Equal);
                        match order {
                            SortOrder::Asc => ord,
                            SortOrder::Desc => ord.reverse(),
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }),
            None => matched.reverse(),
        }

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit)
            .cloned()
            .collect();
        RecordPage {
            items,
            total,
            pagination,
        }
    }

    pub fn counts(&self) -> CatalogCounts {
        let data = self.data.read();
        let active = data.records.values().filter(|r| r.is_active).count();
        CatalogCounts {
            total: data.records.len(),
            active,
            inactive: data.records.len() - active,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().records.is_empty()
    }
}
