//! Aggregation pipelines over the catalog.
//!
//! A [`Pipeline`] is a filter [`Predicate`] followed by an ordered list of
//! [`Stage`]s. The predicate is evaluated against typed records; every later
//! stage works on JSON rows produced by [`ContentRecord::to_row`], so group
//! keys, sort keys and projections address values by document path
//! (`durationHours`, `dubbing.hindi`, `_id.platform`).
//!
//! Pipelines are assembled with [`PipelineBuilder`] and run by the executor in
//! [`exec`]. Construction is where validation happens; execution never fails.

pub mod exec;
pub mod query;

use crate::config;
use crate::content::ContentRecord;
use crate::error::PipelineError;
use crate::query::{Field, Params, Predicate};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub use query::{AnalyticsQuery, Metric};

/// A document row flowing between stages.
pub type Row = Map<String, Value>;

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "stage", content = "spec")]
pub enum Stage {
    /// Drops rows whose value at the path is null, missing or blank.
    RequirePresent(String),
    Group(GroupSpec),
    Sort(SortSpec),
    Skip(usize),
    Limit(usize),
    Bucket(BucketSpec),
    Facet(FacetSpec),
    /// Output rows with only the listed `(output name, source path)` pairs.
    Project(Vec<(String, String)>),
}

/// How rows are keyed into groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupKey {
    /// A single group over every row (`_id: null`).
    Global,
    Single(String),
    /// Object key `{name: value, ...}`.
    Composite(Vec<(String, String)>),
}

impl GroupKey {
    pub fn field(field: Field) -> Self {
        GroupKey::Single(field.path().to_string())
    }

    pub fn fields(named: &[(&str, Field)]) -> Self {
        GroupKey::Composite(
            named
                .iter()
                .map(|(name, field)| (name.to_string(), field.path().to_string()))
                .collect(),
        )
    }
}

/// Per-group reduction. Operands are document paths.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "op", content = "path")]
pub enum Accumulator {
    Count,
    Sum(String),
    /// Mean of numeric values, rounded to two decimals. Nulls are skipped.
    Avg(String),
    Min(String),
    Max(String),
    /// Number of distinct non-null, non-blank values.
    DistinctCount(String),
    /// Sorted distinct non-null, non-blank values.
    DistinctValues(String),
    /// Number of rows whose value is `true`.
    CountTrue(String),
}

impl Accumulator {
    pub fn sum(field: Field) -> Self {
        Accumulator::Sum(field.path().to_string())
    }

    pub fn avg(field: Field) -> Self {
        Accumulator::Avg(field.path().to_string())
    }

    pub fn min(field: Field) -> Self {
        Accumulator::Min(field.path().to_string())
    }

    pub fn max(field: Field) -> Self {
        Accumulator::Max(field.path().to_string())
    }

    pub fn distinct(field: Field) -> Self {
        Accumulator::DistinctCount(field.path().to_string())
    }

    pub fn values(field: Field) -> Self {
        Accumulator::DistinctValues(field.path().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSpec {
    pub key: GroupKey,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl GroupSpec {
    /// Group with a `count` accumulator.
    pub fn new(key: GroupKey) -> Self {
        Self {
            key,
            accumulators: vec![("count".to_string(), Accumulator::Count)],
        }
    }

    pub fn with(mut self, name: &str, accumulator: Accumulator) -> Self {
        self.accumulators.push((name.to_string(), accumulator));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `asc`/`ascending`/`1` ascend; anything else descends.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("asc" | "ascending" | "1") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

/// Sort keys applied in order. Sorting is stable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortSpec(pub Vec<(String, SortOrder)>);

impl SortSpec {
    pub fn by(path: &str, order: SortOrder) -> Self {
        Self(vec![(path.to_string(), order)])
    }

    pub fn then(mut self, path: &str, order: SortOrder) -> Self {
        self.0.push((path.to_string(), order));
        self
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::by("count", SortOrder::Desc)
    }
}

/// One-based page and page size, clamped into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).max(1) as usize;
        let limit = limit
            .unwrap_or(config::DEFAULT_PAGE_LIMIT as i64)
            .clamp(1, config::MAX_PAGE_LIMIT as i64) as usize;
        Self { page, limit }
    }

    pub fn from_params(params: &Params) -> Self {
        Self::new(params.int("page"), params.int("limit"))
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Number of pages needed for `total` items (at least one).
    pub fn pages(&self, total: usize) -> usize {
        total.div_ceil(self.limit).max(1)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Histogram over a numeric path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSpec {
    pub path: String,
    pub boundaries: Vec<f64>,
    /// Label of the bucket for values at or above the last boundary. Without
    /// one those values are dropped.
    pub overflow: Option<String>,
    pub accumulators: Vec<(String, Accumulator)>,
}

impl BucketSpec {
    /// Validates that boundaries are non-empty, finite and strictly ascending.
    pub fn new(
        field: Field,
        boundaries: Vec<f64>,
        overflow: Option<&str>,
    ) -> Result<Self, PipelineError> {
        let ascending = boundaries.windows(2).all(|w| w[0] < w[1]);
        if boundaries.is_empty() || !ascending || boundaries.iter().any(|b| !b.is_finite()) {
            return Err(PipelineError::InvalidBoundaries(boundaries));
        }
        Ok(Self {
            path: field.path().to_string(),
            boundaries,
            overflow: overflow.map(str::to_string),
            accumulators: vec![("count".to_string(), Accumulator::Count)],
        })
    }

    pub fn with(mut self, name: &str, accumulator: Accumulator) -> Self {
        self.accumulators.push((name.to_string(), accumulator));
        self
    }

    /// `lo-hi` for each declared range, then the overflow label.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .boundaries
            .windows(2)
            .map(|w| format!("{}-{}", exec::format_bound(w[0]), exec::format_bound(w[1])))
            .collect();
        if let Some(ref overflow) = self.overflow {
            labels.push(overflow.clone());
        }
        labels
    }
}

/// Named sub-pipelines run independently over the same input rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FacetSpec(pub Vec<(String, Vec<Stage>)>);

impl FacetSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, stages: Vec<Stage>) -> Self {
        self.0.push((name.to_string(), stages));
        self
    }
}

/// A filter followed by aggregation stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub predicate: Predicate,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Filters `records`, converts survivors to rows and runs every stage.
    pub fn execute<'a, I>(&self, records: I) -> Vec<Row>
    where
        I: IntoIterator<Item = &'a ContentRecord>,
    {
        let rows: Vec<Row> = records
            .into_iter()
            .filter(|record| self.predicate.matches(record))
            .map(ContentRecord::to_row)
            .collect();
        exec::run(&self.stages, rows)
    }

    /// The match document and the stage list, for diagnostics.
    pub fn explain(&self) -> Value {
        let stages = serde_json::to_value(&self.stages).unwrap_or(Value::Null);
        json!({
            "match": self.predicate.to_document(),
            "stages": stages,
        })
    }
}

/// Chainable pipeline constructor.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    predicate: Predicate,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            stages: Vec::new(),
        }
    }

    pub fn require_present(mut self, field: Field) -> Self {
        let stage = Stage::RequirePresent(field.path().to_string());
        if !self.stages.contains(&stage) {
            self.stages.push(stage);
        }
        self
    }

    pub fn group(mut self, spec: GroupSpec) -> Self {
        self.stages.push(Stage::Group(spec));
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.stages.push(Stage::Sort(spec));
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        if pagination.offset() > 0 {
            self.stages.push(Stage::Skip(pagination.offset()));
        }
        self.stages.push(Stage::Limit(pagination.limit));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.stages.push(Stage::Limit(limit));
        self
    }

    pub fn bucket(mut self, spec: BucketSpec) -> Self {
        self.stages.push(Stage::Bucket(spec));
        self
    }

    pub fn facet(mut self, spec: FacetSpec) -> Self {
        self.stages.push(Stage::Facet(spec));
        self
    }

    pub fn project(mut self, fields: &[(&str, &str)]) -> Self {
        self.stages.push(Stage::Project(
            fields
                .iter()
                .map(|(out, path)| (out.to_string(), path.to_string()))
                .collect(),
        ));
        self
    }

    /// The stages added so far, for use as a facet sub-pipeline.
    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            predicate: self.predicate,
            stages: self.stages,
        }
    }
}

/// Stages for a facet branch; the predicate of a sub-pipeline is unused.
pub fn stages() -> PipelineBuilder {
    PipelineBuilder::new(Predicate::all())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps_out_of_range_values() {
        assert_eq!(Pagination::new(Some(0), Some(0)), Pagination { page: 1, limit: 1 });
        assert_eq!(
            Pagination::new(Some(-5), Some(5000)),
            Pagination { page: 1, limit: 1000 }
        );
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, limit: 20 });
        assert_eq!(Pagination::new(Some(3), Some(10)).offset(), 20);
        assert_eq!(Pagination::new(Some(1), Some(10)).pages(0), 1);
        assert_eq!(Pagination::new(Some(1), Some(10)).pages(21), 3);
    }

    #[test]
    fn test_bucket_boundaries_must_ascend() {
        assert!(BucketSpec::new(Field::DurationHours, vec![], None).is_err());
        assert!(BucketSpec::new(Field::DurationHours, vec![1.0, 1.0], None).is_err());
        assert!(BucketSpec::new(Field::DurationHours, vec![2.0, 1.0], None).is_err());
        assert!(BucketSpec::new(Field::DurationHours, vec![0.0, f64::NAN], None).is_err());
        assert!(BucketSpec::new(Field::DurationHours, vec![5.0], Some("5+")).is_ok());
    }

    #[test]
    fn test_bucket_labels() {
        let spec = BucketSpec::new(
            Field::DurationHours,
            config::DEFAULT_DURATION_BOUNDARIES.to_vec(),
            Some(config::DURATION_OVERFLOW_LABEL),
        )
        .unwrap();
        assert_eq!(
            spec.labels(),
            vec!["0-1", "1-2", "2-3", "3-5", "5-10", "10-20", "20-50", "50+"]
        );
        let halves = BucketSpec::new(Field::DurationHours, vec![0.5, 1.5], None).unwrap();
        assert_eq!(halves.labels(), vec!["0.5-1.5"]);
    }

    #[test]
    fn test_require_present_is_not_duplicated() {
        let pipeline = PipelineBuilder::new(Predicate::all())
            .require_present(Field::DurationHours)
            .require_present(Field::DurationHours)
            .build();
        assert_eq!(pipeline.stages.len(), 1);
    }

    #[test]
    fn test_paginate_first_page_has_no_skip() {
        let pipeline = stages()
            .paginate(Pagination::new(Some(1), Some(5)))
            .into_stages();
        assert_eq!(pipeline, vec![Stage::Limit(5)]);
        let pipeline = stages()
            .paginate(Pagination::new(Some(2), Some(5)))
            .into_stages();
        assert_eq!(pipeline, vec![Stage::Skip(5), Stage::Limit(5)]);
    }

    #[test]
    fn test_explain_lists_stages() {
        let pipeline = PipelineBuilder::new(Predicate::all())
            .group(GroupSpec::new(GroupKey::field(Field::Platform)))
            .sort(SortSpec::default())
            .build();
        let explained = pipeline.explain();
        assert_eq!(explained["match"]["isActive"], true);
        assert_eq!(explained["stages"][0]["stage"], "group");
        assert_eq!(explained["stages"][1]["spec"][0][0], "count");
    }
}
