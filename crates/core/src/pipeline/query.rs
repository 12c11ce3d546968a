//! Generic analytics queries assembled from request parameters.

use super::{
    stages, Accumulator, FacetSpec, GroupKey, GroupSpec, Pagination, Pipeline, PipelineBuilder,
    Row, SortOrder, SortSpec,
};
use crate::error::PipelineError;
use crate::query::{Field, FilterBuilder, Params, Predicate};
use serde::Serialize;
use serde_json::Value;

/// Maximum number of `groupBy` dimensions.
pub const MAX_GROUP_DIMENSIONS: usize = 2;

/// A named per-group metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Count,
    AvgDuration,
    TotalDuration,
    MinDuration,
    MaxDuration,
    AvgDubbings,
    TotalDubbings,
    MinYear,
    MaxYear,
    DistinctPlatforms,
    DistinctGenres,
    DistinctFormats,
    DistinctLanguages,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Count,
        Metric::AvgDuration,
        Metric::TotalDuration,
        Metric::MinDuration,
        Metric::MaxDuration,
        Metric::AvgDubbings,
        Metric::TotalDubbings,
        Metric::MinYear,
        Metric::MaxYear,
        Metric::DistinctPlatforms,
        Metric::DistinctGenres,
        Metric::DistinctFormats,
        Metric::DistinctLanguages,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Count => "count",
            Metric::AvgDuration => "avgDuration",
            Metric::TotalDuration => "totalDuration",
            Metric::MinDuration => "minDuration",
            Metric::MaxDuration => "maxDuration",
            Metric::AvgDubbings => "avgDubbings",
            Metric::TotalDubbings => "totalDubbings",
            Metric::MinYear => "minYear",
            Metric::MaxYear => "maxYear",
            Metric::DistinctPlatforms => "distinctPlatforms",
            Metric::DistinctGenres => "distinctGenres",
            Metric::DistinctFormats => "distinctFormats",
            Metric::DistinctLanguages => "distinctLanguages",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn accumulator(self) -> Accumulator {
        match self {
            Metric::Count => Accumulator::Count,
            Metric::AvgDuration => Accumulator::avg(Field::DurationHours),
            Metric::TotalDuration => Accumulator::sum(Field::DurationHours),
            Metric::MinDuration => Accumulator::min(Field::DurationHours),
            Metric::MaxDuration => Accumulator::max(Field::DurationHours),
            Metric::AvgDubbings => Accumulator::avg(Field::TotalDubbings),
            Metric::TotalDubbings => Accumulator::sum(Field::TotalDubbings),
            Metric::MinYear => Accumulator::min(Field::Year),
            Metric::MaxYear => Accumulator::max(Field::Year),
            Metric::DistinctPlatforms => Accumulator::distinct(Field::Platform),
            Metric::DistinctGenres => Accumulator::distinct(Field::AssignedGenre),
            Metric::DistinctFormats => Accumulator::distinct(Field::AssignedFormat),
            Metric::DistinctLanguages => Accumulator::distinct(Field::PrimaryLanguage),
        }
    }

    /// Field that must be non-null for the metric to be meaningful. Rows
    /// lacking it are removed before grouping.
    pub fn requires(self) -> Option<Field> {
        match self {
            Metric::AvgDuration
            | Metric::TotalDuration
            | Metric::MinDuration
            | Metric::MaxDuration => Some(Field::DurationHours),
            _ => None,
        }
    }
}

impl PipelineBuilder {
    /// Groups by `key` computing `metrics`, preceded by a presence filter for
    /// every field a metric requires.
    pub fn group_metrics(mut self, key: GroupKey, metrics: &[Metric]) -> Self {
        for field in metrics.iter().filter_map(|m| m.requires()) {
            self = self.require_present(field);
        }
        self.group(GroupSpec {
            key,
            accumulators: metrics
                .iter()
                .map(|m| (m.name().to_string(), m.accumulator()))
                .collect(),
        })
    }
}

/// `groupBy`/`metrics`/`sortBy`/`sortOrder`/`page`/`limit` plus every filter.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsQuery {
    pub predicate: Predicate,
    /// Friendly dimension names paired with their fields. Empty means one
    /// global group.
    pub dimensions: Vec<(String, Field)>,
    pub metrics: Vec<Metric>,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

/// One page of grouped results.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub data: Vec<Row>,
    pub total: usize,
    pub pagination: Pagination,
}

impl AnalyticsQuery {
    pub fn from_params(params: &Params) -> Result<Self, PipelineError> {
        let names = params.list("groupBy");
        if names.len() > MAX_GROUP_DIMENSIONS {
            return Err(PipelineError::InvalidShape(format!(
                "groupBy accepts at most {} dimensions",
                MAX_GROUP_DIMENSIONS
            )));
        }
        let mut dimensions = Vec::with_capacity(names.len());
        for name in names {
            let field = Field::from_friendly(&name)
                .ok_or_else(|| PipelineError::UnknownDimension(name.clone()))?;
            if dimensions.iter().any(|(n, _)| *n == name) {
                continue;
            }
            dimensions.push((name, field));
        }

        let mut metrics: Vec<Metric> = Vec::new();
        for name in params.list("metrics") {
            match Metric::parse(&name) {
                Some(metric) if !metrics.contains(&metric) => metrics.push(metric),
                Some(_) => {}
                None => tracing::debug!(metric = %name, "Ignoring unknown metric"),
            }
        }
        if metrics.is_empty() {
            metrics.push(Metric::Count);
        }

        Ok(Self {
            predicate: FilterBuilder::from_params(params),
            dimensions,
            metrics,
            sort_by: params.get("sortBy").unwrap_or("count").to_string(),
            sort_order: SortOrder::parse(params.get("sortOrder")),
            pagination: Pagination::from_params(params),
        })
    }

    fn key(&self) -> GroupKey {
        match self.dimensions.as_slice() {
            [] => GroupKey::Global,
            [(_, field)] => GroupKey::field(*field),
            many => GroupKey::Composite(
                many.iter()
                    .map(|(name, field)| (name.clone(), field.path().to_string()))
                    .collect(),
            ),
        }
    }

    /// Path of a dimension inside the group key, for sorting before projection.
    fn key_path(&self, name: &str) -> Option<String> {
        match self.dimensions.as_slice() {
            [(only, _)] if only == name => Some("_id".to_string()),
            many if many.len() > 1 && many.iter().any(|(n, _)| n == name) => {
                Some(format!("_id.{}", name))
            }
            _ => None,
        }
    }

    fn projection(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = match self.dimensions.as_slice() {
            [] => Vec::new(),
            [(name, _)] => vec![(name.clone(), "_id".to_string())],
            many => many
                .iter()
                .map(|(name, _)| (name.clone(), format!("_id.{}", name)))
                .collect(),
        };
        fields.extend(
            self.metrics
                .iter()
                .map(|m| (m.name().to_string(), m.name().to_string())),
        );
        fields
    }

    /// Filter, group, then a facet with the requested page and the group total.
    pub fn pipeline(&self) -> Pipeline {
        let sort_path = self
            .key_path(&self.sort_by)
            .unwrap_or_else(|| self.sort_by.clone());
        let projection = self.projection();
        let projection: Vec<(&str, &str)> = projection
            .iter()
            .map(|(out, path)| (out.as_str(), path.as_str()))
            .collect();

        let page = stages()
            .sort(SortSpec::by(&sort_path, self.sort_order))
            .paginate(self.pagination)
            .project(&projection)
            .into_stages();
        let total = stages()
            .group(GroupSpec::new(GroupKey::Global))
            .into_stages();

        PipelineBuilder::new(self.predicate.clone())
            .group_metrics(self.key(), &self.metrics)
            .facet(FacetSpec::new().with("data", page).with("total", total))
            .build()
    }

    /// Unpacks the facet row produced by [`AnalyticsQuery::pipeline`].
    pub fn page(&self, mut rows: Vec<Row>) -> QueryPage {
        let mut row = rows.pop().unwrap_or_default();
        let data = match row.remove("data") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let total = row
            .get("total")
            .and_then(|t| t.get(0))
            .and_then(|t| t.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        QueryPage {
            data,
            total,
            pagination: self.pagination,
        }
    }
}
