//! Dashboard report pipelines.
//!
//! Each report starts from [`FilterBuilder::from_params`], so every filter
//! parameter applies to every report. Builders return a [`Pipeline`]; the
//! `summarize_*` helpers reshape facet output into response objects.

use crate::config;
use crate::content::DubbingLanguage;
use crate::error::PipelineError;
use crate::pipeline::exec::{format_bound, lookup};
use crate::pipeline::{
    stages, Accumulator, BucketSpec, FacetSpec, GroupKey, GroupSpec, Metric, Pipeline,
    PipelineBuilder, Row, SortOrder, SortSpec,
};
use crate::query::{Field, FilterBuilder, Params};
use chrono::{Months, NaiveDate};
use serde::Serialize;
use serde_json::{json, Value};

fn builder(params: &Params) -> PipelineBuilder {
    PipelineBuilder::new(FilterBuilder::from_params(params))
}

/// Optional `limit` on grouped reports.
fn apply_limit(builder: PipelineBuilder, params: &Params) -> PipelineBuilder {
    match params.usize("limit") {
        Some(limit) => builder.limit(limit.clamp(1, config::MAX_PAGE_LIMIT)),
        None => builder,
    }
}

/// The first row of a facet result as a JSON object.
fn facet_row(rows: Vec<Row>) -> Row {
    rows.into_iter().next().unwrap_or_default()
}

/// First row of a named facet branch.
fn first(row: &Row, facet: &str) -> Row {
    match row.get(facet).and_then(|v| v.get(0)) {
        Some(Value::Object(map)) => map.clone(),
        _ => Row::new(),
    }
}

fn read(row: &Row, path: &str) -> Value {
    lookup(row, path).cloned().unwrap_or(Value::Null)
}

pub fn overview(params: &Params) -> Pipeline {
    let totals = stages()
        .group(
            GroupSpec::new(GroupKey::Global)
                .with("platforms", Accumulator::distinct(Field::Platform))
                .with("genres", Accumulator::distinct(Field::AssignedGenre))
                .with("formats", Accumulator::distinct(Field::AssignedFormat))
                .with("languages", Accumulator::distinct(Field::PrimaryLanguage))
                .with("minYear", Accumulator::min(Field::Year))
                .with("maxYear", Accumulator::max(Field::Year))
                .with("dubbed", Accumulator::CountTrue("hasDubbing".into()))
                .with("avgDubbings", Accumulator::avg(Field::TotalDubbings))
                .with("totalDubbings", Accumulator::sum(Field::TotalDubbings)),
        )
        .into_stages();
    let duration = stages()
        .group_metrics(
            GroupKey::Global,
            &[
                Metric::Count,
                Metric::AvgDuration,
                Metric::TotalDuration,
                Metric::MinDuration,
                Metric::MaxDuration,
            ],
        )
        .into_stages();

    builder(params)
        .facet(
            FacetSpec::new()
                .with("totals", totals)
                .with("duration", duration),
        )
        .build()
}

pub fn summarize_overview(rows: Vec<Row>) -> Value {
    let row = facet_row(rows);
    let totals = first(&row, "totals");
    let duration = first(&row, "duration");
    let count = |r: &Row, path: &str| r.get(path).and_then(Value::as_u64).unwrap_or(0);
    json!({
        "totalContent": count(&totals, "count"),
        "platforms": count(&totals, "platforms"),
        "genres": count(&totals, "genres"),
        "formats": count(&totals, "formats"),
        "languages": count(&totals, "languages"),
        "yearRange": { "min": read(&totals, "minYear"), "max": read(&totals, "maxYear") },
        "dubbing": {
            "dubbedTitles": count(&totals, "dubbed"),
            "avgDubbings": read(&totals, "avgDubbings"),
            "totalDubbings": count(&totals, "totalDubbings"),
        },
        "duration": {
            "withDuration": count(&duration, "count"),
            "avgHours": read(&duration, "avgDuration"),
            "totalHours": read(&duration, "totalDuration"),
            "minHours": read(&duration, "minDuration"),
            "maxHours": read(&duration, "maxDuration"),
        },
    })
}

pub fn platforms(params: &Params) -> Pipeline {
    let b = builder(params)
        .group(
            GroupSpec::new(GroupKey::field(Field::Platform))
                .with("avgDuration", Accumulator::avg(Field::DurationHours))
                .with("totalDuration", Accumulator::sum(Field::DurationHours))
                .with("avgDubbings", Accumulator::avg(Field::TotalDubbings))
                .with("genres", Accumulator::distinct(Field::AssignedGenre))
                .with("formats", Accumulator::distinct(Field::AssignedFormat)),
        )
        .sort(SortSpec::default().then("_id", SortOrder::Asc));
    apply_limit(b, params)
        .project(&[
            ("platform", "_id"),
            ("count", "count"),
            ("avgDuration", "avgDuration"),
            ("totalDuration", "totalDuration"),
            ("avgDubbings", "avgDubbings"),
            ("genres", "genres"),
            ("formats", "formats"),
        ])
        .build()
}

/// Genre distribution. Records without an assigned genre are excluded.
pub fn genres(params: &Params) -> Pipeline {
    let predicate = FilterBuilder::extend(FilterBuilder::from_params(params))
        .non_empty(Field::AssignedGenre)
        .build();
    let b = PipelineBuilder::new(predicate)
        .group(
            GroupSpec::new(GroupKey::field(Field::AssignedGenre))
                .with("avgDuration", Accumulator::avg(Field::DurationHours))
                .with("platforms", Accumulator::distinct(Field::Platform)),
        )
        .sort(SortSpec::default());
    apply_limit(b, params)
        .project(&[
            ("genre", "_id"),
            ("count", "count"),
            ("avgDuration", "avgDuration"),
            ("platforms", "platforms"),
        ])
        .build()
}

pub fn languages(params: &Params) -> Pipeline {
    let b = builder(params)
        .group(
            GroupSpec::new(GroupKey::field(Field::PrimaryLanguage))
                .with("avgDubbings", Accumulator::avg(Field::TotalDubbings))
                .with("platforms", Accumulator::distinct(Field::Platform)),
        )
        .sort(SortSpec::default());
    apply_limit(b, params)
        .project(&[
            ("language", "_id"),
            ("count", "count"),
            ("avgDubbings", "avgDubbings"),
            ("platforms", "platforms"),
        ])
        .build()
}

pub fn formats(params: &Params) -> Pipeline {
    let predicate = FilterBuilder::extend(FilterBuilder::from_params(params))
        .non_empty(Field::AssignedFormat)
        .build();
    let b = PipelineBuilder::new(predicate)
        .group(
            GroupSpec::new(GroupKey::field(Field::AssignedFormat))
                .with("avgDuration", Accumulator::avg(Field::DurationHours))
                .with("avgSeasons", Accumulator::avg(Field::Seasons))
                .with("avgEpisodes", Accumulator::avg(Field::Episodes)),
        )
        .sort(SortSpec::default());
    apply_limit(b, params)
        .project(&[
            ("format", "_id"),
            ("count", "count"),
            ("avgDuration", "avgDuration"),
            ("avgSeasons", "avgSeasons"),
            ("avgEpisodes", "avgEpisodes"),
        ])
        .build()
}

pub fn year_trends(params: &Params) -> Pipeline {
    builder(params)
        .group(
            GroupSpec::new(GroupKey::field(Field::Year))
                .with("avgDuration", Accumulator::avg(Field::DurationHours))
                .with("avgDubbings", Accumulator::avg(Field::TotalDubbings))
                .with("platforms", Accumulator::distinct(Field::Platform)),
        )
        .sort(SortSpec::by("_id", SortOrder::Asc))
        .project(&[
            ("year", "_id"),
            ("count", "count"),
            ("avgDuration", "avgDuration"),
            ("avgDubbings", "avgDubbings"),
            ("platforms", "platforms"),
        ])
        .build()
}

/// Inclusive window used by release trends: explicit `startDate`/`endDate`,
/// defaulting to the twelve months ending `today`.
pub fn release_window(params: &Params, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = params.date("endDate").unwrap_or(today);
    let start = params.date("startDate").unwrap_or_else(|| {
        end.checked_sub_months(Months::new(config::TREND_DEFAULT_MONTHS))
            .unwrap_or(end)
    });
    (start, end)
}

/// Monthly release counts inside [`release_window`], ascending by month.
pub fn release_trends(params: &Params, today: NaiveDate) -> Pipeline {
    let (start, end) = release_window(params, today);
    let predicate = FilterBuilder::extend(FilterBuilder::from_params(params))
        .date_range(Some(start), Some(end))
        .build();
    PipelineBuilder::new(predicate)
        .group(
            GroupSpec::new(GroupKey::field(Field::ReleaseMonth))
                .with("platforms", Accumulator::values(Field::Platform)),
        )
        .sort(SortSpec::by("_id", SortOrder::Asc))
        .project(&[
            ("month", "_id"),
            ("count", "count"),
            ("platforms", "platforms"),
        ])
        .build()
}

pub fn dubbing(params: &Params) -> Pipeline {
    let mut per_language = GroupSpec::new(GroupKey::Global);
    for lang in DubbingLanguage::ALL {
        per_language = per_language.with(
            lang.as_str(),
            Accumulator::CountTrue(format!("dubbing.{}", lang.as_str())),
        );
    }
    let languages = stages().group(per_language).into_stages();
    let distribution = stages()
        .group(GroupSpec::new(GroupKey::field(Field::TotalDubbings)))
        .sort(SortSpec::by("_id", SortOrder::Asc))
        .project(&[("dubbings", "_id"), ("count", "count")])
        .into_stages();
    let by_platform = stages()
        .group(
            GroupSpec::new(GroupKey::field(Field::Platform))
                .with("avgDubbings", Accumulator::avg(Field::TotalDubbings))
                .with("dubbed", Accumulator::CountTrue("hasDubbing".into())),
        )
        .sort(SortSpec::by("avgDubbings", SortOrder::Desc).then("_id", SortOrder::Asc))
        .project(&[
            ("platform", "_id"),
            ("count", "count"),
            ("dubbed", "dubbed"),
            ("avgDubbings", "avgDubbings"),
        ])
        .into_stages();

    builder(params)
        .facet(
            FacetSpec::new()
                .with("languages", languages)
                .with("distribution", distribution)
                .with("platforms", by_platform),
        )
        .build()
}

pub fn summarize_dubbing(rows: Vec<Row>) -> Value {
    let mut row = facet_row(rows);
    let totals = first(&row, "languages");
    let mut languages: Vec<Value> = DubbingLanguage::ALL
        .into_iter()
        .map(|lang| {
            json!({
                "language": lang.as_str(),
                "count": totals.get(lang.as_str()).and_then(Value::as_u64).unwrap_or(0),
            })
        })
        .collect();
    languages.sort_by(|a, b| {
        let count = |v: &Value| v["count"].as_u64().unwrap_or(0);
        count(b).cmp(&count(a))
    });
    json!({
        "totalContent": totals.get("count").and_then(Value::as_u64).unwrap_or(0),
        "languages": languages,
        "distribution": row.remove("distribution").unwrap_or_else(|| json!([])),
        "platforms": row.remove("platforms").unwrap_or_else(|| json!([])),
    })
}

/// Comma-separated `boundaries`, falling back to the default set when the
/// list is missing or invalid.
pub fn duration_buckets(params: &Params) -> Result<BucketSpec, PipelineError> {
    let requested: Option<Vec<f64>> = params.get("boundaries").map(|raw| {
        crate::query::params::split_list(raw)
            .iter()
            .filter_map(|token| crate::query::params::parse_float(token))
            .collect()
    });
    let label = params.get("overflowLabel");
    if let Some(boundaries) = requested {
        // Overflow holds values at or above the last caller boundary.
        let overflow = match (label, boundaries.last()) {
            (Some(label), _) => label.to_string(),
            (None, Some(&last)) => format!("{}+", format_bound(last)),
            (None, None) => config::DURATION_OVERFLOW_LABEL.to_string(),
        };
        match BucketSpec::new(Field::DurationHours, boundaries, Some(overflow.as_str())) {
            Ok(spec) => return Ok(spec.with("avgDubbings", Accumulator::avg(Field::TotalDubbings))),
            Err(e) => tracing::debug!(error = %e, "Falling back to default duration boundaries"),
        }
    }
    Ok(BucketSpec::new(
        Field::DurationHours,
        config::DEFAULT_DURATION_BOUNDARIES.to_vec(),
        Some(label.unwrap_or(config::DURATION_OVERFLOW_LABEL)),
    )?
    .with("avgDubbings", Accumulator::avg(Field::TotalDubbings)))
}

pub fn duration(params: &Params) -> Result<Pipeline, PipelineError> {
    let buckets = stages().bucket(duration_buckets(params)?).into_stages();
    let stats = stages()
        .group_metrics(
            GroupKey::Global,
            &[
                Metric::Count,
                Metric::AvgDuration,
                Metric::TotalDuration,
                Metric::MinDuration,
                Metric::MaxDuration,
            ],
        )
        .into_stages();
    Ok(builder(params)
        .facet(FacetSpec::new().with("buckets", buckets).with("stats", stats))
        .build())
}

pub fn summarize_duration(rows: Vec<Row>) -> Value {
    let mut row = facet_row(rows);
    let stats = first(&row, "stats");
    let buckets: Vec<Value> = match row.remove("buckets") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|b| {
                json!({
                    "range": b["_id"],
                    "min": b["min"],
                    "max": b["max"],
                    "count": b["count"],
                    "avgDubbings": b["avgDubbings"],
                })
            })
            .collect(),
        _ => Vec::new(),
    };
    json!({
        "buckets": buckets,
        "stats": {
            "count": stats.get("count").and_then(Value::as_u64).unwrap_or(0),
            "avgHours": read(&stats, "avgDuration"),
            "totalHours": read(&stats, "totalDuration"),
            "minHours": read(&stats, "minDuration"),
            "maxHours": read(&stats, "maxDuration"),
        },
    })
}

/// Two-dimensional grid of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixQuery {
    pub rows: (String, Field),
    pub columns: (String, Field),
    pub metric: Metric,
}

/// `rows`/`columns` friendly dimensions and the cell metric.
#[derive(Debug, Clone, Serialize)]
pub struct Matrix {
    pub rows: Vec<Value>,
    pub columns: Vec<Value>,
    pub metric: Metric,
    /// `values[r][c]`; `null` where no record falls in the cell.
    pub values: Vec<Vec<Value>>,
    pub cells: Vec<Value>,
}

impl MatrixQuery {
    pub fn from_params(params: &Params) -> Result<Self, PipelineError> {
        let dimension = |key: &str, default: &str| -> Result<(String, Field), PipelineError> {
            let name = params.get(key).unwrap_or(default).to_string();
            let field = Field::from_friendly(&name)
                .ok_or_else(|| PipelineError::UnknownDimension(name.clone()))?;
            Ok((name, field))
        };
        let rows = dimension("rows", "genre")?;
        let columns = dimension("columns", "platform")?;
        if rows.1 == columns.1 {
            return Err(PipelineError::InvalidShape(
                "matrix rows and columns must be different dimensions".into(),
            ));
        }
        let metric = match params.get("metric").and_then(Metric::parse) {
            Some(m @ (Metric::Count | Metric::AvgDuration | Metric::AvgDubbings)) => m,
            Some(other) => {
                tracing::debug!(metric = other.name(), "Unsupported matrix metric, using count");
                Metric::Count
            }
            None => Metric::Count,
        };
        Ok(Self {
            rows,
            columns,
            metric,
        })
    }

    pub fn pipeline(&self, params: &Params) -> Pipeline {
        let predicate = FilterBuilder::extend(FilterBuilder::from_params(params))
            .non_empty(self.rows.1)
            .non_empty(self.columns.1)
            .build();
        let mut metrics = vec![Metric::Count];
        if self.metric != Metric::Count {
            metrics.push(self.metric);
        }
        PipelineBuilder::new(predicate)
            .group_metrics(
                GroupKey::Composite(vec![
                    ("row".to_string(), self.rows.1.path().to_string()),
                    ("column".to_string(), self.columns.1.path().to_string()),
                ]),
                &metrics,
            )
            .sort(SortSpec::by("_id.row", SortOrder::Asc).then("_id.column", SortOrder::Asc))
            .build()
    }

    pub fn assemble(&self, rows: Vec<Row>) -> Matrix {
        let metric = self.metric.name();
        let mut row_labels: Vec<Value> = Vec::new();
        let mut column_labels: Vec<Value> = Vec::new();
        let mut cells = Vec::with_capacity(rows.len());
        for group in &rows {
            let r = read(group, "_id.row");
            let c = read(group, "_id.column");
            if !row_labels.contains(&r) {
                row_labels.push(r.clone());
            }
            if !column_labels.contains(&c) {
                column_labels.push(c.clone());
            }
            cells.push(json!({
                "row": r,
                "column": c,
                "count": read(group, "count"),
                "value": read(group, metric),
            }));
        }
        column_labels.sort_by(crate::pipeline::exec::compare);

        let mut values = vec![vec![Value::Null; column_labels.len()]; row_labels.len()];
        for cell in &cells {
            let r = row_labels.iter().position(|l| *l == cell["row"]);
            let c = column_labels.iter().position(|l| *l == cell["column"]);
            if let (Some(r), Some(c)) = (r, c) {
                values[r][c] = cell["value"].clone();
            }
        }

        Matrix {
            rows: row_labels,
            columns: column_labels,
            metric: self.metric,
            values,
            cells,
        }
    }
}

/// `facets=type,genre,platform` with an optional per-facet `facetLimit`.
pub fn facets(params: &Params) -> Result<Pipeline, PipelineError> {
    let mut names = params.list("facets");
    if names.is_empty() {
        names = vec!["type".into(), "genre".into(), "platform".into()];
    }
    let facet_limit = params
        .usize("facetLimit")
        .map(|l| l.clamp(1, config::MAX_PAGE_LIMIT));

    let mut spec = FacetSpec::new();
    for name in names {
        let field = Field::from_friendly(&name)
            .ok_or_else(|| PipelineError::UnknownDimension(name.clone()))?;
        if spec.0.iter().any(|(existing, _)| *existing == name) {
            continue;
        }
        let mut branch = stages()
            .require_present(field)
            .group(GroupSpec::new(GroupKey::field(field)))
            .sort(SortSpec::default().then("_id", SortOrder::Asc));
        if let Some(limit) = facet_limit {
            branch = branch.limit(limit);
        }
        let branch = branch
            .project(&[("value", "_id"), ("count", "count")])
            .into_stages();
        spec = spec.with(&name, branch);
    }
    Ok(builder(params).facet(spec).build())
}

/// Distinct values for every categorical filter, plus the year span.
pub fn filter_options(params: &Params) -> Pipeline {
    builder(params)
        .group(
            GroupSpec::new(GroupKey::Global)
                .with("platforms", Accumulator::values(Field::Platform))
                .with("genres", Accumulator::values(Field::AssignedGenre))
                .with("languages", Accumulator::values(Field::PrimaryLanguage))
                .with("formats", Accumulator::values(Field::AssignedFormat))
                .with("sources", Accumulator::values(Field::Source))
                .with("ageRatings", Accumulator::values(Field::AgeRating))
                .with("minYear", Accumulator::min(Field::Year))
                .with("maxYear", Accumulator::max(Field::Year)),
        )
        .build()
}

pub fn summarize_filter_options(rows: Vec<Row>) -> Value {
    let row = rows.into_iter().next().unwrap_or_default();
    let list = |name: &str| row.get(name).cloned().unwrap_or_else(|| json!([]));
    let dubbing: Vec<&str> = DubbingLanguage::ALL.iter().map(|l| l.as_str()).collect();
    json!({
        "platforms": list("platforms"),
        "genres": list("genres"),
        "languages": list("languages"),
        "formats": list("formats"),
        "sources": list("sources"),
        "ageRatings": list("ageRatings"),
        "dubbingLanguages": dubbing,
        "years": { "min": read(&row, "minYear"), "max": read(&row, "maxYear") },
    })
}
