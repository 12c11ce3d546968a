//! Filter predicate construction and evaluation.
//!
//! [`FilterBuilder::from_params`] translates a bag of HTTP query parameters into a
//! [`Predicate`]: a conjunction of per-field tests plus required dubbing languages.
//! Each dimension composes independently; bounds on the same field accumulate and
//! only ever narrow. Every predicate implicitly requires `isActive == true`.

use crate::content::{ContentRecord, DubbingLanguage};
use crate::query::field::{Field, Scalar};
use crate::query::params::{parse_int, title_case, Params};
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Conjunction of tests against a single field.
///
/// A null field value satisfies the filter only when no test is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldFilter {
    /// Membership set. A single entry is an equality test.
    pub one_of: Option<Vec<Scalar>>,
    /// Inclusive lower bound.
    pub min: Option<Scalar>,
    /// Inclusive upper bound.
    pub max: Option<Scalar>,
    /// Value must be non-null and non-blank.
    pub non_empty: bool,
    /// Case-insensitive substring (stored lowercased).
    pub contains: Option<String>,
}

impl FieldFilter {
    fn is_unconstrained(&self) -> bool {
        self.one_of.is_none()
            && self.min.is_none()
            && self.max.is_none()
            && !self.non_empty
            && self.contains.is_none()
    }

    /// Raises the lower bound; never lowers an existing one.
    fn narrow_min(&mut self, value: Scalar) {
        match &self.min {
            Some(current) if current.compare(&value) != Some(Ordering::Less) => {}
            _ => self.min = Some(value),
        }
    }

    /// Lowers the upper bound; never raises an existing one.
    fn narrow_max(&mut self, value: Scalar) {
        match &self.max {
            Some(current) if current.compare(&value) != Some(Ordering::Greater) => {}
            _ => self.max = Some(value),
        }
    }

    /// Restricts membership; a second restriction intersects with the first.
    fn restrict_to(&mut self, values: Vec<Scalar>) {
        let mut deduped: Vec<Scalar> = Vec::with_capacity(values.len());
        for value in values {
            if !deduped.iter().any(|v| v.same_as(&value)) {
                deduped.push(value);
            }
        }
        self.one_of = Some(match self.one_of.take() {
            Some(existing) => existing
                .into_iter()
                .filter(|v| deduped.iter().any(|d| d.same_as(v)))
                .collect(),
            None => deduped,
        });
    }

    pub fn matches(&self, value: Option<&Scalar>) -> bool {
        let Some(value) = value else {
            return self.is_unconstrained();
        };
        if self.non_empty && !value.is_present() {
            return false;
        }
        if let Some(ref set) = self.one_of {
            if !set.iter().any(|v| v.same_as(value)) {
                return false;
            }
        }
        if let Some(ref min) = self.min {
            if !matches!(value.compare(min), Some(Ordering::Greater | Ordering::Equal)) {
                return false;
            }
        }
        if let Some(ref max) = self.max {
            if !matches!(value.compare(max), Some(Ordering::Less | Ordering::Equal)) {
                return false;
            }
        }
        if let Some(ref needle) = self.contains {
            match value {
                Scalar::Text(s) if s.to_lowercase().contains(needle.as_str()) => {}
                _ => return false,
            }
        }
        true
    }

    fn to_document(&self) -> Value {
        let bare_equality = self.min.is_none()
            && self.max.is_none()
            && !self.non_empty
            && self.contains.is_none();
        if let Some(ref set) = self.one_of {
            if set.len() == 1 && bare_equality {
                return set[0].to_json();
            }
        }

        let mut ops = Map::new();
        if let Some(ref set) = self.one_of {
            if set.len() == 1 {
                ops.insert("$eq".into(), set[0].to_json());
            } else {
                ops.insert(
                    "$in".into(),
                    Value::Array(set.iter().map(Scalar::to_json).collect()),
                );
            }
        }
        if let Some(ref min) = self.min {
            ops.insert("$gte".into(), min.to_json());
        }
        if let Some(ref max) = self.max {
            ops.insert("$lte".into(), max.to_json());
        }
        if self.non_empty {
            ops.insert("$nin".into(), json!([null, ""]));
        }
        if let Some(ref needle) = self.contains {
            ops.insert("$regex".into(), Value::String(needle.clone()));
            ops.insert("$options".into(), Value::String("i".into()));
        }
        Value::Object(ops)
    }
}

/// A canonical filter over active content records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    fields: BTreeMap<Field, FieldFilter>,
    dubbed_in: BTreeSet<DubbingLanguage>,
}

impl Predicate {
    /// Matches every active record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn field(&self, field: Field) -> Option<&FieldFilter> {
        self.fields.get(&field)
    }

    pub fn matches(&self, record: &ContentRecord) -> bool {
        if !record.is_active {
            return false;
        }
        if !self.dubbed_in.iter().all(|&lang| record.is_dubbed_in(lang)) {
            return false;
        }
        self.fields
            .iter()
            .all(|(field, filter)| filter.matches(field.value(record).as_ref()))
    }

    /// Query-document rendering used for diagnostics.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("isActive".into(), Value::Bool(true));
        for (field, filter) in &self.fields {
            if !filter.is_unconstrained() {
                doc.insert(field.path().to_string(), filter.to_document());
            }
        }
        for lang in &self.dubbed_in {
            doc.insert(format!("dubbing.{}", lang.as_str()), Value::Bool(true));
        }
        Value::Object(doc)
    }

    fn entry(&mut self, field: Field) -> &mut FieldFilter {
        self.fields.entry(field).or_default()
    }
}

/// Incremental constructor for [`Predicate`].
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    predicate: Predicate,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues building on top of an existing predicate.
    pub fn extend(predicate: Predicate) -> Self {
        Self { predicate }
    }

    /// Applies every supported query parameter. Unknown parameters are ignored and
    /// malformed values impose no constraint.
    pub fn from_params(params: &Params) -> Predicate {
        let mut builder = Self::new();

        builder = builder
            .categorical(Field::Platform, params.list("platform"))
            .categorical(Field::AssignedGenre, params.list("genre"))
            .categorical(Field::PrimaryLanguage, params.list("language"))
            .categorical(Field::PrimaryLanguage, params.list("region"))
            .categorical(Field::AgeRating, params.list("ageRating"))
            .categorical(Field::Source, params.list("source"));

        let formats: Vec<String> = params
            .first_of(&["type", "format"])
            .map(crate::query::params::split_list)
            .unwrap_or_default()
            .iter()
            .map(|f| title_case(f))
            .collect();
        builder = builder.categorical(Field::AssignedFormat, formats);

        if let Some(raw) = params.get("year") {
            builder = builder.year_expression(raw);
        }
        if let Some(start) = params.int("startYear") {
            builder = builder.at_least(Field::Year, Scalar::Int(start));
        }
        if let Some(end) = params.int("endYear") {
            builder = builder.at_most(Field::Year, Scalar::Int(end));
        }

        builder = builder.date_range(params.date("startDate"), params.date("endDate"));

        if let Some(v) = params.float("minDuration") {
            builder = builder.at_least(Field::DurationHours, Scalar::Float(v));
        }
        if let Some(v) = params.float("maxDuration") {
            builder = builder.at_most(Field::DurationHours, Scalar::Float(v));
        }
        if let Some(v) = params.int("minSeasons") {
            builder = builder.at_least(Field::Seasons, Scalar::Int(v));
        }
        if let Some(v) = params.int("maxSeasons") {
            builder = builder.at_most(Field::Seasons, Scalar::Int(v));
        }
        for name in ["minPopularity", "minDubbings"] {
            if let Some(v) = params.int(name) {
                builder = builder.at_least(Field::TotalDubbings, Scalar::Int(v));
            }
        }
        for name in ["maxPopularity", "maxDubbings"] {
            if let Some(v) = params.int(name) {
                builder = builder.at_most(Field::TotalDubbings, Scalar::Int(v));
            }
        }
        // Must run after the popularity bounds: `false` replaces them.
        if let Some(has_dubbing) = params.flag("hasDubbing") {
            builder = builder.has_dubbing(has_dubbing);
        }

        let languages = params
            .first_of(&["dubbingLanguages", "dubbedIn"])
            .map(crate::query::params::split_list)
            .unwrap_or_default();
        for name in languages {
            match DubbingLanguage::parse(&name) {
                Some(lang) => builder = builder.dubbed_in(lang),
                None => tracing::debug!(language = %name, "Ignoring unknown dubbing language"),
            }
        }

        if let Some(needle) = params.get("search") {
            builder = builder.title_contains(needle);
        }

        builder.build()
    }

    /// Equality for one value, membership for several. An empty list is a no-op.
    pub fn categorical(mut self, field: Field, values: Vec<String>) -> Self {
        if !values.is_empty() {
            self.predicate
                .entry(field)
                .restrict_to(values.into_iter().map(Scalar::Text).collect());
        }
        self
    }

    pub fn one_of(mut self, field: Field, values: Vec<Scalar>) -> Self {
        self.predicate.entry(field).restrict_to(values);
        self
    }

    pub fn at_least(mut self, field: Field, value: Scalar) -> Self {
        self.predicate.entry(field).narrow_min(value);
        self
    }

    pub fn at_most(mut self, field: Field, value: Scalar) -> Self {
        self.predicate.entry(field).narrow_max(value);
        self
    }

    pub fn date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        if let Some(start) = start {
            self = self.at_least(Field::ReleaseDate, Scalar::Date(start));
        }
        if let Some(end) = end {
            self = self.at_most(Field::ReleaseDate, Scalar::Date(end));
        }
        self
    }

    /// Requires a non-null, non-blank value.
    pub fn non_empty(mut self, field: Field) -> Self {
        self.predicate.entry(field).non_empty = true;
        self
    }

    /// `true` ⇒ at least one dubbing; `false` ⇒ exactly zero, discarding other bounds.
    pub fn has_dubbing(mut self, has_dubbing: bool) -> Self {
        if has_dubbing {
            self.predicate
                .entry(Field::TotalDubbings)
                .narrow_min(Scalar::Int(1));
        } else {
            self.predicate.fields.insert(
                Field::TotalDubbings,
                FieldFilter {
                    one_of: Some(vec![Scalar::Int(0)]),
                    ..FieldFilter::default()
                },
            );
        }
        self
    }

    pub fn dubbed_in(mut self, language: DubbingLanguage) -> Self {
        self.predicate.dubbed_in.insert(language);
        self
    }

    pub fn title_contains(mut self, needle: &str) -> Self {
        let needle = needle.trim().to_lowercase();
        if !needle.is_empty() {
            self.predicate.entry(Field::Title).contains = Some(needle);
        }
        self
    }

    /// `2020`, `2020-2023` (inclusive) or `2019,2021`. Malformed parts are skipped.
    fn year_expression(mut self, raw: &str) -> Self {
        let raw = raw.trim();
        if let Some((start, end)) = raw.split_once('-').filter(|_| !raw.starts_with('-')) {
            if let Some(start) = parse_int(start) {
                self = self.at_least(Field::Year, Scalar::Int(start));
            }
            if let Some(end) = parse_int(end) {
                self = self.at_most(Field::Year, Scalar::Int(end));
            }
            return self;
        }
        let years: Vec<Scalar> = crate::query::params::split_list(raw)
            .iter()
            .filter_map(|token| parse_int(token))
            .map(Scalar::Int)
            .collect();
        if years.is_empty() {
            tracing::debug!(value = raw, "Ignoring malformed year parameter");
            return self;
        }
        self.one_of(Field::Year, years)
    }

    pub fn build(self) -> Predicate {
        self.predicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::sample;
    use crate::content::{AgeRating, ContentRecord, NewContent, Source};
    use proptest::prelude::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().copied().collect()
    }

    fn record(year: i32) -> ContentRecord {
        ContentRecord::new(sample("Netflix", "Title", year), None).unwrap()
    }

    fn with(f: impl FnOnce(&mut NewContent)) -> ContentRecord {
        let mut input = sample("Netflix", "Title", 2021);
        f(&mut input);
        ContentRecord::new(input, None).unwrap()
    }

    fn dubbed(count: usize) -> ContentRecord {
        with(|c| {
            for lang in DubbingLanguage::ALL.into_iter().take(count) {
                c.dubbing.insert(lang, true);
            }
        })
    }

    #[test]
    fn test_empty_params_match_active_records_only() {
        let predicate = FilterBuilder::from_params(&Params::new());
        let mut rec = record(2020);
        assert!(predicate.matches(&rec));
        rec.is_active = false;
        assert!(!predicate.matches(&rec));
    }

    #[test]
    fn test_single_value_is_equality_and_list_is_membership() {
        let single = FilterBuilder::from_params(&params(&[("platform", "Netflix")]));
        let filter = single.field(Field::Platform).unwrap();
        assert_eq!(filter.one_of, Some(vec![Scalar::Text("Netflix".into())]));
        assert_eq!(single.to_document()["platform"], "Netflix");

        let multi = FilterBuilder::from_params(&params(&[("platform", "Netflix, Prime")]));
        assert_eq!(
            multi.to_document()["platform"],
            json!({ "$in": ["Netflix", "Prime"] })
        );
        let prime = with(|c| c.platform = "Prime".into());
        assert!(multi.matches(&prime));
        assert!(!single.matches(&prime));
    }

    #[test]
    fn test_language_and_region_are_aliases() {
        let a = FilterBuilder::from_params(&params(&[("language", "Tamil")]));
        let b = FilterBuilder::from_params(&params(&[("region", "Tamil")]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_format_is_title_cased() {
        let predicate = FilterBuilder::from_params(&params(&[("type", "web SERIES,movie")]));
        let series = with(|c| c.assigned_format = Some("Web Series".into()));
        let movie = with(|c| c.assigned_format = Some("Movie".into()));
        let special = with(|c| c.assigned_format = Some("Special".into()));
        assert!(predicate.matches(&series));
        assert!(predicate.matches(&movie));
        assert!(!predicate.matches(&special));
    }

    #[test]
    fn test_age_rating_and_source_filters() {
        let predicate =
            FilterBuilder::from_params(&params(&[("ageRating", "U/A 13+"), ("source", "In-House")]));
        let hit = with(|c| {
            c.age_rating = Some(AgeRating::Ua13);
            c.source = Some(Source::InHouse);
        });
        let miss = with(|c| {
            c.age_rating = Some(AgeRating::Adult);
            c.source = Some(Source::InHouse);
        });
        let unrated = with(|c| c.source = Some(Source::InHouse));
        assert!(predicate.matches(&hit));
        assert!(!predicate.matches(&miss));
        assert!(!predicate.matches(&unrated));
    }

    #[test]
    fn test_year_range_admits_exactly_inclusive_years() {
        let predicate = FilterBuilder::from_params(&params(&[("year", "2020-2023")]));
        for year in 2015..=2028 {
            assert_eq!(
                predicate.matches(&record(year)),
                (2020..=2023).contains(&year),
                "year {}",
                year
            );
        }
    }

    #[test]
    fn test_start_year_narrows_existing_range() {
        let predicate =
            FilterBuilder::from_params(&params(&[("year", "2020-2023"), ("startYear", "2021")]));
        let admitted: Vec<i32> = (2015..=2028)
            .filter(|&y| predicate.matches(&record(y)))
            .collect();
        assert_eq!(admitted, vec![2021, 2022, 2023]);
    }

    #[test]
    fn test_bounds_never_widen() {
        let predicate =
            FilterBuilder::from_params(&params(&[("year", "2020-2023"), ("startYear", "2010"), ("endYear", "2030")]));
        let admitted: Vec<i32> = (2015..=2028)
            .filter(|&y| predicate.matches(&record(y)))
            .collect();
        assert_eq!(admitted, vec![2020, 2021, 2022, 2023]);
    }

    #[test]
    fn test_year_list_intersects_with_bounds() {
        let predicate =
            FilterBuilder::from_params(&params(&[("year", "2019,2021,2024"), ("endYear", "2022")]));
        let admitted: Vec<i32> = (2015..=2028)
            .filter(|&y| predicate.matches(&record(y)))
            .collect();
        assert_eq!(admitted, vec![2019, 2021]);
    }

    #[test]
    fn test_malformed_year_imposes_no_constraint() {
        let predicate = FilterBuilder::from_params(&params(&[("year", "soon")]));
        assert!(predicate.field(Field::Year).is_none());
        assert!(predicate.matches(&record(1950)));
    }

    #[test]
    fn test_has_dubbing_false_overrides_popularity_bound() {
        let predicate = FilterBuilder::from_params(&params(&[
            ("minPopularity", "2"),
            ("hasDubbing", "false"),
        ]));
        assert!(predicate.matches(&dubbed(0)));
        assert!(!predicate.matches(&dubbed(1)));
        assert!(!predicate.matches(&dubbed(3)));
        assert_eq!(predicate.to_document()["totalDubbings"], 0);
    }

    #[test]
    fn test_has_dubbing_true_requires_positive_count() {
        let predicate = FilterBuilder::from_params(&params(&[("hasDubbing", "true")]));
        assert!(!predicate.matches(&dubbed(0)));
        assert!(predicate.matches(&dubbed(1)));
    }

    #[test]
    fn test_numeric_bounds_accumulate() {
        let predicate = FilterBuilder::from_params(&params(&[
            ("minDuration", "1"),
            ("maxDuration", "3"),
            ("minDubbings", "1"),
            ("maxPopularity", "2"),
        ]));
        let filter = predicate.field(Field::DurationHours).unwrap();
        assert_eq!(filter.min, Some(Scalar::Float(1.0)));
        assert_eq!(filter.max, Some(Scalar::Float(3.0)));
        let dubbings = predicate.field(Field::TotalDubbings).unwrap();
        assert_eq!(dubbings.min, Some(Scalar::Int(1)));
        assert_eq!(dubbings.max, Some(Scalar::Int(2)));
    }

    #[test]
    fn test_garbage_numbers_are_ignored() {
        let predicate = FilterBuilder::from_params(&params(&[
            ("minDuration", "NaN"),
            ("maxDuration", "lots"),
            ("minSeasons", "-"),
        ]));
        assert_eq!(predicate, Predicate::all());
    }

    #[test]
    fn test_duration_bound_excludes_null_duration() {
        let predicate = FilterBuilder::from_params(&params(&[("minDuration", "0")]));
        let unknown = record(2020);
        let known = with(|c| c.duration_hours = Some(0.0));
        assert!(!predicate.matches(&unknown));
        assert!(predicate.matches(&known));
    }

    #[test]
    fn test_dubbing_languages_require_all() {
        let predicate =
            FilterBuilder::from_params(&params(&[("dubbingLanguages", "hindi,Tamil,klingon")]));
        let both = with(|c| {
            c.dubbing.insert(DubbingLanguage::Hindi, true);
            c.dubbing.insert(DubbingLanguage::Tamil, true);
        });
        let one = with(|c| {
            c.dubbing.insert(DubbingLanguage::Hindi, true);
            c.dubbing.insert(DubbingLanguage::Tamil, false);
        });
        assert!(predicate.matches(&both));
        assert!(!predicate.matches(&one));
        assert_eq!(predicate.to_document()["dubbing.tamil"], true);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let predicate = FilterBuilder::from_params(&params(&[
            ("startDate", "2024-01-01"),
            ("endDate", "2024-01-31"),
        ]));
        let on_start = with(|c| c.release_date = NaiveDate::from_ymd_opt(2024, 1, 1));
        let on_end = with(|c| c.release_date = NaiveDate::from_ymd_opt(2024, 1, 31));
        let after = with(|c| c.release_date = NaiveDate::from_ymd_opt(2024, 2, 1));
        assert!(predicate.matches(&on_start));
        assert!(predicate.matches(&on_end));
        assert!(!predicate.matches(&after));
        assert!(!predicate.matches(&record(2024)));
    }

    #[test]
    fn test_non_empty_genre_rejects_null_and_blank() {
        let predicate = FilterBuilder::new().non_empty(Field::AssignedGenre).build();
        let drama = with(|c| c.assigned_genre = Some("Drama".into()));
        assert!(predicate.matches(&drama));
        assert!(!predicate.matches(&record(2020)));
        assert_eq!(
            predicate.to_document()["assignedGenre"],
            json!({ "$nin": [null, ""] })
        );
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let predicate = FilterBuilder::from_params(&params(&[("search", "GAMES")]));
        let hit = with(|c| c.title = "Sacred Games".into());
        assert!(predicate.matches(&hit));
        assert!(!predicate.matches(&record(2020)));
    }

    proptest! {
        #[test]
        fn prop_single_value_equals_one_element_list(
            name in prop::sample::select(vec!["platform", "genre", "language", "region", "ageRating", "source", "type"]),
            value in "[A-Za-z][A-Za-z ]{0,12}[A-Za-z]",
        ) {
            let single = FilterBuilder::from_params(&params(&[(name, value.as_str())]));
            let listed = format!("{},", value);
            let list = FilterBuilder::from_params(&params(&[(name, listed.as_str())]));
            prop_assert_eq!(single, list);
        }

        #[test]
        fn prop_year_range_matches_exactly(start in 1900i32..2030, len in 0i32..10, year in 1900i32..=2030) {
            let end = (start + len).min(2030);
            let expr = format!("{}-{}", start, end);
            let predicate = FilterBuilder::from_params(&params(&[("year", expr.as_str())]));
            prop_assert_eq!(predicate.matches(&record(year)), year >= start && year <= end);
        }

        #[test]
        fn prop_has_dubbing_false_matches_only_zero(count in 0usize..15, min in 0i64..5) {
            let min = min.to_string();
            let predicate = FilterBuilder::from_params(&params(&[
                ("minPopularity", min.as_str()),
                ("hasDubbing", "false"),
            ]));
            prop_assert_eq!(predicate.matches(&dubbed(count)), count == 0);
        }
    }
}
