//! Core content types for catalogdb.
//!
//! A [`ContentRecord`] is one catalog item: a title on a platform with genre,
//! language, format, duration and dubbing metadata. `totalDubbings` is derived
//! from the dubbing flags and is recomputed on every write, never taken from input.

use crate::config;
use crate::error::CatalogError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Languages tracked in the dubbing matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DubbingLanguage {
    English,
    Hindi,
    Tamil,
    Telugu,
    Kannada,
    Malayalam,
    Bengali,
    Marathi,
    Gujarati,
    Punjabi,
    Odia,
    Spanish,
    French,
    German,
    Japanese,
}

impl DubbingLanguage {
    /// Every tracked language, in declaration order.
    pub const ALL: [DubbingLanguage; 15] = [
        DubbingLanguage::English,
        DubbingLanguage::Hindi,
        DubbingLanguage::Tamil,
        DubbingLanguage::Telugu,
        DubbingLanguage::Kannada,
        DubbingLanguage::Malayalam,
        DubbingLanguage::Bengali,
        DubbingLanguage::Marathi,
        DubbingLanguage::Gujarati,
        DubbingLanguage::Punjabi,
        DubbingLanguage::Odia,
        DubbingLanguage::Spanish,
        DubbingLanguage::French,
        DubbingLanguage::German,
        DubbingLanguage::Japanese,
    ];

    /// Lowercase key used in documents and query parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            DubbingLanguage::English => "english",
            DubbingLanguage::Hindi => "hindi",
            DubbingLanguage::Tamil => "tamil",
            DubbingLanguage::Telugu => "telugu",
            DubbingLanguage::Kannada => "kannada",
            DubbingLanguage::Malayalam => "malayalam",
            DubbingLanguage::Bengali => "bengali",
            DubbingLanguage::Marathi => "marathi",
            DubbingLanguage::Gujarati => "gujarati",
            DubbingLanguage::Punjabi => "punjabi",
            DubbingLanguage::Odia => "odia",
            DubbingLanguage::Spanish => "spanish",
            DubbingLanguage::French => "french",
            DubbingLanguage::German => "german",
            DubbingLanguage::Japanese => "japanese",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(name))
    }
}

/// Production source of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "In-House")]
    InHouse,
    #[serde(rename = "Commissioned")]
    Commissioned,
    #[serde(rename = "Co-Production")]
    CoProduction,
    #[serde(rename = "NA")]
    Na,
    #[serde(rename = "TBD")]
    Tbd,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::InHouse => "In-House",
            Source::Commissioned => "Commissioned",
            Source::CoProduction => "Co-Production",
            Source::Na => "NA",
            Source::Tbd => "TBD",
        }
    }

    /// `NA` and `TBD` are placeholders rather than a known source.
    pub fn is_known(self) -> bool {
        !matches!(self, Source::Na | Source::Tbd)
    }
}

/// Audience certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeRating {
    #[serde(rename = "U")]
    Universal,
    #[serde(rename = "U/A 7+")]
    Ua7,
    #[serde(rename = "U/A 13+")]
    Ua13,
    #[serde(rename = "U/A 16+")]
    Ua16,
    #[serde(rename = "A")]
    Adult,
}

impl AgeRating {
    pub fn as_str(self) -> &'static str {
        match self {
            AgeRating::Universal => "U",
            AgeRating::Ua7 => "U/A 7+",
            AgeRating::Ua13 => "U/A 13+",
            AgeRating::Ua16 => "U/A 16+",
            AgeRating::Adult => "A",
        }
    }
}

/// Per-language dubbing flags.
pub type Dubbing = BTreeMap<DubbingLanguage, bool>;

/// A stored catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Unique identifier (UUID v4).
    pub id: Uuid,
    pub platform: String,
    pub title: String,
    pub self_declared_genre: Option<String>,
    pub assigned_genre: Option<String>,
    pub primary_language: String,
    pub self_declared_format: Option<String>,
    pub assigned_format: Option<String>,
    pub year: i32,
    pub release_date: Option<NaiveDate>,
    pub seasons: Option<u32>,
    pub episodes: Option<u32>,
    pub duration_hours: Option<f64>,
    pub source: Option<Source>,
    pub dubbing: Dubbing,
    /// Count of `true` flags in `dubbing` as of the last write.
    pub total_dubbings: u32,
    pub age_rating: Option<AgeRating>,
    /// Reference to the user who created the record.
    pub created_by: Option<String>,
    /// Soft-delete flag. Inactive records are invisible to queries.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a record. There is deliberately no `totalDubbings` field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContent {
    pub platform: String,
    pub title: String,
    #[serde(default)]
    pub self_declared_genre: Option<String>,
    #[serde(default)]
    pub assigned_genre: Option<String>,
    pub primary_language: String,
    #[serde(default)]
    pub self_declared_format: Option<String>,
    #[serde(default)]
    pub assigned_format: Option<String>,
    pub year: i32,
    #[serde(default)]
    pub release_date: Option<NaiveDate>,
    #[serde(default)]
    pub seasons: Option<u32>,
    #[serde(default)]
    pub episodes: Option<u32>,
    #[serde(default)]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub dubbing: Dubbing,
    #[serde(default)]
    pub age_rating: Option<AgeRating>,
}

/// Partial update. Absent fields keep their value; an empty string clears an
/// optional text field; dubbing flags are merged one language at a time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    pub platform: Option<String>,
    pub title: Option<String>,
    pub self_declared_genre: Option<String>,
    pub assigned_genre: Option<String>,
    pub primary_language: Option<String>,
    pub self_declared_format: Option<String>,
    pub assigned_format: Option<String>,
    pub year: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub seasons: Option<u32>,
    pub episodes: Option<u32>,
    pub duration_hours: Option<f64>,
    pub source: Option<Source>,
    pub dubbing: Option<Dubbing>,
    pub age_rating: Option<AgeRating>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ContentRecord {
    /// Builds and validates a new active record with a random UUID.
    pub fn new(input: NewContent, created_by: Option<String>) -> Result<Self, CatalogError> {
        let now = Utc::now();
        let mut record = Self {
            id: Uuid::new_v4(),
            platform: input.platform.trim().to_string(),
            title: input.title.trim().to_string(),
            self_declared_genre: clean(input.self_declared_genre),
            assigned_genre: clean(input.assigned_genre),
            primary_language: input.primary_language.trim().to_string(),
            self_declared_format: clean(input.self_declared_format),
            assigned_format: clean(input.assigned_format),
            year: input.year,
            release_date: input.release_date,
            seasons: input.seasons,
            episodes: input.episodes,
            duration_hours: input.duration_hours,
            source: input.source,
            dubbing: input.dubbing,
            total_dubbings: 0,
            age_rating: input.age_rating,
            created_by: clean(created_by),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        record.validate()?;
        record.recompute_total_dubbings();
        Ok(record)
    }

    /// Checks every field rule. Returns the first violation found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.platform.trim().is_empty() {
            return Err(CatalogError::validation("platform", "must not be empty"));
        }
        let title_len = self.title.trim().chars().count();
        if title_len == 0 || title_len > config::MAX_TITLE_LEN {
            return Err(CatalogError::validation(
                "title",
                format!("must be 1-{} characters", config::MAX_TITLE_LEN),
            ));
        }
        if self.primary_language.trim().is_empty() {
            return Err(CatalogError::validation(
                "primaryLanguage",
                "must not be empty",
            ));
        }
        if !(config::MIN_YEAR..=config::MAX_YEAR).contains(&self.year) {
            return Err(CatalogError::validation(
                "year",
                format!("must be {}-{}", config::MIN_YEAR, config::MAX_YEAR),
            ));
        }
        if let Some(hours) = self.duration_hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(CatalogError::validation(
                    "durationHours",
                    "must be a non-negative number",
                ));
            }
        }
        Ok(())
    }

    /// Sets `total_dubbings` to the number of dubbed languages.
    pub fn recompute_total_dubbings(&mut self) {
        self.total_dubbings = self.dubbing.values().filter(|&&dubbed| dubbed).count() as u32;
    }

    /// Whether the title is dubbed into `language`.
    pub fn is_dubbed_in(&self, language: DubbingLanguage) -> bool {
        self.dubbing.get(&language).copied().unwrap_or(false)
    }

    /// Applies a partial update, then re-validates and recomputes derived fields.
    ///
    /// On error the record is left untouched.
    pub fn apply(&mut self, patch: ContentPatch) -> Result<(), CatalogError> {
        let mut next = self.clone();
        if let Some(platform) = patch.platform {
            next.platform = platform.trim().to_string();
        }
        if let Some(title) = patch.title {
            next.title = title.trim().to_string();
        }
        if let Some(language) = patch.primary_language {
            next.primary_language = language.trim().to_string();
        }
        if patch.self_declared_genre.is_some() {
            next.self_declared_genre = clean(patch.self_declared_genre);
        }
        if patch.assigned_genre.is_some() {
            next.assigned_genre = clean(patch.assigned_genre);
        }
        if patch.self_declared_format.is_some() {
            next.self_declared_format = clean(patch.self_declared_format);
        }
        if patch.assigned_format.is_some() {
            next.assigned_format = clean(patch.assigned_format);
        }
        if let Some(year) = patch.year {
            next.year = year;
        }
        if patch.release_date.is_some() {
            next.release_date = patch.release_date;
        }
        if patch.seasons.is_some() {
            next.seasons = patch.seasons;
        }
        if patch.episodes.is_some() {
            next.episodes = patch.episodes;
        }
        if patch.duration_hours.is_some() {
            next.duration_hours = patch.duration_hours;
        }
        if patch.source.is_some() {
            next.source = patch.source;
        }
        if patch.age_rating.is_some() {
            next.age_rating = patch.age_rating;
        }
        if let Some(dubbing) = patch.dubbing {
            next.dubbing.extend(dubbing);
        }

        next.validate()?;
        next.recompute_total_dubbings();
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// `releaseDate` when present, otherwise January 1 of `year`.
    pub fn effective_release_date(&self) -> Option<NaiveDate> {
        self.release_date
            .or_else(|| NaiveDate::from_ymd_opt(self.year, 1, 1))
    }

    /// Document view consumed by the aggregation executor.
    ///
    /// Adds the derived fields `releaseMonth` (`YYYY-MM`) and `hasDubbing`.
    pub fn to_row(&self) -> Map<String, Value> {
        let mut row = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let release_month = self
            .release_date
            .map(|d| Value::String(format!("{:04}-{:02}", d.year(), d.month())))
            .unwrap_or(Value::Null);
        row.insert("releaseMonth".to_string(), release_month);
        row.insert(
            "hasDubbing".to_string(),
            Value::Bool(self.total_dubbings > 0),
        );
        row
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample(platform: &str, title: &str, year: i32) -> NewContent {
        NewContent {
            platform: platform.to_string(),
            title: title.to_string(),
            primary_language: "Hindi".to_string(),
            year,
            ..NewContent::default()
        }
    }

    #[test]
    fn test_new_record_is_active_with_zero_dubbings() {
        let rec = ContentRecord::new(sample("Netflix", "Sacred Games", 2018), None).unwrap();
        assert!(rec.is_active);
        assert_eq!(rec.total_dubbings, 0);
        assert_eq!(rec.platform, "Netflix");
    }

    #[test]
    fn test_new_trims_and_clears_blank_optionals() {
        let mut input = sample("  Prime  ", "  Mirzapur ", 2018);
        input.assigned_genre = Some("   ".into());
        input.assigned_format = Some(" Series ".into());
        let rec = ContentRecord::new(input, Some("  ".into())).unwrap();
        assert_eq!(rec.platform, "Prime");
        assert_eq!(rec.title, "Mirzapur");
        assert_eq!(rec.assigned_genre, None);
        assert_eq!(rec.assigned_format.as_deref(), Some("Series"));
        assert_eq!(rec.created_by, None);
    }

    #[test]
    fn test_total_dubbings_counts_true_flags() {
        let mut input = sample("Netflix", "Delhi Crime", 2019);
        input.dubbing.insert(DubbingLanguage::English, true);
        input.dubbing.insert(DubbingLanguage::Tamil, true);
        input.dubbing.insert(DubbingLanguage::Telugu, false);
        let rec = ContentRecord::new(input, None).unwrap();
        assert_eq!(rec.total_dubbings, 2);
    }

    #[test]
    fn test_toggling_one_flag_changes_total_by_one() {
        let mut input = sample("Netflix", "Kota Factory", 2019);
        input.dubbing.insert(DubbingLanguage::English, true);
        let mut rec = ContentRecord::new(input, None).unwrap();
        for lang in DubbingLanguage::ALL {
            let before = rec.total_dubbings as i64;
            let flag = rec.is_dubbed_in(lang);
            rec.dubbing.insert(lang, !flag);
            rec.recompute_total_dubbings();
            let delta = rec.total_dubbings as i64 - before;
            assert_eq!(delta, if flag { -1 } else { 1 }, "language {:?}", lang);
        }
    }

    #[test]
    fn test_validation_rejects_bad_year() {
        let err = ContentRecord::new(sample("Netflix", "Old", 1899), None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "year", .. }));
        let err = ContentRecord::new(sample("Netflix", "Future", 2031), None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "year", .. }));
        assert!(ContentRecord::new(sample("Netflix", "Edge", 2030), None).is_ok());
    }

    #[test]
    fn test_validation_rejects_title_length() {
        let err = ContentRecord::new(sample("Netflix", "   ", 2020), None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "title", .. }));
        let long = "x".repeat(201);
        let err = ContentRecord::new(sample("Netflix", &long, 2020), None).unwrap_err();
        assert!(matches!(err, CatalogError::Validation { field: "title", .. }));
        let max = "x".repeat(200);
        assert!(ContentRecord::new(sample("Netflix", &max, 2020), None).is_ok());
    }

    #[test]
    fn test_validation_rejects_negative_or_nan_duration() {
        let mut input = sample("Netflix", "Neg", 2020);
        input.duration_hours = Some(-1.0);
        assert!(ContentRecord::new(input, None).is_err());
        let mut input = sample("Netflix", "Nan", 2020);
        input.duration_hours = Some(f64::NAN);
        assert!(ContentRecord::new(input, None).is_err());
    }

    #[test]
    fn test_apply_patch_merges_dubbing_and_recomputes() {
        let mut input = sample("Netflix", "Patch", 2020);
        input.dubbing.insert(DubbingLanguage::Hindi, true);
        let mut rec = ContentRecord::new(input, None).unwrap();
        let mut dubbing = Dubbing::new();
        dubbing.insert(DubbingLanguage::French, true);
        rec.apply(ContentPatch {
            dubbing: Some(dubbing),
            assigned_genre: Some("Drama".into()),
            ..ContentPatch::default()
        })
        .unwrap();
        assert_eq!(rec.total_dubbings, 2);
        assert_eq!(rec.assigned_genre.as_deref(), Some("Drama"));

        rec.apply(ContentPatch {
            assigned_genre: Some(String::new()),
            ..ContentPatch::default()
        })
        .unwrap();
        assert_eq!(rec.assigned_genre, None);
    }

    #[test]
    fn test_apply_invalid_patch_leaves_record_unchanged() {
        let mut rec = ContentRecord::new(sample("Netflix", "Stable", 2020), None).unwrap();
        let before = rec.clone();
        assert!(rec
            .apply(ContentPatch {
                year: Some(1500),
                ..ContentPatch::default()
            })
            .is_err());
        assert_eq!(rec, before);
    }

    #[test]
    fn test_effective_release_date_falls_back_to_year() {
        let rec = ContentRecord::new(sample("Netflix", "NoDate", 2021), None).unwrap();
        assert_eq!(
            rec.effective_release_date(),
            NaiveDate::from_ymd_opt(2021, 1, 1)
        );
    }

    #[test]
    fn test_to_row_uses_camel_case_and_derived_fields() {
        let mut input = sample("Netflix", "Row", 2022);
        input.release_date = NaiveDate::from_ymd_opt(2022, 3, 9);
        input.dubbing.insert(DubbingLanguage::Hindi, true);
        input.source = Some(Source::CoProduction);
        input.age_rating = Some(AgeRating::Ua13);
        let row = ContentRecord::new(input, None).unwrap().to_row();
        assert_eq!(row["primaryLanguage"], "Hindi");
        assert_eq!(row["releaseMonth"], "2022-03");
        assert_eq!(row["hasDubbing"], true);
        assert_eq!(row["totalDubbings"], 1);
        assert_eq!(row["dubbing"]["hindi"], true);
        assert_eq!(row["source"], "Co-Production");
        assert_eq!(row["ageRating"], "U/A 13+");
    }

    #[test]
    fn test_dubbing_language_parse_is_case_insensitive() {
        assert_eq!(DubbingLanguage::parse(" Tamil "), Some(DubbingLanguage::Tamil));
        assert_eq!(DubbingLanguage::parse("KLINGON"), None);
    }
}
