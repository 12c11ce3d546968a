//! Field catalogue: document paths, friendly dimension names, and typed values.

use crate::content::ContentRecord;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// A filterable or groupable content attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Platform,
    Title,
    SelfDeclaredGenre,
    AssignedGenre,
    PrimaryLanguage,
    SelfDeclaredFormat,
    AssignedFormat,
    Year,
    ReleaseDate,
    /// Derived `YYYY-MM` of `releaseDate`.
    ReleaseMonth,
    Seasons,
    Episodes,
    DurationHours,
    Source,
    TotalDubbings,
    AgeRating,
    CreatedBy,
}

impl Field {
    /// Document path of the field (camelCase, as produced by `ContentRecord::to_row`).
    pub fn path(self) -> &'static str {
        match self {
            Field::Platform => "platform",
            Field::Title => "title",
            Field::SelfDeclaredGenre => "selfDeclaredGenre",
            Field::AssignedGenre => "assignedGenre",
            Field::PrimaryLanguage => "primaryLanguage",
            Field::SelfDeclaredFormat => "selfDeclaredFormat",
            Field::AssignedFormat => "assignedFormat",
            Field::Year => "year",
            Field::ReleaseDate => "releaseDate",
            Field::ReleaseMonth => "releaseMonth",
            Field::Seasons => "seasons",
            Field::Episodes => "episodes",
            Field::DurationHours => "durationHours",
            Field::Source => "source",
            Field::TotalDubbings => "totalDubbings",
            Field::AgeRating => "ageRating",
            Field::CreatedBy => "createdBy",
        }
    }

    /// Resolves a dashboard dimension name (e.g. `type`, `genre`, `region`) to a field.
    ///
    /// Document paths are accepted as well, so `assignedGenre` and `genre` are equivalent.
    pub fn from_friendly(name: &str) -> Option<Field> {
        let field = match name.trim() {
            "platform" => Field::Platform,
            "title" => Field::Title,
            "genre" | "assignedGenre" => Field::AssignedGenre,
            "selfGenre" | "selfDeclaredGenre" => Field::SelfDeclaredGenre,
            "type" | "format" | "assignedFormat" => Field::AssignedFormat,
            "selfFormat" | "selfDeclaredFormat" => Field::SelfDeclaredFormat,
            "language" | "region" | "primaryLanguage" => Field::PrimaryLanguage,
            "year" => Field::Year,
            "releaseDate" => Field::ReleaseDate,
            "month" | "releaseMonth" => Field::ReleaseMonth,
            "seasons" => Field::Seasons,
            "episodes" => Field::Episodes,
            "duration" | "durationHours" => Field::DurationHours,
            "source" => Field::Source,
            "dubbings" | "totalDubbings" => Field::TotalDubbings,
            "ageRating" | "rating" => Field::AgeRating,
            "createdBy" => Field::CreatedBy,
            _ => return None,
        };
        Some(field)
    }

    /// Reads the field from a record. `None` means null or absent.
    pub fn value(self, record: &ContentRecord) -> Option<Scalar> {
        match self {
            Field::Platform => Some(Scalar::Text(record.platform.clone())),
            Field::Title => Some(Scalar::Text(record.title.clone())),
            Field::SelfDeclaredGenre => record.self_declared_genre.clone().map(Scalar::Text),
            Field::AssignedGenre => record.assigned_genre.clone().map(Scalar::Text),
            Field::PrimaryLanguage => Some(Scalar::Text(record.primary_language.clone())),
            Field::SelfDeclaredFormat => record.self_declared_format.clone().map(Scalar::Text),
            Field::AssignedFormat => record.assigned_format.clone().map(Scalar::Text),
            Field::Year => Some(Scalar::Int(record.year as i64)),
            Field::ReleaseDate => record.release_date.map(Scalar::Date),
            Field::ReleaseMonth => record
                .release_date
                .map(|d| Scalar::Text(format!("{:04}-{:02}", d.year(), d.month()))),
            Field::Seasons => record.seasons.map(|v| Scalar::Int(v as i64)),
            Field::Episodes => record.episodes.map(|v| Scalar::Int(v as i64)),
            Field::DurationHours => record.duration_hours.map(Scalar::Float),
            Field::Source => record.source.map(|s| Scalar::Text(s.as_str().to_string())),
            Field::TotalDubbings => Some(Scalar::Int(record.total_dubbings as i64)),
            Field::AgeRating => record
                .age_rating
                .map(|r| Scalar::Text(r.as_str().to_string())),
            Field::CreatedBy => record.created_by.clone().map(Scalar::Text),
        }
    }
}

/// A typed comparison value used by filter conditions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Scalar {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Orders two scalars of compatible kinds. Integers and floats compare numerically;
    /// mismatched kinds are incomparable.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    /// Equality with numeric coercion between integers and floats.
    pub fn same_as(&self, other: &Scalar) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Whether the value carries content (non-blank text; other kinds always do).
    pub fn is_present(&self) -> bool {
        match self {
            Scalar::Text(s) => !s.trim().is_empty(),
            _ => true,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Scalar::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}
