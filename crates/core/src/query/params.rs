//! Lenient access to HTTP query parameters.
//!
//! Every accessor fails soft: a missing, blank or unparseable value reads as
//! `None` (or an empty list) and never aborts the caller.

use chrono::{DateTime, NaiveDate};
use std::collections::HashMap;

/// An unordered bag of named string parameters.
#[derive(Debug, Clone, Default)]
pub struct Params(HashMap<String, String>);

impl From<HashMap<String, String>> for Params {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trimmed, non-empty raw value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First non-empty value among several aliases.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Comma-separated list with tokens trimmed and empty tokens dropped.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.get(name).map(split_list).unwrap_or_default()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        let raw = self.get(name)?;
        let parsed = parse_int(raw);
        if parsed.is_none() {
            tracing::debug!(param = name, value = raw, "Ignoring non-integer parameter");
        }
        parsed
    }

    /// Finite float. `NaN` and infinities are treated as absent.
    pub fn float(&self, name: &str) -> Option<f64> {
        let raw = self.get(name)?;
        let parsed = parse_float(raw);
        if parsed.is_none() {
            tracing::debug!(param = name, value = raw, "Ignoring non-numeric parameter");
        }
        parsed
    }

    /// `YYYY-MM-DD` or an RFC 3339 timestamp (date part).
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        let raw = self.get(name)?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            tracing::debug!(param = name, value = raw, "Ignoring unparseable date parameter");
        }
        parsed
    }

    /// `true/false`, `1/0`, `yes/no`, case-insensitive.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name)?.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            other => {
                tracing::debug!(param = name, value = other, "Ignoring non-boolean parameter");
                None
            }
        }
    }

    pub fn usize(&self, name: &str) -> Option<usize> {
        self.int(name).and_then(|v| usize::try_from(v).ok())
    }
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| parse_float(raw).map(|f| f.trunc() as i64))
}

pub fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Lowercases the input, then capitalizes the first letter of every word.
pub fn title_case(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_list_trims_and_drops_empty_tokens() {
        let p = params(&[("platform", " Netflix , ,Prime Video,")]);
        assert_eq!(p.list("platform"), vec!["Netflix", "Prime Video"]);
        assert!(p.list("genre").is_empty());
    }

    #[test]
    fn test_float_rejects_nan_and_garbage() {
        let p = params(&[("a", "NaN"), ("b", "inf"), ("c", "abc"), ("d", "1.5")]);
        assert_eq!(p.float("a"), None);
        assert_eq!(p.float("b"), None);
        assert_eq!(p.float("c"), None);
        assert_eq!(p.float("d"), Some(1.5));
    }

    #[test]
    fn test_int_accepts_decimal_by_truncation() {
        let p = params(&[("a", "12.9"), ("b", "x12")]);
        assert_eq!(p.int("a"), Some(12));
        assert_eq!(p.int("b"), None);
    }

    #[test]
    fn test_date_accepts_plain_and_rfc3339() {
        let p = params(&[("a", "2024-02-29"), ("b", "2024-03-01T10:00:00Z"), ("c", "02/03/2024")]);
        assert_eq!(p.date("a"), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(p.date("b"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(p.date("c"), None);
    }

    #[test]
    fn test_flag_variants() {
        let p = params(&[("a", "TRUE"), ("b", "0"), ("c", "maybe")]);
        assert_eq!(p.flag("a"), Some(true));
        assert_eq!(p.flag("b"), Some(false));
        assert_eq!(p.flag("c"), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("web SERIES"), "Web Series");
        assert_eq!(title_case("  movie "), "Movie");
        assert_eq!(title_case("mini-series"), "Mini-series");
    }
}
