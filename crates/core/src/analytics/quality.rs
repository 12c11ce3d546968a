//! Weighted data-quality scoring.

use crate::config;
use crate::content::ContentRecord;
use crate::pipeline::exec::round2;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A single presence or validity check and its weight.
#[derive(Debug, Clone, Copy)]
pub struct Check {
    pub field: &'static str,
    pub weight: u32,
    passes: fn(&ContentRecord) -> bool,
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// The weights sum to exactly 100.
pub const CHECKS: [Check; 11] = [
    Check { field: "platform", weight: 10, passes: |r| !r.platform.trim().is_empty() },
    Check { field: "title", weight: 10, passes: |r| !r.title.trim().is_empty() },
    Check { field: "primaryLanguage", weight: 10, passes: |r| !r.primary_language.trim().is_empty() },
    Check { field: "year", weight: 15, passes: |r| r.year >= config::MIN_YEAR },
    Check { field: "assignedGenre", weight: 10, passes: |r| has_text(&r.assigned_genre) },
    Check { field: "assignedFormat", weight: 10, passes: |r| has_text(&r.assigned_format) },
    Check { field: "releaseDate", weight: 10, passes: |r| r.release_date.is_some() },
    Check { field: "durationHours", weight: 10, passes: |r| r.duration_hours.is_some_and(|h| h >= 0.0) },
    Check { field: "ageRating", weight: 5, passes: |r| r.age_rating.is_some() },
    Check { field: "source", weight: 5, passes: |r| r.source.is_some_and(|s| s.is_known()) },
    Check { field: "dubbing", weight: 5, passes: |r| r.total_dubbings > 0 },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityScore {
    pub score: u32,
    pub missing: Vec<&'static str>,
}

impl QualityScore {
    pub fn of(record: &ContentRecord) -> Self {
        let mut score = 0;
        let mut missing = Vec::new();
        for check in &CHECKS {
            if (check.passes)(record) {
                score += check.weight;
            } else {
                missing.push(check.field);
            }
        }
        Self { score, missing }
    }
}

/// Score ranges with inclusive lower bounds.
pub const SCORE_RANGES: [(&str, u32, u32); 4] = [
    ("0-39", 0, 39),
    ("40-59", 40, 59),
    ("60-79", 60, 79),
    ("80-100", 80, 100),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeCount {
    pub range: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformQuality {
    pub platform: String,
    pub count: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowQualityRecord {
    pub id: Uuid,
    pub title: String,
    pub platform: String,
    pub score: u32,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub total: usize,
    pub average_score: Option<f64>,
    pub min_score: Option<u32>,
    pub max_score: Option<u32>,
    pub distribution: Vec<RangeCount>,
    pub platforms: Vec<PlatformQuality>,
    /// Records missing each field, keyed by field name.
    pub missing_fields: BTreeMap<&'static str, usize>,
    pub low_quality: Vec<LowQualityRecord>,
}

pub fn report(records: &[ContentRecord]) -> QualityReport {
    let scored: Vec<(&ContentRecord, QualityScore)> = records
        .iter()
        .map(|r| (r, QualityScore::of(r)))
        .collect();

    let total = scored.len();
    let sum: u64 = scored.iter().map(|(_, s)| s.score as u64).sum();
    let average_score = (total > 0).then(|| round2(sum as f64 / total as f64));

    let distribution = SCORE_RANGES
        .iter()
        .map(|&(range, lo, hi)| RangeCount {
            range,
            count: scored
                .iter()
                .filter(|(_, s)| (lo..=hi).contains(&s.score))
                .count(),
        })
        .collect();

    let mut per_platform: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    let mut missing_fields: BTreeMap<&'static str, usize> =
        CHECKS.iter().map(|c| (c.field, 0)).collect();
    for (record, score) in &scored {
        let entry = per_platform.entry(record.platform.as_str()).or_default();
        entry.0 += 1;
        entry.1 += score.score as u64;
        for field in &score.missing {
            *missing_fields.entry(*field).or_default() += 1;
        }
    }
    let mut platforms: Vec<PlatformQuality> = per_platform
        .into_iter()
        .map(|(platform, (count, sum))| PlatformQuality {
            platform: platform.to_string(),
            count,
            average_score: round2(sum as f64 / count as f64),
        })
        .collect();
    platforms.sort_by(|a, b| {
        a.average_score
            .partial_cmp(&b.average_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut low: Vec<&(&ContentRecord, QualityScore)> = scored
        .iter()
        .filter(|(_, s)| s.score < config::LOW_QUALITY_THRESHOLD)
        .collect();
    low.sort_by(|a, b| a.1.score.cmp(&b.1.score).then_with(|| a.0.title.cmp(&b.0.title)));
    let low_quality = low
        .into_iter()
        .take(config::LOW_QUALITY_SAMPLE_SIZE)
        .map(|(record, score)| LowQualityRecord {
            id: record.id,
            title: record.title.clone(),
            platform: record.platform.clone(),
            score: score.score,
            missing: score.missing.clone(),
        })
        .collect();

    QualityReport {
        total,
        average_score,
        min_score: scored.iter().map(|(_, s)| s.score).min(),
        max_score: scored.iter().map(|(_, s)| s.score).max(),
        distribution,
        platforms,
        missing_fields,
        low_quality,
    }
}
