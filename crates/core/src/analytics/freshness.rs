//! Release freshness relative to a single evaluation date.

use crate::config;
use crate::content::ContentRecord;
use crate::pipeline::exec::round2;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Freshness flags for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub effective_date: NaiveDate,
    /// Days since the effective release date; future releases clamp to zero.
    pub age_days: i64,
    pub within_7_days: bool,
    pub within_30_days: bool,
    pub within_90_days: bool,
    pub released_this_year: bool,
}

impl Freshness {
    pub fn assess(record: &ContentRecord, today: NaiveDate) -> Option<Self> {
        let effective_date = record.effective_release_date()?;
        let age_days = (today - effective_date).num_days().max(0);
        Some(Self {
            effective_date,
            age_days,
            within_7_days: age_days <= 7,
            within_30_days: age_days <= 30,
            within_90_days: age_days <= 90,
            released_this_year: effective_date.year() == today.year(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFreshness {
    pub platform: String,
    pub total: usize,
    pub within_30_days: usize,
    pub released_this_year: usize,
    pub average_age_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRelease {
    pub id: Uuid,
    pub title: String,
    pub platform: String,
    pub release_date: NaiveDate,
    pub age_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreshnessReport {
    pub evaluated_on: NaiveDate,
    pub total: usize,
    pub within_7_days: usize,
    pub within_30_days: usize,
    pub within_90_days: usize,
    pub released_this_year: usize,
    pub average_age_days: Option<f64>,
    pub platforms: Vec<PlatformFreshness>,
    pub recent_releases: Vec<RecentRelease>,
}

#[derive(Default)]
struct Tally {
    total: usize,
    within_7_days: usize,
    within_30_days: usize,
    within_90_days: usize,
    released_this_year: usize,
    age_sum: i64,
}

impl Tally {
    fn add(&mut self, f: &Freshness) {
        self.total += 1;
        self.within_7_days += f.within_7_days as usize;
        self.within_30_days += f.within_30_days as usize;
        self.within_90_days += f.within_90_days as usize;
        self.released_this_year += f.released_this_year as usize;
        self.age_sum += f.age_days;
    }

    fn average_age(&self) -> Option<f64> {
        (self.total > 0).then(|| round2(self.age_sum as f64 / self.total as f64))
    }
}

/// Summarizes freshness over `records`, all evaluated against `today`.
pub fn report(records: &[ContentRecord], today: NaiveDate) -> FreshnessReport {
    let mut overall = Tally::default();
    let mut by_platform: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut recent: Vec<(&ContentRecord, Freshness)> = Vec::new();

    for record in records {
        let Some(freshness) = Freshness::assess(record, today) else {
            continue;
        };
        overall.add(&freshness);
        by_platform
            .entry(record.platform.as_str())
            .or_default()
            .add(&freshness);
        if record.release_date.is_some_and(|d| d <= today) {
            recent.push((record, freshness));
        }
    }

    recent.sort_by(|a, b| {
        b.1.effective_date
            .cmp(&a.1.effective_date)
            .then_with(|| a.0.title.cmp(&b.0.title))
    });
    recent.truncate(config::RECENT_RELEASES_SAMPLE_SIZE);

    let mut platforms: Vec<PlatformFreshness> = by_platform
        .into_iter()
        .map(|(platform, tally)| PlatformFreshness {
            platform: platform.to_string(),
            total: tally.total,
            within_30_days: tally.within_30_days,
            released_this_year: tally.released_this_year,
            average_age_days: tally.average_age(),
        })
        .collect();
    platforms.sort_by(|a, b| b.total.cmp(&a.total));

    FreshnessReport {
        evaluated_on: today,
        total: overall.total,
        within_7_days: overall.within_7_days,
        within_30_days: overall.within_30_days,
        within_90_days: overall.within_90_days,
        released_this_year: overall.released_this_year,
        average_age_days: overall.average_age(),
        platforms,
        recent_releases: recent
            .into_iter()
            .map(|(record, f)| RecentRelease {
                id: record.id,
                title: record.title.clone(),
                platform: record.platform.clone(),
                release_date: f.effective_date,
                age_days: f.age_days,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::tests::sample;
    use proptest::prelude::*;

    fn released(platform: &str, title: &str, date: Option<(i32, u32, u32)>, year: i32) -> ContentRecord {
        let mut input = sample(platform, title, year);
        input.release_date = date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        ContentRecord::new(input, None).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_flags_relative_to_today() {
        let today = day(2024, 6, 30);
        let rec = released("Netflix", "A", Some((2024, 6, 25)), 2024);
        let f = Freshness::assess(&rec, today).unwrap();
        assert_eq!(f.age_days, 5);
        assert!(f.within_7_days && f.within_30_days && f.within_90_days && f.released_this_year);

        let rec = released("Netflix", "B", Some((2024, 4, 1)), 2024);
        let f = Freshness::assess(&rec, today).unwrap();
        assert_eq!(f.age_days, 90);
        assert!(!f.within_30_days && f.within_90_days);
    }

    #[test]
    fn test_missing_release_date_uses_january_first() {
        let today = day(2024, 1, 31);
        let rec = released("Netflix", "Y", None, 2023);
        let f = Freshness::assess(&rec, today).unwrap();
        assert_eq!(f.effective_date, day(2023, 1, 1));
        assert_eq!(f.age_days, 395);
        assert!(!f.released_this_year);
    }

    #[test]
    fn test_future_release_clamps_to_zero() {
        let today = day(2024, 6, 30);
        let rec = released("Netflix", "Soon", Some((2025, 1, 1)), 2025);
        let f = Freshness::assess(&rec, today).unwrap();
        assert_eq!(f.age_days, 0);
        assert!(!f.released_this_year);
    }

    #[test]
    fn test_report_totals_and_recent_releases() {
        let today = day(2024, 6, 30);
        let records = vec![
            released("Netflix", "A", Some((2024, 6, 25)), 2024),
            released("Netflix", "B", Some((2024, 5, 20)), 2024),
            released("Prime", "C", None, 2020),
            released("Prime", "D", Some((2024, 7, 10)), 2024),
        ];
        let report = report(&records, today);
        assert_eq!(report.total, 4);
        assert_eq!(report.within_7_days, 2);
        assert_eq!(report.within_30_days, 2);
        assert_eq!(report.released_this_year, 3);
        let titles: Vec<&str> = report.recent_releases.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(report.platforms.len(), 2);
        assert_eq!(report.platforms[0].within_30_days, 1);
    }

    #[test]
    fn test_empty_report_has_no_average() {
        let report = report(&[], day(2024, 1, 1));
        assert_eq!(report.total, 0);
        assert_eq!(report.average_age_days, None);
    }

    proptest! {
        #[test]
        fn prop_age_days_never_negative(
            offset in -2000i64..2000,
            year in 1990i32..2030,
        ) {
            let today = day(2020, 6, 15) + chrono::Duration::days(offset);
            let rec = released("Netflix", "P", Some((year, 3, 1)), year);
            let f = Freshness::assess(&rec, today).unwrap();
            prop_assert!(f.age_days >= 0);
        }
    }
}
