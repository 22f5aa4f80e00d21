//! Pure statistics over a bounded set of entries. No I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use utoipa::ToSchema;

use crate::models::internal::{Entry, Mood};

pub const DEFAULT_TOP_K: usize = 5;
pub const RECURRING_MIN_COUNT: usize = 2;

/// A trend must move by more than this to count as up or down.
const TREND_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MoodDistribution {
    pub good: usize,
    pub okay: usize,
    pub rough: usize,
}

impl MoodDistribution {
    pub fn total(&self) -> usize {
        self.good + self.okay + self.rough
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MoodTrend {
    Up,
    Down,
    Stable,
    InsufficientData,
}

impl MoodTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoodTrend::Up => "up",
            MoodTrend::Down => "down",
            MoodTrend::Stable => "stable",
            MoodTrend::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for MoodTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ThemeCount {
    pub theme: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Insights {
    pub mood_distribution: MoodDistribution,
    pub mood_trend: MoodTrend,
    pub top_tags: Vec<TagCount>,
    pub top_themes: Vec<ThemeCount>,
    pub streak: u32,
}

/// Entries without a mood land in no bucket.
pub fn mood_distribution(entries: &[Entry]) -> MoodDistribution {
    let mut dist = MoodDistribution::default();
    for mood in entries.iter().filter_map(|e| e.mood) {
        match mood {
            Mood::Good => dist.good += 1,
            Mood::Okay => dist.okay += 1,
            Mood::Rough => dist.rough += 1,
        }
    }
    dist
}

/// Compares the newer half of `entries` (indices `0..mid`) against the older
/// half (`mid..`), where `mid = len / 2`. Input is taken as newest-first; the
/// split is purely positional.
///
/// Each half is averaged over all of its entries, so mood-less entries pull
/// the average toward zero.
pub fn mood_trend(entries: &[Entry]) -> MoodTrend {
    if entries.len() < 2 {
        return MoodTrend::InsufficientData;
    }

    let mid = entries.len() / 2;
    let newer_avg = half_average(&entries[..mid]);
    let older_avg = half_average(&entries[mid..]);

    if newer_avg > older_avg + TREND_THRESHOLD {
        MoodTrend::Up
    } else if newer_avg < older_avg - TREND_THRESHOLD {
        MoodTrend::Down
    } else {
        MoodTrend::Stable
    }
}

fn half_average(half: &[Entry]) -> f64 {
    if half.is_empty() {
        return 0.0;
    }
    let sum: f64 = half.iter().filter_map(|e| e.mood).map(|m| m.weight()).sum();
    sum / half.len() as f64
}

/// Frequency count with ties kept in first-seen order.
fn ranked_counts<'a, I>(labels: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<&'a str, usize> = HashMap::new();

    for label in labels {
        let count = counts.entry(label.as_str()).or_insert(0);
        if *count == 0 {
            order.push(label.clone());
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|label| {
            let count = counts.get(label.as_str()).copied().unwrap_or(0);
            (label, count)
        })
        .collect();

    // Stable: equal counts keep first-seen order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

pub fn top_tags(entries: &[Entry], k: usize) -> Vec<TagCount> {
    let mut ranked = ranked_counts(entries.iter().flat_map(|e| e.tags.iter()));
    ranked.truncate(k);
    ranked
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect()
}

pub fn top_themes(entries: &[Entry], k: usize) -> Vec<ThemeCount> {
    let mut ranked = ranked_counts(entries.iter().flat_map(|e| e.themes.iter()));
    ranked.truncate(k);
    ranked
        .into_iter()
        .map(|(theme, count)| ThemeCount { theme, count })
        .collect()
}

/// Like [`top_themes`] but drops anything seen fewer than `min_count` times
/// before truncating.
pub fn recurring_themes(entries: &[Entry], min_count: usize, k: usize) -> Vec<String> {
    ranked_counts(entries.iter().flat_map(|e| e.themes.iter()))
        .into_iter()
        .filter(|(_, count)| *count >= min_count)
        .take(k)
        .map(|(theme, _)| theme)
        .collect()
}

/// Consecutive days with an entry, walking backward from `today`.
///
/// Each step continues while the next entry date is at most one day before
/// the last counted day (or `today` for the first step). A day without an
/// entry today therefore does not break a streak that ran through yesterday;
/// any missed day further back ends it.
pub fn streak(dates_desc: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = today;
    let mut last_seen: Option<NaiveDate> = None;

    for &date in dates_desc {
        if date > today || last_seen == Some(date) {
            continue;
        }
        let diff = (cursor - date).num_days();
        if diff > 1 {
            break;
        }
        streak += 1;
        cursor = date;
        last_seen = Some(date);
    }

    streak
}

pub fn compute_insights(entries: &[Entry], today: NaiveDate) -> Insights {
    let mut dates: Vec<NaiveDate> = entries.iter().map(Entry::date).collect();
    dates.sort_unstable_by(|a, b| b.cmp(a));

    Insights {
        mood_distribution: mood_distribution(entries),
        mood_trend: mood_trend(entries),
        top_tags: top_tags(entries, DEFAULT_TOP_K),
        top_themes: top_themes(entries, DEFAULT_TOP_K),
        streak: streak(&dates, today),
    }
}
