//! Work-in-progress aging: per-issue age, color tiers, and the age histogram.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MS_PER_DAY;
use crate::models::{Issue, IssueStatus};

/// Color tier on the aging chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingTier {
    /// Up to a week old
    Green,
    /// 8 to 30 days old
    Yellow,
    /// Older than 30 days
    Red,
}

impl AgingTier {
    /// Tier for an age in whole days. Upper bounds are inclusive.
    pub fn for_age(age_days: i64) -> Self {
        match age_days {
            d if d <= 7 => AgingTier::Green,
            d if d <= 30 => AgingTier::Yellow,
            _ => AgingTier::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgingTier::Green => "green",
            AgingTier::Yellow => "yellow",
            AgingTier::Red => "red",
        }
    }
}

/// One non-closed issue on the aging chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingPoint {
    pub id: String,
    pub title: String,
    pub status: IssueStatus,
    pub age_days: i64,
    pub tier: AgingTier,
}

/// One bar of the age histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBucket {
    pub label: String,
    pub min_days: i64,
    /// Inclusive upper bound; `None` for the open-ended last bucket
    pub max_days: Option<i64>,
    pub count: usize,
}

/// Histogram ranges: `(label, min, max)`, inclusive on both ends.
/// Independent of the color tier breakpoints.
const BUCKETS: [(&str, i64, Option<i64>); 4] = [
    ("0-7d", 0, Some(7)),
    ("8-14d", 8, Some(14)),
    ("15-30d", 15, Some(30)),
    ("30d+", 31, None),
];

/// Whole days since `created`, rounded down and clamped at zero.
pub fn age_days(created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let ms = (now - created).num_milliseconds();
    if ms <= 0 { 0 } else { ms / MS_PER_DAY }
}

/// Aging points for every non-closed issue, oldest first.
pub fn aging_points<'a, I>(issues: I, now: DateTime<Utc>) -> Vec<AgingPoint>
where
    I: IntoIterator<Item = &'a Issue>,
{
    let mut points: Vec<AgingPoint> = issues
        .into_iter()
        .filter(|issue| !issue.status.is_closed())
        .map(|issue| {
            let age = age_days(issue.created_at, now);
            AgingPoint {
                id: issue.id.clone(),
                title: issue.title.clone(),
                status: issue.status,
                age_days: age,
                tier: AgingTier::for_age(age),
            }
        })
        .collect();

    points.sort_by(|a, b| b.age_days.cmp(&a.age_days).then_with(|| a.id.cmp(&b.id)));
    points
}

/// Count ages into the four fixed histogram buckets.
///
/// Every age lands in exactly one bucket, so the counts sum to `ages.len()`.
pub fn age_distribution(ages: &[i64]) -> Vec<AgeBucket> {
    let mut buckets: Vec<AgeBucket> = BUCKETS
        .iter()
        .map(|&(label, min_days, max_days)| AgeBucket {
            label: label.to_string(),
            min_days,
            max_days,
            count: 0,
        })
        .collect();

    for &age in ages {
        let idx = buckets
            .iter()
            .position(|b| b.max_days.is_none_or(|max| age <= max))
            .unwrap_or(buckets.len() - 1);
        buckets[idx].count += 1;
    }

    buckets
}

/// Arithmetic mean of the ages; 0.0 when there are none.
pub fn average_age(ages: &[i64]) -> f64 {
    if ages.is_empty() {
        return 0.0;
    }
    ages.iter().sum::<i64>() as f64 / ages.len() as f64
}
