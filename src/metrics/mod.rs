//! Flow metrics derived from the issue log.
//!
//! Everything here is a pure function of `(issues, now)`. Nothing reads the
//! clock or the filesystem, so the same inputs always give the same snapshot.
//!
//! - [`lead_time`] - Cycle time per closed issue and nearest-rank percentiles
//! - [`aging`] - Age of open work, color tiers, and the age histogram
//! - [`flow`] - Gap-free cumulative flow timeline

pub mod aging;
pub mod flow;
pub mod lead_time;

pub use aging::{AgeBucket, AgingPoint, AgingTier, age_days, age_distribution, average_age};
pub use flow::{FlowPoint, cumulative_flow};
pub use lead_time::{LeadTimePoint, cycle_time_days, lead_time_points, percentile};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Issue;

pub(crate) const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Everything the dashboard charts, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub lead_time: Vec<LeadTimePoint>,
    pub aging_wip: Vec<AgingPoint>,
    pub cumulative_flow: Vec<FlowPoint>,
    pub age_distribution: Vec<AgeBucket>,
    /// Mean age in days of non-closed issues
    pub avg_age: f64,
    /// `avg_age` formatted to one decimal place, kept for older dashboards
    pub avg_age_display: String,
    /// Median cycle time in days
    pub p50: i64,
    /// 85th percentile cycle time in days
    pub p85: i64,
}

impl Metrics {
    /// Number of non-closed issues counted in the snapshot.
    pub fn open_count(&self) -> usize {
        self.aging_wip.len()
    }

    /// Number of closed issues with a known close time.
    pub fn closed_count(&self) -> usize {
        self.lead_time.len()
    }
}

/// Compute the metrics snapshot for `issues` as of `now`.
///
/// Tombstoned issues are dropped first. Returns `None` when nothing is left,
/// so callers can show an empty state instead of a page of zeros.
pub fn get_metrics(issues: &[Issue], now: DateTime<Utc>) -> Option<Metrics> {
    let live: Vec<&Issue> = issues
        .iter()
        .filter(|issue| !issue.status.is_tombstone())
        .collect();

    if live.is_empty() {
        return None;
    }

    let lead_time = lead_time_points(live.iter().copied());
    let cycle_times: Vec<i64> = lead_time.iter().map(|p| p.cycle_time_days).collect();

    let aging_wip = aging::aging_points(live.iter().copied(), now);
    let ages: Vec<i64> = aging_wip.iter().map(|p| p.age_days).collect();
    let avg_age = average_age(&ages);

    Some(Metrics {
        cumulative_flow: cumulative_flow(live.iter().copied(), now),
        age_distribution: age_distribution(&ages),
        avg_age,
        avg_age_display: format!("{:.1}", avg_age),
        p50: percentile(&cycle_times, 0.5),
        p85: percentile(&cycle_times, 0.85),
        lead_time,
        aging_wip,
    })
}
