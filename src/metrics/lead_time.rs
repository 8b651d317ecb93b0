//! Cycle time and percentile calculation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MS_PER_DAY;
use crate::models::Issue;

/// One closed issue plotted on the lead-time scatter chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTimePoint {
    /// When the issue was closed (its last update)
    pub closed_at: DateTime<Utc>,
    /// Whole days from creation to close, rounded up
    pub cycle_time_days: i64,
    pub id: String,
    pub title: String,
}

/// Days from `created` to `closed`, rounded up and never negative.
///
/// Clock skew between writers can put `closed` before `created`; that reads
/// as zero rather than a negative duration.
pub fn cycle_time_days(created: DateTime<Utc>, closed: DateTime<Utc>) -> i64 {
    let ms = (closed - created).num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    // Integer ceiling division; ms is positive here.
    (ms + MS_PER_DAY - 1) / MS_PER_DAY
}

/// Build lead-time points for every closed issue that has an update timestamp.
///
/// Points are ordered by close time, then ID.
pub fn lead_time_points<'a, I>(issues: I) -> Vec<LeadTimePoint>
where
    I: IntoIterator<Item = &'a Issue>,
{
    let mut points: Vec<LeadTimePoint> = issues
        .into_iter()
        .filter(|issue| issue.status.is_closed())
        .filter_map(|issue| {
            let closed_at = issue.updated_at?;
            Some(LeadTimePoint {
                closed_at,
                cycle_time_days: cycle_time_days(issue.created_at, closed_at),
                id: issue.id.clone(),
                title: issue.title.clone(),
            })
        })
        .collect();

    points.sort_by(|a, b| a.closed_at.cmp(&b.closed_at).then_with(|| a.id.cmp(&b.id)));
    points
}

/// Nearest-rank percentile: sort ascending and take index `floor(n * p)`.
///
/// `p` is clamped to `[0, 1]` and the index to the last element, so `p = 1`
/// yields the maximum. Empty input yields 0.
pub fn percentile(values: &[i64], p: f64) -> i64 {
    if values.is_empty() {
        return 0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueStatus;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn closed(id: &str, created: DateTime<Utc>, updated: Option<DateTime<Utc>>) -> Issue {
        let mut issue = Issue::new(id, format!("Issue {}", id), created);
        issue.status = IssueStatus::Closed;
        issue.updated_at = updated;
        issue
    }

    #[test]
    fn test_cycle_time_whole_days() {
        assert_eq!(cycle_time_days(at(2024, 1, 1, 0), at(2024, 1, 3, 0)), 2);
    }

    #[test]
    fn test_cycle_time_rounds_up() {
        assert_eq!(cycle_time_days(at(2024, 1, 1, 0), at(2024, 1, 1, 1)), 1);
        assert_eq!(cycle_time_days(at(2024, 1, 1, 0), at(2024, 1, 2, 1)), 2);
        assert_eq!(
            cycle_time_days(at(2024, 1, 1, 0), at(2024, 1, 1, 0) + Duration::milliseconds(1)),
            1
        );
    }

    #[test]
    fn test_cycle_time_same_instant_is_zero() {
        assert_eq!(cycle_time_days(at(2024, 1, 1, 0), at(2024, 1, 1, 0)), 0);
    }

    #[test]
    fn test_cycle_time_clock_skew_clamped() {
        assert_eq!(cycle_time_days(at(2024, 1, 5, 0), at(2024, 1, 1, 0)), 0);
    }

    #[test]
    fn test_lead_time_skips_open_and_missing_update() {
        let mut open = Issue::new("open", "Open", at(2024, 1, 1, 0));
        open.updated_at = Some(at(2024, 1, 2, 0));
        let issues = vec![
            open,
            closed("no-update", at(2024, 1, 1, 0), None),
            closed("a", at(2024, 1, 1, 0), Some(at(2024, 1, 3, 0))),
        ];

        let points = lead_time_points(&issues);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, "a");
        assert_eq!(points[0].cycle_time_days, 2);
        assert_eq!(points[0].title, "Issue a");
        assert_eq!(points[0].closed_at, at(2024, 1, 3, 0));
    }

    #[test]
    fn test_lead_time_ordered_by_close() {
        let issues = vec![
            closed("late", at(2024, 1, 1, 0), Some(at(2024, 2, 1, 0))),
            closed("b", at(2024, 1, 1, 0), Some(at(2024, 1, 10, 0))),
            closed("a", at(2024, 1, 5, 0), Some(at(2024, 1, 10, 0))),
        ];

        let ids: Vec<_> = lead_time_points(&issues).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b", "late"]);
    }

    #[test]
    fn test_percentile_empty_is_zero() {
        assert_eq!(percentile(&[], 0.5), 0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values = [5, 1, 4, 2, 3];
        assert_eq!(percentile(&values, 0.0), 1);
        // floor(5 * 0.5) = 2 -> third smallest
        assert_eq!(percentile(&values, 0.5), 3);
        // floor(5 * 0.85) = 4 -> largest
        assert_eq!(percentile(&values, 0.85), 5);
    }

    #[test]
    fn test_percentile_even_length_not_interpolated() {
        // floor(4 * 0.5) = 2 -> 30, no averaging with 20
        assert_eq!(percentile(&[10, 20, 30, 40], 0.5), 30);
    }

    #[test]
    fn test_percentile_one_is_max() {
        assert_eq!(percentile(&[7, 3, 9], 1.0), 9);
        assert_eq!(percentile(&[7, 3, 9], 2.0), 9);
        assert_eq!(percentile(&[7, 3, 9], -1.0), 3);
    }

    #[test]
    fn test_percentile_monotonic() {
        // Deterministic pseudo-random sequences of varying length.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for len in 1..60 {
            let values: Vec<i64> = (0..len)
                .map(|_| {
                    seed ^= seed << 13;
                    seed ^= seed >> 7;
                    seed ^= seed << 17;
                    (seed % 200) as i64
                })
                .collect();
            let max = *values.iter().max().unwrap();

            let p0 = percentile(&values, 0.0);
            let p50 = percentile(&values, 0.5);
            let p85 = percentile(&values, 0.85);

            assert!(p0 <= p50, "p0 {} > p50 {} for {:?}", p0, p50, values);
            assert!(p50 <= p85, "p50 {} > p85 {} for {:?}", p50, p85, values);
            assert!(p85 <= max, "p85 {} > max {} for {:?}", p85, max, values);
        }
    }
}
