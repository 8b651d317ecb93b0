//! Cumulative flow timeline.
//!
//! Produces one point per calendar day (UTC) from the earliest date any issue
//! references through today. Days without activity are filled in so the
//! stacked-area chart has no gaps.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Issue;

/// One day of the cumulative flow diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPoint {
    pub date: NaiveDate,
    /// Issues created on this day
    pub created: u64,
    /// Running created minus running closed. Signed: a close stamped before
    /// its creation day (clock skew) can drive it below zero for a while.
    pub open: i64,
    /// Issues closed so far
    pub closed: u64,
    /// Issues closed on this day
    pub throughput: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct DayActivity {
    created: u64,
    closed: u64,
}

/// Bucket creations and closes by UTC calendar day.
///
/// Every issue contributes its creation day. Closed issues with an update
/// timestamp also contribute a close on the update's day.
fn daily_activity<'a, I>(issues: I) -> BTreeMap<NaiveDate, DayActivity>
where
    I: IntoIterator<Item = &'a Issue>,
{
    let mut activity: BTreeMap<NaiveDate, DayActivity> = BTreeMap::new();

    for issue in issues {
        activity
            .entry(issue.created_at.date_naive())
            .or_default()
            .created += 1;

        if issue.status.is_closed() {
            if let Some(updated) = issue.updated_at {
                activity.entry(updated.date_naive()).or_default().closed += 1;
            }
        }
    }

    activity
}

/// Build the gap-free daily timeline through `now`'s date.
///
/// Empty when there are no issues, or when every referenced date is after
/// today.
pub fn cumulative_flow<'a, I>(issues: I, now: DateTime<Utc>) -> Vec<FlowPoint>
where
    I: IntoIterator<Item = &'a Issue>,
{
    let activity = daily_activity(issues);
    let Some(&earliest) = activity.keys().next() else {
        return Vec::new();
    };
    let today = now.date_naive();

    let mut timeline = Vec::new();
    let mut running_created: u64 = 0;
    let mut running_closed: u64 = 0;

    for date in earliest.iter_days().take_while(|d| *d <= today) {
        let day = activity.get(&date).copied().unwrap_or_default();
        running_created += day.created;
        running_closed += day.closed;

        timeline.push(FlowPoint {
            date,
            created: day.created,
            open: running_created as i64 - running_closed as i64,
            closed: running_closed,
            throughput: day.closed,
        });
    }

    timeline
}
