//! Data models for flowboard.
//!
//! This module defines the issue record read from the JSONL log:
//! - `Issue` - A single tracked item with status, type, priority and timestamps
//! - `IssueStatus` - Closed set of workflow states
//! - `IssueType` - Closed set of item kinds
//! - `Dependency` - Weak reference to another issue
//!
//! Records are read-only here. The external `bd` CLI owns every write.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;
use std::str::FromStr;

/// Issue status in the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Blocked,
    Closed,
    /// Soft-deleted. Excluded from every derived view.
    Tombstone,
    Deferred,
    Pinned,
    Hooked,
}

impl IssueStatus {
    /// All statuses, in workflow order.
    pub const ALL: [IssueStatus; 8] = [
        IssueStatus::Open,
        IssueStatus::InProgress,
        IssueStatus::Blocked,
        IssueStatus::Closed,
        IssueStatus::Tombstone,
        IssueStatus::Deferred,
        IssueStatus::Pinned,
        IssueStatus::Hooked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Blocked => "blocked",
            IssueStatus::Closed => "closed",
            IssueStatus::Tombstone => "tombstone",
            IssueStatus::Deferred => "deferred",
            IssueStatus::Pinned => "pinned",
            IssueStatus::Hooked => "hooked",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, IssueStatus::Closed)
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, IssueStatus::Tombstone)
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Invalid status: {}", s))
    }
}

/// Kind of work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    #[default]
    Task,
    Bug,
    Feature,
    Epic,
    Chore,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Task => "task",
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Epic => "epic",
            IssueType::Chore => "chore",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dependency entry on an issue.
///
/// The log carries either a bare issue ID or an object naming the target via
/// `depends_on_id`. Targets are weak references and are never resolved here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Id(String),
    Link {
        depends_on_id: String,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
}

impl Dependency {
    /// The ID of the issue this entry points at.
    pub fn target(&self) -> &str {
        match self {
            Dependency::Id(id) => id,
            Dependency::Link { depends_on_id, .. } => depends_on_id,
        }
    }
}

/// A single record from the issue log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier (e.g., "bd-a1b2")
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub status: IssueStatus,

    #[serde(default, alias = "type")]
    pub issue_type: IssueType,

    /// Priority level (0-4, 0 is critical)
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Creation timestamp, immutable once written
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(
        default,
        deserialize_with = "deserialize_optional_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Issues this one blocks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<String>,
}

fn default_priority() -> u8 {
    2
}

impl Issue {
    /// Create an open task with the given ID, title and creation time.
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: IssueStatus::Open,
            issue_type: IssueType::Task,
            priority: default_priority(),
            created_at,
            updated_at: None,
            assignee: None,
            labels: Vec::new(),
            dependencies: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// IDs of the issues this one depends on.
    pub fn dependency_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(Dependency::target)
    }
}

/// Parse a timestamp as written by the issue log.
///
/// Accepts RFC 3339 (any offset), naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as
/// UTC), and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw))),
    }
}
