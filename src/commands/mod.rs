//! Command implementations for the flowboard CLI.
//!
//! Each command returns a result type implementing [`Output`], so `main`
//! decides between JSON (the default) and human-readable text.
//! - `metrics` - Flow metrics snapshot
//! - `issues` - Parsed issue records
//! - `status` / `stop` - Dashboard server lifecycle
//! - `config` - Resolved configuration with value sources

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::ResolvedConfig;
use crate::gui::{ProcessStatus, ServerPidFile};
use crate::metrics::{Metrics, get_metrics};
use crate::models::{Issue, parse_timestamp};
use crate::storage::{load_issues, state_dir};
use crate::{Error, Result};

/// How long `stop` waits after SIGTERM before escalating.
pub const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
}

// === metrics ===

#[derive(Debug, Serialize)]
pub struct MetricsReport {
    pub metrics: Option<Metrics>,
    #[serde(skip)]
    pub now: DateTime<Utc>,
}

impl Output for MetricsReport {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let Some(m) = &self.metrics else {
            return "No issues found.".to_string();
        };

        let mut lines = vec![
            format!("Flow metrics as of {}", self.now.format("%Y-%m-%d %H:%M UTC")),
            String::new(),
            format!(
                "Cycle time: p50 {}d, p85 {}d ({} closed)",
                m.p50,
                m.p85,
                m.closed_count()
            ),
            format!(
                "Work in progress: {} (average age {})",
                m.open_count(),
                m.avg_age_display
            ),
            String::new(),
            "Age distribution:".to_string(),
        ];
        for bucket in &m.age_distribution {
            lines.push(format!("  {:>6}  {}", bucket.label, bucket.count));
        }

        if !m.aging_wip.is_empty() {
            lines.push(String::new());
            lines.push("Oldest work in progress:".to_string());
            for point in m.aging_wip.iter().take(10) {
                lines.push(format!(
                    "  {:<12} {:>4}d  {:<6}  {}",
                    point.id,
                    point.age_days,
                    point.tier.as_str(),
                    point.title
                ));
            }
        }

        if let (Some(first), Some(last)) = (m.cumulative_flow.first(), m.cumulative_flow.last()) {
            lines.push(String::new());
            lines.push(format!(
                "Cumulative flow: {} to {}, {} open / {} closed",
                first.date, last.date, last.open, last.closed
            ));
        }

        lines.join("\n")
    }
}

/// Compute the snapshot for the configured issue log.
///
/// `now` overrides the evaluation time (RFC 3339 or `YYYY-MM-DD`).
pub fn metrics(config: &ResolvedConfig, now: Option<&str>) -> Result<MetricsReport> {
    let now = match now {
        Some(raw) => parse_timestamp(raw)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid timestamp: {}", raw)))?,
        None => Utc::now(),
    };
    let issues = load_issues(&config.data_file.value)?;

    Ok(MetricsReport {
        metrics: get_metrics(&issues, now),
        now,
    })
}

// === issues ===

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct IssueList {
    pub issues: Vec<Issue>,
}

impl Output for IssueList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.issues.is_empty() {
            return "No issues found.".to_string();
        }

        let mut lines = vec![format!("{} issue(s):", self.issues.len()), String::new()];
        for issue in &self.issues {
            lines.push(format!(
                "  {:<12} P{} {:<12} {:<8} {}",
                issue.id,
                issue.priority,
                issue.status.as_str(),
                issue.issue_type.as_str(),
                issue.title
            ));
        }
        lines.join("\n")
    }
}

pub fn issues(config: &ResolvedConfig) -> Result<IssueList> {
    Ok(IssueList {
        issues: load_issues(&config.data_file.value)?,
    })
}

// === status / stop ===

#[derive(Debug, Serialize)]
pub struct ServerStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Output for ServerStatus {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match (self.status, self.pid) {
            ("running", Some(pid)) => format!(
                "Dashboard is running\n  PID:  {}\n  URL:  {}",
                pid,
                self.url.as_deref().unwrap_or("-")
            ),
            ("stale", Some(pid)) => format!(
                "Dashboard is not running (stale PID file for PID {})",
                pid
            ),
            _ => "Dashboard is not running".to_string(),
        }
    }
}

fn pid_file_for(project_root: &Path) -> Result<ServerPidFile> {
    Ok(ServerPidFile::new(&state_dir(project_root)?))
}

/// Report the dashboard server recorded for this project.
pub fn server_status(project_root: &Path) -> Result<ServerStatus> {
    let pid_file = pid_file_for(project_root)?;
    Ok(match pid_file.check_running()? {
        Some((status, info)) => ServerStatus {
            status: status.as_str(),
            pid: Some(info.pid),
            port: Some(info.port),
            url: Some(info.url()),
            host: Some(info.host),
        },
        None => ServerStatus {
            status: "not_running",
            pid: None,
            port: None,
            host: None,
            url: None,
        },
    })
}

#[derive(Debug, Serialize)]
pub struct StopResult {
    pub status: &'static str,
    pub pid: u32,
    /// `sigterm`, `sigkill`, or `stale` when only a leftover PID file was removed
    pub method: &'static str,
}

impl Output for StopResult {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match self.method {
            "sigterm" => format!("Dashboard (PID {}) stopped gracefully", self.pid),
            "sigkill" => format!("Dashboard (PID {}) forcefully terminated", self.pid),
            _ => format!("Removed stale PID file (PID {} was not running)", self.pid),
        }
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => kill(Pid::from_raw(raw), signal).is_ok(),
        _ => false,
    }
}

/// Stop the dashboard server recorded for this project.
///
/// Sends SIGTERM and waits up to [`GRACEFUL_TIMEOUT`] before SIGKILL.
/// With `force`, SIGKILL is sent straight away.
#[cfg(unix)]
pub fn stop_server(project_root: &Path, force: bool) -> Result<StopResult> {
    use nix::sys::signal::Signal;

    let pid_file = pid_file_for(project_root)?;
    let (status, info) = pid_file.check_running()?.ok_or(Error::NotRunning)?;
    let pid = info.pid;

    if status == ProcessStatus::Stale {
        pid_file.delete()?;
        return Ok(StopResult {
            status: "not_running",
            pid,
            method: "stale",
        });
    }

    let method = if force {
        send_signal(pid, Signal::SIGKILL);
        "sigkill"
    } else if !send_signal(pid, Signal::SIGTERM) {
        "stale"
    } else if wait_for_exit(&pid_file, pid, GRACEFUL_TIMEOUT) {
        "sigterm"
    } else {
        tracing::warn!(pid, "graceful shutdown timed out, sending SIGKILL");
        send_signal(pid, Signal::SIGKILL);
        "sigkill"
    };

    if method == "sigkill" {
        wait_for_exit(&pid_file, pid, Duration::from_millis(500));
    }
    pid_file.delete()?;

    Ok(StopResult {
        status: "stopped",
        pid,
        method,
    })
}

#[cfg(not(unix))]
pub fn stop_server(_project_root: &Path, _force: bool) -> Result<StopResult> {
    Err(Error::Other(
        "stop is only supported on unix platforms".to_string(),
    ))
}

/// Poll until the server is gone or `timeout` elapses. Returns true once it is gone.
///
/// A server that shuts down cleanly removes its own PID file, so a missing
/// file counts as gone even while the process is still being reaped.
#[cfg(unix)]
fn wait_for_exit(pid_file: &ServerPidFile, pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match pid_file.check_running() {
            Ok(Some((ProcessStatus::Running, info))) if info.pid == pid => {}
            _ => return true,
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

// === config ===

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub project_root: String,
    pub values: Vec<ConfigEntry>,
}

impl Output for ConfigReport {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Project root: {}", self.project_root), String::new()];
        for entry in &self.values {
            lines.push(format!(
                "  {:<22} {:<32} ({})",
                entry.key, entry.value, entry.source
            ));
        }
        lines.join("\n")
    }
}

pub fn config_report(config: &ResolvedConfig) -> ConfigReport {
    fn entry<T: ToString>(key: &'static str, value: &T, source: impl ToString) -> ConfigEntry {
        ConfigEntry {
            key,
            value: value.to_string(),
            source: source.to_string(),
        }
    }

    ConfigReport {
        project_root: config.project_root.display().to_string(),
        values: vec![
            entry("port", &config.port.value, config.port.source),
            entry("host", &config.host.value, config.host.source),
            entry(
                "data-file",
                &config.data_file.value.display(),
                config.data_file.source,
            ),
            entry(
                "debounce-ms",
                &config.debounce_ms.value,
                config.debounce_ms.source,
            ),
            entry(
                "mutator-command",
                &config.mutator_command.value,
                config.mutator_command.source,
            ),
            entry(
                "mutator-timeout-secs",
                &config.mutator_timeout_secs.value,
                config.mutator_timeout_secs.source,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValueSource;
    use std::fs;
    use tempfile::TempDir;

    fn project_with(log: &str) -> (TempDir, ResolvedConfig) {
        let dir = TempDir::new().unwrap();
        let beads = dir.path().join(".beads");
        fs::create_dir(&beads).unwrap();
        fs::write(beads.join("issues.jsonl"), log).unwrap();
        let config = ResolvedConfig::defaults(dir.path());
        (dir, config)
    }

    #[test]
    fn test_metrics_report_empty_is_null() {
        let (_dir, config) = project_with("");
        let report = metrics(&config, Some("2024-01-01")).unwrap();
        assert_eq!(report.to_json(), r#"{"metrics":null}"#);
        assert_eq!(report.to_human(), "No issues found.");
    }

    #[test]
    fn test_metrics_report_human() {
        let (_dir, config) = project_with(concat!(
            r#"{"id":"bd-1","title":"Ship it","status":"in_progress","created_at":"2024-01-01T00:00:00Z"}"#,
            "\n"
        ));
        let report = metrics(&config, Some("2024-02-10T00:00:00Z")).unwrap();
        let human = report.to_human();

        assert!(human.contains("Work in progress: 1"), "{}", human);
        assert!(human.contains("30d+"), "{}", human);
        assert!(human.contains("bd-1"), "{}", human);
    }

    #[test]
    fn test_metrics_bad_now() {
        let (_dir, config) = project_with("");
        assert!(matches!(
            metrics(&config, Some("soon")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_issue_list_json_is_array() {
        let (_dir, config) = project_with(concat!(
            r#"{"id":"bd-1","title":"A","created_at":"2024-01-01"}"#,
            "\n",
            "garbage\n",
        ));
        let list = issues(&config).unwrap();
        let json: serde_json::Value = serde_json::from_str(&list.to_json()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert!(list.to_human().contains("bd-1"));
    }

    #[test]
    fn test_config_report_sources() {
        let dir = TempDir::new().unwrap();
        let mut config = ResolvedConfig::defaults(dir.path());
        config.port = crate::config::Resolved::new(4000, ValueSource::CliFlag);

        let report = config_report(&config);
        let port = report.values.iter().find(|e| e.key == "port").unwrap();
        assert_eq!(port.value, "4000");
        assert_eq!(port.source, "cli");
        let host = report.values.iter().find(|e| e.key == "host").unwrap();
        assert_eq!(host.source, "default");
        assert!(report.to_human().contains("mutator-command"));
    }

    #[test]
    fn test_server_status_human() {
        let status = ServerStatus {
            status: "running",
            pid: Some(42),
            port: Some(3040),
            host: Some("127.0.0.1".to_string()),
            url: Some("http://127.0.0.1:3040".to_string()),
        };
        assert!(status.to_human().contains("http://127.0.0.1:3040"));
        assert_eq!(
            status.to_json(),
            r#"{"status":"running","pid":42,"port":3040,"host":"127.0.0.1","url":"http://127.0.0.1:3040"}"#
        );
    }
}
