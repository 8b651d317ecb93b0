//! Record store reader for the issue log.
//!
//! The issue log is owned by the external `bd` CLI and lives at
//! `<project>/.beads/issues.jsonl`: one JSON object per line, append-only.
//! flowboard only ever reads it.
//!
//! Reading is partial-failure tolerant: a line that does not parse is logged
//! and skipped, and a missing file reads as zero records.
//!
//! Per-project runtime state (the server PID file) is kept outside the project
//! in `<data_dir>/flowboard/<repo-hash>/` so writing it never wakes the
//! change notifier.

use crate::models::Issue;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;

/// Directory holding the issue log, relative to the project root.
pub const BEADS_DIR: &str = ".beads";

/// Issue log file name inside [`BEADS_DIR`].
pub const ISSUES_FILE: &str = "issues.jsonl";

/// Environment variable overriding the per-project state directory root.
pub const DATA_DIR_ENV: &str = "FLOWBOARD_DATA_DIR";

/// Find the nearest `.beads` directory at or above `start`.
pub fn find_beads_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(BEADS_DIR))
        .find(|candidate| candidate.is_dir())
}

/// Determine the project root for `start`.
///
/// This is the directory containing the nearest `.beads` directory, or
/// `start` itself when none exists yet (the store may be created later).
pub fn find_project_root(start: &Path) -> PathBuf {
    find_beads_dir(start)
        .and_then(|beads| beads.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| start.to_path_buf())
}

/// Resolve the issue log path for a project.
///
/// An explicit path wins; relative paths are taken relative to the project root.
pub fn resolve_data_file(project_root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => project_root.join(path),
        None => project_root.join(BEADS_DIR).join(ISSUES_FILE),
    }
}

/// Get the per-project state directory.
///
/// Layout: `<data_dir>/flowboard/<first 12 hex chars of sha256(canonical root)>`.
/// `FLOWBOARD_DATA_DIR` replaces `<data_dir>/flowboard` for tests.
pub fn state_dir(project_root: &Path) -> Result<PathBuf> {
    let base = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?
            .join("flowboard"),
    };

    let canonical = project_root
        .canonicalize()
        .map_err(|e| Error::Other(format!("Could not canonicalize project path: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());

    Ok(base.join(&hash_hex[..12]))
}

/// Parse a single log line into an issue.
pub fn parse_line(line: &str) -> Result<Issue> {
    Ok(serde_json::from_str::<Issue>(line)?)
}

/// Parse one raw line, logging and discarding it on failure.
///
/// Lines are read as bytes so a line that is not valid UTF-8 is skipped like
/// any other malformed record instead of failing the whole read.
fn accept_line(path: &Path, line_no: usize, raw: &[u8]) -> Option<Issue> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let parsed = std::str::from_utf8(raw)
        .map_err(|e| Error::InvalidInput(e.to_string()))
        .and_then(|line| {
            if line.trim().is_empty() {
                Ok(None)
            } else {
                parse_line(line).map(Some)
            }
        });

    match parsed {
        Ok(issue) => issue,
        Err(e) => {
            tracing::warn!(
                file = %path.display(),
                line = line_no,
                error = %e,
                "skipping malformed issue record"
            );
            None
        }
    }
}

/// Read every well-formed issue from the log, in file order.
///
/// A missing file yields an empty list.
pub fn load_issues(path: &Path) -> Result<Vec<Issue>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut issues = Vec::new();
    for (idx, line) in BufReader::new(file).split(b'\n').enumerate() {
        let line = line?;
        issues.extend(accept_line(path, idx + 1, &line));
    }

    tracing::debug!(file = %path.display(), count = issues.len(), "loaded issues");
    Ok(issues)
}

/// Async counterpart of [`load_issues`], reading the log as a line stream so
/// the runtime stays responsive while large logs are read.
pub async fn load_issues_async(path: &Path) -> Result<Vec<Issue>> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut lines = tokio::io::BufReader::new(file).split(b'\n');
    let mut issues = Vec::new();
    let mut line_no = 0;
    while let Some(line) = lines.next_segment().await? {
        line_no += 1;
        issues.extend(accept_line(path, line_no, &line));
    }

    tracing::debug!(file = %path.display(), count = issues.len(), "loaded issues");
    Ok(issues)
}
