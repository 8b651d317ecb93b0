//! Bridge to the external issue CLI for single-record updates.
//!
//! flowboard never writes the issue log. An edit from the dashboard runs
//! `<command> update <id> --description <body>` in the project root and
//! waits for it with a timeout; the resulting file change reaches clients
//! through the change notifier like any other edit.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

use crate::config::ResolvedConfig;
use crate::{Error, Result};

/// Longest stderr excerpt carried into an error message.
const MAX_STDERR_CHARS: usize = 500;

/// Runs the external CLI that owns the issue log.
#[derive(Debug, Clone)]
pub struct IssueMutator {
    program: String,
    project_root: PathBuf,
    timeout: Duration,
}

/// Reject IDs that are empty, could be read as a flag, or carry odd characters.
pub fn validate_issue_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidInput("Issue ID must not be empty".to_string()));
    }
    if id.starts_with('-') {
        return Err(Error::InvalidInput(format!(
            "Issue ID must not start with '-': {}",
            id
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return Err(Error::InvalidInput(format!("Invalid issue ID: {}", id)));
    }
    Ok(())
}

impl IssueMutator {
    pub fn new(program: impl Into<String>, project_root: &Path, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            project_root: project_root.to_path_buf(),
            timeout,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            config.mutator_command.value.clone(),
            &config.project_root,
            config.mutator_timeout(),
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the external CLI for a description update.
    pub fn update_args(id: &str, description: &str) -> Vec<String> {
        vec![
            "update".to_string(),
            id.to_string(),
            "--description".to_string(),
            description.to_string(),
        ]
    }

    /// Replace an issue's description through the external CLI.
    ///
    /// Blocks until the command exits or the timeout elapses; a command still
    /// running at the deadline is killed.
    pub fn update_description(&self, id: &str, description: &str) -> Result<()> {
        validate_issue_id(id)?;

        let mut child = Command::new(&self.program)
            .args(Self::update_args(id, description))
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Mutator(format!("failed to start '{}': {}", self.program, e)))?;

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(program = %self.program, id, "mutator timed out");
                return Err(Error::Mutator(format!(
                    "'{}' did not finish within {}s",
                    self.program,
                    self.timeout.as_secs_f64()
                )));
            }
        };

        if status.success() {
            tracing::info!(program = %self.program, id, "issue updated");
            return Ok(());
        }

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        let excerpt: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();

        Err(Error::Mutator(if excerpt.is_empty() {
            format!("'{}' exited with {}", self.program, status)
        } else {
            format!("'{}' exited with {}: {}", self.program, status, excerpt)
        }))
    }
}
