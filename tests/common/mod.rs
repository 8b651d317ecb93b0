//! Common test utilities for flowboard integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/flowboard/` or `~/.config/flowboard/`.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates two temporary directories:
/// - `repo_dir`: The project root (holds `.beads/issues.jsonl`)
/// - `data_dir`: Holds flowboard's state (via `FLOWBOARD_DATA_DIR`) and
///   an empty config home (via `XDG_CONFIG_HOME`)
///
/// The `flowboard()` method returns a `Command` that sets these variables
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub repo_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            repo_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a test environment whose issue log holds `lines`.
    pub fn with_issues(lines: &[&str]) -> Self {
        let env = Self::new();
        env.write_issues(lines);
        env
    }

    /// Get a Command for the flowboard binary with isolated directories.
    pub fn flowboard(&self) -> Command {
        Command::from_std(self.flowboard_std())
    }

    /// Same isolation as a plain std command (for the long-running server).
    pub fn flowboard_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(env!("CARGO_BIN_EXE_flowboard"));
        cmd.current_dir(self.repo_dir.path())
            .env("FLOWBOARD_DATA_DIR", self.state_root())
            .env("XDG_CONFIG_HOME", self.config_home())
            .env_remove("FLOWBOARD_REPO")
            .env_remove("FLOWBOARD_DATA_FILE")
            .env_remove("FLOWBOARD_PORT")
            .env_remove("FLOWBOARD_HOST")
            .env_remove("FLOWBOARD_LOG_FORMAT")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Get the path to the project root.
    pub fn repo_path(&self) -> &Path {
        self.repo_dir.path()
    }

    pub fn beads_dir(&self) -> PathBuf {
        self.repo_dir.path().join(".beads")
    }

    pub fn issues_file(&self) -> PathBuf {
        self.beads_dir().join("issues.jsonl")
    }

    fn state_root(&self) -> PathBuf {
        self.data_dir.path().join("state")
    }

    fn config_home(&self) -> PathBuf {
        self.data_dir.path().join("config")
    }

    /// Replace the issue log with `lines`.
    pub fn write_issues(&self, lines: &[&str]) {
        fs::create_dir_all(self.beads_dir()).unwrap();
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(self.issues_file(), contents).unwrap();
    }

    /// Write the project-level config file.
    pub fn write_project_config(&self, kdl: &str) {
        fs::create_dir_all(self.beads_dir()).unwrap();
        fs::write(self.beads_dir().join("flowboard.kdl"), kdl).unwrap();
    }

    /// Write the system-level config file.
    pub fn write_system_config(&self, kdl: &str) {
        let dir = self.config_home().join("flowboard");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.kdl"), kdl).unwrap();
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a command's stdout as JSON.
pub fn parse_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}",
            e,
            String::from_utf8_lossy(output)
        )
    })
}
