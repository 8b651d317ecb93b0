//! Precedence resolution for dashboard configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (and the environment variables clap maps onto them)
//! 2. Project config (`<project>/.beads/flowboard.kdl`)
//! 3. System config (`~/.config/flowboard/config.kdl`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;
use crate::config::schema::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_HOST, DEFAULT_MUTATOR_COMMAND, DEFAULT_MUTATOR_TIMEOUT_SECS,
    DEFAULT_PORT, FlowboardConfig,
};
use crate::storage::{self, BEADS_DIR};

/// File name of the project-level config inside `.beads/`.
pub const PROJECT_CONFIG_FILE: &str = "flowboard.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag or its environment variable
    CliFlag,
    /// Value from the project config file
    Project,
    /// Value from the system config file
    System,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Project => write!(f, "project"),
            ValueSource::System => write!(f, "system"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub data_file: Option<PathBuf>,
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Directory that contains (or will contain) `.beads/`
    pub project_root: PathBuf,
    pub port: Resolved<u16>,
    pub host: Resolved<String>,
    /// Absolute path of the issue log
    pub data_file: Resolved<PathBuf>,
    pub debounce_ms: Resolved<u64>,
    pub mutator_command: Resolved<String>,
    pub mutator_timeout_secs: Resolved<u64>,
}

impl ResolvedConfig {
    /// Defaults for a project, before any file or flag is applied.
    pub fn defaults(project_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            port: Resolved::new(DEFAULT_PORT, ValueSource::Default),
            host: Resolved::new(DEFAULT_HOST.to_string(), ValueSource::Default),
            data_file: Resolved::new(
                storage::resolve_data_file(project_root, None),
                ValueSource::Default,
            ),
            debounce_ms: Resolved::new(DEFAULT_DEBOUNCE_MS, ValueSource::Default),
            mutator_command: Resolved::new(
                DEFAULT_MUTATOR_COMMAND.to_string(),
                ValueSource::Default,
            ),
            mutator_timeout_secs: Resolved::new(
                DEFAULT_MUTATOR_TIMEOUT_SECS,
                ValueSource::Default,
            ),
        }
    }

    /// Directory holding the issue log; this is what the change notifier watches.
    pub fn store_dir(&self) -> PathBuf {
        self.data_file
            .value
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project_root.clone())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.value)
    }

    pub fn mutator_timeout(&self) -> Duration {
        Duration::from_secs(self.mutator_timeout_secs.value)
    }
}

/// Path of the system-level config file, if a config directory exists.
pub fn system_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("flowboard").join("config.kdl"))
}

/// Path of the project-level config file.
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(BEADS_DIR).join(PROJECT_CONFIG_FILE)
}

/// Pick the highest-precedence value that is set.
fn pick<T: Clone>(
    flag: Option<&T>,
    project: Option<&T>,
    system: Option<&T>,
    fallback: Resolved<T>,
) -> Resolved<T> {
    if let Some(value) = flag {
        Resolved::new(value.clone(), ValueSource::CliFlag)
    } else if let Some(value) = project {
        Resolved::new(value.clone(), ValueSource::Project)
    } else if let Some(value) = system {
        Resolved::new(value.clone(), ValueSource::System)
    } else {
        fallback
    }
}

/// Resolve configuration from already-loaded layers.
pub fn resolve_layers(
    project_root: &Path,
    system: &FlowboardConfig,
    project: &FlowboardConfig,
    overrides: &ConfigOverrides,
) -> ResolvedConfig {
    let defaults = ResolvedConfig::defaults(project_root);

    let data_file = pick(
        overrides.data_file.as_ref(),
        project.data_file.as_ref(),
        system.data_file.as_ref(),
        defaults.data_file,
    );
    let data_file = Resolved::new(
        storage::resolve_data_file(project_root, Some(&data_file.value)),
        data_file.source,
    );

    ResolvedConfig {
        project_root: project_root.to_path_buf(),
        port: pick(
            overrides.port.as_ref(),
            project.port.as_ref(),
            system.port.as_ref(),
            defaults.port,
        ),
        host: pick(
            overrides.host.as_ref(),
            project.host.as_ref(),
            system.host.as_ref(),
            defaults.host,
        ),
        data_file,
        debounce_ms: pick(
            None,
            project.debounce_ms.as_ref(),
            system.debounce_ms.as_ref(),
            defaults.debounce_ms,
        ),
        mutator_command: pick(
            None,
            project.mutator_command.as_ref(),
            system.mutator_command.as_ref(),
            defaults.mutator_command,
        ),
        mutator_timeout_secs: pick(
            None,
            project.mutator_timeout_secs.as_ref(),
            system.mutator_timeout_secs.as_ref(),
            defaults.mutator_timeout_secs,
        ),
    }
}

/// Load the config files for `project_root` and resolve them with `overrides`.
pub fn resolve_config(project_root: &Path, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let system = match system_config_path() {
        Some(path) => FlowboardConfig::load(&path)?,
        None => FlowboardConfig::new(),
    };
    let project = FlowboardConfig::load(&project_config_path(project_root))?;

    Ok(resolve_layers(project_root, &system, &project, overrides))
}
