//! Configuration for flowboard.
//!
//! Preferences live in KDL files at two levels:
//! - System: `~/.config/flowboard/config.kdl`
//! - Project: `<project>/.beads/flowboard.kdl`
//!
//! Keys:
//! - `port` / `host` - Dashboard bind address
//! - `data-file` - Issue log path (default `.beads/issues.jsonl`)
//! - `debounce-ms` - Quiet period before a refresh is pushed
//! - `mutator-command` / `mutator-timeout-secs` - External CLI for updates
//!
//! ## Precedence
//!
//! CLI flag > project config > system config > defaults.
//!
//! Use the [`resolver`] module for unified precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, PROJECT_CONFIG_FILE, Resolved, ResolvedConfig, ValueSource,
    project_config_path, resolve_config, resolve_layers, system_config_path,
};
pub use schema::{DEFAULT_HOST, DEFAULT_PORT, FlowboardConfig};
