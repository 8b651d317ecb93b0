//! KDL schema for `config.kdl` / `flowboard.kdl`.
//!
//! This module provides:
//! - The Rust struct representing the KDL schema
//! - Serialization/deserialization to/from KDL format
//! - Validation and merging

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default port for the dashboard server.
pub const DEFAULT_PORT: u16 = 3040;

/// Default bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default quiet period before a refresh is broadcast.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Default external CLI used for single-record updates.
pub const DEFAULT_MUTATOR_COMMAND: &str = "bd";

/// Default time allowed for the external CLI to finish.
pub const DEFAULT_MUTATOR_TIMEOUT_SECS: u64 = 30;

/// Dashboard preferences, all optional so files can be layered.
///
/// # KDL Schema
///
/// ```kdl
/// port 3040
/// host "127.0.0.1"
/// data-file ".beads/issues.jsonl"
/// debounce-ms 100
/// mutator-command "bd"
/// mutator-timeout-secs 30
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowboardConfig {
    pub port: Option<u16>,
    pub host: Option<String>,
    /// Issue log path; relative paths are taken from the project root
    pub data_file: Option<PathBuf>,
    pub debounce_ms: Option<u64>,
    pub mutator_command: Option<String>,
    pub mutator_timeout_secs: Option<u64>,
}

fn first_string(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)?
        .entries()
        .first()?
        .value()
        .as_string()
        .map(str::to_string)
}

fn first_integer(doc: &KdlDocument, name: &str) -> Option<i128> {
    doc.get(name)?.entries().first()?.value().as_integer()
}

fn push_node(doc: &mut KdlDocument, name: &str, value: KdlValue) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

impl FlowboardConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(ms) = self.debounce_ms {
            if !(10..=1000).contains(&ms) {
                return Err(format!("debounce-ms must be 10-1000, got {}", ms));
            }
        }
        if let Some(secs) = self.mutator_timeout_secs {
            if secs == 0 {
                return Err("mutator-timeout-secs must be greater than 0".to_string());
            }
        }
        if let Some(ref command) = self.mutator_command {
            if command.trim().is_empty() {
                return Err("mutator-command must not be empty".to_string());
            }
        }
        if let Some(ref host) = self.host {
            if host.parse::<std::net::IpAddr>().is_err() {
                return Err(format!("host must be an IP address, got '{}'", host));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Values with the wrong type or out of range are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            port: first_integer(doc, "port").and_then(|p| u16::try_from(p).ok()),
            host: first_string(doc, "host"),
            data_file: first_string(doc, "data-file").map(PathBuf::from),
            debounce_ms: first_integer(doc, "debounce-ms").and_then(|v| u64::try_from(v).ok()),
            mutator_command: first_string(doc, "mutator-command"),
            mutator_timeout_secs: first_integer(doc, "mutator-timeout-secs")
                .and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(port) = self.port {
            push_node(&mut doc, "port", KdlValue::Integer(port as i128));
        }
        if let Some(ref host) = self.host {
            push_node(&mut doc, "host", KdlValue::String(host.clone()));
        }
        if let Some(ref path) = self.data_file {
            push_node(
                &mut doc,
                "data-file",
                KdlValue::String(path.display().to_string()),
            );
        }
        if let Some(ms) = self.debounce_ms {
            push_node(&mut doc, "debounce-ms", KdlValue::Integer(ms as i128));
        }
        if let Some(ref command) = self.mutator_command {
            push_node(&mut doc, "mutator-command", KdlValue::String(command.clone()));
        }
        if let Some(secs) = self.mutator_timeout_secs {
            push_node(
                &mut doc,
                "mutator-timeout-secs",
                KdlValue::Integer(secs as i128),
            );
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &FlowboardConfig) {
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.host.is_some() {
            self.host = other.host.clone();
        }
        if other.data_file.is_some() {
            self.data_file = other.data_file.clone();
        }
        if other.debounce_ms.is_some() {
            self.debounce_ms = other.debounce_ms;
        }
        if other.mutator_command.is_some() {
            self.mutator_command = other.mutator_command.clone();
        }
        if other.mutator_timeout_secs.is_some() {
            self.mutator_timeout_secs = other.mutator_timeout_secs;
        }
    }

    /// Read and validate a config file. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };

        let doc: KdlDocument = contents
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|msg| Error::Config(format!("{}: {}", path.display(), msg)))?;
        Ok(config)
    }
}
