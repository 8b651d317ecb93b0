//! CLI argument definitions for flowboard.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Version string with the build commit and timestamp.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("FLOWBOARD_GIT_COMMIT"),
    " ",
    env!("FLOWBOARD_BUILD_TIMESTAMP"),
    ")"
);

/// flowboard - live flow metrics for a local issue log.
///
/// Run with no command to start the dashboard.
#[derive(Parser, Debug)]
#[command(name = "flowboard")]
#[command(author, version, long_version = LONG_VERSION, about = "A live flow-metrics dashboard over a local JSONL issue log", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if flowboard was started in <path> instead of the current directory.
    /// The project root is the nearest ancestor holding a `.beads` directory.
    #[arg(short = 'C', long = "repo", global = true, env = "FLOWBOARD_REPO")]
    pub repo_path: Option<PathBuf>,

    /// Issue log to read (default: .beads/issues.jsonl under the project root)
    #[arg(long, global = true, env = "FLOWBOARD_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the dashboard server (default when no command is given)
    #[cfg(feature = "gui")]
    Serve {
        /// Port to listen on (default: 3040, or the next free port)
        #[arg(short, long, env = "FLOWBOARD_PORT")]
        port: Option<u16>,

        /// Host address to bind to (use 0.0.0.0 for network access)
        #[arg(long, env = "FLOWBOARD_HOST")]
        host: Option<String>,

        /// Stop any running server for this project first
        #[arg(long)]
        replace: bool,
    },

    /// Print the flow metrics snapshot
    Metrics {
        /// Evaluate ages as of this time (RFC 3339 or YYYY-MM-DD) instead of now
        #[arg(long)]
        now: Option<String>,
    },

    /// Print the parsed issue records
    Issues,

    /// Show whether a dashboard server is running for this project
    Status,

    /// Stop the running dashboard server (SIGTERM, then SIGKILL after 5s)
    Stop {
        /// Send SIGKILL immediately
        #[arg(long)]
        force: bool,
    },

    /// Show the resolved configuration and where each value came from
    Config,
}
