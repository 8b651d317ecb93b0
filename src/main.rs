//! flowboard CLI - live flow metrics for a local issue log.

use clap::Parser;
use flowboard::cli::{Cli, Commands};
use flowboard::commands::{self, Output};
use flowboard::config::{ConfigOverrides, resolve_config};
use flowboard::storage::find_project_root;
use std::env;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;
    flowboard::logging::init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Resolve the directory to start project detection from.
///
/// Priority: --repo flag > FLOWBOARD_REPO env var > current working directory.
/// An explicit path must exist.
fn resolve_start_dir(explicit_path: Option<PathBuf>) -> Result<PathBuf, flowboard::Error> {
    match explicit_path {
        Some(path) if path.is_dir() => Ok(path),
        Some(path) => Err(flowboard::Error::InvalidInput(format!(
            "Specified repo path does not exist: {}",
            path.display()
        ))),
        None => Ok(env::current_dir()?),
    }
}

fn run(cli: Cli) -> Result<(), flowboard::Error> {
    let human = cli.human_readable;
    let project_root = find_project_root(&resolve_start_dir(cli.repo_path)?);
    let mut overrides = ConfigOverrides {
        data_file: cli.data_file,
        ..ConfigOverrides::default()
    };

    match cli.command {
        #[cfg(feature = "gui")]
        Some(Commands::Serve {
            port,
            host,
            replace,
        }) => {
            overrides.port = port;
            overrides.host = host;
            run_serve(resolve_config(&project_root, &overrides)?, replace, human)
        }
        None => run_default(&project_root, &overrides, human),
        Some(Commands::Metrics { now }) => {
            let config = resolve_config(&project_root, &overrides)?;
            output(&commands::metrics(&config, now.as_deref())?, human);
            Ok(())
        }
        Some(Commands::Issues) => {
            let config = resolve_config(&project_root, &overrides)?;
            output(&commands::issues(&config)?, human);
            Ok(())
        }
        Some(Commands::Status) => {
            output(&commands::server_status(&project_root)?, human);
            Ok(())
        }
        Some(Commands::Stop { force }) => {
            output(&commands::stop_server(&project_root, force)?, human);
            Ok(())
        }
        Some(Commands::Config) => {
            let config = resolve_config(&project_root, &overrides)?;
            output(&commands::config_report(&config), human);
            Ok(())
        }
    }
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

#[cfg(feature = "gui")]
fn run_default(
    project_root: &Path,
    overrides: &ConfigOverrides,
    human: bool,
) -> Result<(), flowboard::Error> {
    run_serve(resolve_config(project_root, overrides)?, false, human)
}

#[cfg(not(feature = "gui"))]
fn run_default(
    _project_root: &Path,
    _overrides: &ConfigOverrides,
    _human: bool,
) -> Result<(), flowboard::Error> {
    Err(flowboard::Error::Other(
        "flowboard was built without the 'gui' feature; try 'flowboard metrics'".to_string(),
    ))
}

/// Run the dashboard server until it is interrupted.
#[cfg(feature = "gui")]
fn run_serve(
    mut config: flowboard::config::ResolvedConfig,
    replace: bool,
    human: bool,
) -> Result<(), flowboard::Error> {
    use flowboard::config::ValueSource;
    use flowboard::gui::{ProcessStatus, ServerPidFile, ServerPidInfo, find_available_port};
    use flowboard::storage::state_dir;

    let pid_file = ServerPidFile::new(&state_dir(&config.project_root)?);

    // Check if another server is already running for this project
    if let Some((status, info)) = pid_file.check_running()? {
        match status {
            ProcessStatus::Running if replace => {
                let stopped = commands::stop_server(&config.project_root, false)?;
                tracing::info!(pid = stopped.pid, "stopped previous dashboard");
            }
            ProcessStatus::Running => {
                return Err(flowboard::Error::Other(format!(
                    "Dashboard already running (pid: {}, url: {}). Use 'flowboard stop' first, or --replace to restart.",
                    info.pid,
                    info.url()
                )));
            }
            ProcessStatus::Stale => pid_file.delete()?,
        }
    }

    // An unconfigured port falls forward to the next free one
    if config.port.source == ValueSource::Default {
        config.port.value =
            find_available_port(&config.host.value, config.port.value).ok_or_else(|| {
                flowboard::Error::Other(format!(
                    "Could not find an available port on {} starting from {}",
                    config.host.value, config.port.value
                ))
            })?;
    }

    let pid_info = ServerPidInfo::current(&config.host.value, config.port.value);
    pid_file.write(&pid_info)?;

    if human {
        println!("flowboard dashboard at {}", pid_info.url());
        println!("Press Ctrl+C to stop");
    }

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| flowboard::Error::Other(format!("Failed to create runtime: {}", e)))
        .and_then(|runtime| runtime.block_on(flowboard::gui::start_server(&config)));

    // Clean up PID file on shutdown (whether success or error)
    pid_file.delete().ok();

    result
}
