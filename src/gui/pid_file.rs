//! PID file for the dashboard server.
//!
//! `flowboard serve` records its process in the per-project state directory so
//! `flowboard status` and `flowboard stop` can find it later. The file lives
//! outside `.beads/` on purpose: writing it must not wake the change notifier.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name inside the state directory.
pub const PID_FILE_NAME: &str = "server.pid";

/// What a running server wrote about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPidInfo {
    pub pid: u32,
    pub port: u16,
    pub host: String,
}

impl ServerPidInfo {
    /// Info for the current process.
    pub fn current(host: &str, port: u16) -> Self {
        Self {
            pid: std::process::id(),
            port,
            host: host.to_string(),
        }
    }

    /// Browser URL for the recorded address.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Liveness of a recorded PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// The file exists but its process is gone.
    Stale,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Stale => "stale",
        }
    }
}

/// Check whether a process with this PID exists.
///
/// Signal 0 probes without delivering anything. `EPERM` means the process
/// exists but belongs to someone else.
#[cfg(unix)]
pub fn verify_process(pid: u32) -> ProcessStatus {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return ProcessStatus::Stale;
    };
    if raw <= 0 {
        return ProcessStatus::Stale;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => ProcessStatus::Running,
        Err(_) => ProcessStatus::Stale,
    }
}

#[cfg(not(unix))]
pub fn verify_process(_pid: u32) -> ProcessStatus {
    ProcessStatus::Running
}

/// The server PID file, one per project.
///
/// Plain `KEY=value` lines:
/// ```text
/// PID=12345
/// PORT=3040
/// HOST=127.0.0.1
/// ```
#[derive(Debug)]
pub struct ServerPidFile {
    path: PathBuf,
}

impl ServerPidFile {
    /// PID file inside `state_dir` (see [`crate::storage::state_dir`]).
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(PID_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `info`, creating the state directory if needed.
    pub fn write(&self, info: &ServerPidInfo) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = format!("PID={}\nPORT={}\nHOST={}\n", info.pid, info.port, info.host);

        let mut file = fs::File::create(&self.path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        Ok(())
    }

    /// `Ok(None)` when no file exists; `InvalidData` when it cannot be parsed.
    pub fn read(&self) -> io::Result<Option<ServerPidInfo>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Self::parse_contents(&contents).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove the file. Missing is not an error.
    pub fn delete(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the file and probe the recorded process.
    pub fn check_running(&self) -> io::Result<Option<(ProcessStatus, ServerPidInfo)>> {
        Ok(self.read()?.map(|info| (verify_process(info.pid), info)))
    }

    fn parse_contents(contents: &str) -> io::Result<ServerPidInfo> {
        let invalid = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_string());

        let mut pid: Option<u32> = None;
        let mut port: Option<u16> = None;
        let mut host: Option<String> = None;

        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "PID" => pid = Some(value.parse().map_err(|_| invalid("Invalid PID value"))?),
                "PORT" => port = Some(value.parse().map_err(|_| invalid("Invalid PORT value"))?),
                "HOST" => host = Some(value.to_string()),
                _ => {} // newer writers may add keys
            }
        }

        Ok(ServerPidInfo {
            pid: pid.ok_or_else(|| invalid("Missing PID field"))?,
            port: port.ok_or_else(|| invalid("Missing PORT field"))?,
            host: host.ok_or_else(|| invalid("Missing HOST field"))?,
        })
    }
}
