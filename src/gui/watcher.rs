//! File system watcher for issue log changes.
//!
//! Any create/modify/remove event under the store directory schedules a
//! `reload` broadcast once events have been quiet for the debounce window.
//!
//! When the store directory does not exist yet, the parent directory is
//! watched instead. As soon as the store appears, the watch moves onto it and
//! one `reload` is sent so clients retry.

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::protocol::ServerMessage;

/// Send a reload to every connected client. Having no clients is fine.
fn broadcast_reload(update_tx: &broadcast::Sender<String>) {
    match update_tx.send(ServerMessage::reload_now().to_json()) {
        Ok(receivers) => tracing::debug!(receivers, "broadcast reload"),
        Err(_) => tracing::debug!("reload skipped, no clients connected"),
    }
}

fn is_mutation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Handle to a running watcher. Dropping it stops watching.
#[derive(Debug)]
pub struct ChangeNotifier {
    task: JoinHandle<()>,
    bootstrapping: bool,
}

impl ChangeNotifier {
    /// Start watching `store_dir` and broadcasting reloads on `update_tx`.
    ///
    /// The watch is registered before this returns, so changes made
    /// afterwards are seen. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns the underlying `notify` error when the watch cannot be set up
    /// (for example when neither the store nor its parent exists).
    pub fn start(
        store_dir: &Path,
        update_tx: broadcast::Sender<String>,
        debounce: Duration,
    ) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel(100);

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            },
            Config::default(),
        )?;

        let store_dir = store_dir.to_path_buf();
        let awaiting_parent = if store_dir.is_dir() {
            watcher.watch(&store_dir, RecursiveMode::Recursive)?;
            tracing::info!(store = %store_dir.display(), "watching store directory");
            None
        } else {
            let parent = parent_to_watch(&store_dir);
            watcher.watch(&parent, RecursiveMode::NonRecursive)?;
            tracing::info!(
                store = %store_dir.display(),
                parent = %parent.display(),
                "store directory missing, waiting for it to appear"
            );
            Some(parent)
        };
        let bootstrapping = awaiting_parent.is_some();

        let task = tokio::spawn(run_loop(
            watcher,
            rx,
            store_dir,
            awaiting_parent,
            update_tx,
            debounce,
        ));

        Ok(Self {
            task,
            bootstrapping,
        })
    }

    /// Whether the watcher started out waiting for the store to be created.
    pub fn started_bootstrapping(&self) -> bool {
        self.bootstrapping
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Directory to watch while `store_dir` does not exist. A bare relative
/// name has an empty parent, which means the current directory.
fn parent_to_watch(store_dir: &Path) -> PathBuf {
    store_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}

/// Move the watch from `parent` onto the newly created store directory.
fn attach_store(watcher: &mut RecommendedWatcher, store_dir: &Path, parent: &Path) -> bool {
    match watcher.watch(store_dir, RecursiveMode::Recursive) {
        Ok(()) => {
            if let Err(e) = watcher.unwatch(parent) {
                tracing::debug!(parent = %parent.display(), error = %e, "could not unwatch parent");
            }
            tracing::info!(store = %store_dir.display(), "store directory appeared, watching it");
            true
        }
        Err(e) => {
            tracing::warn!(store = %store_dir.display(), error = %e, "could not watch store directory");
            false
        }
    }
}

async fn run_loop(
    mut watcher: RecommendedWatcher,
    mut rx: mpsc::Receiver<Event>,
    store_dir: PathBuf,
    mut awaiting_parent: Option<PathBuf>,
    update_tx: broadcast::Sender<String>,
    debounce: Duration,
) {
    // Debounce state: track when we last saw a relevant event
    let mut pending_update = false;
    let mut last_event_time = Instant::now();

    loop {
        let timeout = if pending_update {
            debounce.saturating_sub(last_event_time.elapsed())
        } else {
            // No pending update, wait indefinitely for next event
            Duration::from_secs(3600)
        };

        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    break; // Channel closed
                };

                if let Some(parent) = &awaiting_parent {
                    if store_dir.is_dir() && attach_store(&mut watcher, &store_dir, parent) {
                        awaiting_parent = None;
                        broadcast_reload(&update_tx);
                    }
                    continue;
                }

                if is_mutation(&event.kind) {
                    tracing::debug!(kind = ?event.kind, paths = ?event.paths, "store changed");
                    pending_update = true;
                    last_event_time = Instant::now();
                }
            }
            _ = tokio::time::sleep(timeout), if pending_update => {
                broadcast_reload(&update_tx);
                pending_update = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    async fn expect_reload(rx: &mut broadcast::Receiver<String>) {
        let msg = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("no reload within timeout")
            .expect("channel closed");
        assert!(msg.contains("\"reload\""), "unexpected message: {}", msg);
    }

    #[tokio::test]
    async fn test_write_triggers_reload() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = broadcast::channel(16);

        let notifier =
            ChangeNotifier::start(dir.path(), tx, Duration::from_millis(50)).unwrap();
        assert!(!notifier.started_bootstrapping());

        fs::write(dir.path().join("issues.jsonl"), "{}\n").unwrap();
        expect_reload(&mut rx).await;
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = broadcast::channel(16);
        let _notifier =
            ChangeNotifier::start(dir.path(), tx, Duration::from_millis(300)).unwrap();

        let path = dir.path().join("issues.jsonl");
        for i in 0..5 {
            fs::write(&path, format!("{}\n", i)).unwrap();
        }

        expect_reload(&mut rx).await;
        let second = tokio::time::timeout(Duration::from_millis(600), rx.recv()).await;
        assert!(second.is_err(), "burst produced more than one reload");
    }

    #[tokio::test]
    async fn test_bootstrap_when_store_missing() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join(".beads");
        let (tx, mut rx) = broadcast::channel(16);

        let notifier = ChangeNotifier::start(&store, tx, Duration::from_millis(50)).unwrap();
        assert!(notifier.started_bootstrapping());

        fs::create_dir(&store).unwrap();
        expect_reload(&mut rx).await;

        // The watch moved onto the store, so writes inside it are seen.
        fs::write(store.join("issues.jsonl"), "{}\n").unwrap();
        expect_reload(&mut rx).await;
    }

    #[tokio::test]
    async fn test_unrelated_sibling_ignored_while_bootstrapping() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join(".beads");
        let (tx, mut rx) = broadcast::channel(16);
        let _notifier = ChangeNotifier::start(&store, tx, Duration::from_millis(50)).unwrap();

        fs::write(dir.path().join("README.md"), "hi").unwrap();
        let got = tokio::time::timeout(Duration::from_millis(400), rx.recv()).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn test_parent_released_after_store_appears() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join(".beads");
        let (tx, mut rx) = broadcast::channel(16);
        let _notifier = ChangeNotifier::start(&store, tx, Duration::from_millis(50)).unwrap();

        fs::create_dir(&store).unwrap();
        expect_reload(&mut rx).await;

        // Let stragglers from the mkdir settle before checking the parent
        tokio::time::sleep(Duration::from_millis(300)).await;
        while rx.try_recv().is_ok() {}

        fs::write(dir.path().join("README.md"), "hi").unwrap();
        let got = tokio::time::timeout(Duration::from_millis(400), rx.recv()).await;
        assert!(got.is_err());
    }

    #[test]
    fn test_parent_to_watch() {
        assert_eq!(parent_to_watch(Path::new(".beads")), PathBuf::from("."));
        assert_eq!(
            parent_to_watch(Path::new("proj/.beads")),
            PathBuf::from("proj")
        );
    }

    #[tokio::test]
    async fn test_missing_parent_is_error() {
        let dir = TempDir::new().unwrap();
        let store = dir.path().join("nope").join(".beads");
        let (tx, _rx) = broadcast::channel(16);

        assert!(ChangeNotifier::start(&store, tx, Duration::from_millis(50)).is_err());
    }
}
