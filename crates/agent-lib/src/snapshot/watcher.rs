//! Snapshot file watcher
//!
//! Watches the directory holding the snapshot rather than the file itself:
//! writers replace the file by rename, and ConfigMap mounts swap a `..data`
//! symlink, both of which a file-level watch would miss.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct SnapshotWatcher {
    snapshot_path: PathBuf,
    trigger_tx: mpsc::Sender<()>,
}

impl SnapshotWatcher {
    /// Reload triggers are sent on `trigger_tx`; a full channel coalesces them
    pub fn new(snapshot_path: impl Into<PathBuf>, trigger_tx: mpsc::Sender<()>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            trigger_tx,
        }
    }

    /// Start watching. Stops when the returned handle is dropped.
    pub fn start(self) -> Result<WatcherHandle> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = event_tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create filesystem watcher")?;

        let dir = watch_dir(&self.snapshot_path);
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        info!(path = %dir.display(), "Watching snapshot directory");

        let file_name = self.snapshot_path.file_name().map(OsString::from);
        let trigger_tx = self.trigger_tx;

        let task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if is_relevant(&event, file_name.as_deref()) {
                    debug!(kind = ?event.kind, "Snapshot file event");
                    // Full means a reload is already pending
                    let _ = trigger_tx.try_send(());
                }
            }
            debug!("Watcher channel closed");
        });

        Ok(WatcherHandle {
            _watcher: watcher,
            task,
        })
    }
}

fn watch_dir(snapshot_path: &Path) -> PathBuf {
    match snapshot_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Events on the snapshot file itself or on ConfigMap `..` entries
fn is_relevant(event: &Event, file_name: Option<&std::ffi::OsStr>) -> bool {
    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return false;
    }

    event.paths.iter().any(|path| match path.file_name() {
        Some(name) => {
            Some(name) == file_name || name.to_string_lossy().starts_with("..")
        }
        None => false,
    })
}

/// Handle to a running watcher; watching stops when dropped
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
