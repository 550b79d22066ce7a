//! Dataset File Watcher
//!
//! Notices when the dataset file is replaced outside the process (an
//! operator copying a new sheet into place) so the caller can reload it.
//! Uses the `notify` crate for filesystem events with a periodic fallback poll.

use crate::error::Result;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio::sync::mpsc;

/// Configuration for the dataset watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Fallback poll interval (safety net for missed events)
    pub poll_interval: Duration,
    /// Quiet period after a filesystem event before the file is checked
    pub debounce: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            debounce: Duration::from_millis(250),
        }
    }
}

/// Size and modification time of the file; `None` while it does not exist.
type Fingerprint = Option<(SystemTime, u64)>;

fn fingerprint(path: &Path) -> Fingerprint {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

/// Watches one dataset file and reports when its content may have changed.
pub struct DatasetWatcher {
    file_path: PathBuf,
    last_seen: Arc<Mutex<Fingerprint>>,
    config: WatcherConfig,
}

impl DatasetWatcher {
    /// Create a watcher. The file's current state counts as already seen.
    pub fn new(file_path: PathBuf, config: Option<WatcherConfig>) -> Self {
        let current = fingerprint(&file_path);
        Self {
            file_path,
            last_seen: Arc::new(Mutex::new(current)),
            config: config.unwrap_or_default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Check the file once. Returns `true` if it appeared or changed since
    /// the last check; a deleted file is not reported.
    pub async fn poll(&self) -> bool {
        check_changed(&self.file_path, &self.last_seen).await
    }

    /// Start watching and send `()` on `tx` each time the file changes.
    ///
    /// This spawns a background task that:
    /// 1. Watches the file's directory for create/modify events
    /// 2. Polls periodically as a safety fallback
    ///
    /// Returns a handle that can be used to stop the watcher.
    pub async fn start(self, tx: mpsc::Sender<()>) -> Result<WatcherHandle> {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let file_path = self.file_path.clone();
        let last_seen = self.last_seen.clone();
        let poll_interval = self.config.poll_interval;
        let debounce = self.config.debounce;

        let (event_tx, mut event_rx) = mpsc::channel::<()>(16);
        let watched_name = file_path.file_name().map(|n| n.to_os_string());

        // notify calls back on its own thread. Atomic replacement shows up
        // as a create or rename of the file name.
        let watcher_result: std::result::Result<RecommendedWatcher, notify::Error> =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res
                    && (event.kind.is_modify() || event.kind.is_create())
                    && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == watched_name)
                {
                    let _ = event_tx.try_send(());
                }
            });

        let mut watcher = match watcher_result {
            Ok(mut w) => {
                let dir = match file_path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => PathBuf::from("."),
                };
                if let Err(e) = w.watch(&dir, RecursiveMode::NonRecursive) {
                    tracing::warn!(dir = %dir.display(), error = %e, "cannot watch dataset directory, polling only");
                }
                Some(w)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to create file watcher, polling only");
                None
            }
        };

        let handle = tokio::spawn(async move {
            let mut poll_timer = tokio::time::interval(poll_interval);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        break;
                    }

                    Some(()) = event_rx.recv() => {
                        // Let a burst of writes settle, then drain what piled up.
                        tokio::time::sleep(debounce).await;
                        while event_rx.try_recv().is_ok() {}
                        if check_changed(&file_path, &last_seen).await && tx.send(()).await.is_err() {
                            break; // Receiver dropped
                        }
                    }

                    _ = poll_timer.tick() => {
                        if check_changed(&file_path, &last_seen).await && tx.send(()).await.is_err() {
                            break; // Receiver dropped
                        }
                    }
                }
            }

            drop(watcher.take());
        });

        Ok(WatcherHandle {
            stop_tx,
            _task: handle,
        })
    }
}

async fn check_changed(file_path: &Path, last_seen: &Arc<Mutex<Fingerprint>>) -> bool {
    let mut last = last_seen.lock().await;
    let now = fingerprint(file_path);
    if now == *last {
        return false;
    }
    *last = now;
    now.is_some()
}

/// Handle to control a running watcher
pub struct WatcherHandle {
    stop_tx: mpsc::Sender<()>,
    _task: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Stop the watcher
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
    }
}
