//! Filesystem watcher feeding the change detector.
//!
//! Raw events go through notify-debouncer-mini (per-file coalescing of
//! rapid successive edits), then through a second, slightly longer timer
//! that gates the "changes updated" notification fan-out so bulk
//! operations produce one notification instead of hundreds.

use super::detector::ChangeDetector;
use crate::{Error, Result};
use mirror_fs::{NormalizedPath, ignore};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Debounce applied to raw filesystem events, per file.
pub const EVENT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Coalescing gate ahead of the notification fan-out.
pub const NOTIFY_DEBOUNCE: Duration = Duration::from_millis(200);

/// Notification that a project's change set was updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeUpdate {
    pub project_root: PathBuf,
}

/// Watches a project tree and drives debounced re-evaluation.
pub struct ChangeWatcher {
    /// Debouncer handle (must keep alive)
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    updates: mpsc::UnboundedReceiver<ChangeUpdate>,
}

impl ChangeWatcher {
    /// Start watching the detector's project with the default debounce.
    ///
    /// Must be called from within a tokio runtime; the coalescing stage
    /// runs as a spawned task.
    pub fn spawn(detector: Arc<Mutex<ChangeDetector>>) -> Result<Self> {
        Self::with_debounce(detector, EVENT_DEBOUNCE, NOTIFY_DEBOUNCE)
    }

    /// Start watching with explicit debounce windows.
    pub fn with_debounce(
        detector: Arc<Mutex<ChangeDetector>>,
        event_debounce: Duration,
        notify_debounce: Duration,
    ) -> Result<Self> {
        let root = detector
            .lock()
            .expect("change detector mutex poisoned")
            .root()
            .to_path_buf();

        let (path_tx, path_rx) = mpsc::unbounded_channel::<String>();
        let event_root = root.clone();

        let mut debouncer = new_debouncer(
            event_debounce,
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        if let Some(rel) = relevant_path(&event.path, &event_root)
                            && path_tx.send(rel).is_err()
                        {
                            // Receiver dropped
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "file watcher error");
                }
            },
        )
        .map_err(|e| Error::Task(format!("failed to create watcher: {}", e)))?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| Error::Task(format!("failed to watch {}: {}", root.display(), e)))?;

        let (update_tx, updates) = mpsc::unbounded_channel();
        tokio::spawn(coalesce_loop(
            detector,
            root,
            path_rx,
            update_tx,
            notify_debounce,
        ));

        Ok(Self {
            _debouncer: debouncer,
            updates,
        })
    }

    /// Receiver for coalesced change notifications.
    pub fn updates(&mut self) -> &mut mpsc::UnboundedReceiver<ChangeUpdate> {
        &mut self.updates
    }
}

/// Coalescing stage: gather event paths for one notification window, then
/// re-evaluate them in a single batch and emit one update.
async fn coalesce_loop(
    detector: Arc<Mutex<ChangeDetector>>,
    root: PathBuf,
    mut path_rx: mpsc::UnboundedReceiver<String>,
    update_tx: mpsc::UnboundedSender<ChangeUpdate>,
    notify_debounce: Duration,
) {
    let mut pending: HashSet<String> = HashSet::new();
    while let Some(first) = path_rx.recv().await {
        pending.insert(first);

        let gate = tokio::time::sleep(notify_debounce);
        tokio::pin!(gate);
        loop {
            tokio::select! {
                _ = &mut gate => break,
                maybe = path_rx.recv() => match maybe {
                    Some(rel) => {
                        pending.insert(rel);
                    }
                    None => break,
                },
            }
        }

        {
            let mut det = detector.lock().expect("change detector mutex poisoned");
            for rel in pending.drain() {
                match det.reevaluate(&rel) {
                    Ok(status) => debug!(path = %rel, ?status, "re-evaluated"),
                    Err(e) => warn!(path = %rel, error = %e, "re-evaluation failed"),
                }
            }
            if let Err(e) = det.persist() {
                warn!(error = %e, "failed to persist change state");
            }
        }

        if update_tx
            .send(ChangeUpdate {
                project_root: root.clone(),
            })
            .is_err()
        {
            // Subscriber dropped
            break;
        }
    }
}

/// Map an event path to a tracked relative path, or discard it.
fn relevant_path(path: &Path, root: &Path) -> Option<String> {
    let rel = NormalizedPath::new(path)
        .strip_prefix(&NormalizedPath::new(root))?
        .to_string();
    if rel.is_empty() || ignore::is_ignored(&rel) {
        return None;
    }
    Some(rel)
}
