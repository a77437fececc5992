//! Change detection: scanner, watcher, and persisted change state.

mod detector;
mod state;
mod watcher;

pub use detector::ChangeDetector;
pub use state::{ChangeStatus, FileChange, ProjectChanges};
pub use watcher::{ChangeUpdate, ChangeWatcher, EVENT_DEBOUNCE, NOTIFY_DEBOUNCE};
