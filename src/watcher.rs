//! Live sorting driven by filesystem creation notifications.
//!
//! `notify` delivers events on its own thread; they are forwarded into a
//! channel drained by a single dispatch thread that runs each newly created
//! file through the same [`FileOrganizer`] the scanner uses. Stopping drops
//! the subscription, tells the dispatch thread to exit and joins it, so no
//! file is touched after [`FolderWatcher::stop`] returns.

use crate::activity_log::ActivityLog;
use crate::file_organizer::{FileOrganizer, MoveOutcome, Trigger};
use crate::rules::RuleTable;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

/// Errors raised while establishing a watch.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watched directory does not exist or is not a directory: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Failed to subscribe to file notifications: {0}")]
    Subscribe(#[from] notify::Error),

    #[error("Failed to start the watch thread: {0}")]
    Spawn(#[source] io::Error),
}

enum Signal {
    Notify(notify::Result<Event>),
    Stop,
}

/// An active, non-recursive subscription on one directory.
pub struct FolderWatcher {
    subscription: Option<RecommendedWatcher>,
    signals: Sender<Signal>,
    worker: Option<JoinHandle<()>>,
}

impl FolderWatcher {
    /// Subscribes to creation events in `root` and starts the dispatch thread.
    pub fn start(
        root: PathBuf,
        rules: Arc<RuleTable>,
        log: Arc<ActivityLog>,
    ) -> Result<Self, WatchError> {
        if !root.is_dir() {
            return Err(WatchError::MissingDirectory(root));
        }

        let (tx, rx) = mpsc::channel::<Signal>();
        let notify_tx = tx.clone();
        let mut subscription = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver is gone once the watcher is stopping.
            let _ = notify_tx.send(Signal::Notify(res));
        })?;
        subscription.watch(&root, RecursiveMode::NonRecursive)?;

        let worker = thread::Builder::new()
            .name("dlsort-watch".to_string())
            .spawn(move || dispatch(rx, &root, &rules, &log))
            .map_err(WatchError::Spawn)?;

        Ok(Self {
            subscription: Some(subscription),
            signals: tx,
            worker: Some(worker),
        })
    }

    /// Unsubscribes and waits for the dispatch thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // No new notifications once the subscription is gone.
        drop(self.subscription.take());
        let _ = self.signals.send(Signal::Stop);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("watch dispatch thread panicked");
        }
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch(signals: Receiver<Signal>, root: &Path, rules: &RuleTable, log: &ActivityLog) {
    let organizer = FileOrganizer::new(root, rules, log);
    debug!(root = %root.display(), "watch dispatch started");

    for signal in signals {
        match signal {
            Signal::Stop => break,
            Signal::Notify(Ok(event)) => {
                if !matches!(event.kind, EventKind::Create(_)) {
                    trace!(kind = ?event.kind, "ignoring event");
                    continue;
                }
                for path in &event.paths {
                    // Duplicate events for an already moved file come back as Vanished.
                    match organizer.relocate(path, Trigger::Watch) {
                        MoveOutcome::Moved { destination, .. } => {
                            debug!(src = %path.display(), dest = %destination.display(), "sorted new file");
                        }
                        outcome => trace!(path = %path.display(), ?outcome, "new file not moved"),
                    }
                }
            }
            Signal::Notify(Err(e)) => {
                warn!(error = %e, "file watcher error");
            }
        }
    }

    debug!(root = %root.display(), "watch dispatch stopped");
}
