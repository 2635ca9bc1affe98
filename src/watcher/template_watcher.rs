//! notify-backed watcher for the template tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::ReloadConfig;

use super::error::WatchError;
use super::event::WatchEvent;
use super::path_registry::PathRegistry;
use super::rescan::RescanQueue;

/// Capacity of the subscription error stream.
const ERROR_CHANNEL_SIZE: usize = 64;

/// Receiving ends handed to the reload coordinator.
#[derive(Debug)]
pub struct WatchStreams {
    pub events: Receiver<WatchEvent>,
    pub errors: Receiver<WatchError>,
    /// Directories to rescan because their events were lost.
    pub rescans: RescanQueue,
    /// Fires when `rescans` has something queued.
    pub rescan_wake: Receiver<()>,
}

/// Send `err` on the error stream without blocking.
///
/// Returns whether it was delivered. A full stream is logged; a closed one
/// means the coordinator is gone.
pub(crate) fn report_error(errors: &Sender<WatchError>, err: WatchError) -> bool {
    match errors.try_send(err) {
        Ok(()) => true,
        Err(TrySendError::Full(err)) => {
            tracing::warn!("[watcher] error stream full, dropping: {err}");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Runs inside notify's callback thread. Never blocks longer than `timeout`.
struct EventForwarder {
    root: PathBuf,
    events: Sender<WatchEvent>,
    errors: Sender<WatchError>,
    rescans: RescanQueue,
    timeout: Duration,
    dropped: Arc<AtomicUsize>,
}

impl EventForwarder {
    fn forward(&self, res: notify::Result<Event>) {
        match res {
            Ok(event) => {
                if event.need_rescan() {
                    self.report(WatchError::EventError {
                        details: "notification queue overflowed, some changes were missed"
                            .to_string(),
                    });
                    self.rescans.push(&self.root);
                }

                for watch_event in WatchEvent::from_notify(&event) {
                    match self.events.send_timeout(watch_event, self.timeout) {
                        Ok(()) => {}
                        Err(SendTimeoutError::Timeout(lost)) => {
                            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                            tracing::warn!(
                                "[watcher] reload queue full, dropped {:?} {} ({total} dropped so far)",
                                lost.kind,
                                lost.path.display()
                            );
                            let dir = lost.path.parent().unwrap_or(self.root.as_path());
                            self.rescans.push(dir);
                            self.report(WatchError::DeliveryTimeout { path: lost.path });
                        }
                        // Coordinator is gone; nothing left to deliver to.
                        Err(SendTimeoutError::Disconnected(_)) => return,
                    }
                }
            }
            Err(e) => {
                let err = match e.paths.first() {
                    Some(path) => WatchError::PathWatchFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    },
                    None => WatchError::from(e),
                };
                self.report(err);
            }
        }
    }

    fn report(&self, err: WatchError) {
        report_error(&self.errors, err);
    }
}

/// One non-recursive notify subscription per directory under the root.
///
/// Dropping the watcher releases every OS watch handle.
pub struct TemplateWatcher {
    watcher: RecommendedWatcher,
    registry: PathRegistry,
    root: PathBuf,
    errors: Sender<WatchError>,
    dropped: Arc<AtomicUsize>,
}

impl TemplateWatcher {
    /// Create the watcher and subscribe `root` plus `directories`.
    ///
    /// Failing to create the backend or to subscribe the root is
    /// [`WatchError::InitFailed`]. A failing subdirectory is reported on
    /// the error stream and skipped.
    pub fn start(
        root: &Path,
        directories: &[PathBuf],
        config: &ReloadConfig,
    ) -> Result<(Self, WatchStreams), WatchError> {
        let (event_tx, event_rx) = bounded(config.channel_capacity.max(1));
        let (error_tx, error_rx) = bounded(ERROR_CHANNEL_SIZE);
        let dropped = Arc::new(AtomicUsize::new(0));
        let (rescans, rescan_wake) = RescanQueue::new();

        let forwarder = EventForwarder {
            root: root.to_path_buf(),
            events: event_tx,
            errors: error_tx.clone(),
            rescans: rescans.clone(),
            timeout: Duration::from_millis(config.send_timeout_ms),
            dropped: Arc::clone(&dropped),
        };

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            forwarder.forward(res);
        })
        .map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;

        let mut this = Self {
            watcher,
            registry: PathRegistry::new(),
            root: root.to_path_buf(),
            errors: error_tx,
            dropped,
        };

        this.subscribe(root).map_err(|e| WatchError::InitFailed {
            reason: e.to_string(),
        })?;

        for dir in directories.iter().filter(|dir| dir.as_path() != root) {
            if let Err(e) = this.subscribe(dir) {
                tracing::warn!("[watcher] {e}");
                report_error(&this.errors, e);
            }
        }

        crate::log_event!(
            "watcher",
            "monitoring",
            "{} directories under {}",
            this.registry.len(),
            root.display()
        );

        Ok((
            this,
            WatchStreams {
                events: event_rx,
                errors: error_rx,
                rescans,
                rescan_wake,
            },
        ))
    }

    /// Subscribe one directory. Returns `Ok(false)` if already subscribed.
    pub fn subscribe(&mut self, dir: &Path) -> Result<bool, WatchError> {
        if self.registry.contains(dir) {
            return Ok(false);
        }

        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        self.registry.insert(dir.to_path_buf());
        crate::debug_event!("watcher", "watching", "{}", dir.display());
        Ok(true)
    }

    /// Forget `dir` and every subscribed directory below it.
    ///
    /// Returns how many subscriptions were dropped.
    pub fn unsubscribe_tree(&mut self, dir: &Path) -> usize {
        let removed = self.registry.remove_tree(dir);
        for path in &removed {
            // The backend usually drops the watch itself once the
            // directory is gone; a failing unwatch is expected then.
            if let Err(e) = self.watcher.unwatch(path) {
                crate::debug_event!("watcher", "unwatch", "{}: {e}", path.display());
            }
        }
        removed.len()
    }

    pub fn is_watching(&self, dir: &Path) -> bool {
        self.registry.contains(dir)
    }

    pub fn watched_count(&self) -> usize {
        self.registry.len()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Events dropped because the coordinator fell behind.
    pub fn dropped_events(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for TemplateWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateWatcher")
            .field("root", &self.root)
            .field("watched", &self.registry.len())
            .field("dropped", &self.dropped_events())
            .finish()
    }
}
