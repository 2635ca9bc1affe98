//! Reload coordinator: the single consumer of watch events.
//!
//! Every post-startup write to the template set, the cache and the index
//! happens here, on one thread, in delivery order. Readers never wait on it.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, never, select};

use crate::config::RemovePolicy;
use crate::error::EngineError;
use crate::state::EngineState;
use crate::watcher::{RescanQueue, TemplateWatcher, WatchEvent, WatchEventKind, WatchStreams};

/// Name of the coordinator thread.
pub const THREAD_NAME: &str = "tplindex-reload";

pub struct ReloadCoordinator {
    state: Arc<EngineState>,
    /// Present when running against a live watcher; needed to subscribe
    /// new directories and forget removed ones.
    watcher: Option<TemplateWatcher>,
}

impl ReloadCoordinator {
    pub fn new(state: Arc<EngineState>) -> Self {
        Self {
            state,
            watcher: None,
        }
    }

    pub fn with_watcher(mut self, watcher: TemplateWatcher) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn watcher(&self) -> Option<&TemplateWatcher> {
        self.watcher.as_ref()
    }

    /// Apply one event.
    pub fn process(&mut self, event: &WatchEvent) {
        crate::debug_event!("reload", "received", "{:?} {}", event.kind, event.path.display());

        match event.kind {
            WatchEventKind::Created | WatchEventKind::Modified => {
                if event.path.is_dir() {
                    if event.kind == WatchEventKind::Created {
                        self.adopt_directory(&event.path);
                    }
                    return;
                }
                self.recompile(&event.path);
            }
            WatchEventKind::Removed => self.handle_removed(&event.path),
        }
    }

    fn recompile(&self, path: &Path) {
        if !self.state.scanner.extensions().matches(path) {
            crate::debug_event!("reload", "skipped", "{}", path.display());
            return;
        }

        // Created then removed before we got to it.
        if !path.is_file() {
            crate::debug_event!("reload", "vanished", "{}", path.display());
            return;
        }

        match self.state.load(path) {
            Ok(name) => {
                crate::log_event!("reload", "recompiled", "{name} <- {}", path.display());
            }
            Err(e) => {
                // Previous artifact and mapping stay in place.
                self.state.report(EngineError::Compile(e));
            }
        }
    }

    /// A directory appeared after startup: watch it and load what it holds.
    fn adopt_directory(&mut self, dir: &Path) {
        if !self.state.reload.watch_new_directories {
            crate::debug_event!("reload", "new directory not watched", "{}", dir.display());
            return;
        }

        // Watch before scanning: a file created after the scan still
        // produces an event.
        self.subscribe(dir);
        if let Some(loaded) = self.scan_and_load(dir, true) {
            crate::log_event!(
                "reload",
                "new directory",
                "{} ({loaded} templates)",
                dir.display()
            );
        }
    }

    /// Catch up on `dir` after its events were lost.
    ///
    /// Loads new and changed templates below it. Under the evict policy,
    /// indexed templates whose files are gone are evicted.
    pub fn rescan(&mut self, dir: &Path) {
        if !dir.is_dir() {
            self.handle_removed(dir);
            return;
        }

        let subscribe = self.state.reload.watch_new_directories;
        let Some(loaded) = self.scan_and_load(dir, subscribe) else {
            return;
        };

        if self.state.reload.remove_policy == RemovePolicy::Evict {
            for (_, path) in self.state.index.entries() {
                if path.starts_with(dir) && !path.is_file() {
                    self.state.evict(&path);
                }
            }
        }

        crate::log_event!("reload", "rescanned", "{} ({loaded} templates)", dir.display());
    }

    fn scan_and_load(&mut self, dir: &Path, subscribe: bool) -> Option<usize> {
        let outcome = match self.state.scanner.scan(dir) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state.report(EngineError::Scan(e));
                return None;
            }
        };

        if subscribe {
            for sub in &outcome.directories {
                self.subscribe(sub);
            }
        }

        Some(self.state.load_all(&outcome.files))
    }

    fn subscribe(&mut self, dir: &Path) {
        if let Some(watcher) = self.watcher.as_mut() {
            if let Err(e) = watcher.subscribe(dir) {
                self.state.report(EngineError::Subscription(e));
            }
        }
    }

    fn handle_removed(&mut self, path: &Path) {
        // Forgotten under every policy so a recreated directory is re-subscribed.
        if let Some(watcher) = self.watcher.as_mut() {
            watcher.unsubscribe_tree(path);
        }

        match self.state.reload.remove_policy {
            RemovePolicy::Retain => {
                crate::debug_event!("reload", "removed, entry retained", "{}", path.display());
            }
            RemovePolicy::Evict => {
                let names = self.state.evict(path);
                if !names.is_empty() {
                    crate::log_event!(
                        "reload",
                        "evicted",
                        "{} ({} names)",
                        path.display(),
                        names.len()
                    );
                }
            }
        }
    }

    fn drain_rescans(&mut self, rescans: &RescanQueue) {
        for dir in rescans.drain() {
            self.rescan(&dir);
        }
    }

    /// Consume events until `shutdown` fires or the event stream closes.
    pub fn run(mut self, streams: WatchStreams, shutdown: Receiver<()>) {
        let WatchStreams {
            events,
            mut errors,
            rescans,
            mut rescan_wake,
        } = streams;

        crate::log_event!("reload", "started");

        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => self.process(&event),
                    Err(_) => {
                        crate::debug_event!("reload", "event stream closed");
                        break;
                    }
                },
                recv(errors) -> msg => match msg {
                    Ok(err) => self.state.report(EngineError::from_watch(err)),
                    Err(_) => errors = never(),
                },
                recv(rescan_wake) -> msg => match msg {
                    Ok(()) => self.drain_rescans(&rescans),
                    Err(_) => rescan_wake = never(),
                },
                recv(shutdown) -> _ => break,
            }
        }

        crate::log_event!("reload", "stopped");
        // Dropping self releases the watcher and its OS handles.
    }

    /// Run on a dedicated thread.
    pub fn spawn(
        self,
        streams: WatchStreams,
        shutdown: Receiver<()>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run(streams, shutdown))
    }
}
