//! Directories whose change events were lost and must be rescanned.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

/// Shared between notify's callback (producer) and the reload
/// coordinator (consumer). Pushing never blocks.
#[derive(Clone, Debug)]
pub struct RescanQueue {
    dirs: Arc<Mutex<BTreeSet<PathBuf>>>,
    wake: Sender<()>,
}

impl RescanQueue {
    /// The queue plus the receiver that fires when something is queued.
    pub fn new() -> (Self, Receiver<()>) {
        let (wake, woken) = bounded(1);
        (
            Self {
                dirs: Arc::new(Mutex::new(BTreeSet::new())),
                wake,
            },
            woken,
        )
    }

    pub fn push(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        crate::debug_event!("watcher", "rescan queued", "{}", dir.display());
        self.dirs.lock().insert(dir);

        // Full means a wake-up is already pending.
        if let Err(TrySendError::Disconnected(())) = self.wake.try_send(()) {
            crate::debug_event!("watcher", "rescan queued with no consumer");
        }
    }

    /// Take every queued directory. A directory below another queued one
    /// is covered by it and left out.
    pub fn drain(&self) -> Vec<PathBuf> {
        let queued = std::mem::take(&mut *self.dirs.lock());
        let mut dirs: Vec<PathBuf> = Vec::with_capacity(queued.len());
        // Component-wise order puts ancestors first.
        for dir in queued {
            if !dirs.iter().any(|kept| dir.starts_with(kept)) {
                dirs.push(dir);
            }
        }
        dirs
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.lock().is_empty()
    }
}
