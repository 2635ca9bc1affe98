//! Translation of raw filesystem notifications into typed watch events.
//!
//! Raw notifications are first lowered to an [`OpFlags`] bitset, then
//! [`classify`] picks exactly one class with a fixed precedence:
//! WRITE, then CREATE, then REMOVE. RENAME and CHMOD are recognized but
//! never acted on.

use std::path::PathBuf;

use bitflags::bitflags;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

bitflags! {
    /// Operations reported by a single low-level notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u8 {
        const CREATE = 1;
        const WRITE = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
        const CHMOD = 1 << 4;
    }
}

impl From<&EventKind> for OpFlags {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => OpFlags::CREATE,
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other) => {
                OpFlags::WRITE
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => OpFlags::CHMOD,
            // Something moved into place (editors saving via rename): the
            // destination is a new file at that path.
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => OpFlags::CREATE,
            EventKind::Modify(ModifyKind::Name(_)) => OpFlags::RENAME,
            EventKind::Remove(_) => OpFlags::REMOVE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => OpFlags::empty(),
        }
    }
}

/// Outcome of translating one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    Created,
    Modified,
    Removed,
    Ignored,
}

/// Pick one class for a (possibly compound) set of operations.
pub fn classify(ops: OpFlags) -> EventClass {
    if ops.contains(OpFlags::WRITE) {
        EventClass::Modified
    } else if ops.contains(OpFlags::CREATE) {
        EventClass::Created
    } else if ops.contains(OpFlags::REMOVE) {
        EventClass::Removed
    } else {
        EventClass::Ignored
    }
}

/// Kinds the reload coordinator acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

impl WatchEventKind {
    pub fn from_class(class: EventClass) -> Option<Self> {
        match class {
            EventClass::Created => Some(WatchEventKind::Created),
            EventClass::Modified => Some(WatchEventKind::Modified),
            EventClass::Removed => Some(WatchEventKind::Removed),
            EventClass::Ignored => None,
        }
    }
}

/// A typed change to one filesystem entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(WatchEventKind::Created, path)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(WatchEventKind::Modified, path)
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::new(WatchEventKind::Removed, path)
    }

    /// Translate a notify event into zero or more typed events, one per path.
    pub fn from_notify(event: &Event) -> Vec<WatchEvent> {
        let Some(kind) = WatchEventKind::from_class(classify(OpFlags::from(&event.kind))) else {
            return Vec::new();
        };

        event
            .paths
            .iter()
            .map(|path| WatchEvent::new(kind, path.clone()))
            .collect()
    }
}
