//! Normalization of raw notify events into typed file events.

use std::path::{Path, PathBuf};
use std::time::Instant;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::EventKind;

use crate::naming;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File appeared.
    Created,
    /// File contents changed or a writer closed it.
    Modified,
    /// File was renamed or moved to this path.
    Renamed,
}

/// A filesystem event for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Affected path.
    pub path: PathBuf,
    /// Event kind.
    pub kind: FileEventKind,
    /// When the event was received.
    pub timestamp: Instant,
}

/// Turn a raw notify event into zero or more typed events.
///
/// Only events that can announce a new or growing file are kept: creation,
/// data modification, close-after-write and the destination side of
/// renames. Removals, metadata changes and rename sources are dropped.
#[must_use]
pub fn normalize(event: notify::Event, timestamp: Instant) -> Vec<FileEvent> {
    let (kind, paths) = match event.kind {
        EventKind::Create(_) => (FileEventKind::Created, event.paths),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
        | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            (FileEventKind::Modified, event.paths)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => (FileEventKind::Renamed, event.paths),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths = [from, to]
            (FileEventKind::Renamed, event.paths.into_iter().skip(1).collect())
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            // Platforms that cannot pair rename halves report each side alone;
            // only the side that now exists is a destination.
            let existing = event.paths.into_iter().filter(|p| p.exists()).collect();
            (FileEventKind::Renamed, existing)
        }
        _ => return Vec::new(),
    };

    paths
        .into_iter()
        .map(|path| FileEvent {
            path,
            kind,
            timestamp,
        })
        .collect()
}

/// Whether a path in `watch_dir` should be picked up by the watcher.
///
/// The file must sit directly in the watched directory (so nothing inside the
/// archive subfolder qualifies), carry a supported image extension and not be
/// one of this crate's own outputs.
#[must_use]
pub fn is_candidate(watch_dir: &Path, path: &Path) -> bool {
    path.parent() == Some(watch_dir)
        && !path.starts_with(watch_dir.join(naming::ARCHIVE_DIR_NAME))
        && naming::is_supported_image(path)
        && !naming::is_own_output(path)
}
