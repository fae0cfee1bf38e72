//! Per-path debounce and size-stabilization state machine.
//!
//! The debouncer never touches the clock or the filesystem itself: callers
//! pass the current [`Instant`] and a size probe, which keeps every state
//! transition reproducible in tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::events::FileEvent;

/// Lifecycle of a tracked path. Terminal states remove the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for the file to stop changing.
    Debouncing,
    /// Handed to a worker; further events are ignored.
    Processing,
}

/// Tracking record for one path.
#[derive(Debug, Clone)]
pub struct WatchEntry {
    /// Watched file.
    pub path: PathBuf,
    /// Time of the event that created the entry.
    pub first_event: Instant,
    /// Time of the most recent event.
    pub last_event: Instant,
    /// Size at the most recent observation, `None` if unreadable.
    pub last_observed_size: Option<u64>,
    /// When the entry is next evaluated.
    pub deadline: Instant,
    /// Reschedules so far, by new events or by a changed size.
    pub cycles: u32,
    /// Current state.
    pub state: EntryState,
}

/// Result of evaluating an entry whose deadline passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Size was stable across a quiet period; the entry is now `Processing`.
    Stabilized(PathBuf),
    /// The file never settled; the entry was dropped.
    TimedOut {
        /// Watched file.
        path: PathBuf,
        /// Cycles spent waiting.
        cycles: u32,
    },
    /// The file disappeared; the entry was dropped.
    Vanished(PathBuf),
}

/// Debounces event bursts per path and detects when files stop growing.
#[derive(Debug)]
pub struct Debouncer {
    quiet_period: Duration,
    max_cycles: u32,
    entries: HashMap<PathBuf, WatchEntry>,
}

impl Debouncer {
    /// Create a debouncer.
    ///
    /// An entry that is still changing `max_cycles` quiet periods after its
    /// first event is given up on, however often events keep arriving.
    #[must_use]
    pub fn new(quiet_period: Duration, max_cycles: u32) -> Self {
        Self {
            quiet_period,
            max_cycles: max_cycles.max(1),
            entries: HashMap::new(),
        }
    }

    /// Record an event, starting or resetting the quiet period for its path.
    ///
    /// `size` is the file size sampled when the event arrived. Returns
    /// `false` when the path is already being processed and the event was
    /// ignored.
    pub fn observe(&mut self, event: &FileEvent, size: Option<u64>) -> bool {
        let deadline = event.timestamp + self.quiet_period;
        let window = self.window();

        if let Some(entry) = self.entries.get_mut(&event.path) {
            if entry.state == EntryState::Processing {
                return false;
            }
            entry.last_event = event.timestamp;
            entry.last_observed_size = size;
            entry.deadline = deadline.min(entry.first_event + window);
            entry.cycles += 1;
            return true;
        }

        self.entries.insert(
            event.path.clone(),
            WatchEntry {
                path: event.path.clone(),
                first_event: event.timestamp,
                last_event: event.timestamp,
                last_observed_size: size,
                deadline,
                cycles: 0,
                state: EntryState::Debouncing,
            },
        );
        true
    }

    fn window(&self) -> Duration {
        self.quiet_period.saturating_mul(self.max_cycles)
    }

    /// Earliest pending deadline, if any entry is debouncing.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter(|e| e.state == EntryState::Debouncing)
            .map(|e| e.deadline)
            .min()
    }

    /// Evaluate every debouncing entry whose deadline is at or before `now`.
    ///
    /// A file is stable when its size is non-zero and equal to the size seen
    /// one quiet period earlier. Unstable files are rescheduled until
    /// `max_cycles` quiet periods have passed since their first event.
    pub fn poll<F>(&mut self, now: Instant, mut probe: F) -> Vec<Decision>
    where
        F: FnMut(&Path) -> Option<u64>,
    {
        let mut due: Vec<PathBuf> = self
            .entries
            .values()
            .filter(|e| e.state == EntryState::Debouncing && e.deadline <= now)
            .map(|e| e.path.clone())
            .collect();
        due.sort();

        let window = self.window();
        let mut decisions = Vec::with_capacity(due.len());
        for path in due {
            let Some(size) = probe(&path) else {
                self.entries.remove(&path);
                decisions.push(Decision::Vanished(path));
                continue;
            };

            let Some(entry) = self.entries.get_mut(&path) else {
                continue;
            };

            if size > 0 && entry.last_observed_size == Some(size) {
                entry.state = EntryState::Processing;
                decisions.push(Decision::Stabilized(path));
                continue;
            }

            entry.cycles += 1;
            if now >= entry.first_event + window {
                let cycles = entry.cycles;
                self.entries.remove(&path);
                decisions.push(Decision::TimedOut { path, cycles });
                continue;
            }

            entry.last_observed_size = Some(size);
            entry.deadline = now + self.quiet_period;
        }

        decisions
    }

    /// Drop the entry for `path` once its job reached a terminal state.
    pub fn finish(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    /// Drop every entry that has not started processing. Returns how many
    /// were cancelled.
    pub fn cancel_pending(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.state == EntryState::Processing);
        before - self.entries.len()
    }

    /// Current state of `path`, if tracked.
    #[must_use]
    pub fn state(&self, path: &Path) -> Option<EntryState> {
        self.entries.get(path).map(|e| e.state)
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no path is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
