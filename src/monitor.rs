//! Owner of the current watch configuration.
//!
//! A [`Monitor`] holds at most one [`DirectoryWatcher`]. Applying new settings
//! stops the previous watcher completely before the next one starts, so two
//! watchers never race over archive folders or output names.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::Receiver;

use crate::error::Result;
use crate::processor::ImageProcessor;
use crate::settings::MonitorSettings;
use crate::watcher::{DirectoryWatcher, WatchReport, WatchSettings};

/// Single-writer holder of the active directory watcher.
pub struct Monitor {
    processor: Arc<ImageProcessor>,
    active: Mutex<Option<DirectoryWatcher>>,
}

impl Monitor {
    /// Create an idle monitor.
    #[must_use]
    pub fn new(processor: Arc<ImageProcessor>) -> Self {
        Self {
            processor,
            active: Mutex::new(None),
        }
    }

    /// Replace the active watch.
    ///
    /// The current watcher (if any) is stopped first. With `dir = None` the
    /// monitor is left idle. Returns the report receiver of the new watcher.
    ///
    /// # Errors
    ///
    /// Propagates [`DirectoryWatcher::start`] errors; the monitor is idle
    /// afterwards.
    pub fn watch(
        &self,
        dir: Option<&Path>,
        settings: WatchSettings,
    ) -> Result<Option<Receiver<WatchReport>>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = active.take() {
            tracing::debug!(path = %previous.dir().display(), "Stopping previous watcher");
            previous.stop();
        }

        let Some(dir) = dir else {
            return Ok(None);
        };

        let watcher = DirectoryWatcher::start(dir, Arc::clone(&self.processor), settings)?;
        let reports = watcher.reports();
        *active = Some(watcher);
        Ok(Some(reports))
    }

    /// Apply persisted settings: watch `watch_dir` when `enabled`, else idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the watcher fails to start.
    pub fn apply(&self, settings: &MonitorSettings) -> Result<Option<Receiver<WatchReport>>> {
        let watch_settings = settings.watch_settings()?;
        let dir = settings
            .watch_dir
            .as_deref()
            .filter(|_| settings.enabled);
        self.watch(dir, watch_settings)
    }

    /// Directory currently watched.
    #[must_use]
    pub fn watched_dir(&self) -> Option<PathBuf> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|w| w.dir().to_path_buf())
    }

    /// Stop the active watcher, letting in-flight jobs finish.
    pub fn shutdown(&self) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(watcher) = previous {
            watcher.stop();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
