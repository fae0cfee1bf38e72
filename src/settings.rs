//! Persisted monitor settings.
//!
//! The watcher itself only ever sees a [`WatchSettings`] value; this module is
//! the key-value store a front end uses to remember the watched directory and
//! tunables between runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::output::{self, OutputConfig, OutputFormat};
use crate::watcher::{
    WatchSettings, DEFAULT_MAX_DEBOUNCE_CYCLES, DEFAULT_QUEUE_CAPACITY, DEFAULT_QUIET_PERIOD,
    DEFAULT_WORKERS,
};

/// Default location of the overlay reference patches.
pub const DEFAULT_RESOURCE_DIR: &str = "assets/gemini_watermark";

/// Monitor configuration as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorSettings {
    /// Directory to watch.
    pub watch_dir: Option<PathBuf>,
    /// Whether monitoring should start automatically.
    pub enabled: bool,
    /// Directory holding `bg_48.png` and `bg_96.png`.
    pub resource_dir: PathBuf,
    /// Encoding of cleaned images.
    pub output_format: OutputFormat,
    /// Encoder quality, `1..=100`.
    pub quality: u32,
    /// Debounce quiet period in milliseconds.
    pub quiet_period_ms: u64,
    /// Quiet periods a still-changing file is waited for before it is skipped.
    pub max_debounce_cycles: u32,
    /// Worker threads.
    pub workers: usize,
    /// Stabilized-job queue capacity.
    pub queue_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            watch_dir: None,
            enabled: false,
            resource_dir: PathBuf::from(DEFAULT_RESOURCE_DIR),
            output_format: OutputFormat::default(),
            quality: u32::from(output::Quality::default().get()),
            quiet_period_ms: u64::try_from(DEFAULT_QUIET_PERIOD.as_millis()).unwrap_or(800),
            max_debounce_cycles: DEFAULT_MAX_DEBOUNCE_CYCLES,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl MonitorSettings {
    /// Watcher tunables described by these settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuality`] if the stored quality is out of range.
    pub fn watch_settings(&self) -> Result<WatchSettings> {
        Ok(WatchSettings {
            quiet_period: Duration::from_millis(self.quiet_period_ms),
            max_debounce_cycles: self.max_debounce_cycles,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            output: OutputConfig::new(self.output_format, self.quality, None)?,
        })
    }
}

/// JSON file holding [`MonitorSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file exists but cannot be read, or
    /// [`Error::Settings`] if it is not valid JSON.
    pub fn load(&self) -> Result<MonitorSettings> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No settings file, using defaults");
                return Ok(MonitorSettings::default());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        serde_json::from_str(&contents).map_err(|source| Error::Settings {
            path: self.path.clone(),
            source,
        })
    }

    /// Persist settings atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Settings`] if serialization fails or [`Error::Write`]
    /// if the file cannot be written.
    pub fn save(&self, settings: &MonitorSettings) -> Result<()> {
        let json = serde_json::to_vec_pretty(settings).map_err(|source| Error::Settings {
            path: self.path.clone(),
            source,
        })?;
        output::write_atomic(&json, &self.path)?;
        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}
