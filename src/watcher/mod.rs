//! Continuous processing of images dropped into a watched directory.
//!
//! The pipeline is three stages connected by channels:
//!
//! 1. the notify callback normalizes OS events into [`FileEvent`]s and
//!    filters out anything that is not a fresh candidate image;
//! 2. a single debounce thread owns every [`debounce::WatchEntry`] and
//!    decides when a file has stopped changing;
//! 3. a fixed pool of workers cleans stabilized files, writes
//!    `Clean_{name}` next to them and moves the original into `Archive/`.
//!
//! Workers report completion back to the debounce thread so each file goes
//! from event to terminal state exactly once.

pub mod archive;
pub mod debounce;
pub mod events;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::{Error, Result};
use crate::naming;
use crate::output::OutputConfig;
use crate::processor::{ImageProcessor, Outcome, ProcessingJob, SkipReason};

use debounce::{Debouncer, Decision};
pub use events::{FileEvent, FileEventKind};

/// Default quiet period before a file is re-examined.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(800);
/// Default number of quiet periods a changing file is waited for (~60s).
pub const DEFAULT_MAX_DEBOUNCE_CYCLES: u32 = 75;
/// Default worker pool size.
pub const DEFAULT_WORKERS: usize = 2;
/// Default capacity of the stabilized-job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Tunables of a directory watcher.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    /// Time without events (and without size change) before processing.
    pub quiet_period: Duration,
    /// Quiet periods a still-changing file is waited for before it is skipped.
    pub max_debounce_cycles: u32,
    /// Worker threads.
    pub workers: usize,
    /// Bounded queue between the debouncer and the workers.
    pub queue_capacity: usize,
    /// Output encoding. `output_dir` is ignored: cleaned files always land
    /// in the watched directory.
    pub output: OutputConfig,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            max_debounce_cycles: DEFAULT_MAX_DEBOUNCE_CYCLES,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            output: OutputConfig::default(),
        }
    }
}

/// Terminal state of a watched file.
#[derive(Debug)]
pub enum WatchOutcome {
    /// Cleaned image written and original archived.
    Archived {
        /// Cleaned image.
        output: PathBuf,
        /// New location of the original.
        archived_to: PathBuf,
    },
    /// File left in place.
    Skipped(SkipReason),
    /// Processing failed; file left in place, not retried.
    Failed(Error),
}

/// Structured result for one watched file.
#[derive(Debug)]
pub struct WatchReport {
    /// File that triggered the job.
    pub source: PathBuf,
    /// What happened to it.
    pub outcome: WatchOutcome,
}

/// A running watch on one directory.
///
/// Dropping the watcher stops it the same way [`DirectoryWatcher::stop`] does.
pub struct DirectoryWatcher {
    dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
    shutdown: Option<Sender<()>>,
    stopping: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    reports: Receiver<WatchReport>,
}

impl DirectoryWatcher {
    /// Start watching `dir` (non-recursively).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if `dir` cannot be resolved or threads cannot
    /// be spawned, or [`Error::Watch`] if the OS watcher cannot attach.
    pub fn start(
        dir: &Path,
        processor: Arc<ImageProcessor>,
        settings: WatchSettings,
    ) -> Result<Self> {
        let dir = dir.canonicalize()?;

        let (event_tx, event_rx) = channel::unbounded::<FileEvent>();
        let (job_tx, job_rx) = channel::bounded::<ProcessingJob>(settings.queue_capacity.max(1));
        let (done_tx, done_rx) = channel::unbounded::<PathBuf>();
        let (report_tx, report_rx) = channel::unbounded::<WatchReport>();
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let stopping = Arc::new(AtomicBool::new(false));
        let reserved = Arc::new(Mutex::new(HashSet::new()));

        let mut threads = Vec::with_capacity(settings.workers + 1);

        let debounce = DebounceLoop {
            debouncer: Debouncer::new(settings.quiet_period, settings.max_debounce_cycles),
            events: event_rx,
            done: done_rx,
            shutdown: shutdown_rx,
            output: settings.output,
            jobs: job_tx,
            reports: report_tx.clone(),
        };
        threads.push(
            thread::Builder::new()
                .name("gwr-debounce".into())
                .spawn(move || debounce.run())?,
        );

        for id in 0..settings.workers.max(1) {
            let worker = Worker {
                id,
                dir: dir.clone(),
                processor: Arc::clone(&processor),
                jobs: job_rx.clone(),
                reserved: Arc::clone(&reserved),
                done: done_tx.clone(),
                reports: report_tx.clone(),
                stopping: Arc::clone(&stopping),
            };
            threads.push(
                thread::Builder::new()
                    .name(format!("gwr-worker-{id}"))
                    .spawn(move || worker.run())?,
            );
        }

        let filter_dir = dir.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for ev in events::normalize(event, Instant::now()) {
                        if events::is_candidate(&filter_dir, &ev.path) {
                            tracing::debug!(path = %ev.path.display(), kind = ?ev.kind, "File event");
                            let _ = event_tx.send(ev);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "File watcher error"),
            })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %dir.display(), workers = settings.workers, "Directory watcher started");

        Ok(Self {
            dir,
            watcher: Some(watcher),
            shutdown: Some(shutdown_tx),
            stopping,
            threads,
            reports: report_rx,
        })
    }

    /// Watched directory (canonicalized).
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Receiver of per-file reports. Every clone sees each report once.
    #[must_use]
    pub fn reports(&self) -> Receiver<WatchReport> {
        self.reports.clone()
    }

    /// Stop watching.
    ///
    /// Pending debounce timers are cancelled and queued jobs are discarded,
    /// but jobs already being processed run to completion before this
    /// returns.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }

        self.stopping.store(true, Ordering::SeqCst);
        self.watcher.take();
        self.shutdown.take();

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!(path = %self.dir.display(), "Watcher thread panicked");
            }
        }
        tracing::info!(path = %self.dir.display(), "Directory watcher stopped");
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
}

struct DebounceLoop {
    debouncer: Debouncer,
    events: Receiver<FileEvent>,
    done: Receiver<PathBuf>,
    shutdown: Receiver<()>,
    output: OutputConfig,
    jobs: Sender<ProcessingJob>,
    reports: Sender<WatchReport>,
}

impl DebounceLoop {
    fn run(mut self) {
        loop {
            let timer = match self.debouncer.next_deadline() {
                Some(deadline) => channel::at(deadline),
                None => channel::never(),
            };

            crossbeam::select! {
                recv(self.shutdown) -> _ => break,
                recv(self.events) -> msg => match msg {
                    Ok(event) => {
                        let size = file_size(&event.path);
                        if !self.debouncer.observe(&event, size) {
                            tracing::debug!(path = %event.path.display(), "Ignoring event for file being processed");
                        }
                    }
                    Err(_) => break,
                },
                recv(self.done) -> msg => {
                    if let Ok(path) = msg {
                        self.debouncer.finish(&path);
                    }
                },
                recv(timer) -> _ => {},
            }

            for decision in self.debouncer.poll(Instant::now(), file_size) {
                self.dispatch(decision);
            }
        }

        let cancelled = self.debouncer.cancel_pending();
        tracing::debug!(cancelled, "Debouncer stopped");
    }

    fn dispatch(&mut self, decision: Decision) {
        match decision {
            Decision::Stabilized(path) => {
                tracing::debug!(path = %path.display(), "File stabilized");
                let job = ProcessingJob::new(path.clone(), self.output.clone());
                if self.jobs.send(job).is_err() {
                    self.debouncer.finish(&path);
                }
            }
            Decision::TimedOut { path, cycles } => {
                let reason = SkipReason::PartialFileTimeout { cycles };
                tracing::warn!(path = %path.display(), %reason, "Skipped");
                let _ = self.reports.send(WatchReport {
                    source: path,
                    outcome: WatchOutcome::Skipped(reason),
                });
            }
            Decision::Vanished(path) => {
                tracing::debug!(path = %path.display(), "File vanished before it stabilized");
            }
        }
    }
}

struct Worker {
    id: usize,
    dir: PathBuf,
    processor: Arc<ImageProcessor>,
    jobs: Receiver<ProcessingJob>,
    done: Sender<PathBuf>,
    reports: Sender<WatchReport>,
    stopping: Arc<AtomicBool>,
    /// `Clean_` names claimed by in-flight jobs.
    reserved: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Worker {
    fn run(self) {
        for job in &self.jobs {
            let source = job.source.clone();
            if self.stopping.load(Ordering::SeqCst) {
                tracing::debug!(worker = self.id, path = %source.display(), "Discarding queued job after stop");
                let _ = self.done.send(source);
                continue;
            }

            let outcome = self.process(&job);
            match &outcome {
                WatchOutcome::Archived {
                    output,
                    archived_to,
                } => tracing::info!(
                    worker = self.id,
                    source = %source.display(),
                    output = %output.display(),
                    archived_to = %archived_to.display(),
                    "Processed and archived"
                ),
                WatchOutcome::Skipped(reason) => {
                    tracing::warn!(worker = self.id, source = %source.display(), %reason, "Skipped");
                }
                WatchOutcome::Failed(e) => {
                    tracing::error!(worker = self.id, source = %source.display(), error = %e, "Failed");
                }
            }

            let _ = self.reports.send(WatchReport {
                source: source.clone(),
                outcome,
            });
            let _ = self.done.send(source);
        }
    }

    /// Pick a free `Clean_` name for the job and run it. The name stays
    /// reserved until the job ends, so concurrent jobs never share it.
    fn process(&self, job: &ProcessingJob) -> WatchOutcome {
        let destination = {
            let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
            naming::clean_destination(&job.source, job.output.format, &mut reserved)
        };

        let outcome = self.clean_and_archive(job, &destination);

        self.reserved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&destination);
        outcome
    }

    /// Clean the source, then archive it. A failed archive rolls back the
    /// output so the job leaves either both effects or neither.
    fn clean_and_archive(&self, job: &ProcessingJob, destination: &Path) -> WatchOutcome {
        let source = job.source.as_path();

        match self.processor.process(source, destination, &job.output) {
            Ok(Outcome::Processed { output, .. }) => {
                match archive::archive_original(&self.dir, source) {
                    Ok(archived_to) => WatchOutcome::Archived {
                        output,
                        archived_to,
                    },
                    Err(e) => {
                        if let Err(rm) = std::fs::remove_file(&output) {
                            tracing::warn!(path = %output.display(), error = %rm, "Failed to roll back output");
                        }
                        WatchOutcome::Failed(e)
                    }
                }
            }
            Ok(Outcome::Skipped(reason)) => WatchOutcome::Skipped(reason),
            Err(e) => WatchOutcome::Failed(e),
        }
    }
}
