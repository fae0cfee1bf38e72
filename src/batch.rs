//! One-shot processing of an explicit list of files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;

use crate::error::Error;
use crate::naming;
use crate::output::OutputConfig;
use crate::processor::{ImageProcessor, Outcome, ProcessingJob, SkipReason};

/// Result of one batch job.
#[derive(Debug)]
pub struct JobReport {
    /// Source image.
    pub source: PathBuf,
    /// Resolved destination.
    pub destination: PathBuf,
    /// What happened.
    pub result: Result<Outcome, Error>,
}

impl JobReport {
    /// Whether the output was written.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.result, Ok(Outcome::Processed { .. }))
    }

    /// Skip reason, if the source was left alone.
    #[must_use]
    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.result {
            Ok(Outcome::Skipped(reason)) => Some(reason),
            _ => None,
        }
    }

    /// Error, if the job failed.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }
}

/// Reports for every job of a batch, in submission order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Per-file reports.
    pub reports: Vec<JobReport>,
}

impl BatchSummary {
    /// Number of files written.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.succeeded()).count()
    }

    /// Number of files skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.skip_reason().is_some()).count()
    }

    /// Number of files that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.error().is_some()).count()
    }

    /// Failed sources with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &Error)> {
        self.reports
            .iter()
            .filter_map(|r| r.error().map(|e| (r.source.as_path(), e)))
    }
}

/// Runs independent jobs over a list of paths with one shared output config.
pub struct BatchCoordinator {
    processor: Arc<ImageProcessor>,
}

impl BatchCoordinator {
    /// Create a coordinator over a shared processor.
    #[must_use]
    pub fn new(processor: Arc<ImageProcessor>) -> Self {
        Self { processor }
    }

    /// Process every path, continuing past failures.
    ///
    /// Destinations are resolved up front, in order, so two sources with the
    /// same stem never race for the same output name. With the `parallel`
    /// feature the jobs themselves then run on the rayon pool.
    #[must_use]
    pub fn run(&self, paths: &[PathBuf], config: &OutputConfig) -> BatchSummary {
        let mut reserved = HashSet::new();
        let planned: Vec<(ProcessingJob, PathBuf)> = paths
            .iter()
            .map(|path| {
                let job = ProcessingJob::new(path.clone(), config.clone());
                let destination = naming::batch_destination(
                    &job.source,
                    job.output.format,
                    job.output.output_dir.as_deref(),
                    &Local::now(),
                    &mut reserved,
                );
                (job, destination)
            })
            .collect();

        tracing::info!(jobs = planned.len(), "Starting batch");

        #[cfg(feature = "parallel")]
        let reports = {
            use rayon::prelude::*;
            planned
                .into_par_iter()
                .map(|(job, destination)| self.run_job(job, destination))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let reports = planned
            .into_iter()
            .map(|(job, destination)| self.run_job(job, destination))
            .collect();

        let summary = BatchSummary { reports };
        tracing::info!(
            succeeded = summary.succeeded(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Batch finished"
        );
        summary
    }

    fn run_job(&self, job: ProcessingJob, destination: PathBuf) -> JobReport {
        let result = self
            .processor
            .process(&job.source, &destination, &job.output);

        match &result {
            Ok(Outcome::Processed { output, .. }) => {
                tracing::info!(source = %job.source.display(), output = %output.display(), "Processed");
            }
            Ok(Outcome::Skipped(reason)) => {
                tracing::warn!(source = %job.source.display(), %reason, "Skipped");
            }
            Err(e) => {
                tracing::error!(source = %job.source.display(), error = %e, "Failed");
            }
        }

        JobReport {
            source: job.source,
            destination,
            result,
        }
    }
}
