//! Remove visible Gemini AI watermarks via reverse alpha blending.
//!
//! Gemini overlays a semi-transparent star/sparkle logo near the bottom-right
//! corner of generated images. This crate reverses the alpha-blending equation
//! to recover the original pixels, using reference overlay patches (one per
//! image size class) loaded from disk at startup.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use gemini_watermark_remover::{ImageProcessor, OutputConfig, OutputFormat, Outcome};
//!
//! let processor = ImageProcessor::from_resource_dir(Path::new("assets/gemini_watermark"))
//!     .expect("overlay resources missing");
//! let config = OutputConfig::new(OutputFormat::Png, 90, None).unwrap();
//! match processor.process(Path::new("photo.jpg"), Path::new("cleaned.png"), &config) {
//!     Ok(Outcome::Processed { output, .. }) => println!("wrote {}", output.display()),
//!     Ok(Outcome::Skipped(reason)) => println!("skipped: {reason}"),
//!     Err(e) => eprintln!("failed: {e}"),
//! }
//! ```
//!
//! # Watching a folder
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use gemini_watermark_remover::{DirectoryWatcher, ImageProcessor, WatchSettings};
//!
//! let processor = Arc::new(
//!     ImageProcessor::from_resource_dir(Path::new("assets/gemini_watermark")).unwrap(),
//! );
//! let watcher =
//!     DirectoryWatcher::start(Path::new("Downloads"), processor, WatchSettings::default())
//!         .unwrap();
//! for report in watcher.reports().iter().take(1) {
//!     println!("{}: {:?}", report.source.display(), report.outcome);
//! }
//! watcher.stop();
//! ```
//!
//! Images can be cleaned one by one with [`ImageProcessor`], as a batch with
//! [`BatchCoordinator`], or continuously with [`DirectoryWatcher`], which picks
//! up files as they finish downloading, writes `Clean_{name}` next to them and
//! moves the original into an `Archive` subfolder.

#![deny(missing_docs)]

pub mod batch;
pub mod blending;
pub mod error;
pub mod monitor;
pub mod naming;
pub mod output;
pub mod processor;
pub mod profile;
pub mod settings;
pub mod watcher;

pub use batch::{BatchCoordinator, BatchSummary, JobReport};
pub use error::{Error, Result};
pub use monitor::Monitor;
pub use output::{OutputConfig, OutputFormat, Quality};
pub use processor::{ImageProcessor, Outcome, ProcessingJob, SkipReason};
pub use profile::{OverlayProfile, ProfileRegistry, SizeClass};
pub use settings::{MonitorSettings, SettingsStore};
pub use watcher::{DirectoryWatcher, WatchOutcome, WatchReport, WatchSettings};
