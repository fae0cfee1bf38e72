use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gemini_watermark_remover::settings::DEFAULT_RESOURCE_DIR;
use gemini_watermark_remover::{
    profile, BatchCoordinator, ImageProcessor, JobReport, Monitor, OutputConfig, OutputFormat,
    SettingsStore, WatchOutcome, WatchReport,
};

#[derive(Parser)]
#[command(
    name = "gemini-watermark",
    about = "Remove visible Gemini AI watermarks via reverse alpha blending",
    version,
    after_help = "Batch usage: gemini-watermark batch <images>...  (writes {stem}_no_watermark_{timestamp}{ext})\n\
                  Watch usage: gemini-watermark watch <dir>  (writes Clean_{name}, archives originals)\n\n\
                  NOTE: This tool only removes the VISIBLE Gemini watermark (star/sparkle logo).\n\
                  It cannot remove SynthID (invisible watermark)."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the bg_48.png and bg_96.png overlay resources
    #[arg(long, global = true)]
    resources: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Remove watermarks from a list of images
    Batch {
        /// Input images
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output directory (default: next to each source)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "keep")]
        format: OutputFormat,

        /// Output quality (1-100)
        #[arg(short = 'Q', long, default_value_t = 95)]
        quality: u32,
    },

    /// Watch a directory and clean images as they arrive
    Watch {
        /// Directory to watch (default: the one stored in the settings file)
        dir: Option<PathBuf>,

        /// Settings file
        #[arg(long, default_value = "gemini-watermark.json")]
        settings: PathBuf,

        /// Store the effective settings before starting
        #[arg(long)]
        save: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Output quality (1-100)
        #[arg(short = 'Q', long)]
        quality: Option<u32>,

        /// Worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Debounce quiet period in milliseconds
        #[arg(long)]
        quiet_period_ms: Option<u64>,
    },

    /// Convert a background capture (logo over black) into an overlay resource
    ImportCapture {
        /// Capture image
        capture: PathBuf,

        /// Output PNG resource, e.g. bg_48.png
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match (&cli.command, cli.verbose, cli.quiet) {
        (_, true, _) => "debug",
        (_, _, true) => "error",
        (Command::Watch { .. }, _, _) => "info",
        _ => "warn",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gemini_watermark_remover={default_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let code = match cli.command {
        Command::Batch {
            ref paths,
            ref output_dir,
            format,
            quality,
        } => run_batch(&cli, paths, output_dir.clone(), format, quality),
        Command::Watch {
            ref dir,
            ref settings,
            save,
            format,
            quality,
            workers,
            quiet_period_ms,
        } => {
            let overrides = WatchOverrides {
                dir: dir.clone(),
                format,
                quality,
                workers,
                quiet_period_ms,
            };
            run_watch(&cli, settings, save, overrides)
        }
        Command::ImportCapture {
            ref capture,
            ref output,
        } => run_import_capture(capture, output),
    };

    process::exit(code);
}

fn load_processor(resource_dir: &Path) -> Arc<ImageProcessor> {
    match ImageProcessor::from_resource_dir(resource_dir) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("Fatal: Failed to initialize engine: {e}");
            process::exit(1);
        }
    }
}

fn run_batch(
    cli: &Cli,
    paths: &[PathBuf],
    output_dir: Option<PathBuf>,
    format: OutputFormat,
    quality: u32,
) -> i32 {
    let config = match OutputConfig::new(format, quality, output_dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let resource_dir = cli
        .resources
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RESOURCE_DIR));
    let coordinator = BatchCoordinator::new(load_processor(&resource_dir));
    let summary = coordinator.run(paths, &config);

    for report in &summary.reports {
        print_job_report(report, cli);
    }

    if summary.reports.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {}", summary.succeeded());
        if summary.skipped() > 0 {
            eprint!(", Skipped: {}", summary.skipped());
        }
        if summary.failed() > 0 {
            eprint!(", Failed: {}", summary.failed());
        }
        eprintln!(" (Total: {})", summary.reports.len());
    }

    i32::from(summary.failed() > 0)
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn print_job_report(report: &JobReport, cli: &Cli) {
    let filename = display_name(&report.source);

    if let Some(e) = report.error() {
        eprintln!("[FAIL] {filename}: {e}");
        if cli.verbose {
            eprintln!("  -> kind: {}", e.kind());
        }
    } else if let Some(reason) = report.skip_reason() {
        if !cli.quiet {
            eprintln!("[SKIP] {filename}: {reason}");
        }
    } else if !cli.quiet {
        eprintln!("[OK] {filename} -> {}", report.destination.display());
    }
}

struct WatchOverrides {
    dir: Option<PathBuf>,
    format: Option<OutputFormat>,
    quality: Option<u32>,
    workers: Option<usize>,
    quiet_period_ms: Option<u64>,
}

fn run_watch(cli: &Cli, settings_path: &Path, save: bool, overrides: WatchOverrides) -> i32 {
    let store = SettingsStore::new(settings_path);
    let mut settings = match store.load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    if let Some(dir) = overrides.dir {
        settings.watch_dir = Some(dir);
    }
    if let Some(format) = overrides.format {
        settings.output_format = format;
    }
    if let Some(quality) = overrides.quality {
        settings.quality = quality;
    }
    if let Some(workers) = overrides.workers {
        settings.workers = workers;
    }
    if let Some(ms) = overrides.quiet_period_ms {
        settings.quiet_period_ms = ms;
    }
    if let Some(resources) = &cli.resources {
        settings.resource_dir.clone_from(resources);
    }
    settings.enabled = true;

    if settings.watch_dir.is_none() {
        eprintln!("Error: No directory to watch");
        eprintln!("Usage: gemini-watermark watch <dir>");
        return 1;
    }

    if save {
        if let Err(e) = store.save(&settings) {
            eprintln!("Error: {e}");
            return 1;
        }
    }

    let monitor = Monitor::new(load_processor(&settings.resource_dir));
    let reports = match monitor.apply(&settings) {
        Ok(Some(reports)) => reports,
        Ok(None) => return 0,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };

    let (stop_tx, stop_rx) = crossbeam::channel::bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    }) {
        eprintln!("Error: Failed to install Ctrl-C handler: {e}");
        return 1;
    }

    if !cli.quiet {
        eprintln!("Watching for new images (Ctrl-C to stop)");
    }

    loop {
        crossbeam::select! {
            recv(stop_rx) -> _ => break,
            recv(reports) -> report => match report {
                Ok(report) => print_watch_report(&report, cli),
                Err(_) => break,
            },
        }
    }

    monitor.shutdown();
    0
}

fn print_watch_report(report: &WatchReport, cli: &Cli) {
    let filename = display_name(&report.source);
    match &report.outcome {
        WatchOutcome::Archived { output, .. } => {
            if !cli.quiet {
                eprintln!("[OK] {filename} -> {}", display_name(output));
            }
        }
        WatchOutcome::Skipped(reason) => {
            if !cli.quiet {
                eprintln!("[SKIP] {filename}: {reason}");
            }
        }
        WatchOutcome::Failed(e) => eprintln!("[FAIL] {filename}: {e}"),
    }
}

fn run_import_capture(capture: &Path, output: &Path) -> i32 {
    let img = match image::open(capture) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            eprintln!("Error: Failed to load {}: {e}", capture.display());
            return 1;
        }
    };

    let resource = profile::resource_from_capture(&img);
    if let Err(e) = resource.save_with_format(output, image::ImageFormat::Png) {
        eprintln!("Error: Failed to save {}: {e}", output.display());
        return 1;
    }

    eprintln!(
        "Wrote {}x{} overlay resource to {}",
        resource.width(),
        resource.height(),
        output.display()
    );
    0
}
