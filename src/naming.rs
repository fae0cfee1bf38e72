//! Output and archive file naming.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use crate::output::OutputFormat;

/// Marker inserted between stem and timestamp for batch outputs.
pub const BATCH_MARKER: &str = "_no_watermark_";

/// Prefix of files written by the directory watcher.
pub const CLEAN_PREFIX: &str = "Clean_";

/// Subfolder of the watched directory receiving processed originals.
pub const ARCHIVE_DIR_NAME: &str = "Archive";

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Whether `path` looks like something this crate wrote.
#[must_use]
pub fn is_own_output(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| name.starts_with(CLEAN_PREFIX) || name.contains(BATCH_MARKER))
}

/// Destination for a batch job:
/// `{dir}/{stem}_no_watermark_{YYYYMMDDHHMMSS}{ext}`.
///
/// `dir` is `output_dir` or the source's own directory. When the name is
/// taken on disk or already in `reserved`, `_1`, `_2`, ... is appended
/// before the extension. The returned path is added to `reserved`.
pub fn batch_destination<Tz: TimeZone>(
    source: &Path,
    format: OutputFormat,
    output_dir: Option<&Path>,
    timestamp: &DateTime<Tz>,
    reserved: &mut HashSet<PathBuf>,
) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    let dir = output_dir
        .or_else(|| source.parent())
        .unwrap_or(Path::new("."));
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let ext = format.extension(source);
    let base = format!("{stem}{BATCH_MARKER}{}", timestamp.format("%Y%m%d%H%M%S"));

    let taken = |p: &Path| p.exists() || reserved.contains(p);

    let mut candidate = dir.join(format!("{base}{ext}"));
    let mut counter = 1u32;
    while taken(&candidate) {
        candidate = dir.join(format!("{base}_{counter}{ext}"));
        counter += 1;
    }

    reserved.insert(candidate.clone());
    candidate
}

/// Destination for a watcher job: `Clean_{stem}{ext}` next to the source.
///
/// When that name is taken on disk or in `reserved`, `Clean_{stem}_{n}{ext}`
/// is used instead. The returned path is added to `reserved`.
pub fn clean_destination(
    source: &Path,
    format: OutputFormat,
    reserved: &mut HashSet<PathBuf>,
) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let ext = format.extension(source);
    let parent = source.parent().unwrap_or(Path::new("."));

    let taken = |p: &Path| p.exists() || reserved.contains(p);

    let mut candidate = parent.join(format!("{CLEAN_PREFIX}{stem}{ext}"));
    let mut counter = 1u32;
    while taken(&candidate) {
        candidate = parent.join(format!("{CLEAN_PREFIX}{stem}_{counter}{ext}"));
        counter += 1;
    }

    reserved.insert(candidate.clone());
    candidate
}

/// Free path for `file_name` inside `archive_dir`, appending `_{n}` to the stem
/// when a file of that name was archived before.
#[must_use]
pub fn archive_destination(archive_dir: &Path, file_name: &Path) -> PathBuf {
    let first = archive_dir.join(file_name);
    if !first.exists() {
        return first;
    }

    let stem = file_name.file_stem().unwrap_or_default().to_string_lossy();
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| archive_dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
