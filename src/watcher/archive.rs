//! Relocation of processed originals into the archive subfolder.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::naming;

/// Archive folder for `watch_dir`.
#[must_use]
pub fn archive_dir(watch_dir: &Path) -> PathBuf {
    watch_dir.join(naming::ARCHIVE_DIR_NAME)
}

/// Move `source` into the archive folder of `watch_dir`, creating the folder
/// on first use. Returns the archived path.
///
/// # Errors
///
/// Returns [`Error::Archive`] if the folder cannot be created or the move fails.
pub fn archive_original(watch_dir: &Path, source: &Path) -> Result<PathBuf> {
    let archive_err = |e: std::io::Error| Error::Archive {
        path: source.to_path_buf(),
        source: e,
    };

    let dir = archive_dir(watch_dir);
    std::fs::create_dir_all(&dir).map_err(archive_err)?;

    let file_name = source.file_name().ok_or_else(|| {
        archive_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "source has no file name",
        ))
    })?;
    let target = naming::archive_destination(&dir, Path::new(file_name));

    std::fs::rename(source, &target).map_err(archive_err)?;
    Ok(target)
}
