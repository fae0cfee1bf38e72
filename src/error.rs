//! Error types for the gemini-watermark-remover crate.

use std::path::PathBuf;

/// Errors that can occur while loading profiles, processing images or watching folders.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reference overlay resource is missing or malformed. Fatal at startup.
    #[error("failed to load overlay resource {path}: {reason}")]
    ResourceLoad {
        /// Resource file that failed to load.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The source image could not be read or decoded.
    #[error("failed to decode {path}: {source}")]
    Decode {
        /// Source image path.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// The requested output format cannot encode this image.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// The encoder rejected the image.
    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// The destination could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The original could not be moved into the archive folder.
    #[error("failed to archive {path}: {source}")]
    Archive {
        /// Original file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Output quality outside `1..=100`.
    #[error("quality must be between 1 and 100, got {0}")]
    InvalidQuality(u32),

    /// The filesystem watcher could not be created or attached.
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Persisted settings could not be parsed or serialized.
    #[error("invalid settings file {path}: {source}")]
    Settings {
        /// Settings file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An I/O error occurred outside of image reading and writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-friendly name of the error kind, used in job reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResourceLoad { .. } => "resource-load",
            Self::Decode { .. } => "decode",
            Self::UnsupportedFormat(_) => "unsupported-format",
            Self::Encode(_) => "encode",
            Self::Write { .. } => "write",
            Self::Archive { .. } => "archive",
            Self::InvalidQuality(_) => "invalid-quality",
            Self::Watch(_) => "watch",
            Self::Settings { .. } => "settings",
            Self::Io(_) => "io",
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tiff".to_string());
        assert!(unsupported.to_string().contains("tiff"));

        let write = Error::Write {
            path: PathBuf::from("/out/a.png"),
            source: std::io::Error::new(std::io::ErrorKind::StorageFull, "disk full"),
        };
        let msg = write.to_string();
        assert!(msg.contains("/out/a.png"));
        assert!(msg.contains("disk full"));
        assert_eq!(write.kind(), "write");

        let quality = Error::InvalidQuality(101);
        assert!(quality.to_string().contains("101"));
    }
}
