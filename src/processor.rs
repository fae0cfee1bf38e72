//! Single-image processing: classify, unblend, encode, write.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, RgbImage};

use crate::blending;
use crate::error::{Error, Result};
use crate::output::{self, OutputConfig};
use crate::profile::{ProfileRegistry, SizeClass};

/// Why a file was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No overlay profile covers the image dimensions.
    UnmatchedSize {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// The file kept changing for the whole stabilization window.
    PartialFileTimeout {
        /// Number of debounce cycles observed.
        cycles: u32,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedSize { width, height } => {
                write!(f, "unmatched size ({width}x{height})")
            }
            Self::PartialFileTimeout { cycles } => {
                write!(f, "file still changing after {cycles} debounce cycles")
            }
        }
    }
}

/// Non-error result of processing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Watermark removed and the cleaned image written.
    Processed {
        /// Written file.
        output: PathBuf,
        /// Overlay geometry that was removed.
        size_class: SizeClass,
    },
    /// Source left untouched.
    Skipped(SkipReason),
}

/// A unit of work: one source image plus the shared output settings.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    /// Image to clean.
    pub source: PathBuf,
    /// Output settings.
    pub output: OutputConfig,
}

impl ProcessingJob {
    /// Create a job for `source`.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, output: OutputConfig) -> Self {
        Self {
            source: source.into(),
            output,
        }
    }
}

/// Watermark remover holding the shared, read-only overlay profiles.
///
/// Create once and share behind an `Arc` between batch runs and watcher
/// workers.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    registry: Arc<ProfileRegistry>,
}

impl ImageProcessor {
    /// Create a processor over a loaded registry.
    #[must_use]
    pub fn new(registry: Arc<ProfileRegistry>) -> Self {
        Self { registry }
    }

    /// Load overlay resources from `resource_dir` and build a processor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLoad`] if any resource is missing or malformed.
    pub fn from_resource_dir(resource_dir: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(ProfileRegistry::load(resource_dir)?)))
    }

    /// Overlay profiles in use.
    #[must_use]
    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Remove the watermark from an image in place.
    ///
    /// Returns the size class that was removed, or `None` if the image
    /// dimensions match no profile (the image is then left untouched).
    pub fn remove(&self, image: &mut RgbImage) -> Option<SizeClass> {
        let (w, h) = image.dimensions();
        let profile = self.registry.profile_for(w, h)?;
        let (x, y) = profile.origin(w, h);

        let patch = imageops::crop_imm(image, x, y, profile.width(), profile.height()).to_image();
        let recovered = blending::recover(&patch, profile);
        imageops::replace(image, &recovered, i64::from(x), i64::from(y));

        Some(profile.size_class())
    }

    /// Process one file: load, remove, encode, write to `destination`.
    ///
    /// Images whose dimensions match no profile are skipped without reading
    /// pixel data or touching the filesystem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`], [`Error::UnsupportedFormat`],
    /// [`Error::Encode`] or [`Error::Write`]. On error no file exists at
    /// `destination` unless one was there before.
    pub fn process(
        &self,
        source: &Path,
        destination: &Path,
        config: &OutputConfig,
    ) -> Result<Outcome> {
        let decode_err = |source_err| Error::Decode {
            path: source.to_path_buf(),
            source: source_err,
        };

        let (width, height) = image::image_dimensions(source).map_err(decode_err)?;
        if self.registry.profile_for(width, height).is_none() {
            tracing::debug!(path = %source.display(), width, height, "No overlay profile matches");
            return Ok(Outcome::Skipped(SkipReason::UnmatchedSize { width, height }));
        }

        let format = config.format.image_format(source)?;
        let mut img = image::open(source).map_err(decode_err)?.to_rgb8();

        let Some(size_class) = self.remove(&mut img) else {
            return Ok(Outcome::Skipped(SkipReason::UnmatchedSize { width, height }));
        };

        let bytes = output::encode(&img, format, config.quality)?;
        output::write_atomic(&bytes, destination)?;

        tracing::debug!(
            source = %source.display(),
            output = %destination.display(),
            size_class = %size_class,
            "Watermark removed"
        );

        Ok(Outcome::Processed {
            output: destination.to_path_buf(),
            size_class,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use crate::profile::OverlayProfile;
    use image::{Rgb, Rgba, RgbaImage};

    fn processor() -> ImageProcessor {
        let small = OverlayProfile::from_rgba(
            SizeClass::Small,
            &RgbaImage::from_pixel(48, 48, Rgba([255, 255, 255, 100])),
        )
        .unwrap();
        let large = OverlayProfile::from_rgba(
            SizeClass::Large,
            &RgbaImage::from_pixel(96, 96, Rgba([255, 255, 255, 100])),
        )
        .unwrap();
        ImageProcessor::new(Arc::new(ProfileRegistry::from_profiles(small, large)))
    }

    #[test]
    fn remove_only_touches_overlay_region() {
        let processor = processor();
        let mut img = RgbImage::from_pixel(200, 200, Rgb([200, 200, 200]));

        assert_eq!(processor.remove(&mut img), Some(SizeClass::Small));

        // Region spans 120..168 on both axes
        assert_eq!(img.get_pixel(119, 150), &Rgb([200, 200, 200]));
        assert_eq!(img.get_pixel(168, 150), &Rgb([200, 200, 200]));
        assert_eq!(img.get_pixel(199, 199), &Rgb([200, 200, 200]));
        assert_ne!(img.get_pixel(120, 120), &Rgb([200, 200, 200]));
        assert_ne!(img.get_pixel(167, 167), &Rgb([200, 200, 200]));
    }

    #[test]
    fn remove_returns_none_for_unmatched_size() {
        let processor = processor();
        let mut img = RgbImage::from_pixel(40, 40, Rgb([1, 2, 3]));
        let before = img.clone();
        assert_eq!(processor.remove(&mut img), None);
        assert_eq!(img, before);
    }

    #[test]
    fn process_reports_decode_error_for_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("broken.png");
        std::fs::write(&source, b"not really a png").unwrap();
        let dest = dir.path().join("out.png");

        let err = processor()
            .process(&source, &dest, &OutputConfig::default())
            .unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn process_reports_unsupported_format_for_keep_original_gif() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("anim.gif");
        RgbImage::from_pixel(200, 200, Rgb([9, 9, 9]))
            .save(&source)
            .unwrap();
        let dest = dir.path().join("Clean_anim.gif");

        let err = processor()
            .process(&source, &dest, &OutputConfig::default())
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn process_converts_format() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.bmp");
        RgbImage::from_pixel(300, 200, Rgb([50, 60, 70]))
            .save(&source)
            .unwrap();
        let dest = dir.path().join("out.webp");
        let config = OutputConfig::new(OutputFormat::WebP, 80, None).unwrap();

        let outcome = processor().process(&source, &dest, &config).unwrap();

        assert_eq!(
            outcome,
            Outcome::Processed {
                output: dest.clone(),
                size_class: SizeClass::Small
            }
        );
        let written = image::open(&dest).unwrap();
        assert_eq!((written.width(), written.height()), (300, 200));
    }
}
