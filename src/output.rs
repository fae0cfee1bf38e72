//! Output format selection, encoding and crash-safe writes.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{ImageError, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Encoding used for the cleaned image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Same format as the source file.
    #[default]
    #[serde(rename = "keep")]
    #[cfg_attr(feature = "cli", value(name = "keep"))]
    KeepOriginal,
    /// JPEG, quality passed to the encoder.
    Jpeg,
    /// PNG, quality mapped to a compression preset.
    Png,
    /// Lossless WebP.
    #[serde(rename = "webp")]
    #[cfg_attr(feature = "cli", value(name = "webp"))]
    WebP,
}

impl OutputFormat {
    /// Concrete image format to encode a cleaned `source` with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] when keeping the original format
    /// and the source is not JPEG, PNG, WebP or BMP.
    pub fn image_format(self, source: &Path) -> Result<ImageFormat> {
        match self {
            Self::Jpeg => Ok(ImageFormat::Jpeg),
            Self::Png => Ok(ImageFormat::Png),
            Self::WebP => Ok(ImageFormat::WebP),
            Self::KeepOriginal => {
                let format = ImageFormat::from_path(source)
                    .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
                match format {
                    ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
                        Ok(format)
                    }
                    other => Err(Error::UnsupportedFormat(format!(
                        "cannot re-encode {other:?} sources"
                    ))),
                }
            }
        }
    }

    /// File extension (with leading dot) for output derived from `source`.
    ///
    /// Keeping the original format keeps the source extension verbatim.
    #[must_use]
    pub fn extension(self, source: &Path) -> String {
        match self {
            Self::Jpeg => ".jpg".to_string(),
            Self::Png => ".png".to_string(),
            Self::WebP => ".webp".to_string(),
            Self::KeepOriginal => source
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default(),
        }
    }
}

/// Output quality in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    /// Validate a quality value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuality`] outside `1..=100`.
    pub fn new(value: u32) -> Result<Self> {
        match u8::try_from(value) {
            Ok(q) if (1..=100).contains(&q) => Ok(Self(q)),
            _ => Err(Error::InvalidQuality(value)),
        }
    }

    /// Raw quality value.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// PNG compression preset: high quality favors speed over size.
    fn png_compression(self) -> CompressionType {
        match self.0 {
            67..=100 => CompressionType::Fast,
            34..=66 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// Output settings shared by every job of a batch or watcher.
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Encoding of the cleaned image.
    pub format: OutputFormat,
    /// Encoder quality.
    pub quality: Quality,
    /// Directory for outputs; `None` writes next to the source.
    pub output_dir: Option<PathBuf>,
}

impl OutputConfig {
    /// Build a config, validating `quality`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidQuality`] outside `1..=100`.
    pub fn new(format: OutputFormat, quality: u32, output_dir: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            format,
            quality: Quality::new(quality)?,
            output_dir,
        })
    }
}

/// Encode an RGB image into memory.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if no encoder exists for `format`,
/// or [`Error::Encode`] if the encoder fails.
pub fn encode(img: &RgbImage, format: ImageFormat, quality: Quality) -> Result<Vec<u8>> {
    let mut buf = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.get());
            encoder.encode_image(img).map_err(encode_error)?;
        }
        ImageFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, quality.png_compression(), FilterType::Adaptive);
            img.write_with_encoder(encoder).map_err(encode_error)?;
        }
        ImageFormat::WebP => {
            img.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
                .map_err(encode_error)?;
        }
        ImageFormat::Bmp => {
            img.write_with_encoder(BmpEncoder::new(&mut buf))
                .map_err(encode_error)?;
        }
        other => return Err(Error::UnsupportedFormat(format!("{other:?}"))),
    }

    Ok(buf)
}

fn encode_error(e: ImageError) -> Error {
    match e {
        ImageError::Unsupported(u) => Error::UnsupportedFormat(u.to_string()),
        other => Error::Encode(other),
    }
}

/// Write `bytes` to `destination` without ever exposing a truncated file.
///
/// Data goes to a temporary file in the destination directory, which is
/// renamed over `destination` once fully flushed. On failure the temporary
/// file is removed and `destination` is left as it was.
///
/// # Errors
///
/// Returns [`Error::Write`] on any I/O failure.
pub fn write_atomic(bytes: &[u8], destination: &Path) -> Result<()> {
    let write_err = |source: std::io::Error| Error::Write {
        path: destination.to_path_buf(),
        source,
    };

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(write_err)?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix(".gwr-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(destination).map_err(|e| write_err(e.error))?;

    Ok(())
}
