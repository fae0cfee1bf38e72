//! Overlay profiles and the size-class rule that selects them.
//!
//! Gemini stamps one of two fixed logos near the bottom-right corner:
//! a 48x48 logo inset by 32px on ordinary images, and a 96x96 logo inset by
//! 64px when both edges exceed 1024px. Each logo is described by an RGBA
//! reference patch where RGB is the logo color and A its blend opacity.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

/// Both edges must exceed this for the large overlay to apply.
const LARGE_EDGE_THRESHOLD: u32 = 1024;

/// Longest edge covered by the known overlay geometries.
const MAX_EDGE: u32 = 2816;

/// Overlay size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    /// 48x48 logo, 32px inset.
    Small,
    /// 96x96 logo, 64px inset.
    Large,
}

impl SizeClass {
    /// Every known size class.
    pub const ALL: [SizeClass; 2] = [SizeClass::Small, SizeClass::Large];

    /// Edge length of the square logo patch.
    #[must_use]
    pub fn patch_size(self) -> u32 {
        match self {
            Self::Small => 48,
            Self::Large => 96,
        }
    }

    /// Distance between the patch and the right/bottom image edges.
    #[must_use]
    pub fn inset(self) -> u32 {
        match self {
            Self::Small => 32,
            Self::Large => 64,
        }
    }

    /// File name of the reference patch inside the resource directory.
    #[must_use]
    pub fn resource_name(self) -> &'static str {
        match self {
            Self::Small => "bg_48.png",
            Self::Large => "bg_96.png",
        }
    }

    /// Classify image dimensions.
    ///
    /// - `None` when either edge exceeds 2816px or the image cannot hold the
    ///   small patch plus its inset
    /// - **Large** when both edges exceed 1024px
    /// - **Small** otherwise (including 1024x1024)
    #[must_use]
    pub fn for_dimensions(width: u32, height: u32) -> Option<Self> {
        let min_edge = Self::Small.patch_size() + Self::Small.inset();
        if width > MAX_EDGE || height > MAX_EDGE || width < min_edge || height < min_edge {
            return None;
        }
        if width > LARGE_EDGE_THRESHOLD && height > LARGE_EDGE_THRESHOLD {
            Some(Self::Large)
        } else {
            Some(Self::Small)
        }
    }
}

impl std::fmt::Display for SizeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self.patch_size();
        write!(f, "{size}x{size}")
    }
}

/// A single overlay pixel: logo color and blend opacity in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPixel {
    /// Logo color.
    pub color: [u8; 3],
    /// Blend opacity.
    pub alpha: f32,
}

/// Reference overlay for one size class.
#[derive(Debug, Clone)]
pub struct OverlayProfile {
    size_class: SizeClass,
    width: u32,
    height: u32,
    pixels: Vec<OverlayPixel>,
}

impl OverlayProfile {
    /// Build a profile from an RGBA reference patch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLoad`] if the patch dimensions differ from the
    /// size class's declared patch size.
    pub fn from_rgba(size_class: SizeClass, patch: &RgbaImage) -> Result<Self> {
        let expected = size_class.patch_size();
        if patch.width() != expected || patch.height() != expected {
            return Err(Error::ResourceLoad {
                path: PathBuf::from(size_class.resource_name()),
                reason: format!(
                    "expected {expected}x{expected} patch, found {}x{}",
                    patch.width(),
                    patch.height()
                ),
            });
        }

        let pixels = patch
            .pixels()
            .map(|&Rgba([r, g, b, a])| OverlayPixel {
                color: [r, g, b],
                alpha: f32::from(a) / 255.0,
            })
            .collect();

        Ok(Self {
            size_class,
            width: expected,
            height: expected,
            pixels,
        })
    }

    /// Size class this profile belongs to.
    #[must_use]
    pub fn size_class(&self) -> SizeClass {
        self.size_class
    }

    /// Patch width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Patch height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Overlay pixel at patch-relative coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the patch.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> OverlayPixel {
        assert!(x < self.width && y < self.height, "({x},{y}) outside overlay patch");
        self.pixels[(y * self.width + x) as usize]
    }

    /// Top-left corner of the overlay region inside an image of the given size.
    #[must_use]
    pub fn origin(&self, img_w: u32, img_h: u32) -> (u32, u32) {
        let inset = self.size_class.inset();
        (
            img_w.saturating_sub(self.width + inset),
            img_h.saturating_sub(self.height + inset),
        )
    }
}

/// Read-only index of overlay profiles, one per size class.
///
/// Load once at startup and share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    small: OverlayProfile,
    large: OverlayProfile,
}

impl ProfileRegistry {
    /// Load `bg_48.png` and `bg_96.png` from `resource_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceLoad`] if a resource is missing, cannot be
    /// decoded, has no alpha channel or has the wrong dimensions.
    pub fn load(resource_dir: &Path) -> Result<Self> {
        let small = load_profile(resource_dir, SizeClass::Small)?;
        let large = load_profile(resource_dir, SizeClass::Large)?;
        tracing::debug!(dir = %resource_dir.display(), "Overlay profiles loaded");
        Ok(Self { small, large })
    }

    /// Build a registry from already constructed profiles.
    ///
    /// # Panics
    ///
    /// Panics if a profile is passed in the wrong slot.
    #[must_use]
    pub fn from_profiles(small: OverlayProfile, large: OverlayProfile) -> Self {
        assert_eq!(small.size_class(), SizeClass::Small, "small slot needs a Small profile");
        assert_eq!(large.size_class(), SizeClass::Large, "large slot needs a Large profile");
        Self { small, large }
    }

    /// Profile for a size class.
    #[must_use]
    pub fn get(&self, size_class: SizeClass) -> &OverlayProfile {
        match size_class {
            SizeClass::Small => &self.small,
            SizeClass::Large => &self.large,
        }
    }

    /// Profile matching the given image dimensions, if any.
    #[must_use]
    pub fn profile_for(&self, width: u32, height: u32) -> Option<&OverlayProfile> {
        SizeClass::for_dimensions(width, height).map(|class| self.get(class))
    }
}

fn load_profile(resource_dir: &Path, size_class: SizeClass) -> Result<OverlayProfile> {
    let path = resource_dir.join(size_class.resource_name());
    let resource_err = |reason: String| Error::ResourceLoad {
        path: path.clone(),
        reason,
    };

    let img = image::open(&path).map_err(|e| resource_err(e.to_string()))?;
    if !img.color().has_alpha() {
        return Err(resource_err(format!(
            "no alpha channel (color type {:?})",
            img.color()
        )));
    }

    OverlayProfile::from_rgba(size_class, &img.to_rgba8()).map_err(|e| match e {
        Error::ResourceLoad { reason, .. } => resource_err(reason),
        other => other,
    })
}

/// Convert a background capture into an RGBA reference patch.
///
/// A capture is the logo rendered over pure black, so each pixel's brightest
/// channel equals `alpha * 255` of a white logo. The result carries white
/// color with that derived alpha.
#[must_use]
pub fn resource_from_capture(capture: &image::RgbImage) -> RgbaImage {
    RgbaImage::from_fn(capture.width(), capture.height(), |x, y| {
        let px = capture.get_pixel(x, y);
        let alpha = px[0].max(px[1]).max(px[2]);
        Rgba([255, 255, 255, alpha])
    })
}
