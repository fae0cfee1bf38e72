//! Alpha blending math for watermark removal.
//!
//! Gemini applies watermarks via forward alpha blending:
//! `watermarked = alpha * color + (1 - alpha) * original`
//!
//! This module provides the reverse operation to recover original pixels.

use image::RgbImage;

use crate::profile::OverlayProfile;

/// Pixels at or above `1 - ALPHA_EPSILON` opacity hide the original completely.
pub const ALPHA_EPSILON: f32 = 1e-3;

/// Recover a single channel value.
///
/// Returns `observed` unchanged when `alpha` is too close to 1 for the
/// inversion to be meaningful.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn unblend_channel(observed: u8, color: u8, alpha: f32) -> u8 {
    if alpha >= 1.0 - ALPHA_EPSILON {
        return observed;
    }
    let original = (f32::from(observed) - f32::from(color) * alpha) / (1.0 - alpha);
    original.round().clamp(0.0, 255.0) as u8
}

/// Remove the overlay from a patch cut out of the watermarked image.
///
/// `patch` must be aligned with the profile: pixel `(x, y)` of the patch was
/// blended with overlay pixel `(x, y)`. Only the overlapping area is
/// processed; any part of `patch` beyond the profile is copied through.
#[must_use]
pub fn recover(patch: &RgbImage, profile: &OverlayProfile) -> RgbImage {
    let mut recovered = patch.clone();
    let w = patch.width().min(profile.width());
    let h = patch.height().min(profile.height());

    for y in 0..h {
        for x in 0..w {
            let overlay = profile.pixel(x, y);
            let px = recovered.get_pixel_mut(x, y);
            for ch in 0..3 {
                px[ch] = unblend_channel(px[ch], overlay.color[ch], overlay.alpha);
            }
        }
    }

    recovered
}

/// Apply the overlay to a clean patch, the way the generator does.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn composite(patch: &RgbImage, profile: &OverlayProfile) -> RgbImage {
    let mut blended = patch.clone();
    let w = patch.width().min(profile.width());
    let h = patch.height().min(profile.height());

    for y in 0..h {
        for x in 0..w {
            let overlay = profile.pixel(x, y);
            let px = blended.get_pixel_mut(x, y);
            for ch in 0..3 {
                let value = overlay.alpha * f32::from(overlay.color[ch])
                    + (1.0 - overlay.alpha) * f32::from(px[ch]);
                px[ch] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    blended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SizeClass;
    use image::{Rgb, Rgba, RgbaImage};

    /// Gradient overlay: alpha rises from 0 to 0.6 across the patch.
    ///
    /// 8-bit quantization of the composite adds up to 0.5 / (1 - alpha) of
    /// error, which stays under the +/-1 tolerance while alpha <= 2/3.
    fn gradient_profile() -> OverlayProfile {
        let patch = RgbaImage::from_fn(48, 48, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let a = ((x + y) * 153 / 94) as u8;
            Rgba([255, 240, 200, a])
        });
        OverlayProfile::from_rgba(SizeClass::Small, &patch).unwrap()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn textured_patch() -> RgbImage {
        RgbImage::from_fn(48, 48, |x, y| {
            Rgb([(x * 5) as u8, (y * 5) as u8, ((x * y) % 256) as u8])
        })
    }

    #[test]
    fn reverse_blend_recovers_original_within_tolerance() {
        let profile = gradient_profile();
        let original = textured_patch();
        let watermarked = composite(&original, &profile);
        let restored = recover(&watermarked, &profile);

        for (x, y, px) in restored.enumerate_pixels() {
            let orig = original.get_pixel(x, y);
            for ch in 0..3 {
                let diff = (i32::from(px[ch]) - i32::from(orig[ch])).abs();
                assert!(
                    diff <= 1,
                    "Pixel ({x},{y}) ch {ch} diff {diff} (restored={}, orig={})",
                    px[ch],
                    orig[ch]
                );
            }
        }
    }

    #[test]
    fn opaque_overlay_pixels_are_left_unchanged() {
        let mut overlay = RgbaImage::from_pixel(48, 48, Rgba([255, 255, 255, 255]));
        overlay.put_pixel(0, 0, Rgba([255, 255, 255, 128]));
        let profile = OverlayProfile::from_rgba(SizeClass::Small, &overlay).unwrap();

        let observed = RgbImage::from_pixel(48, 48, Rgb([250, 17, 3]));
        let restored = recover(&observed, &profile);

        for (x, y, px) in restored.enumerate_pixels() {
            if (x, y) != (0, 0) {
                assert_eq!(px, &Rgb([250, 17, 3]));
            }
        }
        assert_ne!(restored.get_pixel(0, 0), &Rgb([250, 17, 3]));
    }

    #[test]
    fn unblend_channel_rounds_and_clamps() {
        assert_eq!(unblend_channel(100, 255, 0.0), 100);
        // (200 - 255 * 0.5) / 0.5 = 145
        assert_eq!(unblend_channel(200, 255, 0.5), 145);
        // Observed darker than the overlay alone could produce
        assert_eq!(unblend_channel(10, 255, 0.5), 0);
        assert_eq!(unblend_channel(255, 0, 0.5), 255);
        assert_eq!(unblend_channel(42, 255, 1.0 - ALPHA_EPSILON / 2.0), 42);
    }

    #[test]
    fn recover_leaves_pixels_beyond_profile_untouched() {
        let profile = gradient_profile();
        let patch = RgbImage::from_pixel(60, 60, Rgb([90, 90, 90]));
        let restored = recover(&patch, &profile);
        assert_eq!(restored.dimensions(), (60, 60));
        assert_eq!(restored.get_pixel(55, 10), &Rgb([90, 90, 90]));
        assert_eq!(restored.get_pixel(10, 55), &Rgb([90, 90, 90]));
    }

    #[test]
    fn recover_is_deterministic() {
        let profile = gradient_profile();
        let watermarked = composite(&textured_patch(), &profile);
        assert_eq!(recover(&watermarked, &profile), recover(&watermarked, &profile));
    }
}
