#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gemini_watermark_remover::{blending, ImageProcessor, ProfileRegistry, SizeClass};
use image::{imageops, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

/// Overlay with alpha rising from 0 to 0.6 towards the bottom-right corner.
pub fn overlay_resource(size: u32) -> RgbaImage {
    let span = 2 * (size - 1);
    RgbaImage::from_fn(size, size, |x, y| {
        let alpha = u8::try_from((x + y) * 153 / span).unwrap();
        Rgba([255, 255, 255, alpha])
    })
}

/// Write `bg_48.png` and `bg_96.png` into `dir`.
pub fn write_resources(dir: &Path) {
    for class in SizeClass::ALL {
        overlay_resource(class.patch_size())
            .save_with_format(dir.join(class.resource_name()), ImageFormat::Png)
            .unwrap();
    }
}

pub fn processor(resource_dir: &Path) -> Arc<ImageProcessor> {
    write_resources(resource_dir);
    Arc::new(ImageProcessor::from_resource_dir(resource_dir).unwrap())
}

pub fn clean_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            u8::try_from(x % 200).unwrap() + 20,
            u8::try_from(y % 200).unwrap() + 20,
            u8::try_from((x + y) % 100).unwrap() + 60,
        ])
    })
}

/// Blend the overlay into `img` at the position Gemini uses.
pub fn watermark(img: &RgbImage, registry: &ProfileRegistry) -> RgbImage {
    let mut marked = img.clone();
    let (w, h) = img.dimensions();
    let profile = registry.profile_for(w, h).unwrap();
    let (x, y) = profile.origin(w, h);
    let patch = imageops::crop_imm(img, x, y, profile.width(), profile.height()).to_image();
    imageops::replace(
        &mut marked,
        &blending::composite(&patch, profile),
        i64::from(x),
        i64::from(y),
    );
    marked
}

/// Save a watermarked test image and return its path.
pub fn write_watermarked(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    registry: &ProfileRegistry,
) -> PathBuf {
    let path = dir.join(name);
    let format = ImageFormat::from_path(&path).unwrap();
    watermark(&clean_image(width, height), registry)
        .save_with_format(&path, format)
        .unwrap();
    path
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
