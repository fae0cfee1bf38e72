mod common;

use std::path::PathBuf;

use gemini_watermark_remover::{
    BatchCoordinator, Error, OutputConfig, OutputFormat, Outcome, SizeClass, SkipReason,
};
use image::RgbImage;
use pretty_assertions::assert_eq;

fn assert_close(restored: &RgbImage, original: &RgbImage) {
    assert_eq!(restored.dimensions(), original.dimensions());
    for (x, y, px) in restored.enumerate_pixels() {
        let orig = original.get_pixel(x, y);
        for ch in 0..3 {
            let diff = (i32::from(px[ch]) - i32::from(orig[ch])).abs();
            assert!(diff <= 1, "Pixel ({x},{y}) ch {ch} diff {diff}");
        }
    }
}

#[test]
fn remove_restores_small_and_large_images() {
    let res = tempfile::tempdir().unwrap();
    let processor = common::processor(res.path());

    for (w, h, class) in [
        (512, 512, SizeClass::Small),
        (1200, 1100, SizeClass::Large),
        (2048, 700, SizeClass::Small),
    ] {
        let original = common::clean_image(w, h);
        let mut img = common::watermark(&original, processor.registry());
        assert_ne!(img, original);

        assert_eq!(processor.remove(&mut img), Some(class));
        assert_close(&img, &original);
    }
}

#[test]
fn remove_leaves_unmatched_image_untouched() {
    let res = tempfile::tempdir().unwrap();
    let processor = common::processor(res.path());

    let original = common::clean_image(60, 500);
    let mut img = original.clone();
    assert_eq!(processor.remove(&mut img), None);
    assert_eq!(img, original);
}

#[test]
fn missing_resources_fail_startup() {
    let empty = tempfile::tempdir().unwrap();
    let err = gemini_watermark_remover::ImageProcessor::from_resource_dir(empty.path())
        .err()
        .unwrap();
    assert!(matches!(err, Error::ResourceLoad { .. }));
    assert_eq!(err.kind(), "resource-load");
}

#[test]
fn batch_single_jpeg_to_png_next_to_source() {
    let res = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let processor = common::processor(res.path());

    let source =
        common::write_watermarked(work.path(), "photo.jpg", 512, 512, processor.registry());
    let source_bytes = std::fs::read(&source).unwrap();

    let config = OutputConfig::new(OutputFormat::Png, 90, None).unwrap();
    let summary = BatchCoordinator::new(processor).run(&[source.clone()], &config);

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 0);
    let report = &summary.reports[0];
    assert_eq!(
        report.result.as_ref().unwrap(),
        &Outcome::Processed {
            output: report.destination.clone(),
            size_class: SizeClass::Small,
        }
    );

    let name = report
        .destination
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string();
    let timestamp = name
        .strip_prefix("photo_no_watermark_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .unwrap();
    assert_eq!(timestamp.len(), 14);
    assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(report.destination.parent(), source.parent());

    let cleaned = image::open(&report.destination).unwrap();
    assert_eq!((cleaned.width(), cleaned.height()), (512, 512));
    assert_eq!(std::fs::read(&source).unwrap(), source_bytes);
}

#[test]
fn batch_png_output_matches_original_pixels() {
    let res = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let out = work.path().join("cleaned");
    let processor = common::processor(res.path());

    let source = common::write_watermarked(work.path(), "art.png", 300, 400, processor.registry());
    let config = OutputConfig::new(OutputFormat::KeepOriginal, 95, Some(out.clone())).unwrap();
    let summary = BatchCoordinator::new(processor).run(&[source], &config);

    assert_eq!(summary.succeeded(), 1);
    let destination = &summary.reports[0].destination;
    assert_eq!(destination.parent(), Some(out.as_path()));

    let cleaned = image::open(destination).unwrap().to_rgb8();
    assert_close(&cleaned, &common::clean_image(300, 400));
}

#[test]
fn batch_continues_past_a_failing_job() {
    let res = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let processor = common::processor(res.path());

    // The third output name is longer than any filesystem allows.
    let long_stem = "x".repeat(240);
    let names = [
        "a.png".to_string(),
        "b.png".to_string(),
        format!("{long_stem}.png"),
        "d.png".to_string(),
        "e.png".to_string(),
    ];
    let paths: Vec<PathBuf> = names
        .iter()
        .map(|n| common::write_watermarked(work.path(), n, 200, 200, processor.registry()))
        .collect();

    let config = OutputConfig::new(OutputFormat::KeepOriginal, 95, None).unwrap();
    let summary = BatchCoordinator::new(processor).run(&paths, &config);

    assert_eq!(summary.reports.len(), 5);
    assert_eq!(summary.succeeded(), 4);
    assert_eq!(summary.failed(), 1);
    for (i, report) in summary.reports.iter().enumerate() {
        assert_eq!(report.source, paths[i]);
        assert_eq!(report.succeeded(), i != 2, "job {i}");
    }
    assert!(matches!(
        summary.reports[2].error(),
        Some(Error::Write { .. })
    ));

    let failures: Vec<_> = summary.failures().map(|(p, _)| p.to_path_buf()).collect();
    assert_eq!(failures, vec![paths[2].clone()]);

    let names = common::file_names(work.path());
    assert!(names.iter().all(|n| !n.starts_with(".gwr-")), "{names:?}");
    assert_eq!(names.len(), 9);
}

#[test]
fn batch_skips_unmatched_sizes_without_writing() {
    let res = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let processor = common::processor(res.path());

    let huge = work.path().join("huge.png");
    RgbImage::from_pixel(3000, 3000, image::Rgb([10, 20, 30]))
        .save(&huge)
        .unwrap();
    let bytes = std::fs::read(&huge).unwrap();

    let config = OutputConfig::default();
    let coordinator = BatchCoordinator::new(processor);
    for _ in 0..2 {
        let summary = coordinator.run(&[huge.clone()], &config);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(
            summary.reports[0].skip_reason(),
            Some(&SkipReason::UnmatchedSize {
                width: 3000,
                height: 3000
            })
        );
    }

    assert_eq!(common::file_names(work.path()), vec!["huge.png"]);
    assert_eq!(std::fs::read(&huge).unwrap(), bytes);
}

#[test]
fn batch_reports_decode_errors() {
    let res = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let processor = common::processor(res.path());

    let corrupt = work.path().join("corrupt.png");
    std::fs::write(&corrupt, b"definitely not a png").unwrap();
    let missing = work.path().join("missing.jpg");

    let summary =
        BatchCoordinator::new(processor).run(&[corrupt, missing], &OutputConfig::default());

    assert_eq!(summary.failed(), 2);
    for report in &summary.reports {
        assert!(matches!(report.error(), Some(Error::Decode { .. })));
    }
    assert_eq!(common::file_names(work.path()), vec!["corrupt.png"]);
}

#[test]
fn batch_gives_repeated_sources_distinct_outputs() {
    let res = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let processor = common::processor(res.path());

    let source =
        common::write_watermarked(work.path(), "dup.png", 200, 200, processor.registry());
    let config = OutputConfig::new(OutputFormat::WebP, 80, None).unwrap();
    let summary = BatchCoordinator::new(processor).run(&[source.clone(), source], &config);

    assert_eq!(summary.succeeded(), 2);
    let first = &summary.reports[0].destination;
    let second = &summary.reports[1].destination;
    assert_ne!(first, second);
    assert_eq!(second.extension().unwrap(), "webp");
    assert!(first.exists() && second.exists());
}

#[test]
fn invalid_quality_is_rejected_before_processing() {
    assert!(matches!(
        OutputConfig::new(OutputFormat::Jpeg, 0, None),
        Err(Error::InvalidQuality(0))
    ));
    assert!(matches!(
        OutputConfig::new(OutputFormat::Jpeg, 101, None),
        Err(Error::InvalidQuality(101))
    ));
}
