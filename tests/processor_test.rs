use std::fs;
use std::path::Path;

use clap::Parser;
use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use cutout_rs::mocks::MockSegmentationProvider;
use cutout_rs::{Config, CutoutProcessor, ProcessSummary};

fn write_half_green(path: &Path) {
    let image = RgbaImage::from_fn(8, 4, |x, _| {
        if x < 4 {
            Rgba([0, 255, 0, 255])
        } else {
            Rgba([200, 30, 30, 255])
        }
    });
    image.save(path).unwrap();
}

fn config(args: &[&str]) -> Config {
    Config::try_parse_from(std::iter::once("cutout-rs").chain(args.iter().copied())).unwrap()
}

#[tokio::test]
async fn chroma_directory_run_writes_transparent_background() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(input_dir.join("nested")).unwrap();
    write_half_green(&input_dir.join("nested/shot.png"));
    fs::write(input_dir.join("notes.txt"), b"not an image").unwrap();

    let input = input_dir.display().to_string();
    let output = output_dir.display().to_string();
    let config = config(&[&input, &output, "--mode", "chroma", "--tolerance", "10"]);
    config.validate().unwrap();

    let summary = CutoutProcessor::new(config, None).process_input().await.unwrap();
    assert_eq!(
        summary,
        ProcessSummary {
            processed: 1,
            skipped: 0,
            failed: 0
        }
    );

    let result = image::open(output_dir.join("nested/shot.png")).unwrap().into_rgba8();
    assert_eq!(result.dimensions(), (8, 4));
    assert_eq!(result.get_pixel(0, 0).0[3], 0);
    assert_eq!(result.get_pixel(7, 3).0, [200, 30, 30, 255]);
}

#[tokio::test]
async fn person_run_uses_provider_and_downscales() {
    let temp_dir = TempDir::new().unwrap();
    let input_file = temp_dir.path().join("large.png");
    let output_dir = temp_dir.path().join("out");
    RgbaImage::from_pixel(40, 20, Rgba([10, 20, 30, 255]))
        .save(&input_file)
        .unwrap();

    let input = input_file.display().to_string();
    let output = output_dir.display().to_string();
    let config = config(&[&input, &output, "--max-width", "10", "--confidence", "50"]);

    let provider = MockSegmentationProvider::uniform(1.0);
    let summary = CutoutProcessor::new(config, Some(Box::new(provider)))
        .process_input()
        .await
        .unwrap();
    assert_eq!(summary.processed, 1);

    let result = image::open(output_dir.join("large.png")).unwrap().into_rgba8();
    assert_eq!(result.dimensions(), (10, 5));
    assert!(result.pixels().all(|p| p.0[3] == 255));
}

#[tokio::test]
async fn person_run_without_provider_counts_failures() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path().join("input");
    fs::create_dir_all(&input_dir).unwrap();
    write_half_green(&input_dir.join("a.png"));
    fs::write(input_dir.join("broken.png"), b"not a png").unwrap();

    let input = input_dir.display().to_string();
    let output = temp_dir.path().join("out").display().to_string();
    let config = config(&[&input, &output]);

    let summary = CutoutProcessor::new(config, None).process_input().await.unwrap();
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.total(), 2);
}

#[tokio::test]
async fn missing_input_is_filesystem_error() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("missing").display().to_string();
    let config = config(&[&input, "--mode", "chroma"]);

    let result = CutoutProcessor::new(config, None).process_input().await;
    assert!(matches!(
        result,
        Err(cutout_rs::CutoutError::FileSystem { .. })
    ));
}
