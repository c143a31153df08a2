use std::sync::Arc;

use image::{Rgb, Rgba, RgbaImage};
use tokio::sync::Notify;

use cutout_rs::mocks::MockSegmentationProvider;
use cutout_rs::{
    ChromaKeyParams, Cutout, CutoutError, MaskEngine, PersonMaskParams, ProcessingMode,
    RasterImage,
};

fn portrait(width: u32, height: u32) -> RasterImage {
    RasterImage::new(RgbaImage::from_pixel(
        width,
        height,
        Rgba([180, 140, 120, 255]),
    ))
}

fn alphas(cutout: Cutout) -> Vec<u8> {
    cutout
        .into_composite()
        .expect("cutout should be ready")
        .image
        .pixels()
        .map(|p| p.0[3])
        .collect()
}

#[tokio::test]
async fn feather_change_reuses_cached_mask() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let provider = MockSegmentationProvider::uniform(0.9);
    let image = portrait(8, 8);

    let first = engine
        .person_cutout(&image, &PersonMaskParams::new(55, 0), &provider)
        .await?;
    assert!(first.is_ready());

    let second = engine
        .person_cutout(&image, &PersonMaskParams::new(55, 3), &provider)
        .await?;
    assert!(second.is_ready());
    assert_eq!(provider.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn confidence_change_reapplies_without_provider() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let provider = MockSegmentationProvider::uniform(0.75);
    let image = portrait(4, 4);

    let low = engine
        .person_cutout(&image, &PersonMaskParams::new(50, 0), &provider)
        .await?;
    assert!(alphas(low).iter().all(|&a| a == 128));

    let high = engine
        .reapply_person_mask(&image, &PersonMaskParams::new(80, 0))?
        .expect("mask should be cached");
    assert!(high.image.pixels().all(|p| p.0[3] == 0));
    assert!(high.image.pixels().all(|p| p.0[..3] == [180, 140, 120]));
    assert_eq!(provider.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn new_source_triggers_new_segmentation() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let provider = MockSegmentationProvider::uniform(0.9);
    let params = PersonMaskParams::default();

    engine.person_cutout(&portrait(4, 4), &params, &provider).await?;
    engine.person_cutout(&portrait(4, 4), &params, &provider).await?;
    engine.person_cutout(&portrait(6, 2), &params, &provider).await?;
    assert_eq!(provider.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn refresh_always_asks_provider() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let provider = MockSegmentationProvider::uniform(0.9);
    let image = portrait(4, 4);
    let params = PersonMaskParams::default();

    engine.person_cutout(&image, &params, &provider).await?;
    engine.refresh_person_mask(&image, &params, &provider).await?;
    assert_eq!(provider.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_request_is_dropped_while_in_flight() -> cutout_rs::Result<()> {
    let gate = Arc::new(Notify::new());
    let provider = MockSegmentationProvider::uniform(0.9).gated(Arc::clone(&gate));
    let engine = MaskEngine::new();
    let image = portrait(4, 4);
    let params = PersonMaskParams::default();

    let first = engine.refresh_person_mask(&image, &params, &provider);
    let second = async {
        tokio::task::yield_now().await;
        assert!(engine.is_busy());
        let result = engine.refresh_person_mask(&image, &params, &provider).await;
        gate.notify_one();
        result
    };

    let (first, second) = tokio::join!(first, second);
    assert!(first?.is_ready());
    assert!(matches!(second?, Cutout::Busy));
    assert_eq!(provider.calls(), 1);
    assert!(!engine.is_busy());
    Ok(())
}

#[tokio::test]
async fn failed_segmentation_clears_in_flight_flag() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let provider = MockSegmentationProvider::uniform(0.9);
    let image = portrait(4, 4);
    let params = PersonMaskParams::default();

    provider.set_failing(true);
    let failed = engine.person_cutout(&image, &params, &provider).await;
    assert!(matches!(failed, Err(CutoutError::Segmentation { .. })));
    assert!(!engine.is_busy());
    assert!(!engine.has_mask_for(&image));

    provider.set_failing(false);
    let retried = engine.person_cutout(&image, &params, &provider).await?;
    assert!(retried.is_ready());
    assert_eq!(provider.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn empty_image_never_reaches_provider() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let provider = MockSegmentationProvider::uniform(0.9);
    let image = RasterImage::new(RgbaImage::new(0, 5));

    let cutout = engine
        .person_cutout(&image, &PersonMaskParams::default(), &provider)
        .await?;
    assert!(matches!(cutout, Cutout::Empty));
    assert_eq!(provider.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn chroma_mode_keys_green_half() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let image = RasterImage::new(RgbaImage::from_fn(4, 4, |x, _| {
        if x < 2 {
            Rgba([0, 255, 0, 255])
        } else {
            Rgba([255, 0, 0, 255])
        }
    }));
    let mode = ProcessingMode::ChromaKey(ChromaKeyParams::new(Rgb([0, 255, 0]), 10));

    let composite = engine
        .process::<MockSegmentationProvider>(&image, &mode, None)
        .await?
        .into_composite()
        .expect("chroma key should produce a cutout");

    for (x, _, pixel) in composite.image.enumerate_pixels() {
        if x < 2 {
            assert_eq!(pixel.0, [0, 255, 0, 0]);
        } else {
            assert_eq!(pixel.0, [255, 0, 0, 255]);
        }
    }
    Ok(())
}

#[tokio::test]
async fn person_mode_dispatches_to_provider() -> cutout_rs::Result<()> {
    let engine = MaskEngine::new();
    let provider = MockSegmentationProvider::uniform(0.3);
    let mode = ProcessingMode::Person(PersonMaskParams::default());

    let cutout = engine.process(&portrait(3, 3), &mode, Some(&provider)).await?;
    assert!(alphas(cutout).iter().all(|&a| a == 0));
    assert_eq!(provider.calls(), 1);
    Ok(())
}
