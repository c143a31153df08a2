use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::Luma;
use tokio::sync::Notify;

use crate::errors::{CutoutError, Result};
use crate::raster::{AlphaMask, RasterImage};
use crate::traits::SegmentationProvider;

#[derive(Debug, Clone)]
enum MockMask {
    Uniform(f32),
    Fixed(AlphaMask),
}

/// Test provider that counts its calls.
///
/// It can be held open with a [`Notify`] gate to simulate a slow request, and
/// switched into a failing mode to simulate provider errors.
#[derive(Debug)]
pub struct MockSegmentationProvider {
    mask: MockMask,
    calls: AtomicUsize,
    failing: AtomicBool,
    gate: Option<Arc<Notify>>,
}

impl MockSegmentationProvider {
    /// Returns a mask of the image's size filled with `probability`.
    pub fn uniform(probability: f32) -> Self {
        Self::from_mask(MockMask::Uniform(probability))
    }

    /// Returns `mask` regardless of the image.
    pub fn with_mask(mask: AlphaMask) -> Self {
        Self::from_mask(MockMask::Fixed(mask))
    }

    fn from_mask(mask: MockMask) -> Self {
        Self {
            mask,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Makes each call wait for a notification before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentationProvider for MockSegmentationProvider {
    async fn segment(&self, image: &RasterImage) -> Result<AlphaMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CutoutError::segmentation(self.name(), "mock provider failure"));
        }
        Ok(match &self.mask {
            MockMask::Uniform(probability) => {
                let (width, height) = image.dimensions();
                AlphaMask::from_pixel(width, height, Luma([*probability]))
            }
            MockMask::Fixed(mask) => mask.clone(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[tokio::test]
    async fn test_uniform_mask_matches_image() -> Result<()> {
        let provider = MockSegmentationProvider::uniform(0.8);
        let image = RasterImage::new(RgbaImage::new(5, 3));
        let mask = provider.segment(&image).await?;
        assert_eq!(mask.dimensions(), (5, 3));
        assert!(mask.pixels().all(|p| p.0[0] == 0.8));
        assert_eq!(provider.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_mode_returns_segmentation_error() {
        let provider = MockSegmentationProvider::uniform(0.8);
        provider.set_failing(true);
        let image = RasterImage::new(RgbaImage::new(1, 1));
        let result = provider.segment(&image).await;
        assert!(matches!(result, Err(CutoutError::Segmentation { .. })));
    }
}
