use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{imageops, imageops::FilterType, ImageBuffer, ImageFormat, Luma, RgbaImage};

use crate::errors::{CutoutError, Result};

/// Per-pixel opacity in `[0, 1]`, one value per pixel.
pub type AlphaMask = ImageBuffer<Luma<f32>, Vec<f32>>;

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a decoded source image.
///
/// Cached segmentation masks are keyed by this value, so two images with the
/// same size but different content never share a mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An RGBA8 source image with a stable identity.
///
/// Clones share the identity of the original; anything that produces new
/// pixels gets a new one.
#[derive(Debug, Clone)]
pub struct RasterImage {
    id: SourceId,
    pixels: RgbaImage,
}

impl RasterImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            id: SourceId::next(),
            pixels,
        }
    }

    /// Decodes an encoded image (png, jpeg, webp, ...) from memory.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| CutoutError::ImageProcessing {
            path: "<memory>".to_string(),
            operation: "decode".to_string(),
            source: Box::new(e),
        })?;
        Ok(Self::new(image.into_rgba8()))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path).map_err(|e| CutoutError::ImageProcessing {
            path: path.display().to_string(),
            operation: "decode".to_string(),
            source: Box::new(e),
        })?;
        Ok(Self::new(image.into_rgba8()))
    }

    pub const fn id(&self) -> SourceId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub const fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Downscales the image to fit within `max_width` x `max_height`.
    ///
    /// Images that already fit are returned as-is and keep their identity.
    /// A bound of `0` leaves that axis unconstrained.
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        let (width, height) = self.dimensions();
        let target = fit_dimensions(width, height, max_width, max_height);
        if target == (width, height) {
            return self;
        }
        let resized = imageops::resize(&self.pixels, target.0, target.1, FilterType::Triangle);
        Self::new(resized)
    }
}

/// Computes the size an image must be drawn at to fit the given bounds,
/// never upscaling.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let bound = |max: u32, size: u32| {
        if max == 0 {
            f64::INFINITY
        } else {
            f64::from(max) / f64::from(size)
        }
    };
    let ratio = bound(max_width, width).min(bound(max_height, height)).min(1.0);
    if ratio >= 1.0 {
        return (width, height);
    }
    let scale = |size: u32| ((f64::from(size) * ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Stretches a mask to the given size with a triangle filter.
pub fn resize_mask(mask: &AlphaMask, width: u32, height: u32) -> AlphaMask {
    if mask.dimensions() == (width, height) {
        return mask.clone();
    }
    imageops::resize(mask, width, height, FilterType::Triangle)
}

/// Encodes a composited RGBA image.
pub fn encode(image: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, format)
        .map_err(|e| CutoutError::ImageProcessing {
            path: "<memory>".to_string(),
            operation: format!("encode {format:?}"),
            source: Box::new(e),
        })?;
    Ok(bytes.into_inner())
}
