use async_trait::async_trait;

use crate::errors::Result;
use crate::raster::{AlphaMask, RasterImage};

/// Source of raw per-pixel person probabilities.
///
/// Implementations may be slow (model inference, remote calls) and fallible.
/// The returned mask should match the image dimensions; the engine resizes
/// masks that do not.
#[async_trait]
pub trait SegmentationProvider: Send + Sync {
    /// Segments `image`, returning probabilities in `[0, 1]`.
    async fn segment(&self, image: &RasterImage) -> Result<AlphaMask>;

    /// Short name used in logs and errors.
    fn name(&self) -> &str;
}
