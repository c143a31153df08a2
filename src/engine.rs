use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbaImage;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::errors::{CutoutError, Result};
use crate::imageops_ai::{chroma_key, refine_person_mask, AlphaMaskApplicable};
use crate::imageops_ai::{ChromaKeyParams, PersonMaskParams};
use crate::raster::{resize_mask, AlphaMask, RasterImage, SourceId};
use crate::traits::SegmentationProvider;

/// How the background is separated from the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    ChromaKey(ChromaKeyParams),
    Person(PersonMaskParams),
}

/// A finished cutout: the final mask and the composited image.
#[derive(Debug, Clone)]
pub struct Composite {
    pub mask: AlphaMask,
    pub image: RgbaImage,
}

#[derive(Debug, Clone)]
pub enum Cutout {
    Ready(Composite),
    /// A segmentation request is already in flight; this call did nothing.
    Busy,
    /// The source image has no pixels.
    Empty,
}

impl Cutout {
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn into_composite(self) -> Option<Composite> {
        match self {
            Self::Ready(composite) => Some(composite),
            _ => None,
        }
    }
}

struct CachedMask {
    source: SourceId,
    raw: AlphaMask,
}

impl CachedMask {
    fn matches(&self, image: &RasterImage) -> bool {
        self.source == image.id() && self.raw.dimensions() == image.dimensions()
    }
}

/// Clears the in-flight flag when dropped, whichever way the request ends.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Masking session for one image-editing workflow.
///
/// Holds the raw segmentation mask of the last segmented source so that
/// threshold and feather changes can be re-applied without asking the provider
/// again, and allows at most one segmentation request at a time. Requests made
/// while one is outstanding are dropped, not queued.
#[derive(Default)]
pub struct MaskEngine {
    cached: Mutex<Option<CachedMask>>,
    in_flight: AtomicBool,
}

impl MaskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a segmentation request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether a raw mask usable for `image` is cached.
    pub fn has_mask_for(&self, image: &RasterImage) -> bool {
        self.cached
            .lock()
            .as_ref()
            .is_some_and(|cached| cached.matches(image))
    }

    /// Drops the cached raw mask.
    pub fn invalidate(&self) {
        self.cached.lock().take();
    }

    /// Runs `mode` against `image`. Person mode needs a provider.
    pub async fn process<P>(
        &self,
        image: &RasterImage,
        mode: &ProcessingMode,
        provider: Option<&P>,
    ) -> Result<Cutout>
    where
        P: SegmentationProvider + ?Sized,
    {
        match mode {
            ProcessingMode::ChromaKey(params) => self.chroma_key(image, params),
            ProcessingMode::Person(params) => {
                let provider = provider.ok_or_else(|| CutoutError::Configuration {
                    message: "person mode needs a segmentation provider".to_string(),
                })?;
                self.person_cutout(image, params, provider).await
            }
        }
    }

    pub fn chroma_key(&self, image: &RasterImage, params: &ChromaKeyParams) -> Result<Cutout> {
        if image.is_empty() {
            return Ok(Cutout::Empty);
        }
        let (mask, output) = chroma_key(image.pixels(), params)?;
        Ok(Cutout::Ready(Composite {
            mask,
            image: output,
        }))
    }

    /// Applies the cached raw mask if it belongs to `image`, otherwise asks the
    /// provider for a new one.
    pub async fn person_cutout<P>(
        &self,
        image: &RasterImage,
        params: &PersonMaskParams,
        provider: &P,
    ) -> Result<Cutout>
    where
        P: SegmentationProvider + ?Sized,
    {
        if image.is_empty() {
            return Ok(Cutout::Empty);
        }
        if let Some(composite) = self.reapply_person_mask(image, params)? {
            debug!(source = ?image.id(), "reusing cached segmentation mask");
            return Ok(Cutout::Ready(composite));
        }
        self.segment_and_apply(image, params, provider).await
    }

    /// Asks the provider for a new mask even when a cached one exists.
    pub async fn refresh_person_mask<P>(
        &self,
        image: &RasterImage,
        params: &PersonMaskParams,
        provider: &P,
    ) -> Result<Cutout>
    where
        P: SegmentationProvider + ?Sized,
    {
        if image.is_empty() {
            return Ok(Cutout::Empty);
        }
        self.segment_and_apply(image, params, provider).await
    }

    /// Re-applies the cached raw mask with new parameters.
    ///
    /// Returns `None` when no cached mask belongs to `image`; a mask cached for
    /// another source or size is never applied.
    pub fn reapply_person_mask(
        &self,
        image: &RasterImage,
        params: &PersonMaskParams,
    ) -> Result<Option<Composite>> {
        let mask = {
            let cached = self.cached.lock();
            match cached.as_ref() {
                Some(cached) if cached.matches(image) => refine_person_mask(&cached.raw, params),
                _ => return Ok(None),
            }
        };
        let output = image.pixels().mask_in(&mask)?;
        Ok(Some(Composite {
            mask,
            image: output,
        }))
    }

    async fn segment_and_apply<P>(
        &self,
        image: &RasterImage,
        params: &PersonMaskParams,
        provider: &P,
    ) -> Result<Cutout>
    where
        P: SegmentationProvider + ?Sized,
    {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            debug!(provider = provider.name(), "segmentation already in flight, dropping request");
            return Ok(Cutout::Busy);
        };

        debug!(provider = provider.name(), source = ?image.id(), "requesting segmentation mask");
        let raw = provider.segment(image).await.inspect_err(|e| {
            warn!(provider = provider.name(), error = %e, "segmentation failed");
        })?;
        if raw.width() == 0 || raw.height() == 0 {
            return Err(CutoutError::segmentation(
                provider.name(),
                "provider returned an empty mask",
            ));
        }

        let (width, height) = image.dimensions();
        let raw = resize_mask(&raw, width, height);
        let mask = refine_person_mask(&raw, params);
        let output = image.pixels().mask_in(&mask)?;
        *self.cached.lock() = Some(CachedMask {
            source: image.id(),
            raw,
        });

        Ok(Cutout::Ready(Composite {
            mask,
            image: output,
        }))
    }
}
