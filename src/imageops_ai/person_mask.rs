use rayon::prelude::*;

use crate::imageops_ai::smooth_alpha;
use crate::raster::AlphaMask;

/// Smallest denominator used when stretching probabilities above the
/// threshold; keeps a threshold of 1.0 finite.
const MIN_RANGE: f32 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonMaskParams {
    /// Confidence percentage, `0..=100`. Values above 100 are treated as 100.
    pub confidence: u8,
    /// Feather strength; each step is two box-blur passes.
    pub feather: u32,
}

impl Default for PersonMaskParams {
    fn default() -> Self {
        Self {
            confidence: 55,
            feather: 0,
        }
    }
}

impl PersonMaskParams {
    pub const fn new(confidence: u8, feather: u32) -> Self {
        Self {
            confidence,
            feather,
        }
    }

    pub fn threshold(&self) -> f32 {
        f32::from(self.confidence.min(100)) / 100.0
    }

    pub const fn feather_passes(&self) -> u32 {
        self.feather.saturating_mul(2)
    }
}

/// Maps a raw probability through the confidence threshold.
///
/// Probabilities at or below `threshold` become 0 and the remaining range is
/// stretched linearly onto `[0, 1]`. The result is always within `[0, 1]`,
/// NaN included (it maps to 0).
pub fn rescale_probability(probability: f32, threshold: f32) -> f32 {
    let range = (1.0 - threshold).max(MIN_RANGE);
    ((probability - threshold) / range).max(0.0).min(1.0)
}

/// Turns a raw segmentation mask into the final person mask.
pub fn refine_person_mask(raw: &AlphaMask, params: &PersonMaskParams) -> AlphaMask {
    let threshold = params.threshold();
    let mut working = raw.clone();
    let values: &mut [f32] = &mut working;
    values
        .par_iter_mut()
        .for_each(|value| *value = rescale_probability(*value, threshold));
    smooth_alpha(&working, params.feather_passes())
}
