use anyhow::Result;
use image::{Rgb, RgbaImage};
use rayon::prelude::*;

use crate::imageops_ai::{smooth_alpha, AlphaMaskApplicable};
use crate::raster::AlphaMask;

/// Parameters of the color-distance key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaKeyParams {
    pub target: Rgb<u8>,
    pub tolerance: u32,
}

impl ChromaKeyParams {
    /// Lower bound of the alpha ramp width, so a zero tolerance still keys
    /// near-matches softly.
    pub const MIN_SOFTNESS: f32 = 12.0;

    pub const fn new(target: Rgb<u8>, tolerance: u32) -> Self {
        Self { target, tolerance }
    }

    /// Width of the linear ramp between fully keyed and fully kept.
    pub fn softness(&self) -> f32 {
        (self.tolerance as f32 * 1.35).max(Self::MIN_SOFTNESS)
    }

    pub fn smooth_passes(&self) -> u32 {
        (self.tolerance as f32 / 25.0).round() as u32
    }
}

/// Computes the unsmoothed key mask: distance to the target color mapped
/// through the tolerance/softness ramp, scaled by the source alpha.
pub fn key_alpha(image: &RgbaImage, params: &ChromaKeyParams) -> AlphaMask {
    let (width, height) = image.dimensions();
    let Rgb([tr, tg, tb]) = params.target;
    let (tr, tg, tb) = (f32::from(tr), f32::from(tg), f32::from(tb));
    let tolerance = params.tolerance as f32;
    let softness = params.softness();

    let mut mask = AlphaMask::new(width, height);
    let alpha: &mut [f32] = &mut mask;
    alpha
        .par_iter_mut()
        .zip(image.par_chunks_exact(4))
        .for_each(|(out, pixel)| {
            let dr = f32::from(pixel[0]) - tr;
            let dg = f32::from(pixel[1]) - tg;
            let db = f32::from(pixel[2]) - tb;
            let distance = (dr * dr + dg * dg + db * db).sqrt();
            let ramp = ((distance - tolerance) / softness).clamp(0.0, 1.0);
            *out = ramp * (f32::from(pixel[3]) / 255.0);
        });
    mask
}

/// Keys out `params.target` from `image`.
///
/// Returns the smoothed mask together with the recolored output, whose color
/// channels equal the input and whose alpha is the quantized mask.
pub fn chroma_key(image: &RgbaImage, params: &ChromaKeyParams) -> Result<(AlphaMask, RgbaImage)> {
    let raw = key_alpha(image, params);
    let mask = smooth_alpha(&raw, params.smooth_passes());
    let output = image.with_alpha_mask(&mask)?;
    Ok((mask, output))
}
