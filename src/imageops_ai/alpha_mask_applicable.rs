use anyhow::{ensure, Result};
use image::RgbaImage;
use rayon::prelude::*;

use crate::imageops_ai::quantize_alpha;
use crate::raster::AlphaMask;

pub trait AlphaMaskApplicable {
    /// Returns a copy whose alpha channel is the quantized mask, colors untouched.
    fn with_alpha_mask(&self, mask: &AlphaMask) -> Result<RgbaImage>;

    /// "destination-in" compositing: keeps colors and scales the existing
    /// alpha by the quantized mask, so pixels outside the mask become fully
    /// transparent.
    fn mask_in(&self, mask: &AlphaMask) -> Result<RgbaImage>;
}

impl AlphaMaskApplicable for RgbaImage {
    fn with_alpha_mask(&self, mask: &AlphaMask) -> Result<RgbaImage> {
        ensure!(
            self.dimensions() == mask.dimensions(),
            "Image and mask dimensions do not match"
        );

        let mut output = self.clone();
        output
            .par_chunks_exact_mut(4)
            .zip(mask.par_iter())
            .for_each(|(pixel, &alpha)| pixel[3] = quantize_alpha(alpha));
        Ok(output)
    }

    fn mask_in(&self, mask: &AlphaMask) -> Result<RgbaImage> {
        ensure!(
            self.dimensions() == mask.dimensions(),
            "Image and mask dimensions do not match"
        );

        let mut output = self.clone();
        output
            .par_chunks_exact_mut(4)
            .zip(mask.par_iter())
            .for_each(|(pixel, &alpha)| {
                let coverage = u32::from(quantize_alpha(alpha));
                pixel[3] = ((u32::from(pixel[3]) * coverage + 127) / 255) as u8;
            });
        Ok(output)
    }
}
