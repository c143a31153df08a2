use rayon::prelude::*;

use crate::raster::AlphaMask;

/// Box-blurs an alpha mask with a 3x3 window, `iterations` times.
///
/// Window cells that fall outside the image are left out of both the sum and
/// the count, so edges average over fewer samples instead of fading to zero.
/// Each pass reads only the output of the previous pass.
pub fn smooth_alpha(mask: &AlphaMask, iterations: u32) -> AlphaMask {
    let mut smoothed = mask.clone();
    let (width, height) = mask.dimensions();
    if iterations == 0 || width == 0 || height == 0 {
        return smoothed;
    }

    let (width, height) = (width as usize, height as usize);
    let mut scratch = vec![0.0f32; width * height];

    for _ in 0..iterations {
        let source: &[f32] = &smoothed;
        scratch
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| box_row(source, width, height, y, row));
        smoothed.copy_from_slice(&scratch);
    }

    smoothed
}

fn box_row(source: &[f32], width: usize, height: usize, y: usize, row: &mut [f32]) {
    let rows = y.saturating_sub(1)..=(y + 1).min(height - 1);
    for (x, out) in row.iter_mut().enumerate() {
        let columns = x.saturating_sub(1)..=(x + 1).min(width - 1);
        let mut sum = 0.0f32;
        let mut count = 0u32;
        for ny in rows.clone() {
            let line = &source[ny * width..(ny + 1) * width];
            for value in &line[columns.clone()] {
                sum += value;
                count += 1;
            }
        }
        *out = sum / count as f32;
    }
}
