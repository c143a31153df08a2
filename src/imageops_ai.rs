pub mod alpha_mask_applicable;
pub mod chroma_key;
pub mod convert_color;
pub mod person_mask;
pub mod smooth;

pub use alpha_mask_applicable::AlphaMaskApplicable;
pub use chroma_key::{chroma_key, ChromaKeyParams};
pub use convert_color::parse_hex_color;
pub use person_mask::{refine_person_mask, rescale_probability, PersonMaskParams};
pub use smooth::smooth_alpha;

/// Quantizes a `[0, 1]` opacity to an 8-bit alpha value.
pub fn quantize_alpha(alpha: f32) -> u8 {
    (alpha.max(0.0).min(1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_alpha_rounds_and_clamps() {
        assert_eq!(quantize_alpha(0.0), 0);
        assert_eq!(quantize_alpha(1.0), 255);
        assert_eq!(quantize_alpha(0.5), 128);
        assert_eq!(quantize_alpha(-3.0), 0);
        assert_eq!(quantize_alpha(7.0), 255);
        assert_eq!(quantize_alpha(f32::NAN), 0);
    }
}
