// SPDX-License-Identifier: GPL-3.0-only
//! Blend a filter's output back over the original frame
//!
//! The effect is turned into its own mask: dark parts of the effect become
//! opaque, light parts transparent. The masked effect is then laid over the
//! original with source-atop, so the original's alpha survives.

use image::{Rgba, RgbaImage};

/// Rec. 709 luma weights
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

#[inline]
pub fn luminance(px: &Rgba<u8>) -> f32 {
    (LUMA_WEIGHTS[0] * px[0] as f32 + LUMA_WEIGHTS[1] * px[1] as f32 + LUMA_WEIGHTS[2] * px[2] as f32)
        / 255.0
}

/// Invert RGB in place, leaving alpha
pub fn invert_colors(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    }
}

/// Replace alpha with the pixel's luminance
pub fn mask_to_alpha(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        px[3] = (luminance(px) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Lay `source` over `destination`, keeping the destination's alpha.
///
/// `source` must have `destination`'s dimensions; pixels outside it are left
/// untouched.
pub fn source_atop(source: &RgbaImage, destination: &mut RgbaImage) {
    for (x, y, dst) in destination.enumerate_pixels_mut() {
        let Some(src) = source.get_pixel_checked(x, y) else {
            continue;
        };
        let a = src[3] as f32 / 255.0;
        for c in 0..3 {
            let blended = src[c] as f32 * a + dst[c] as f32 * (1.0 - a);
            dst[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Composite `effect` over `original`
pub fn composite(effect: &RgbaImage, original: &RgbaImage) -> RgbaImage {
    let mut mask = effect.clone();
    invert_colors(&mut mask);
    mask_to_alpha(&mut mask);
    invert_colors(&mut mask);

    let mut out = original.clone();
    source_atop(&mask, &mut out);
    out
}
