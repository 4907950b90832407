// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for luminance-masked compositing

use framefx::composite::{composite, invert_colors, mask_to_alpha, source_atop};
use image::{Rgba, RgbaImage};

#[test]
fn test_white_effect_over_black_gives_black() {
    let effect = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
    let original = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));

    let out = composite(&effect, &original);
    for px in out.pixels() {
        assert_eq!(px.0, [0, 0, 0, 255]);
    }
}

#[test]
fn test_steps_compose_to_the_full_pipeline() {
    let effect = RgbaImage::from_fn(2, 2, |x, y| Rgba([(x * 200) as u8, (y * 90) as u8, 40, 255]));
    let original = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 120, 180]));

    let mut masked = effect.clone();
    invert_colors(&mut masked);
    mask_to_alpha(&mut masked);
    invert_colors(&mut masked);
    let mut by_steps = original.clone();
    source_atop(&masked, &mut by_steps);

    assert_eq!(composite(&effect, &original), by_steps);
}

#[test]
fn test_original_alpha_is_kept() {
    let effect = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
    let original = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 77]));
    assert_eq!(composite(&effect, &original).get_pixel(0, 0).0[3], 77);
}

#[test]
fn test_double_invert_restores_the_image() {
    let levels = [0u8, 1, 64, 127, 128, 200, 254, 255];
    let image = RgbaImage::from_fn(8, 8, |x, y| {
        let (a, b) = (levels[x as usize], levels[y as usize]);
        Rgba([a, b, a.wrapping_add(b), levels[(x as usize + y as usize) % 8]])
    });

    let mut twice = image.clone();
    invert_colors(&mut twice);
    assert_ne!(twice, image);
    invert_colors(&mut twice);
    assert_eq!(twice, image);
}

#[test]
fn test_invert_keeps_alpha() {
    let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 128, 255, 33]));
    invert_colors(&mut image);
    assert_eq!(image.get_pixel(1, 0).0, [255, 127, 0, 33]);
}
