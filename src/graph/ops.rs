// SPDX-License-Identifier: GPL-3.0-only

//! CPU image operations behind the graph backend
//!
//! Every op takes an RGBA image and produces one of the same size. Alpha is
//! carried through unless an op documents otherwise. Coordinates are clamped
//! at the edges.

use crate::composite::luminance;
use crate::params::Color;
use image::{Rgba, RgbaImage};
use std::f32::consts::TAU;

#[inline]
fn to_unit(v: u8) -> f32 {
    v as f32 / 255.0
}

#[inline]
fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Map every pixel through `f`, which sees and returns unit RGB
fn map_rgb(image: &mut RgbaImage, f: impl Fn([f32; 3]) -> [f32; 3]) {
    for px in image.pixels_mut() {
        let out = f([to_unit(px[0]), to_unit(px[1]), to_unit(px[2])]);
        px[0] = to_byte(out[0]);
        px[1] = to_byte(out[1]);
        px[2] = to_byte(out[2]);
    }
}

/// Rotate `(x, y)` about `center` by `-angle` degrees so patterns can be
/// evaluated along axis-aligned lines
#[inline]
fn pattern_coords(x: u32, y: u32, center: (f32, f32), angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.to_radians().sin_cos();
    let dx = x as f32 - center.0;
    let dy = y as f32 - center.1;
    (dx * cos + dy * sin, -dx * sin + dy * cos)
}

/// Soft threshold of `value` against `pattern`; sharpness 1 is a hard edge
#[inline]
fn screen(value: f32, pattern: f32, sharpness: f32) -> f32 {
    let softness = (1.0 - sharpness.clamp(0.0, 1.0)).max(0.01);
    ((value - pattern) / softness + 0.5).clamp(0.0, 1.0)
}

pub fn grayscale(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        let l = to_byte(luminance(px));
        px[0] = l;
        px[1] = l;
        px[2] = l;
    }
}

/// Rows are applied to `(r, g, b, 1)`
pub fn color_matrix(image: &mut RgbaImage, rows: &[[f32; 4]; 3]) {
    map_rgb(image, |[r, g, b]| {
        let apply = |row: &[f32; 4]| row[0] * r + row[1] * g + row[2] * b + row[3];
        [apply(&rows[0]), apply(&rows[1]), apply(&rows[2])]
    });
}

pub fn posterize(image: &mut RgbaImage, levels: i64) {
    let steps = (levels.max(2) - 1) as f32;
    map_rgb(image, |rgb| rgb.map(|c| (c * steps).round() / steps));
}

fn rgb_to_hsv([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };
    [hue, saturation, max]
}

fn hsv_to_rgb([h, s, v]: [f32; 3]) -> [f32; 3] {
    let c = v * s;
    let hp = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    [r + m, g + m, b + m]
}

/// Hue shift in degrees, saturation and brightness as multipliers
pub fn hsb_adjust(image: &mut RgbaImage, hue: f32, saturation: f32, brightness: f32) {
    map_rgb(image, |rgb| {
        let [h, s, v] = rgb_to_hsv(rgb);
        hsv_to_rgb([h + hue, (s * saturation).clamp(0.0, 1.0), (v * brightness).clamp(0.0, 1.0)])
    });
}

/// Boost saturation most where it is lowest
pub fn vibrance(image: &mut RgbaImage, amount: f32) {
    map_rgb(image, |[r, g, b]| {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let gray = (r + g + b) / 3.0;
        let boost = 1.0 + amount * (1.0 - (max - min));
        [r, g, b].map(|c| gray + (c - gray) * boost)
    });
}

/// White balance shift around 6500 K
pub fn temperature_tint(image: &mut RgbaImage, temperature: f32, tint: f32) {
    let warm = ((6500.0 - temperature) / 6500.0).clamp(-1.0, 1.0) * 0.3;
    let magenta = (tint / 150.0).clamp(-1.0, 1.0) * 0.2;
    map_rgb(image, |[r, g, b]| [r * (1.0 + warm), g * (1.0 - magenta), b * (1.0 - warm)]);
}

/// Map luminance onto a two-color ramp
pub fn false_color(image: &mut RgbaImage, low: Color, high: Color) {
    let low = low.to_array();
    let high = high.to_array();
    for px in image.pixels_mut() {
        let l = luminance(px);
        for c in 0..3 {
            px[c] = to_byte(low[c] + (high[c] - low[c]) * l);
        }
    }
}

/// Parse `#rrggbb@position` stops separated by commas, sorted by position
pub fn parse_gradient(text: &str) -> Vec<(Color, f32)> {
    let mut stops: Vec<(Color, f32)> = text
        .split(',')
        .filter_map(|stop| {
            let (hex, position) = stop.trim().split_once('@')?;
            let position: f32 = position.trim().parse().ok()?;
            Some((Color::from_hex(hex.trim())?, position.clamp(0.0, 1.0)))
        })
        .collect();
    stops.sort_by(|a, b| a.1.total_cmp(&b.1));
    stops
}

fn sample_gradient(stops: &[(Color, f32)], t: f32) -> [f32; 4] {
    let Some(first) = stops.first() else {
        return [t, t, t, 1.0];
    };
    if t <= first.1 {
        return first.0.to_array();
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.1 {
            let span = (b.1 - a.1).max(f32::EPSILON);
            let k = (t - a.1) / span;
            let (ca, cb) = (a.0.to_array(), b.0.to_array());
            return std::array::from_fn(|i| ca[i] + (cb[i] - ca[i]) * k);
        }
    }
    stops[stops.len() - 1].0.to_array()
}

/// Look up each pixel's luminance in a gradient
pub fn color_map(image: &mut RgbaImage, stops: &[(Color, f32)]) {
    for px in image.pixels_mut() {
        let c = sample_gradient(stops, luminance(px));
        px[0] = to_byte(c[0]);
        px[1] = to_byte(c[1]);
        px[2] = to_byte(c[2]);
    }
}

/// Parallel line halftone
pub fn line_screen(image: &mut RgbaImage, center: (f32, f32), angle: f32, width: f32, sharpness: f32) {
    let width = width.max(1.0);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let (_, v) = pattern_coords(x, y, center, angle);
        let pattern = 0.5 + 0.5 * (TAU * v / width).cos();
        let out = to_byte(screen(luminance(px), pattern, sharpness));
        *px = Rgba([out, out, out, px[3]]);
    }
}

/// Crossed lines; the second set only shows in the darker half
pub fn hatch_screen(image: &mut RgbaImage, center: (f32, f32), angle: f32, width: f32, sharpness: f32) {
    let width = width.max(1.0);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let (u, v) = pattern_coords(x, y, center, angle);
        let l = luminance(px);
        let first = 0.5 + 0.5 * (TAU * v / width).cos();
        let second = 0.5 + 0.5 * (TAU * u / width).cos();
        let pattern = if l < 0.5 { first.max(second) } else { first };
        let out = to_byte(screen(l, pattern, sharpness));
        *px = Rgba([out, out, out, px[3]]);
    }
}

fn dot_pattern(u: f32, v: f32, width: f32) -> f32 {
    0.5 + 0.25 * ((TAU * u / width).cos() + (TAU * v / width).cos())
}

pub fn dot_screen(image: &mut RgbaImage, center: (f32, f32), angle: f32, width: f32, sharpness: f32) {
    let width = width.max(1.0);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let (u, v) = pattern_coords(x, y, center, angle);
        let out = to_byte(screen(luminance(px), dot_pattern(u, v, width), sharpness));
        *px = Rgba([out, out, out, px[3]]);
    }
}

/// Concentric rings around `center`
pub fn circular_screen(image: &mut RgbaImage, center: (f32, f32), width: f32, sharpness: f32) {
    let width = width.max(1.0);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let distance = (x as f32 - center.0).hypot(y as f32 - center.1);
        let pattern = 0.5 + 0.5 * (TAU * distance / width).cos();
        let out = to_byte(screen(luminance(px), pattern, sharpness));
        *px = Rgba([out, out, out, px[3]]);
    }
}

/// Four screened separations at the classic angles
pub fn cmyk_halftone(image: &mut RgbaImage, center: (f32, f32), angle: f32, width: f32, sharpness: f32) {
    const OFFSETS: [f32; 4] = [15.0, 75.0, 0.0, 45.0];
    let width = width.max(1.0);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let [r, g, b] = [to_unit(px[0]), to_unit(px[1]), to_unit(px[2])];
        let k = 1.0 - r.max(g).max(b);
        let ink = |c: f32| if k >= 1.0 { 0.0 } else { (1.0 - c - k) / (1.0 - k) };
        let separations = [ink(r), ink(g), ink(b), k];

        let mut dots = [0.0f32; 4];
        for (i, amount) in separations.iter().enumerate() {
            let (u, v) = pattern_coords(x, y, center, angle + OFFSETS[i]);
            // Ink shows where coverage beats the dot pattern
            dots[i] = 1.0 - screen(1.0 - amount, dot_pattern(u, v, width), sharpness);
        }
        let paper = 1.0 - dots[3];
        *px = Rgba([
            to_byte((1.0 - dots[0]) * paper),
            to_byte((1.0 - dots[1]) * paper),
            to_byte((1.0 - dots[2]) * paper),
            px[3],
        ]);
    }
}

/// Flat square blocks aligned on `center`
pub fn pixellate(image: &RgbaImage, center: (f32, f32), scale: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    // A block never needs to be larger than the image
    let limit = w.max(h).max(1) as i64;
    let size = (scale.max(1.0) as i64).min(limit);
    let origin = |c: u32, center: f32| -> i64 {
        let center = (center as i64).clamp(-limit, 2 * limit);
        let offset = (c as i64 - center).div_euclid(size);
        center + offset * size
    };

    let mut out = RgbaImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let x0 = origin(x, center.0).clamp(0, w as i64 - 1) as u32;
        let y0 = origin(y, center.1).clamp(0, h as i64 - 1) as u32;
        let x1 = (x0 as i64).saturating_add(size).min(w as i64) as u32;
        let y1 = (y0 as i64).saturating_add(size).min(h as i64) as u32;
        *px = block_average(image, x0, y0, x1.max(x0 + 1), y1.max(y0 + 1));
    }
    out
}

fn block_average(image: &RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Rgba<u8> {
    let mut sum = [0u64; 4];
    let mut count = 0u64;
    for y in y0..y1.min(image.height()) {
        for x in x0..x1.min(image.width()) {
            let p = image.get_pixel(x, y);
            for c in 0..4 {
                sum[c] += p[c] as u64;
            }
            count += 1;
        }
    }
    let count = count.max(1);
    Rgba(sum.map(|s| (s / count) as u8))
}

/// Colored disks on a white ground, one per grid cell
pub fn pointillize(image: &RgbaImage, radius: f32) -> RgbaImage {
    let radius = radius.max(1.0);
    let cell = (radius * 2.0).ceil() as u32;
    let (w, h) = image.dimensions();
    let mut out = RgbaImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let cx = (x / cell) * cell + cell / 2;
        let cy = (y / cell) * cell + cell / 2;
        let source = image.get_pixel(cx.min(w - 1), cy.min(h - 1));
        let inside = (x as f32 - cx as f32).hypot(y as f32 - cy as f32) <= radius;
        *px = if inside {
            *source
        } else {
            Rgba([255, 255, 255, image.get_pixel(x, y)[3]])
        };
    }
    out
}

/// Sobel magnitude of luminance, scaled by `intensity`
pub fn edges(image: &RgbaImage, intensity: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let sample = |x: i64, y: i64| -> f32 {
        let x = x.clamp(0, w as i64 - 1) as u32;
        let y = y.clamp(0, h as i64 - 1) as u32;
        luminance(image.get_pixel(x, y))
    };

    let mut out = RgbaImage::new(w, h);
    for (px_x, px_y, px) in out.enumerate_pixels_mut() {
        let (x, y) = (px_x as i64, px_y as i64);
        let tl = sample(x - 1, y - 1);
        let tm = sample(x, y - 1);
        let tr = sample(x + 1, y - 1);
        let ml = sample(x - 1, y);
        let mr = sample(x + 1, y);
        let bl = sample(x - 1, y + 1);
        let bm = sample(x, y + 1);
        let br = sample(x + 1, y + 1);

        let gx = -tl - 2.0 * ml - bl + tr + 2.0 * mr + br;
        let gy = -tl - 2.0 * tm - tr + bl + 2.0 * bm + br;
        let edge = to_byte((gx * gx + gy * gy).sqrt() * intensity);
        *px = Rgba([edge, edge, edge, image.get_pixel(px_x, px_y)[3]]);
    }
    out
}

/// Dark strokes on white wherever edges exceed `threshold`
pub fn ink_lines(image: &mut RgbaImage, threshold: f32, contrast: f32) {
    for px in image.pixels_mut() {
        let edge = ((luminance(px) - threshold) * contrast.max(0.0) + threshold).clamp(0.0, 1.0);
        let out = if edge > threshold { to_byte(1.0 - edge) } else { 255 };
        px[0] = out;
        px[1] = out;
        px[2] = out;
    }
}

/// Square grid of two colors aligned on `center`
pub fn checkerboard(image: &mut RgbaImage, center: (f32, f32), color0: Color, color1: Color, width: f32) {
    let width = width.max(1.0);
    for (x, y, px) in image.enumerate_pixels_mut() {
        let cx = ((x as f32 - center.0) / width).floor() as i64;
        let cy = ((y as f32 - center.1) / width).floor() as i64;
        let color = if (cx + cy).rem_euclid(2) == 0 { color0 } else { color1 };
        *px = Rgba(color.to_rgba8());
    }
}

/// Smoothstep blend from `color0` at `p0` to `color1` at `p1`
pub fn linear_gradient(
    image: &mut RgbaImage,
    p0: (f32, f32),
    p1: (f32, f32),
    color0: Color,
    color1: Color,
) {
    let axis = (p1.0 - p0.0, p1.1 - p0.1);
    let length_sq = (axis.0 * axis.0 + axis.1 * axis.1).max(f32::EPSILON);
    let (a, b) = (color0.to_array(), color1.to_array());
    for (x, y, px) in image.enumerate_pixels_mut() {
        let t = (((x as f32 - p0.0) * axis.0 + (y as f32 - p0.1) * axis.1) / length_sq).clamp(0.0, 1.0);
        let t = t * t * (3.0 - 2.0 * t);
        let c: [f32; 4] = std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t);
        *px = Rgba(c.map(to_byte));
    }
}

/// Per-channel product, alpha from `base`
pub fn multiply(base: &mut RgbaImage, other: &RgbaImage) {
    for (x, y, px) in base.enumerate_pixels_mut() {
        let Some(o) = other.get_pixel_checked(x, y) else {
            continue;
        };
        for c in 0..3 {
            px[c] = ((px[c] as u16 * o[c] as u16 + 127) / 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsv_round_trip_primary() {
        let hsv = rgb_to_hsv([1.0, 0.0, 0.0]);
        assert_eq!(hsv, [0.0, 1.0, 1.0]);
        let back = hsv_to_rgb([120.0, 1.0, 1.0]);
        assert_eq!(back, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_parse_gradient_sorts_and_skips_bad_stops() {
        let stops = parse_gradient("#ffffff@1.0, junk, #000000@0");
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].1, 0.0);
        assert_eq!(stops[1].0, Color::WHITE);
    }

    #[test]
    fn test_posterize_two_levels() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([100, 200, 10, 255]));
        posterize(&mut img, 2);
        assert_eq!(img.get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_pixellate_flattens_blocks() {
        let mut img = RgbaImage::new(4, 4);
        img.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let out = pixellate(&img, (0.0, 0.0), 2.0);
        assert_eq!(out.get_pixel(0, 0), out.get_pixel(1, 1));
        assert_eq!(out.get_pixel(3, 3).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_pixellate_huge_block_width() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([40, 80, 120, 255]));
        let out = pixellate(&img, (2.0, 2.0), 1e19);
        assert_eq!(out.dimensions(), (4, 4));
        assert!(out.pixels().all(|p| p.0 == [40, 80, 120, 255]));
    }

    #[test]
    fn test_pixellate_far_center() {
        let img = RgbaImage::from_pixel(5, 3, Rgba([7, 7, 7, 255]));
        for center in [(f32::MAX, f32::MAX), (f32::MIN, -1e30), (1e12, 2.0)] {
            let out = pixellate(&img, center, 3.0);
            assert!(out.pixels().all(|p| p.0 == [7, 7, 7, 255]));
        }
    }

    #[test]
    fn test_edges_flat_image_is_black() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([90, 90, 90, 255]));
        let out = edges(&img, 1.0);
        assert!(out.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn test_multiply_by_white_is_identity() {
        let mut base = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 40]));
        let white = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        multiply(&mut base, &white);
        assert_eq!(base.get_pixel(0, 0).0, [10, 20, 30, 40]);
    }
}
