// SPDX-License-Identifier: GPL-3.0-only

//! Declarative CPU filter graphs
//!
//! A graph filter describes its effect as an ordered list of [`GraphOp`]s
//! built fresh for each render from the current parameters. Evaluation runs
//! the ops in order over an RGBA image.

pub mod ops;

use crate::params::Color;
use image::RgbaImage;
use image::imageops;

/// One step of a filter graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    Grayscale,
    Invert,
    /// 3x4 matrix applied to `(r, g, b, 1)`
    ColorMatrix([[f32; 4]; 3]),
    HueRotate { degrees: i32 },
    Hsb { hue: f32, saturation: f32, brightness: f32 },
    Contrast(f32),
    Brightness(i32),
    Vibrance(f32),
    Blur { sigma: f32 },
    Posterize(i64),
    FalseColor { low: Color, high: Color },
    TemperatureTint { temperature: f32, tint: f32 },
    ColorMap(Vec<(Color, f32)>),
    LineScreen { center: (f32, f32), angle: f32, width: f32, sharpness: f32 },
    DotScreen { center: (f32, f32), angle: f32, width: f32, sharpness: f32 },
    HatchScreen { center: (f32, f32), angle: f32, width: f32, sharpness: f32 },
    CircularScreen { center: (f32, f32), width: f32, sharpness: f32 },
    CmykHalftone { center: (f32, f32), angle: f32, width: f32, sharpness: f32 },
    Pixellate { center: (f32, f32), scale: f32 },
    Pointillize { radius: f32 },
    Edges { intensity: f32 },
    InkLines { threshold: f32, contrast: f32 },
    Checkerboard { center: (f32, f32), color0: Color, color1: Color, width: f32 },
    LinearGradient { p0: (f32, f32), p1: (f32, f32), color0: Color, color1: Color },
    /// Evaluate both branches on the current image and multiply them
    Multiply(FilterGraph, FilterGraph),
}

/// Largest blur sigma worth running on an image of `width` x `height`.
///
/// Past a quarter of the longer edge the result is already a flat average.
pub fn max_blur_sigma((width, height): (u32, u32)) -> f32 {
    (width.max(height) as f32 / 4.0).max(1.0)
}

/// Ordered list of image operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    ops: Vec<GraphOp>,
}

impl FilterGraph {
    /// The empty graph passes its input through
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, op: GraphOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn ops(&self) -> &[GraphOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn evaluate(&self, input: &RgbaImage) -> RgbaImage {
        let mut image = input.clone();
        for op in &self.ops {
            image = apply(op, image);
        }
        image
    }
}

impl FromIterator<GraphOp> for FilterGraph {
    fn from_iter<I: IntoIterator<Item = GraphOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

fn apply(op: &GraphOp, mut image: RgbaImage) -> RgbaImage {
    match op {
        GraphOp::Grayscale => ops::grayscale(&mut image),
        GraphOp::Invert => imageops::invert(&mut image),
        GraphOp::ColorMatrix(rows) => ops::color_matrix(&mut image, rows),
        GraphOp::HueRotate { degrees } => return imageops::huerotate(&image, *degrees),
        GraphOp::Hsb {
            hue,
            saturation,
            brightness,
        } => ops::hsb_adjust(&mut image, *hue, *saturation, *brightness),
        GraphOp::Contrast(amount) => return imageops::contrast(&image, *amount),
        GraphOp::Brightness(amount) => return imageops::brighten(&image, *amount),
        GraphOp::Vibrance(amount) => ops::vibrance(&mut image, *amount),
        GraphOp::Blur { sigma } => {
            // imageops::blur rejects a zero sigma
            if *sigma > 0.0 {
                let sigma = sigma.min(max_blur_sigma(image.dimensions()));
                return imageops::blur(&image, sigma);
            }
        }
        GraphOp::Posterize(levels) => ops::posterize(&mut image, *levels),
        GraphOp::FalseColor { low, high } => ops::false_color(&mut image, *low, *high),
        GraphOp::TemperatureTint { temperature, tint } => {
            ops::temperature_tint(&mut image, *temperature, *tint)
        }
        GraphOp::ColorMap(stops) => ops::color_map(&mut image, stops),
        GraphOp::LineScreen {
            center,
            angle,
            width,
            sharpness,
        } => ops::line_screen(&mut image, *center, *angle, *width, *sharpness),
        GraphOp::DotScreen {
            center,
            angle,
            width,
            sharpness,
        } => ops::dot_screen(&mut image, *center, *angle, *width, *sharpness),
        GraphOp::HatchScreen {
            center,
            angle,
            width,
            sharpness,
        } => ops::hatch_screen(&mut image, *center, *angle, *width, *sharpness),
        GraphOp::CircularScreen {
            center,
            width,
            sharpness,
        } => ops::circular_screen(&mut image, *center, *width, *sharpness),
        GraphOp::CmykHalftone {
            center,
            angle,
            width,
            sharpness,
        } => ops::cmyk_halftone(&mut image, *center, *angle, *width, *sharpness),
        GraphOp::Pixellate { center, scale } => return ops::pixellate(&image, *center, *scale),
        GraphOp::Pointillize { radius } => return ops::pointillize(&image, *radius),
        GraphOp::Edges { intensity } => return ops::edges(&image, *intensity),
        GraphOp::InkLines {
            threshold,
            contrast,
        } => ops::ink_lines(&mut image, *threshold, *contrast),
        GraphOp::Checkerboard {
            center,
            color0,
            color1,
            width,
        } => ops::checkerboard(&mut image, *center, *color0, *color1, *width),
        GraphOp::LinearGradient {
            p0,
            p1,
            color0,
            color1,
        } => ops::linear_gradient(&mut image, *p0, *p1, *color0, *color1),
        GraphOp::Multiply(a, b) => {
            let mut left = a.evaluate(&image);
            ops::multiply(&mut left, &b.evaluate(&image));
            return left;
        }
    }
    image
}
