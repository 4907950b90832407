// SPDX-License-Identifier: GPL-3.0-only

//! Filters evaluated as CPU graphs
//!
//! Positions (`Center`, `Point0`, `Point1`) are stored in unit coordinates
//! and scaled to the frame when the graph is built, so one setting works
//! for every resolution.

use super::{GraphFilter, spec};
use crate::graph::{FilterGraph, GraphOp, max_blur_sigma, ops};
use crate::params::{Color, FieldSpec, ParameterField as F, ParameterReader, ParameterValue as V, Point};

const CENTER: Point = Point { x: 0.5, y: 0.5 };

fn to_pixels(point: Point, (width, height): (u32, u32)) -> (f32, f32) {
    ((point.x * width as f64) as f32, (point.y * height as f64) as f32)
}

fn screen_fields(width: f64, angle: Option<f64>) -> Vec<FieldSpec> {
    let mut fields = vec![
        spec(F::Center, V::Point(CENTER)),
        spec(F::Width, V::Double(width)),
        spec(F::Sharpness, V::Double(0.7)),
        spec(F::MergeWithBackground, V::Bool(true)),
    ];
    if let Some(angle) = angle {
        fields.push(spec(F::Angle, V::Double(angle)));
    }
    fields
}

pub struct PassThrough;

impl GraphFilter for PassThrough {
    fn fields(&self) -> Vec<FieldSpec> {
        Vec::new()
    }

    fn build_graph(&self, _params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new()
    }
}

pub struct Noir;

impl GraphFilter for Noir {
    fn fields(&self) -> Vec<FieldSpec> {
        Vec::new()
    }

    fn build_graph(&self, _params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new()
            .then(GraphOp::Grayscale)
            .then(GraphOp::Contrast(25.0))
    }
}

pub struct LineScreen;

impl GraphFilter for LineScreen {
    fn fields(&self) -> Vec<FieldSpec> {
        screen_fields(5.0, Some(90.0))
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::LineScreen {
            center: to_pixels(params.point(F::Center), size),
            angle: params.double(F::Angle) as f32,
            width: params.double(F::Width) as f32,
            sharpness: params.double(F::Sharpness) as f32,
        })
    }

    fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        params.bool(F::MergeWithBackground)
    }
}

pub struct CircularScreen;

impl GraphFilter for CircularScreen {
    fn fields(&self) -> Vec<FieldSpec> {
        screen_fields(6.0, None)
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::CircularScreen {
            center: to_pixels(params.point(F::Center), size),
            width: params.double(F::Width) as f32,
            sharpness: params.double(F::Sharpness) as f32,
        })
    }

    fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        params.bool(F::MergeWithBackground)
    }
}

pub struct DotScreen;

impl GraphFilter for DotScreen {
    fn fields(&self) -> Vec<FieldSpec> {
        screen_fields(6.0, Some(0.0))
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::DotScreen {
            center: to_pixels(params.point(F::Center), size),
            angle: params.double(F::Angle) as f32,
            width: params.double(F::Width) as f32,
            sharpness: params.double(F::Sharpness) as f32,
        })
    }

    fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        params.bool(F::MergeWithBackground)
    }
}

pub struct HatchScreen;

impl GraphFilter for HatchScreen {
    fn fields(&self) -> Vec<FieldSpec> {
        screen_fields(6.0, Some(45.0))
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::HatchScreen {
            center: to_pixels(params.point(F::Center), size),
            angle: params.double(F::Angle) as f32,
            width: params.double(F::Width) as f32,
            sharpness: params.double(F::Sharpness) as f32,
        })
    }

    fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        params.bool(F::MergeWithBackground)
    }
}

pub struct CmykHalftone;

impl GraphFilter for CmykHalftone {
    fn fields(&self) -> Vec<FieldSpec> {
        screen_fields(6.0, Some(0.0))
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::CmykHalftone {
            center: to_pixels(params.point(F::Center), size),
            angle: params.double(F::Angle) as f32,
            width: params.double(F::Width) as f32,
            sharpness: params.double(F::Sharpness) as f32,
        })
    }

    fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        params.bool(F::MergeWithBackground)
    }
}

pub struct Pixellate;

impl GraphFilter for Pixellate {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Center, V::Point(CENTER)),
            spec(F::Width, V::Double(8.0)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::Pixellate {
            center: to_pixels(params.point(F::Center), size),
            scale: params.double(F::Width) as f32,
        })
    }
}

pub struct Pointillize;

impl GraphFilter for Pointillize {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Radius, V::Double(8.0))]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::Pointillize {
            radius: params.double(F::Radius) as f32,
        })
    }
}

/// Rings multiplied with lines; always composited
pub struct CircleAndLines;

impl GraphFilter for CircleAndLines {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Center, V::Point(CENTER)),
            spec(F::Width, V::Double(10.0)),
            spec(F::Angle, V::Double(45.0)),
            spec(F::Sharpness, V::Double(0.7)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        let center = to_pixels(params.point(F::Center), size);
        let width = params.double(F::Width) as f32;
        let sharpness = params.double(F::Sharpness) as f32;
        let rings = FilterGraph::new().then(GraphOp::CircularScreen {
            center,
            width,
            sharpness,
        });
        let lines = FilterGraph::new().then(GraphOp::LineScreen {
            center,
            angle: params.double(F::Angle) as f32,
            width,
            sharpness,
        });
        FilterGraph::new().then(GraphOp::Multiply(rings, lines))
    }

    fn merge_with_background(&self, _params: &ParameterReader<'_>) -> bool {
        true
    }
}

/// Posterized color with inked edges; always composited
pub struct Comic;

impl GraphFilter for Comic {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::PosterizeLevel, V::Int(4)),
            spec(F::EdgeIntensity, V::Double(2.0)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        let posterized = FilterGraph::new().then(GraphOp::Posterize(params.int(F::PosterizeLevel)));
        let inked = FilterGraph::new()
            .then(GraphOp::Edges {
                intensity: params.double(F::EdgeIntensity) as f32,
            })
            .then(GraphOp::InkLines {
                threshold: 0.2,
                contrast: 2.0,
            });
        FilterGraph::new().then(GraphOp::Multiply(posterized, inked))
    }

    fn merge_with_background(&self, _params: &ParameterReader<'_>) -> bool {
        true
    }
}

pub struct XRay;

impl GraphFilter for XRay {
    fn fields(&self) -> Vec<FieldSpec> {
        Vec::new()
    }

    fn build_graph(&self, _params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new()
            .then(GraphOp::Grayscale)
            .then(GraphOp::Invert)
            .then(GraphOp::ColorMatrix([
                [0.85, 0.0, 0.0, 0.0],
                [0.0, 0.95, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.05],
            ]))
            .then(GraphOp::Contrast(20.0))
    }
}

/// Sketch lines from noise-reduced edges
pub struct LineOverlay;

impl GraphFilter for LineOverlay {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::NRNoiseLevel, V::Double(0.07)),
            spec(F::NRSharpness, V::Double(0.71)),
            spec(F::EdgeIntensity, V::Double(1.0)),
            spec(F::InputThreshold, V::Double(0.1)),
            spec(F::InputContrast, V::Double(50.0)),
            spec(F::MergeWithBackground, V::Bool(true)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        let noise = params.double(F::NRNoiseLevel) as f32;
        let sharpness = params.double(F::NRSharpness) as f32;
        FilterGraph::new()
            .then(GraphOp::Blur {
                sigma: (noise * 10.0 * (1.0 - sharpness.clamp(0.0, 1.0))).max(0.0),
            })
            .then(GraphOp::Edges {
                intensity: params.double(F::EdgeIntensity) as f32,
            })
            .then(GraphOp::InkLines {
                threshold: params.double(F::InputThreshold) as f32,
                contrast: params.double(F::InputContrast) as f32,
            })
    }

    fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        params.bool(F::MergeWithBackground)
    }
}

pub struct HueAdjust;

impl GraphFilter for HueAdjust {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Angle, V::Double(0.0))]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::HueRotate {
            degrees: params.double(F::Angle).round() as i32,
        })
    }
}

pub struct HsbAdjust;

impl GraphFilter for HsbAdjust {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::InputHue, V::Double(0.0)),
            spec(F::InputSaturation, V::Double(1.0)),
            spec(F::InputBrightness, V::Double(1.0)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::Hsb {
            hue: params.double(F::InputHue) as f32,
            saturation: params.double(F::InputSaturation) as f32,
            brightness: params.double(F::InputBrightness) as f32,
        })
    }
}

pub struct EdgeWork;

impl GraphFilter for EdgeWork {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Radius, V::Double(3.0))]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new()
            .then(GraphOp::Blur {
                sigma: (params.double(F::Radius) as f32 / 2.0).max(0.0),
            })
            .then(GraphOp::Edges { intensity: 4.0 })
            .then(GraphOp::Posterize(2))
    }
}

pub struct FalseColor;

impl GraphFilter for FalseColor {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Color0, V::Color(Color::rgb(0.3, 0.0, 0.0))),
            spec(F::Color1, V::Color(Color::rgb(1.0, 0.9, 0.8))),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::FalseColor {
            low: params.color(F::Color0),
            high: params.color(F::Color1),
        })
    }
}

pub struct Vibrance;

impl GraphFilter for Vibrance {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Amount, V::Double(0.5))]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::Vibrance(params.double(F::Amount) as f32))
    }
}

pub struct TemperatureAndTint;

impl GraphFilter for TemperatureAndTint {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Temperature, V::Double(6500.0)),
            spec(F::Tint, V::Double(0.0)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::TemperatureTint {
            temperature: params.double(F::Temperature) as f32,
            tint: params.double(F::Tint) as f32,
        })
    }
}

pub struct GaussianBlur;

impl GraphFilter for GaussianBlur {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Radius, V::Double(10.0))]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        let radius = params.double(F::Radius).max(0.0) as f32;
        FilterGraph::new().then(GraphOp::Blur {
            sigma: radius.min(max_blur_sigma(size)),
        })
    }
}

pub struct ColorMap;

pub const DEFAULT_GRADIENT: &str = "#000080@0.0,#ff8000@0.5,#ffffff@1.0";

impl GraphFilter for ColorMap {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(
            F::ColorMapGradient,
            V::String(DEFAULT_GRADIENT.to_string()),
        )]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, _size: (u32, u32)) -> FilterGraph {
        let mut stops = ops::parse_gradient(&params.string(F::ColorMapGradient));
        if stops.is_empty() {
            stops = ops::parse_gradient(DEFAULT_GRADIENT);
        }
        FilterGraph::new().then(GraphOp::ColorMap(stops))
    }
}

pub struct Checkerboard;

impl GraphFilter for Checkerboard {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Center, V::Point(CENTER)),
            spec(F::Color0, V::Color(Color::WHITE)),
            spec(F::Color1, V::Color(Color::BLACK)),
            spec(F::Width, V::Double(80.0)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::Checkerboard {
            center: to_pixels(params.point(F::Center), size),
            color0: params.color(F::Color0),
            color1: params.color(F::Color1),
            width: params.double(F::Width) as f32,
        })
    }
}

pub struct SmoothLinearGradient;

impl GraphFilter for SmoothLinearGradient {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Point0, V::Point(Point::new(0.0, 0.0))),
            spec(F::Point1, V::Point(Point::new(1.0, 1.0))),
            spec(F::Color0, V::Color(Color::WHITE)),
            spec(F::Color1, V::Color(Color::BLACK)),
        ]
    }

    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph {
        FilterGraph::new().then(GraphOp::LinearGradient {
            p0: to_pixels(params.point(F::Point0), size),
            p1: to_pixels(params.point(F::Point1), size),
            color0: params.color(F::Color0),
            color1: params.color(F::Color1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterOverrides, ParameterStore};
    use uuid::Uuid;

    #[test]
    fn test_line_screen_defaults() {
        let fields = LineScreen.fields();
        let width = fields.iter().find(|f| f.field == F::Width).unwrap();
        assert_eq!(width.default, V::Double(5.0));
        let angle = fields.iter().find(|f| f.field == F::Angle).unwrap();
        assert_eq!(angle.default, V::Double(90.0));
    }

    #[test]
    fn test_center_scales_to_frame() {
        assert_eq!(to_pixels(CENTER, (200, 100)), (100.0, 50.0));
    }

    #[test]
    fn test_merge_follows_override() {
        let store = ParameterStore::in_memory();
        let id = Uuid::new_v4();
        store.seed_defaults(id, &LineScreen.fields());
        let overrides = ParameterOverrides::new().with(F::MergeWithBackground, V::Bool(false));

        assert!(LineScreen.merge_with_background(&ParameterReader::new(&store, id, None)));
        assert!(!LineScreen.merge_with_background(&ParameterReader::new(&store, id, Some(&overrides))));
    }

    #[test]
    fn test_bad_gradient_falls_back() {
        let store = ParameterStore::in_memory();
        let id = Uuid::new_v4();
        store.seed_defaults(id, &ColorMap.fields());
        let overrides = ParameterOverrides::new().with(F::ColorMapGradient, V::String("nope".into()));
        let graph = ColorMap.build_graph(&ParameterReader::new(&store, id, Some(&overrides)), (1, 1));
        assert!(matches!(&graph.ops()[0], GraphOp::ColorMap(stops) if stops.len() == 3));
    }

    #[test]
    fn test_blur_radius_capped_by_size() {
        let store = ParameterStore::in_memory();
        let id = Uuid::new_v4();
        store.seed_defaults(id, &GaussianBlur.fields());
        let overrides = ParameterOverrides::new().with(F::Radius, V::Double(1e12));
        let graph = GaussianBlur.build_graph(&ParameterReader::new(&store, id, Some(&overrides)), (64, 32));
        assert_eq!(graph.ops(), &[GraphOp::Blur { sigma: 16.0 }]);
    }
}
