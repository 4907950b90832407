// SPDX-License-Identifier: GPL-3.0-only

//! Filters that run as compute kernels
//!
//! Each filter packs its current parameters into a `#[repr(C)]` block that
//! mirrors the kernel's uniform struct: colors first as `vec4<f32>`, flags
//! as `u32`, padded to 16 bytes.

use super::{KernelFilter, spec};
use crate::params::{Color, FieldSpec, ParameterField as F, ParameterReader, ParameterValue as V};
use bytemuck::{Pod, Zeroable};

fn block<T: Pod>(value: T) -> Vec<u8> {
    bytemuck::bytes_of(&value).to_vec()
}

#[inline]
fn flag(value: bool) -> u32 {
    value as u32
}

/// Channel index in 0..=2
fn channel(value: i64) -> u32 {
    value.clamp(0, 2) as u32
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MixerParams {
    red_source: u32,
    green_source: u32,
    blue_source: u32,
    _padding: u32,
}

pub struct ChannelMixer;

impl KernelFilter for ChannelMixer {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::RedChannel, V::Int(0)),
            spec(F::GreenChannel, V::Int(1)),
            spec(F::BlueChannel, V::Int(2)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "channel_mixer"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(MixerParams {
            red_source: channel(params.int(F::RedChannel)),
            green_source: channel(params.int(F::GreenChannel)),
            blue_source: channel(params.int(F::BlueChannel)),
            _padding: 0,
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct InvertParams {
    invert_red: u32,
    invert_green: u32,
    invert_blue: u32,
    invert_alpha: u32,
}

pub struct ColorInverter;

impl KernelFilter for ColorInverter {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::InvertRed, V::Bool(true)),
            spec(F::InvertGreen, V::Bool(true)),
            spec(F::InvertBlue, V::Bool(true)),
            spec(F::InvertAlpha, V::Bool(false)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "color_inverter"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(InvertParams {
            invert_red: flag(params.bool(F::InvertRed)),
            invert_green: flag(params.bool(F::InvertGreen)),
            invert_blue: flag(params.bool(F::InvertBlue)),
            invert_alpha: flag(params.bool(F::InvertAlpha)),
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DesaturateParams {
    strength: f32,
    _padding: [f32; 3],
}

pub struct DesaturateColors;

impl KernelFilter for DesaturateColors {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Strength, V::Normal(1.0))]
    }

    fn kernel_name(&self) -> &'static str {
        "desaturate"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(DesaturateParams {
            strength: params.normal(F::Strength) as f32,
            _padding: [0.0; 3],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GrayscaleParams {
    red_weight: f32,
    green_weight: f32,
    blue_weight: f32,
    _padding: f32,
}

pub struct GrayscaleAdjust;

impl KernelFilter for GrayscaleAdjust {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::RAdjustment, V::Normal(0.2126)),
            spec(F::GAdjustment, V::Normal(0.7152)),
            spec(F::BAdjustment, V::Normal(0.0722)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "grayscale_adjust"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(GrayscaleParams {
            red_weight: params.normal(F::RAdjustment) as f32,
            green_weight: params.normal(F::GAdjustment) as f32,
            blue_weight: params.normal(F::BAdjustment) as f32,
            _padding: 0.0,
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RadiusParams {
    radius: i32,
    _padding: [i32; 3],
}

pub struct Kuwahara;

impl KernelFilter for Kuwahara {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Radius, V::Double(4.0))]
    }

    fn kernel_name(&self) -> &'static str {
        "kuwahara"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(RadiusParams {
            radius: params.double(F::Radius).round().clamp(1.0, 16.0) as i32,
            _padding: [0; 3],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BlockParams {
    block_width: u32,
    block_height: u32,
    _padding: [u32; 2],
}

fn block_size(params: &ParameterReader<'_>, width: u32, height: u32) -> BlockParams {
    BlockParams {
        block_width: params.int(F::BlockWidth).clamp(1, width.max(1) as i64) as u32,
        block_height: params.int(F::BlockHeight).clamp(1, height.max(1) as i64) as u32,
        _padding: [0; 2],
    }
}

/// Flat blocks; reports the block count and size in the results buffer
pub struct PixellateMetal;

impl KernelFilter for PixellateMetal {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::BlockWidth, V::Int(20)),
            spec(F::BlockHeight, V::Int(20)),
            spec(F::MergeWithBackground, V::Bool(false)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "pixellate"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, width: u32, height: u32) -> Vec<u8> {
        block(block_size(params, width, height))
    }

    fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        params.bool(F::MergeWithBackground)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ModeParams {
    mode: u32,
    _padding: [u32; 3],
}

pub struct Mirroring;

impl KernelFilter for Mirroring {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::MirroringDirection, V::Int(0))]
    }

    fn kernel_name(&self) -> &'static str {
        "mirroring"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(ModeParams {
            mode: params.int(F::MirroringDirection).clamp(0, 3) as u32,
            _padding: [0; 3],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SolarizeParams {
    threshold: f32,
    if_greater: u32,
    _padding: [u32; 2],
}

pub struct Solarize;

impl KernelFilter for Solarize {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::SolarizeThreshold, V::Normal(0.5)),
            spec(F::SolarizeIfGreater, V::Bool(true)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "solarize"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(SolarizeParams {
            threshold: params.normal(F::SolarizeThreshold) as f32,
            if_greater: flag(params.bool(F::SolarizeIfGreater)),
            _padding: [0; 2],
        })
    }
}

/// Bayer matrix order 2, 4 or 8
pub struct Dithering;

impl KernelFilter for Dithering {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::BayerPattern, V::Int(4))]
    }

    fn kernel_name(&self) -> &'static str {
        "dither"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(ModeParams {
            mode: params.int(F::BayerPattern).clamp(2, 8) as u32,
            _padding: [0; 3],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ThresholdParams {
    low_color: [f32; 4],
    high_color: [f32; 4],
    threshold: f32,
    apply_if_higher: u32,
    _padding: [u32; 2],
}

pub struct Threshold;

impl KernelFilter for Threshold {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::ThresholdValue, V::Normal(0.5)),
            spec(F::ApplyThresholdIfHigher, V::Bool(true)),
            spec(F::LowThresholdColor, V::Color(Color::BLACK)),
            spec(F::HighThresholdColor, V::Color(Color::WHITE)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "threshold"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(ThresholdParams {
            low_color: params.color(F::LowThresholdColor).to_array(),
            high_color: params.color(F::HighThresholdColor).to_array(),
            threshold: params.normal(F::ThresholdValue) as f32,
            apply_if_higher: flag(params.bool(F::ApplyThresholdIfHigher)),
            _padding: [0; 2],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MonochromeParams {
    channel: u32,
    bright_channels: u32,
    _padding: [u32; 2],
}

pub struct MonochromeColors;

impl KernelFilter for MonochromeColors {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Channel1, V::Int(0)),
            spec(F::BrightChannels, V::Bool(false)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "monochrome_colors"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(MonochromeParams {
            channel: channel(params.int(F::Channel1)),
            bright_channels: flag(params.bool(F::BrightChannels)),
            _padding: [0; 2],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MorphologyParams {
    radius: i32,
    erode: u32,
    _padding: [u32; 2],
}

/// `Operation` 0 dilates, 1 erodes
pub struct DilateErode;

impl KernelFilter for DilateErode {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::WindowSize, V::Int(2)),
            spec(F::Operation, V::Int(1)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "dilate_erode"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(MorphologyParams {
            radius: params.int(F::WindowSize).clamp(0, 16) as i32,
            erode: flag(params.int(F::Operation) != 0),
            _padding: [0; 2],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SobelParams {
    intensity: f32,
    monochrome: u32,
    _padding: [u32; 2],
}

/// `Operation` 1 collapses the gradient to gray
pub struct Sobel;

impl KernelFilter for Sobel {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Intensity, V::Double(1.0)),
            spec(F::Operation, V::Int(0)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "sobel"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(SobelParams {
            intensity: params.double(F::Intensity) as f32,
            monochrome: flag(params.int(F::Operation) != 0),
            _padding: [0; 2],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LaplacianParams {
    intensity: f32,
    bias: f32,
    _padding: [f32; 2],
}

pub struct Laplacian;

impl KernelFilter for Laplacian {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Intensity, V::Double(2.0)),
            spec(F::Bias, V::Double(0.0)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "laplacian"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(LaplacianParams {
            intensity: params.double(F::Intensity) as f32,
            bias: params.double(F::Bias) as f32,
            _padding: [0.0; 2],
        })
    }
}

/// Window radius is limited to 2 (a 5x5 window)
pub struct Median;

impl KernelFilter for Median {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![spec(F::Radius, V::Double(1.0))]
    }

    fn kernel_name(&self) -> &'static str {
        "median"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(RadiusParams {
            radius: params.double(F::Radius).round().clamp(1.0, 2.0) as i32,
            _padding: [0; 3],
        })
    }
}

pub struct BlockMean;

impl KernelFilter for BlockMean {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::BlockWidth, V::Int(9)),
            spec(F::BlockHeight, V::Int(9)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "block_mean"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, width: u32, height: u32) -> Vec<u8> {
        block(block_size(params, width, height))
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CounterParams {
    highlight: [f32; 4],
    threshold: f32,
    _padding: [f32; 3],
}

/// Highlights bright pixels; results[0] counts them, results[1] the rest
pub struct PixelCounter;

impl KernelFilter for PixelCounter {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::ThresholdValue, V::Normal(0.8)),
            spec(F::HighThresholdColor, V::Color(Color::rgb(1.0, 0.0, 0.0))),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "pixel_counter"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(CounterParams {
            highlight: params.color(F::HighThresholdColor).to_array(),
            threshold: params.normal(F::ThresholdValue) as f32,
            _padding: [0.0; 3],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CheckerParams {
    color0: [f32; 4],
    color1: [f32; 4],
    block_size: u32,
    _padding: [u32; 3],
}

pub struct MetalCheckerboard;

impl KernelFilter for MetalCheckerboard {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::Color0, V::Color(Color::WHITE)),
            spec(F::Color1, V::Color(Color::BLACK)),
            spec(F::PatternBlockWidth, V::Double(40.0)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "checkerboard"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(CheckerParams {
            color0: params.color(F::Color0).to_array(),
            color1: params.color(F::Color1).to_array(),
            block_size: params.double(F::PatternBlockWidth).round().max(1.0) as u32,
            _padding: [0; 3],
        })
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MaskParams {
    mask_color: [f32; 4],
    tolerance: f32,
    _padding: [f32; 3],
}

/// Two images: the overlay shows through where the base matches the mask
/// color. `MaskTolerance` is in 8-bit steps.
pub struct Masking;

impl KernelFilter for Masking {
    fn fields(&self) -> Vec<FieldSpec> {
        vec![
            spec(F::MaskColor, V::Color(Color::rgb(0.0, 1.0, 0.0))),
            spec(F::MaskTolerance, V::Int(40)),
        ]
    }

    fn kernel_name(&self) -> &'static str {
        "masking"
    }

    fn parameter_block(&self, params: &ParameterReader<'_>, _width: u32, _height: u32) -> Vec<u8> {
        block(MaskParams {
            mask_color: params.color(F::MaskColor).to_array(),
            tolerance: params.int(F::MaskTolerance).clamp(0, 255) as f32 / 255.0,
            _padding: [0.0; 3],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterOverrides, ParameterStore};
    use std::mem::size_of;
    use uuid::Uuid;

    #[test]
    fn test_blocks_are_uniform_sized() {
        for size in [
            size_of::<MixerParams>(),
            size_of::<InvertParams>(),
            size_of::<DesaturateParams>(),
            size_of::<GrayscaleParams>(),
            size_of::<RadiusParams>(),
            size_of::<BlockParams>(),
            size_of::<ModeParams>(),
            size_of::<SolarizeParams>(),
            size_of::<ThresholdParams>(),
            size_of::<MonochromeParams>(),
            size_of::<MorphologyParams>(),
            size_of::<SobelParams>(),
            size_of::<LaplacianParams>(),
            size_of::<CounterParams>(),
            size_of::<CheckerParams>(),
            size_of::<MaskParams>(),
        ] {
            assert_eq!(size % 16, 0);
        }
        assert_eq!(size_of::<ThresholdParams>(), 48);
        assert_eq!(size_of::<CheckerParams>(), 48);
    }

    #[test]
    fn test_pixellate_block_from_overrides() {
        let store = ParameterStore::in_memory();
        let id = Uuid::new_v4();
        store.seed_defaults(id, &PixellateMetal.fields());
        let overrides = ParameterOverrides::new().with(F::BlockWidth, V::Int(8));
        let reader = ParameterReader::new(&store, id, Some(&overrides));

        let bytes = PixellateMetal.parameter_block(&reader, 640, 480);
        let packed: BlockParams = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(packed.block_width, 8);
        assert_eq!(packed.block_height, 20);
    }

    #[test]
    fn test_block_size_clamps_to_frame() {
        let store = ParameterStore::in_memory();
        let id = Uuid::new_v4();
        store.seed_defaults(id, &BlockMean.fields());
        let reader = ParameterReader::new(&store, id, None);

        let bytes = BlockMean.parameter_block(&reader, 4, 4);
        let packed: BlockParams = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!((packed.block_width, packed.block_height), (4, 4));
    }

    #[test]
    fn test_threshold_colors_lead_the_block() {
        let store = ParameterStore::in_memory();
        let id = Uuid::new_v4();
        store.seed_defaults(id, &Threshold.fields());
        let reader = ParameterReader::new(&store, id, None);

        let bytes = Threshold.parameter_block(&reader, 1, 1);
        let packed: ThresholdParams = bytemuck::pod_read_unaligned(&bytes);
        assert_eq!(packed.low_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(packed.high_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(packed.apply_if_higher, 1);
    }
}
