// SPDX-License-Identifier: GPL-3.0-only

//! The closed set of filter implementations
//!
//! A filter is either a graph filter, which describes its effect as a CPU
//! [`FilterGraph`], or a kernel filter, which names a compute kernel and
//! packs a parameter block for it. Both declare their fields with defaults;
//! the registry seeds those into the parameter store.

mod graph_filters;
mod kernel_filters;

pub use graph_filters::DEFAULT_GRADIENT;

use crate::constants::{FilterType, KernelKind};
use crate::graph::FilterGraph;
use crate::params::{FieldSpec, ParameterField, ParameterReader, ParameterValue};
use crate::shaders::{self, KernelSource};

#[inline]
pub(crate) fn spec(field: ParameterField, default: ParameterValue) -> FieldSpec {
    FieldSpec::new(field, default)
}

/// A filter evaluated on the CPU
pub trait GraphFilter: Send + Sync {
    fn fields(&self) -> Vec<FieldSpec>;

    /// Build the graph for one render at `size`
    fn build_graph(&self, params: &ParameterReader<'_>, size: (u32, u32)) -> FilterGraph;

    /// Whether the output is composited over the original
    fn merge_with_background(&self, _params: &ParameterReader<'_>) -> bool {
        false
    }
}

/// A filter that runs a compute kernel
pub trait KernelFilter: Send + Sync {
    fn fields(&self) -> Vec<FieldSpec>;

    /// Entry in the embedded kernel library
    fn kernel_name(&self) -> &'static str;

    /// Uniform block bytes for one render of a `width` x `height` frame
    fn parameter_block(&self, params: &ParameterReader<'_>, width: u32, height: u32) -> Vec<u8>;

    fn merge_with_background(&self, _params: &ParameterReader<'_>) -> bool {
        false
    }

    fn kernel(&self) -> Option<&'static KernelSource> {
        shaders::kernel(self.kernel_name())
    }
}

/// One of the two filter kinds
pub enum FilterProgram {
    Graph(Box<dyn GraphFilter>),
    Kernel(Box<dyn KernelFilter>),
}

impl std::fmt::Debug for FilterProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterProgram::Graph(_) => f.write_str("FilterProgram::Graph"),
            FilterProgram::Kernel(k) => write!(f, "FilterProgram::Kernel({})", k.kernel_name()),
        }
    }
}

impl FilterProgram {
    pub fn kind(&self) -> KernelKind {
        match self {
            FilterProgram::Graph(_) => KernelKind::Graph,
            FilterProgram::Kernel(_) => KernelKind::Compute,
        }
    }

    pub fn fields(&self) -> Vec<FieldSpec> {
        match self {
            FilterProgram::Graph(g) => g.fields(),
            FilterProgram::Kernel(k) => k.fields(),
        }
    }

    /// Number of images one render consumes
    pub fn input_count(&self) -> usize {
        match self {
            FilterProgram::Graph(_) => 1,
            FilterProgram::Kernel(k) => k.kernel().map_or(1, |source| source.inputs),
        }
    }

    pub fn merge_with_background(&self, params: &ParameterReader<'_>) -> bool {
        match self {
            FilterProgram::Graph(g) => g.merge_with_background(params),
            FilterProgram::Kernel(k) => k.merge_with_background(params),
        }
    }
}

/// Build the implementation for `filter_type`
pub fn program_for(filter_type: FilterType) -> FilterProgram {
    use FilterProgram::{Graph, Kernel};
    use graph_filters as g;
    use kernel_filters as k;

    match filter_type {
        FilterType::PassThrough => Graph(Box::new(g::PassThrough)),
        FilterType::Noir => Graph(Box::new(g::Noir)),
        FilterType::LineScreen => Graph(Box::new(g::LineScreen)),
        FilterType::CircularScreen => Graph(Box::new(g::CircularScreen)),
        FilterType::DotScreen => Graph(Box::new(g::DotScreen)),
        FilterType::HatchScreen => Graph(Box::new(g::HatchScreen)),
        FilterType::CmykHalftone => Graph(Box::new(g::CmykHalftone)),
        FilterType::Pixellate => Graph(Box::new(g::Pixellate)),
        FilterType::Pointillize => Graph(Box::new(g::Pointillize)),
        FilterType::CircleAndLines => Graph(Box::new(g::CircleAndLines)),
        FilterType::Comic => Graph(Box::new(g::Comic)),
        FilterType::XRay => Graph(Box::new(g::XRay)),
        FilterType::LineOverlay => Graph(Box::new(g::LineOverlay)),
        FilterType::HueAdjust => Graph(Box::new(g::HueAdjust)),
        FilterType::HsbAdjust => Graph(Box::new(g::HsbAdjust)),
        FilterType::EdgeWork => Graph(Box::new(g::EdgeWork)),
        FilterType::FalseColor => Graph(Box::new(g::FalseColor)),
        FilterType::Vibrance => Graph(Box::new(g::Vibrance)),
        FilterType::TemperatureAndTint => Graph(Box::new(g::TemperatureAndTint)),
        FilterType::GaussianBlur => Graph(Box::new(g::GaussianBlur)),
        FilterType::ColorMap => Graph(Box::new(g::ColorMap)),
        FilterType::Checkerboard => Graph(Box::new(g::Checkerboard)),
        FilterType::SmoothLinearGradient => Graph(Box::new(g::SmoothLinearGradient)),
        FilterType::ChannelMixer => Kernel(Box::new(k::ChannelMixer)),
        FilterType::ColorInverter => Kernel(Box::new(k::ColorInverter)),
        FilterType::DesaturateColors => Kernel(Box::new(k::DesaturateColors)),
        FilterType::GrayscaleAdjust => Kernel(Box::new(k::GrayscaleAdjust)),
        FilterType::Kuwahara => Kernel(Box::new(k::Kuwahara)),
        FilterType::PixellateMetal => Kernel(Box::new(k::PixellateMetal)),
        FilterType::Mirroring => Kernel(Box::new(k::Mirroring)),
        FilterType::Solarize => Kernel(Box::new(k::Solarize)),
        FilterType::Dithering => Kernel(Box::new(k::Dithering)),
        FilterType::Threshold => Kernel(Box::new(k::Threshold)),
        FilterType::MonochromeColors => Kernel(Box::new(k::MonochromeColors)),
        FilterType::DilateErode => Kernel(Box::new(k::DilateErode)),
        FilterType::Sobel => Kernel(Box::new(k::Sobel)),
        FilterType::Laplacian => Kernel(Box::new(k::Laplacian)),
        FilterType::Median => Kernel(Box::new(k::Median)),
        FilterType::BlockMean => Kernel(Box::new(k::BlockMean)),
        FilterType::PixelCounter => Kernel(Box::new(k::PixelCounter)),
        FilterType::MetalCheckerboard => Kernel(Box::new(k::MetalCheckerboard)),
        FilterType::Masking1 => Kernel(Box::new(k::Masking)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kernel_filter_names_a_kernel() {
        for filter_type in FilterType::ALL {
            if let FilterProgram::Kernel(k) = program_for(filter_type) {
                assert!(k.kernel().is_some(), "{} names a missing kernel", filter_type);
            }
        }
    }

    #[test]
    fn test_defaults_match_declared_types() {
        for filter_type in FilterType::ALL {
            for spec in program_for(filter_type).fields() {
                assert!(
                    spec.default.clone().conform_to(spec.field.kind()).is_some(),
                    "{}: {:?} default does not fit",
                    filter_type,
                    spec.field
                );
                assert!(!spec.field.is_statistic());
            }
        }
    }

    #[test]
    fn test_masking_takes_two_images() {
        assert_eq!(program_for(FilterType::Masking1).input_count(), 2);
        assert_eq!(program_for(FilterType::Sobel).input_count(), 1);
        assert_eq!(program_for(FilterType::Noir).input_count(), 1);
    }

    #[test]
    fn test_backend_split() {
        assert_eq!(program_for(FilterType::LineScreen).kind(), KernelKind::Graph);
        assert_eq!(program_for(FilterType::PixellateMetal).kind(), KernelKind::Compute);
    }
}
