// SPDX-License-Identifier: GPL-3.0-only

//! Filter identities and pipeline-wide constants

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::uuid;

/// Default number of output buffers a pool preallocates
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Number of `u32` slots in a kernel's diagnostic results buffer
pub const RESULTS_LEN: usize = 10;

/// Every filter the pipeline knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum FilterType {
    #[default]
    PassThrough,
    Noir,
    LineScreen,
    CircularScreen,
    DotScreen,
    HatchScreen,
    CmykHalftone,
    Pixellate,
    Pointillize,
    CircleAndLines,
    Comic,
    XRay,
    LineOverlay,
    HueAdjust,
    HsbAdjust,
    EdgeWork,
    FalseColor,
    Vibrance,
    TemperatureAndTint,
    GaussianBlur,
    ColorMap,
    Checkerboard,
    SmoothLinearGradient,
    ChannelMixer,
    ColorInverter,
    DesaturateColors,
    GrayscaleAdjust,
    Kuwahara,
    PixellateMetal,
    Mirroring,
    Solarize,
    Dithering,
    Threshold,
    MonochromeColors,
    DilateErode,
    Sobel,
    Laplacian,
    Median,
    BlockMean,
    PixelCounter,
    MetalCheckerboard,
    Masking1,
}

impl FilterType {
    /// All filters, in catalogue order
    pub const ALL: [FilterType; 42] = [
        FilterType::PassThrough,
        FilterType::Noir,
        FilterType::LineScreen,
        FilterType::CircularScreen,
        FilterType::DotScreen,
        FilterType::HatchScreen,
        FilterType::CmykHalftone,
        FilterType::Pixellate,
        FilterType::Pointillize,
        FilterType::CircleAndLines,
        FilterType::Comic,
        FilterType::XRay,
        FilterType::LineOverlay,
        FilterType::HueAdjust,
        FilterType::HsbAdjust,
        FilterType::EdgeWork,
        FilterType::FalseColor,
        FilterType::Vibrance,
        FilterType::TemperatureAndTint,
        FilterType::GaussianBlur,
        FilterType::ColorMap,
        FilterType::Checkerboard,
        FilterType::SmoothLinearGradient,
        FilterType::ChannelMixer,
        FilterType::ColorInverter,
        FilterType::DesaturateColors,
        FilterType::GrayscaleAdjust,
        FilterType::Kuwahara,
        FilterType::PixellateMetal,
        FilterType::Mirroring,
        FilterType::Solarize,
        FilterType::Dithering,
        FilterType::Threshold,
        FilterType::MonochromeColors,
        FilterType::DilateErode,
        FilterType::Sobel,
        FilterType::Laplacian,
        FilterType::Median,
        FilterType::BlockMean,
        FilterType::PixelCounter,
        FilterType::MetalCheckerboard,
        FilterType::Masking1,
    ];

    /// Look a filter up by its variant name, case-insensitively
    pub fn from_name(name: &str) -> Option<FilterType> {
        let wanted = name.trim().replace([' ', '-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|t| format!("{:?}", t).eq_ignore_ascii_case(&wanted))
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Catalogue groups shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterGroup {
    Standard,
    Combined,
    Effects,
    PhotoEffects,
    Colors,
    Gray,
    Tiles,
    Generator,
    Blur,
    Measuration,
    /// Filters the user marked as favorite
    Favorites,
    /// Filters the user rated with five stars
    FiveStar,
}

impl FilterGroup {
    pub const ALL: [FilterGroup; 12] = [
        FilterGroup::Standard,
        FilterGroup::Combined,
        FilterGroup::Effects,
        FilterGroup::PhotoEffects,
        FilterGroup::Colors,
        FilterGroup::Gray,
        FilterGroup::Tiles,
        FilterGroup::Generator,
        FilterGroup::Blur,
        FilterGroup::Measuration,
        FilterGroup::Favorites,
        FilterGroup::FiveStar,
    ];

    /// Get display name for the group
    pub fn display_name(&self) -> &'static str {
        match self {
            FilterGroup::Standard => "Standard",
            FilterGroup::Combined => "Combined",
            FilterGroup::Effects => "Effects",
            FilterGroup::PhotoEffects => "Photo Effects",
            FilterGroup::Colors => "Colors",
            FilterGroup::Gray => "Grayscale",
            FilterGroup::Tiles => "Tiles",
            FilterGroup::Generator => "Generators",
            FilterGroup::Blur => "Blur",
            FilterGroup::Measuration => "Measuration",
            FilterGroup::Favorites => "Favorites",
            FilterGroup::FiveStar => "Five Stars",
        }
    }

    /// Stable identifier of the group
    pub fn id(&self) -> uuid::Uuid {
        match self {
            FilterGroup::Standard => uuid!("ce79f6b5-dce4-4280-b291-2b5af6a7f617"),
            FilterGroup::Combined => uuid!("99a6054e-8b60-4c7d-9a7a-3ea8ecacf874"),
            FilterGroup::Effects => uuid!("fae8b7f3-db91-47c9-8599-7227ef0d9fdb"),
            FilterGroup::PhotoEffects => uuid!("a8a857f4-ddbf-4fbb-a998-e48395f3ca10"),
            FilterGroup::Colors => uuid!("28cae223-4e86-4d53-b8e9-419e08d9c823"),
            FilterGroup::Gray => uuid!("d004805c-4571-40d1-b2af-fb6d9b680816"),
            FilterGroup::Tiles => uuid!("b641cbc9-7ad1-4bdf-9afe-bbf715020525"),
            FilterGroup::Generator => uuid!("fc757ea9-8300-47a9-9fa0-0855d86100bb"),
            FilterGroup::Blur => uuid!("417aafdc-2264-404c-bfd8-a1420d627427"),
            FilterGroup::Measuration => uuid!("3c092135-8a86-4ae1-a53d-26be3a37ac4d"),
            FilterGroup::Favorites => uuid!("8f5c963f-f009-40c9-80d9-a528506b7192"),
            FilterGroup::FiveStar => uuid!("5045f4bc-5d07-4a0c-9ed7-7f5fd20354dd"),
        }
    }

    /// Whether membership is computed from ratings rather than the catalogue
    pub fn is_virtual(&self) -> bool {
        matches!(self, FilterGroup::Favorites | FilterGroup::FiveStar)
    }
}

/// Where a renderer instance is used; each location keeps its own instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterLocation {
    Photo,
    Video,
}

impl FilterLocation {
    pub const ALL: [FilterLocation; 2] = [FilterLocation::Photo, FilterLocation::Video];
}

/// Which code path produced a render, for statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Single still image, blocking
    Image,
    /// Per-frame stream, asynchronous
    Live,
}

/// How a filter is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelKind {
    /// Declarative CPU filter graph
    Graph,
    /// WGSL compute kernel
    Compute,
}

impl KernelKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            KernelKind::Graph => "Filter graph",
            KernelKind::Compute => "GPU kernel",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_spacing_variants() {
        assert_eq!(FilterType::from_name("noir"), Some(FilterType::Noir));
        assert_eq!(
            FilterType::from_name("line-screen"),
            Some(FilterType::LineScreen)
        );
        assert_eq!(
            FilterType::from_name("Pixellate Metal"),
            Some(FilterType::PixellateMetal)
        );
        assert_eq!(FilterType::from_name("sepia"), None);
    }

    #[test]
    fn test_group_ids_parse() {
        for group in FilterGroup::ALL {
            assert!(!group.id().is_nil(), "{:?} has nil id", group);
        }
    }
}
