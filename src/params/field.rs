// SPDX-License-Identifier: GPL-3.0-only

//! Field identities and their declared value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a parameter field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Double,
    Int,
    Bool,
    Point,
    String,
    /// Double clamped to [0, 1]
    Normal,
    Color,
    /// Returned when a field has no stored record
    NoType,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::Double => "Double",
            ParameterType::Int => "Integer",
            ParameterType::Bool => "Boolean",
            ParameterType::Point => "Point",
            ParameterType::String => "String",
            ParameterType::Normal => "Normal",
            ParameterType::Color => "Color",
            ParameterType::NoType => "NoType",
        };
        f.write_str(name)
    }
}

macro_rules! parameter_fields {
    ($($field:ident => $kind:ident),* $(,)?) => {
        /// A named, typed setting of a filter
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ParameterField {
            $($field,)*
        }

        impl ParameterField {
            pub const ALL: &'static [ParameterField] = &[$(ParameterField::$field,)*];

            /// The value type this field always holds
            pub fn kind(&self) -> ParameterType {
                match self {
                    $(ParameterField::$field => ParameterType::$kind,)*
                }
            }

            /// Field name as used in storage keys
            pub fn name(&self) -> &'static str {
                match self {
                    $(ParameterField::$field => stringify!($field),)*
                }
            }
        }
    };
}

parameter_fields! {
    Center => Point,
    Width => Double,
    Angle => Double,
    Sharpness => Double,
    MergeWithBackground => Bool,
    InputThreshold => Double,
    InputContrast => Double,
    EdgeIntensity => Double,
    NRNoiseLevel => Double,
    NRSharpness => Double,
    InputHue => Double,
    InputSaturation => Double,
    InputBrightness => Double,
    Radius => Double,
    Intensity => Double,
    Amount => Double,
    Bias => Double,
    Temperature => Double,
    Tint => Double,
    PatternBlockWidth => Double,
    PosterizeLevel => Int,
    Color0 => Color,
    Color1 => Color,
    Point0 => Point,
    Point1 => Point,
    ColorMapGradient => String,
    RedChannel => Int,
    GreenChannel => Int,
    BlueChannel => Int,
    Channel1 => Int,
    InvertRed => Bool,
    InvertGreen => Bool,
    InvertBlue => Bool,
    InvertAlpha => Bool,
    Strength => Normal,
    RAdjustment => Normal,
    GAdjustment => Normal,
    BAdjustment => Normal,
    SolarizeThreshold => Normal,
    SolarizeIfGreater => Bool,
    ThresholdValue => Normal,
    ApplyThresholdIfHigher => Bool,
    LowThresholdColor => Color,
    HighThresholdColor => Color,
    BrightChannels => Bool,
    BlockWidth => Int,
    BlockHeight => Int,
    MaskColor => Color,
    MaskTolerance => Int,
    MirroringDirection => Int,
    WindowSize => Int,
    Operation => Int,
    BayerPattern => Int,
    Stars => Int,
    Favorite => Bool,
    RenderImageCount => Int,
    CumulativeImageRenderDuration => Double,
    RenderLiveCount => Int,
    CumulativeLiveRenderDuration => Double,
}

impl ParameterField {
    /// Suffix appended to the filter id to form the storage key
    pub fn storage_suffix(&self) -> String {
        format!("_{}", self.name())
    }

    /// Look a field up by name, case-insensitively
    pub fn from_name(name: &str) -> Option<ParameterField> {
        let name = name.trim().trim_start_matches('_');
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Statistics fields are owned by the accumulator, not by filters
    pub fn is_statistic(&self) -> bool {
        matches!(
            self,
            ParameterField::RenderImageCount
                | ParameterField::CumulativeImageRenderDuration
                | ParameterField::RenderLiveCount
                | ParameterField::CumulativeLiveRenderDuration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_field_declares_no_type() {
        for field in ParameterField::ALL {
            assert_ne!(field.kind(), ParameterType::NoType, "{:?}", field);
        }
    }

    #[test]
    fn test_storage_suffix() {
        assert_eq!(ParameterField::BlockWidth.storage_suffix(), "_BlockWidth");
        assert_eq!(
            ParameterField::from_name("_mergewithbackground"),
            Some(ParameterField::MergeWithBackground)
        );
    }
}
