// SPDX-License-Identifier: GPL-3.0-only
//! Embedded compute kernels and the dispatch machinery that runs them
//!
//! Every kernel is a WGSL compute entry point named `main`. Kernels share the
//! [`COMMON`] prelude and the thread-group constants `WG_X`/`WG_Y`, which the
//! dispatcher prepends once it knows the device limits.
//!
//! Binding layout shared by all kernels:
//! - group 0: input texture(s) then the `rgba8unorm` storage output
//! - group 1: parameter uniform at 0, results buffer of [`RESULTS_LEN`] `u32`
//!   at 1 (only for kernels that report results)

pub mod dispatch;
mod gpu_processor;

pub use dispatch::{
    ComputeDispatcher, DispatchMode, DispatchOutput, GpuFence, GpuReadback, GridSize,
    KernelPipeline, ThreadGroupSize,
};
pub use gpu_processor::{
    CachedDimensions, compute_dispatch_size, padded_bytes_per_row, read_buffer_async, unpad_rows,
};

use crate::constants::RESULTS_LEN;

/// Helpers prepended to every kernel
pub const COMMON: &str = include_str!("kernels/common.wgsl");

/// One embedded kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSource {
    pub name: &'static str,
    pub source: &'static str,
    /// Number of input textures bound in group 0
    pub inputs: usize,
    /// Whether the kernel writes the results buffer
    pub reports_results: bool,
}

macro_rules! kernel_table {
    ($($name:literal => inputs $inputs:literal, results $results:literal;)*) => {
        /// Every kernel compiled into the binary
        pub static KERNELS: &[KernelSource] = &[
            $(KernelSource {
                name: $name,
                source: include_str!(concat!("kernels/", $name, ".wgsl")),
                inputs: $inputs,
                reports_results: $results,
            },)*
        ];
    };
}

kernel_table! {
    "block_mean" => inputs 1, results false;
    "channel_mixer" => inputs 1, results false;
    "checkerboard" => inputs 1, results false;
    "color_inverter" => inputs 1, results false;
    "desaturate" => inputs 1, results false;
    "dilate_erode" => inputs 1, results false;
    "dither" => inputs 1, results false;
    "grayscale_adjust" => inputs 1, results false;
    "kuwahara" => inputs 1, results false;
    "laplacian" => inputs 1, results false;
    "masking" => inputs 2, results false;
    "median" => inputs 1, results false;
    "mirroring" => inputs 1, results false;
    "monochrome_colors" => inputs 1, results false;
    "pixel_counter" => inputs 1, results true;
    "pixellate" => inputs 1, results true;
    "sobel" => inputs 1, results false;
    "solarize" => inputs 1, results false;
    "threshold" => inputs 1, results false;
}

/// Look up a kernel by function name
pub fn kernel(name: &str) -> Option<&'static KernelSource> {
    KERNELS.iter().find(|k| k.name == name)
}

/// Full WGSL for `kernel` with the thread-group constants for `group`
pub fn compose_source(kernel: &KernelSource, group: ThreadGroupSize) -> String {
    format!(
        "const WG_X: u32 = {}u;\nconst WG_Y: u32 = {}u;\n{}\n{}",
        group.width, group.height, COMMON, kernel.source
    )
}

/// Size in bytes of the results buffer
pub const RESULTS_BYTES: u64 = (RESULTS_LEN * std::mem::size_of::<u32>()) as u64;

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_shader(name: &str, source: &str) {
        let result = naga::front::wgsl::parse_str(source);
        match result {
            Ok(module) => {
                let info = naga::valid::Validator::new(
                    naga::valid::ValidationFlags::all(),
                    naga::valid::Capabilities::all(),
                )
                .validate(&module);

                if let Err(e) = info {
                    panic!("Shader '{}' validation failed: {:?}", name, e);
                }
            }
            Err(e) => {
                panic!("Shader '{}' parse failed: {}", name, e.emit_to_string(source));
            }
        }
    }

    #[test]
    fn test_every_kernel_validates() {
        let group = ThreadGroupSize::new(32, 1024);
        for kernel in KERNELS {
            validate_shader(kernel.name, &compose_source(kernel, group));
        }
    }

    #[test]
    fn test_kernel_lookup() {
        assert_eq!(kernel("masking").map(|k| k.inputs), Some(2));
        assert!(kernel("pixellate").is_some_and(|k| k.reports_results));
        assert!(kernel("no_such_kernel").is_none());
    }

    #[test]
    fn test_kernel_names_are_unique() {
        let mut names: Vec<_> = KERNELS.iter().map(|k| k.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), KERNELS.len());
    }

    #[test]
    fn test_compose_prepends_constants() {
        let source = compose_source(&KERNELS[0], ThreadGroupSize::new(16, 256));
        assert!(source.starts_with("const WG_X: u32 = 16u;\nconst WG_Y: u32 = 16u;"));
        assert!(source.contains("fn luminance"));
    }
}
