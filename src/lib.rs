// SPDX-License-Identifier: GPL-3.0-only

//! framefx - real-time image filters for camera frames
//!
//! Filters run either as GPU compute kernels or as declarative CPU filter
//! graphs. Both share one parameter store, one output buffer pool per
//! renderer and one compositing step.
//!
//! # Architecture
//!
//! - [`params`]: typed, cached, durable filter settings and render statistics
//! - [`pool`]: fixed-size output buffer pools and their texture caches
//! - [`shaders`]: the embedded WGSL kernels and the compute dispatcher
//! - [`graph`]: CPU filter graphs
//! - [`composite`]: luminance-masked compositing over the original frame
//! - [`filters`]: the filter implementations
//! - [`renderer`]: per-filter renderers with live and still-image paths
//! - [`registry`]: the filter catalogue and renderer instances
//!
//! # Example
//!
//! ```no_run
//! use framefx::{FilterLocation, FilterRegistry, FilterType, ParameterStore};
//! use std::sync::Arc;
//!
//! let registry = FilterRegistry::new(Arc::new(ParameterStore::in_memory()), None);
//! registry.seed_initial_storage();
//! let renderer = registry.set_active(FilterType::Comic, FilterLocation::Photo);
//! let image = image::RgbaImage::new(64, 64);
//! let filtered = renderer.render_image(&image, None);
//! ```

pub mod composite;
pub mod config;
pub mod constants;
pub mod errors;
pub mod filters;
pub mod frame;
pub mod gpu;
pub mod graph;
pub mod params;
pub mod pool;
pub mod registry;
pub mod renderer;
pub mod shaders;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use constants::{FilterGroup, FilterLocation, FilterType, KernelKind, RenderMode};
pub use frame::{FormatDescriptor, Frame, PixelFormat};
pub use params::{ParameterOverrides, ParameterStore, ParameterValue};
pub use registry::{FilterDescriptor, FilterRegistry, RenderDataDump};
pub use renderer::{FilteredFrame, PendingFrame, Renderer};
pub use shaders::ComputeDispatcher;
