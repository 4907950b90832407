// SPDX-License-Identifier: GPL-3.0-only
//! Per-format texture caches
//!
//! A graph filter works on host images and only needs the bound size. A
//! kernel filter needs GPU textures matching the frame plus one readback
//! staging buffer per pool slot so in-flight frames never share a mapping.

use crate::errors::PoolError;
use crate::frame::{Frame, PixelFormat};
use crate::gpu::wgpu;
use crate::shaders::{CachedDimensions, RESULTS_BYTES, padded_bytes_per_row};
use image::RgbaImage;
use std::sync::Arc;
use tracing::debug;

/// Texture cache bound alongside a pool
#[derive(Debug)]
pub enum TextureCache {
    Host(HostTextureCache),
    Gpu(GpuTextureCache),
}

impl TextureCache {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            TextureCache::Host(cache) => (cache.dims.width, cache.dims.height),
            TextureCache::Gpu(cache) => cache.dimensions(),
        }
    }

    pub fn as_gpu(&self) -> Option<&GpuTextureCache> {
        match self {
            TextureCache::Gpu(cache) => Some(cache),
            TextureCache::Host(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct HostTextureCache {
    dims: CachedDimensions,
}

impl HostTextureCache {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dims: CachedDimensions::new(width, height),
        }
    }
}

/// Native texture format for a filterable pixel format
pub fn texture_format(format: PixelFormat) -> Option<wgpu::TextureFormat> {
    match format {
        PixelFormat::Rgba8 => Some(wgpu::TextureFormat::Rgba8Unorm),
        PixelFormat::Bgra8 => Some(wgpu::TextureFormat::Bgra8Unorm),
        PixelFormat::Nv12 => None,
    }
}

/// GPU resources for one bound size
#[derive(Debug)]
pub struct GpuTextureCache {
    dims: CachedDimensions,
    inputs: Vec<(wgpu::Texture, wgpu::TextureFormat)>,
    output: wgpu::Texture,
    results: wgpu::Buffer,
    staging: Vec<Arc<wgpu::Buffer>>,
}

impl GpuTextureCache {
    /// Cache for a live stream: one input in the frame's format, `slots`
    /// staging buffers
    pub fn new(
        device: &wgpu::Device,
        format: PixelFormat,
        width: u32,
        height: u32,
        slots: usize,
    ) -> Result<Self, PoolError> {
        let texture_format = texture_format(format).ok_or(PoolError::UnsupportedFormat(format))?;
        Self::build(
            device,
            &[(width, height, texture_format)],
            (width, height),
            slots,
        )
    }

    /// Transient cache for still images; every image gets its own input and
    /// the output matches the first
    pub fn for_images(device: &wgpu::Device, images: &[&RgbaImage]) -> Result<Self, PoolError> {
        let first = images
            .first()
            .ok_or_else(|| PoolError::TextureCache("no input images".to_string()))?;
        let inputs: Vec<_> = images
            .iter()
            .map(|img| (img.width(), img.height(), wgpu::TextureFormat::Rgba8Unorm))
            .collect();
        Self::build(device, &inputs, first.dimensions(), 1)
    }

    fn build(
        device: &wgpu::Device,
        inputs: &[(u32, u32, wgpu::TextureFormat)],
        (width, height): (u32, u32),
        slots: usize,
    ) -> Result<Self, PoolError> {
        let max = device.limits().max_texture_dimension_2d;
        for &(w, h, _) in inputs {
            if w == 0 || h == 0 {
                return Err(PoolError::EmptyFrame {
                    width: w,
                    height: h,
                });
            }
            if w > max || h > max {
                return Err(PoolError::TextureCache(format!(
                    "{}x{} exceeds the device limit of {}",
                    w, h, max
                )));
            }
        }

        debug!(width, height, inputs = inputs.len(), slots, "Allocating texture cache");
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let input_textures = inputs
            .iter()
            .enumerate()
            .map(|(i, &(w, h, format))| {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(if i == 0 { "filter_input_texture" } else { "filter_secondary_texture" }),
                    size: wgpu::Extent3d {
                        width: w,
                        height: h,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                });
                (texture, format)
            })
            .collect();

        let output = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("filter_output_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let results = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_results_buffer"),
            size: RESULTS_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Image rows first, then the results words
        let staging_size = padded_bytes_per_row(width) as u64 * height as u64 + RESULTS_BYTES;
        let staging = (0..slots.max(1))
            .map(|_| {
                Arc::new(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("filter_staging_buffer"),
                    size: staging_size,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                }))
            })
            .collect();

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(PoolError::TextureCache(error.to_string()));
        }

        Ok(Self {
            dims: CachedDimensions::new(width, height),
            inputs: input_textures,
            output,
            results,
            staging,
        })
    }

    /// Output size
    pub fn dimensions(&self) -> (u32, u32) {
        (self.dims.width, self.dims.height)
    }

    /// Input texture `index`, falling back to the first
    pub fn input(&self, index: usize) -> &wgpu::Texture {
        &self.inputs.get(index).unwrap_or(&self.inputs[0]).0
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output(&self) -> &wgpu::Texture {
        &self.output
    }

    pub fn results(&self) -> &wgpu::Buffer {
        &self.results
    }

    pub fn staging(&self, slot: usize) -> Option<&Arc<wgpu::Buffer>> {
        self.staging.get(slot)
    }

    pub fn slot_count(&self) -> usize {
        self.staging.len()
    }

    /// Copy a frame into the first input, honoring its stride.
    ///
    /// Returns false without touching the texture when the frame size
    /// differs from the bound size.
    pub fn upload_frame(&self, queue: &wgpu::Queue, frame: &Frame) -> bool {
        if !self.dims.matches(frame.descriptor.width, frame.descriptor.height) {
            return false;
        }
        self.upload(
            queue,
            0,
            &frame.data,
            frame.stride,
            frame.descriptor.width,
            frame.descriptor.height,
        );
        true
    }

    pub fn upload_image(&self, queue: &wgpu::Queue, index: usize, image: &RgbaImage) {
        self.upload(
            queue,
            index,
            image.as_raw(),
            image.width() * 4,
            image.width(),
            image.height(),
        );
    }

    fn upload(
        &self,
        queue: &wgpu::Queue,
        index: usize,
        data: &[u8],
        stride: u32,
        width: u32,
        height: u32,
    ) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: self.input(index),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(stride),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_formats() {
        assert_eq!(
            texture_format(PixelFormat::Bgra8),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
        assert_eq!(
            texture_format(PixelFormat::Rgba8),
            Some(wgpu::TextureFormat::Rgba8Unorm)
        );
        assert_eq!(texture_format(PixelFormat::Nv12), None);
    }

    #[test]
    fn test_host_cache_dimensions() {
        let cache = TextureCache::Host(HostTextureCache::new(64, 48));
        assert_eq!(cache.dimensions(), (64, 48));
        assert!(cache.as_gpu().is_none());
    }

    #[tokio::test]
    async fn test_oversized_cache_is_rejected() {
        let (device, info) = match crate::gpu::create_compute_device("cache_test").await {
            Ok(gpu) => (gpu.device, gpu.info),
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };
        let too_wide = info.max_texture_dimension + 1;
        assert!(matches!(
            GpuTextureCache::new(&device, PixelFormat::Bgra8, too_wide, 16, 3),
            Err(PoolError::TextureCache(_))
        ));

        let cache = GpuTextureCache::new(&device, PixelFormat::Bgra8, 64, 48, 3).unwrap();
        assert_eq!(cache.dimensions(), (64, 48));
        assert_eq!(cache.slot_count(), 3);
        assert_eq!(cache.input_count(), 1);
    }
}
