// SPDX-License-Identifier: GPL-3.0-only
//! Compute dispatch for filter kernels
//!
//! The dispatcher owns the device and queue and the bind group layouts every
//! kernel shares. A renderer asks it for a pipeline once, then submits one
//! dispatch per frame against the textures of its pool's texture cache.

use super::{KernelSource, RESULTS_BYTES, compose_source, padded_bytes_per_row, unpad_rows};
use crate::constants::RESULTS_LEN;
use crate::errors::DispatchError;
use crate::gpu::{self, GpuDeviceInfo, wgpu};
use crate::pool::GpuTextureCache;
use futures::channel::oneshot;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

/// Threads per workgroup along x and y
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadGroupSize {
    pub width: u32,
    pub height: u32,
}

/// Workgroups to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl ThreadGroupSize {
    /// One SIMD-width row of threads, as many rows as the device allows
    pub fn new(execution_width: u32, max_threads: u32) -> Self {
        let width = execution_width.max(1);
        Self {
            width,
            height: (max_threads / width).max(1),
        }
    }

    pub fn from_limits(limits: &wgpu::Limits) -> Self {
        let width = limits.max_compute_workgroup_size_x.clamp(1, 32);
        let height = (limits.max_compute_invocations_per_workgroup / width)
            .min(limits.max_compute_workgroup_size_y)
            .max(1);
        Self { width, height }
    }

    /// Workgroups needed to cover a `width` x `height` image
    pub fn grid(&self, width: u32, height: u32) -> GridSize {
        GridSize {
            width: super::compute_dispatch_size(width, self.width),
            height: super::compute_dispatch_size(height, self.height),
            depth: 1,
        }
    }
}

/// How the caller wants to receive the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Block until the readback is complete
    Image,
    /// Return immediately; completion arrives through a [`GpuFence`]
    Live,
}

/// Pixels and counters read back after a dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct GpuReadback {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA
    pub pixels: Vec<u8>,
    pub results: [u32; RESULTS_LEN],
}

impl GpuReadback {
    /// Split a staging buffer into unpadded pixels and the trailing results.
    ///
    /// Kernels that report nothing get zeroed results.
    fn from_staging(data: &[u8], width: u32, height: u32, with_results: bool) -> Self {
        let image_bytes = padded_bytes_per_row(width) as usize * height as usize;
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        unpad_rows(&data[..image_bytes], width, height, &mut pixels);

        let mut results = [0u32; RESULTS_LEN];
        if with_results {
            for (value, chunk) in results
                .iter_mut()
                .zip(data[image_bytes..].chunks_exact(4))
            {
                *value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }

        Self {
            width,
            height,
            pixels,
            results,
        }
    }
}

/// Completion handle for a live dispatch
pub struct GpuFence {
    device: Arc<wgpu::Device>,
    receiver: oneshot::Receiver<Result<GpuReadback, DispatchError>>,
}

impl GpuFence {
    /// Block until the GPU work and readback have finished
    pub fn wait(self) -> Result<GpuReadback, DispatchError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| DispatchError::Readback(e.to_string()))?;
        pollster::block_on(self.receiver)
            .map_err(|_| DispatchError::Readback("mapping callback dropped".to_string()))?
    }
}

impl std::fmt::Debug for GpuFence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuFence").finish_non_exhaustive()
    }
}

pub enum DispatchOutput {
    Complete(GpuReadback),
    Pending(GpuFence),
}

/// A compiled kernel together with its table entry
#[derive(Debug)]
pub struct KernelPipeline {
    pub kernel: &'static KernelSource,
    pipeline: wgpu::ComputePipeline,
}

/// Owns the device and submits kernel work
pub struct ComputeDispatcher {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: GpuDeviceInfo,
    group: ThreadGroupSize,
    single_input_layout: wgpu::BindGroupLayout,
    dual_input_layout: wgpu::BindGroupLayout,
    buffer_layout: wgpu::BindGroupLayout,
}

impl std::fmt::Debug for ComputeDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeDispatcher")
            .field("info", &self.info)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

fn input_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn output_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::Rgba8Unorm,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

impl ComputeDispatcher {
    /// Create a dispatcher on the preferred adapter, blocking the caller
    pub fn new() -> Result<Self, DispatchError> {
        let gpu = pollster::block_on(gpu::create_compute_device("framefx_compute"))?;
        Ok(Self::from_device(gpu.device, gpu.queue, gpu.info))
    }

    pub fn from_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        info: GpuDeviceInfo,
    ) -> Self {
        let group = ThreadGroupSize::from_limits(&device.limits());
        info!(
            adapter = %info.adapter_name,
            group_width = group.width,
            group_height = group.height,
            "Compute dispatcher ready"
        );

        let single_input_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("kernel_single_input_layout"),
                entries: &[input_texture_entry(0), output_texture_entry(1)],
            });

        let dual_input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel_dual_input_layout"),
            entries: &[
                input_texture_entry(0),
                input_texture_entry(1),
                output_texture_entry(2),
            ],
        });

        let buffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel_buffer_layout"),
            entries: &[
                // Parameter block
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Results
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        Self {
            device,
            queue,
            info,
            group,
            single_input_layout,
            dual_input_layout,
            buffer_layout,
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    pub fn thread_group(&self) -> ThreadGroupSize {
        self.group
    }

    fn texture_layout(&self, inputs: usize) -> &wgpu::BindGroupLayout {
        if inputs >= 2 {
            &self.dual_input_layout
        } else {
            &self.single_input_layout
        }
    }

    /// Compile the named kernel.
    ///
    /// Validation errors are caught in an error scope and returned instead
    /// of reaching the device's uncaptured error handler.
    pub fn build_pipeline(&self, kernel_name: &str) -> Result<KernelPipeline, DispatchError> {
        let kernel = super::kernel(kernel_name).ok_or_else(|| {
            warn!(kernel = kernel_name, "Kernel function not found");
            DispatchError::KernelNotFound(kernel_name.to_string())
        })?;

        debug!(kernel = kernel.name, "Building compute pipeline");
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel.name),
                source: wgpu::ShaderSource::Wgsl(compose_source(kernel, self.group).into()),
            });

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("kernel_pipeline_layout"),
                bind_group_layouts: &[self.texture_layout(kernel.inputs), &self.buffer_layout],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.name),
                layout: Some(&layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            warn!(kernel = kernel.name, error = %error, "Compute pipeline failed to build");
            return Err(DispatchError::PipelineBuild {
                kernel: kernel.name.to_string(),
                message: error.to_string(),
            });
        }

        Ok(KernelPipeline { kernel, pipeline })
    }

    /// Run `pipeline` over the cache's input textures and read back the
    /// output through the staging buffer of `slot`.
    ///
    /// The caller has already uploaded the inputs. A cache with fewer input
    /// textures than the kernel wants binds its first input in every
    /// missing position.
    pub fn dispatch(
        &self,
        pipeline: &KernelPipeline,
        cache: &GpuTextureCache,
        params: &[u8],
        mode: DispatchMode,
        slot: usize,
    ) -> Result<DispatchOutput, DispatchError> {
        let kernel = pipeline.kernel;
        // Deliver finished map callbacks of earlier live frames
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            warn!(error = %e, "Device poll failed before dispatch");
        }
        let staging = cache.staging(slot).ok_or_else(|| {
            DispatchError::Readback(format!("no staging buffer for slot {}", slot))
        })?;
        let (width, height) = cache.dimensions();

        // Uniform bindings cannot be empty
        let mut block = params.to_vec();
        block.resize(block.len().max(16).next_multiple_of(16), 0);
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kernel_params"),
                contents: &block,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let input_views: Vec<wgpu::TextureView> = (0..kernel.inputs.max(1))
            .map(|i| cache.input(i).create_view(&wgpu::TextureViewDescriptor::default()))
            .collect();
        let output_view = cache
            .output()
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut texture_entries: Vec<wgpu::BindGroupEntry> = input_views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        texture_entries.push(wgpu::BindGroupEntry {
            binding: input_views.len() as u32,
            resource: wgpu::BindingResource::TextureView(&output_view),
        });

        let texture_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_textures"),
            layout: self.texture_layout(kernel.inputs),
            entries: &texture_entries,
        });

        let buffer_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_buffers"),
            layout: &self.buffer_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: cache.results().as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kernel_encoder"),
            });

        if kernel.reports_results {
            encoder.clear_buffer(cache.results(), 0, None);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, Some(&texture_group), &[]);
            pass.set_bind_group(1, Some(&buffer_group), &[]);
            let grid = self.group.grid(width, height);
            pass.dispatch_workgroups(grid.width, grid.height, grid.depth);
        }

        let padded_row = padded_bytes_per_row(width);
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: cache.output(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        if kernel.reports_results {
            encoder.copy_buffer_to_buffer(
                cache.results(),
                0,
                staging,
                padded_row as u64 * height as u64,
                RESULTS_BYTES,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));

        match mode {
            DispatchMode::Image => {
                let data = pollster::block_on(super::read_buffer_async(&self.device, staging))?;
                Ok(DispatchOutput::Complete(GpuReadback::from_staging(
                    &data,
                    width,
                    height,
                    kernel.reports_results,
                )))
            }
            DispatchMode::Live => {
                let (sender, receiver) = oneshot::channel();
                let buffer = Arc::clone(staging);
                let with_results = kernel.reports_results;
                staging
                    .slice(..)
                    .map_async(wgpu::MapMode::Read, move |result| {
                        let readback = result
                            .map_err(|e| DispatchError::Readback(format!("{:?}", e)))
                            .map(|()| {
                                let readback = {
                                    let data = buffer.slice(..).get_mapped_range();
                                    GpuReadback::from_staging(&data, width, height, with_results)
                                };
                                buffer.unmap();
                                readback
                            });
                        let _ = sender.send(readback);
                    });
                Ok(DispatchOutput::Pending(GpuFence {
                    device: Arc::clone(&self.device),
                    receiver,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_group_for_hd_frame() {
        let group = ThreadGroupSize::new(32, 1024);
        assert_eq!(group, ThreadGroupSize { width: 32, height: 32 });
        assert_eq!(
            group.grid(1920, 1080),
            GridSize {
                width: 60,
                height: 34,
                depth: 1
            }
        );
    }

    #[test]
    fn test_thread_group_from_limits() {
        let limits = wgpu::Limits {
            max_compute_workgroup_size_x: 64,
            max_compute_workgroup_size_y: 8,
            max_compute_invocations_per_workgroup: 256,
            ..wgpu::Limits::default()
        };
        assert_eq!(
            ThreadGroupSize::from_limits(&limits),
            ThreadGroupSize { width: 32, height: 8 }
        );
    }

    #[test]
    fn test_grid_never_empty() {
        let group = ThreadGroupSize::new(32, 1024);
        assert_eq!(group.grid(1, 1).width, 1);
        assert_eq!(group.grid(33, 1).width, 2);
    }

    #[test]
    fn test_readback_splits_results() {
        let pitch = padded_bytes_per_row(1) as usize;
        let mut data = vec![0u8; pitch + RESULTS_BYTES as usize];
        data[..4].copy_from_slice(&[9, 8, 7, 6]);
        data[pitch..pitch + 4].copy_from_slice(&42u32.to_le_bytes());

        let readback = GpuReadback::from_staging(&data, 1, 1, true);
        assert_eq!(readback.pixels, vec![9, 8, 7, 6]);
        assert_eq!(readback.results[0], 42);
        assert_eq!(readback.results[1], 0);

        let silent = GpuReadback::from_staging(&data, 1, 1, false);
        assert_eq!(silent.pixels, vec![9, 8, 7, 6]);
        assert_eq!(silent.results, [0; RESULTS_LEN]);
    }

    #[test]
    fn test_missing_kernel_is_reported() {
        let Ok(dispatcher) = ComputeDispatcher::new() else {
            println!("Skipping test (no GPU)");
            return;
        };
        assert!(matches!(
            dispatcher.build_pipeline("does_not_exist"),
            Err(DispatchError::KernelNotFound(_))
        ));
        assert!(dispatcher.build_pipeline("sobel").is_ok());
    }
}
