// SPDX-License-Identifier: GPL-3.0-only

//! Compute device creation
//!
//! Filters only run compute passes, so the device is requested without a
//! surface and with the adapter's own limits: thread-group sizing and the
//! texture cache both read those limits back from the device.

use crate::errors::DispatchError;
use std::sync::Arc;
use tracing::info;

/// Re-export the compute wgpu so the rest of the crate names one version
pub use wgpu_compute as wgpu;

/// What the dispatcher reports about its adapter
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    pub adapter_name: String,
    pub backend: wgpu::Backend,
    /// Largest texture edge the device accepts
    pub max_texture_dimension: u32,
}

/// Device, queue and adapter summary for compute work
#[derive(Debug, Clone)]
pub struct ComputeDevice {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
}

/// Open the first Vulkan adapter for compute
pub async fn create_compute_device(label: &str) -> Result<ComputeDevice, DispatchError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| DispatchError::NoAdapter(e.to_string()))?;

    let limits = adapter.limits();
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_limits: limits.clone(),
            ..Default::default()
        })
        .await
        .map_err(|e| DispatchError::Device(e.to_string()))?;

    let adapter_info = adapter.get_info();
    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        max_workgroup_x = limits.max_compute_workgroup_size_x,
        max_invocations = limits.max_compute_invocations_per_workgroup,
        "Compute device ready"
    );

    Ok(ComputeDevice {
        device: Arc::new(device),
        queue: Arc::new(queue),
        info: GpuDeviceInfo {
            adapter_name: adapter_info.name,
            backend: adapter_info.backend,
            max_texture_dimension: limits.max_texture_dimension_2d,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_limits_are_the_adapter_limits() {
        let gpu = match create_compute_device("test_device").await {
            Ok(gpu) => gpu,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };
        assert!(!gpu.info.adapter_name.is_empty());
        assert_eq!(
            gpu.device.limits().max_texture_dimension_2d,
            gpu.info.max_texture_dimension
        );
    }
}
