// SPDX-License-Identifier: GPL-3.0-only

//! Buffer plumbing shared by the dispatcher and the texture caches

use crate::errors::DispatchError;
use crate::gpu::wgpu;

/// Size a texture cache was built for
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub struct CachedDimensions {
    pub width: u32,
    pub height: u32,
}

impl CachedDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

/// Map `buffer` for reading, block the device until the mapping lands, and
/// copy the whole buffer out. The buffer is unmapped before returning.
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> Result<Vec<u8>, DispatchError> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| DispatchError::Readback(e.to_string()))?;

    receiver
        .await
        .map_err(|_| DispatchError::Readback("mapping callback dropped".to_string()))?
        .map_err(|e| DispatchError::Readback(format!("{:?}", e)))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(data)
}

/// Row pitch for a texture copy, rounded up to wgpu's 256-byte alignment
#[inline]
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copy a row-padded RGBA readback into a tightly packed destination
pub fn unpad_rows(padded: &[u8], width: u32, height: u32, dst: &mut [u8]) {
    let row = width as usize * 4;
    let pitch = padded_bytes_per_row(width) as usize;
    for (y, out) in dst.chunks_exact_mut(row).take(height as usize).enumerate() {
        let start = y * pitch;
        out.copy_from_slice(&padded[start..start + row]);
    }
}

/// Thread groups needed to cover `dimension`
#[inline]
pub fn compute_dispatch_size(dimension: u32, workgroup_size: u32) -> u32 {
    dimension.div_ceil(workgroup_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_dimensions_match() {
        let dims = CachedDimensions::new(640, 480);
        assert!(dims.matches(640, 480));
        assert!(!dims.matches(480, 640));
        assert!(!CachedDimensions::default().matches(640, 480));
    }

    #[test]
    fn test_compute_dispatch_size() {
        assert_eq!(compute_dispatch_size(1920, 32), 60);
        assert_eq!(compute_dispatch_size(1080, 32), 34);
        assert_eq!(compute_dispatch_size(33, 32), 2);
        assert_eq!(compute_dispatch_size(1, 32), 1);
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(1920), 7680);
    }

    #[test]
    fn test_unpad_rows() {
        let pitch = padded_bytes_per_row(1) as usize;
        let mut padded = vec![0u8; pitch * 2];
        padded[..4].copy_from_slice(&[1, 2, 3, 4]);
        padded[pitch..pitch + 4].copy_from_slice(&[5, 6, 7, 8]);

        let mut out = vec![0u8; 8];
        unpad_rows(&padded, 1, 2, &mut out);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
