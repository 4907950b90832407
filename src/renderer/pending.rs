// SPDX-License-Identifier: GPL-3.0-only

//! Live render results that may still be on the GPU

use crate::composite::composite;
use crate::constants::RESULTS_LEN;
use crate::frame::{FormatDescriptor, PixelFormat, swap_red_blue};
use crate::pool::PooledBuffer;
use crate::shaders::{GpuFence, GpuReadback};
use image::RgbaImage;
use tracing::warn;

/// A finished live render
#[derive(Debug)]
pub struct FilteredFrame {
    buffer: PooledBuffer,
    results: [u32; RESULTS_LEN],
}

impl FilteredFrame {
    pub(super) fn new(buffer: PooledBuffer, results: [u32; RESULTS_LEN]) -> Self {
        Self { buffer, results }
    }

    /// Output format; always the format the renderer was initialized with
    pub fn descriptor(&self) -> FormatDescriptor {
        self.buffer.descriptor()
    }

    /// Pixels in the bound pixel format, tightly packed
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Counters written by measuring kernels; zero for everything else
    pub fn results(&self) -> &[u32; RESULTS_LEN] {
        &self.results
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        self.buffer.to_rgba_image()
    }
}

enum PendingInner {
    Ready(FilteredFrame),
    Gpu {
        fence: GpuFence,
        buffer: PooledBuffer,
        /// Set when the result is composited over the input
        original: Option<RgbaImage>,
    },
}

/// Result of a live render call.
///
/// Dropping a frame whose readback is still on the GPU blocks until the
/// staging buffer is mapped, so its pool slot is never handed out while the
/// mapping is pending.
pub struct PendingFrame {
    /// `None` once consumed by [`wait`](Self::wait)
    inner: Option<PendingInner>,
}

impl std::fmt::Debug for PendingFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFrame")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl PendingFrame {
    pub(super) fn ready(frame: FilteredFrame) -> Self {
        Self {
            inner: Some(PendingInner::Ready(frame)),
        }
    }

    pub(super) fn gpu(fence: GpuFence, buffer: PooledBuffer, original: Option<RgbaImage>) -> Self {
        Self {
            inner: Some(PendingInner::Gpu {
                fence,
                buffer,
                original,
            }),
        }
    }

    /// Whether [`wait`](Self::wait) returns without blocking
    pub fn is_ready(&self) -> bool {
        matches!(self.inner, Some(PendingInner::Ready(_)))
    }

    /// Block until the frame is complete.
    ///
    /// `None` when the GPU readback failed; the buffer goes back to its pool.
    pub fn wait(mut self) -> Option<FilteredFrame> {
        match self.inner.take()? {
            PendingInner::Ready(frame) => Some(frame),
            PendingInner::Gpu {
                fence,
                buffer,
                original,
            } => match fence.wait() {
                Ok(readback) => finish(buffer, readback, original.as_ref()),
                Err(e) => {
                    warn!(error = %e, "Live readback failed, dropping frame");
                    None
                }
            },
        }
    }
}

impl Drop for PendingFrame {
    fn drop(&mut self) {
        if let Some(PendingInner::Gpu { fence, buffer, .. }) = self.inner.take() {
            // The slot goes back to the pool only after the mapping resolved
            if let Err(e) = fence.wait() {
                warn!(slot = buffer.slot(), error = %e, "Abandoned live readback failed");
            }
            drop(buffer);
        }
    }
}

/// Copy a readback into `buffer`, compositing over `original` when given
pub(super) fn finish(
    mut buffer: PooledBuffer,
    readback: GpuReadback,
    original: Option<&RgbaImage>,
) -> Option<FilteredFrame> {
    let results = readback.results;
    let pixels = match original {
        Some(original) => {
            let rendered = RgbaImage::from_raw(readback.width, readback.height, readback.pixels)?;
            composite(&rendered, original).into_raw()
        }
        None => readback.pixels,
    };
    fill_buffer(&mut buffer, pixels).then(|| FilteredFrame::new(buffer, results))
}

/// Write tightly packed RGBA into `buffer` in the buffer's pixel format
pub(super) fn fill_buffer(buffer: &mut PooledBuffer, mut rgba: Vec<u8>) -> bool {
    let expected = buffer.as_bytes().len();
    if expected != rgba.len() {
        warn!(
            expected,
            actual = rgba.len(),
            "Rendered frame does not fit the output buffer"
        );
        return false;
    }
    if buffer.descriptor().pixel_format == PixelFormat::Bgra8 {
        swap_red_blue(&mut rgba);
    }
    buffer.as_mut_bytes().copy_from_slice(&rgba);
    true
}
