// SPDX-License-Identifier: GPL-3.0-only
//! Output buffer pool bound to one input format
//!
//! The pool preallocates a fixed number of output buffers for the bound
//! format. A buffer leaves the pool on [`FrameBufferPool::acquire_output_buffer`]
//! and comes back when the [`PooledBuffer`] is dropped. Buffers hold only a
//! weak link to the pool, so a buffer still in flight after a reset is simply
//! freed instead of returning to a pool that no longer exists.
//!
//! The texture cache is created and destroyed with the pool.

mod texture_cache;

pub use texture_cache::{GpuTextureCache, HostTextureCache, TextureCache, texture_format};

use crate::errors::PoolError;
use crate::frame::FormatDescriptor;
use crate::shaders::ComputeDispatcher;
use image::RgbaImage;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, info};

/// Where the texture cache lives
#[derive(Debug, Clone)]
pub enum PoolBackend {
    Host,
    Gpu(Arc<ComputeDispatcher>),
}

struct PoolShared {
    descriptor: FormatDescriptor,
    free: Mutex<Vec<(usize, Vec<u8>)>>,
}

impl PoolShared {
    fn release(&self, slot: usize, mut data: Vec<u8>) {
        // Buffers handed out with into_vec come back empty
        data.resize(self.descriptor.frame_bytes(), 0);
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((slot, data));
    }
}

struct BoundPool {
    input: FormatDescriptor,
    output: FormatDescriptor,
    capacity: usize,
    shared: Arc<PoolShared>,
    cache: TextureCache,
}

/// Fixed-size set of reusable output buffers
#[derive(Default)]
pub struct FrameBufferPool {
    bound: Option<BoundPool>,
}

impl std::fmt::Debug for FrameBufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBufferPool")
            .field("descriptor", &self.descriptor())
            .field("available", &self.available())
            .finish()
    }
}

impl FrameBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `format` with `buffer_count_hint` buffers.
    ///
    /// Any previous binding is dropped first. On error the pool stays
    /// unbound.
    pub fn initialize(
        &mut self,
        format: FormatDescriptor,
        buffer_count_hint: usize,
        backend: &PoolBackend,
    ) -> Result<(), PoolError> {
        self.reset();

        if !format.pixel_format.is_filterable() {
            return Err(PoolError::UnsupportedFormat(format.pixel_format));
        }
        if buffer_count_hint == 0 {
            return Err(PoolError::EmptyPool);
        }
        if format.width == 0 || format.height == 0 {
            return Err(PoolError::EmptyFrame {
                width: format.width,
                height: format.height,
            });
        }

        // Output keeps the input's channel order and color space
        let output = format;

        let cache = match backend {
            PoolBackend::Host => TextureCache::Host(HostTextureCache::new(format.width, format.height)),
            PoolBackend::Gpu(dispatcher) => TextureCache::Gpu(GpuTextureCache::new(
                dispatcher.device(),
                format.pixel_format,
                format.width,
                format.height,
                buffer_count_hint,
            )?),
        };

        let free = (0..buffer_count_hint)
            .rev()
            .map(|slot| (slot, vec![0u8; output.frame_bytes()]))
            .collect();

        info!(
            format = ?format.pixel_format,
            width = format.width,
            height = format.height,
            buffers = buffer_count_hint,
            "Frame buffer pool bound"
        );

        self.bound = Some(BoundPool {
            input: format,
            output,
            capacity: buffer_count_hint,
            shared: Arc::new(PoolShared {
                descriptor: output,
                free: Mutex::new(free),
            }),
            cache,
        });
        Ok(())
    }

    /// Take a free output buffer without blocking
    pub fn acquire_output_buffer(&self) -> Option<PooledBuffer> {
        let Some(bound) = &self.bound else {
            debug!("Buffer requested from an unbound pool");
            return None;
        };
        let (slot, data) = bound
            .shared
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()?;
        Some(PooledBuffer {
            pool: Arc::downgrade(&bound.shared),
            descriptor: bound.output,
            slot,
            data,
        })
    }

    /// Drop the pool and its texture cache together
    pub fn reset(&mut self) {
        if self.bound.take().is_some() {
            debug!("Frame buffer pool reset");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Bound input format
    pub fn descriptor(&self) -> Option<FormatDescriptor> {
        self.bound.as_ref().map(|b| b.input)
    }

    pub fn output_descriptor(&self) -> Option<FormatDescriptor> {
        self.bound.as_ref().map(|b| b.output)
    }

    pub fn texture_cache(&self) -> Option<&TextureCache> {
        self.bound.as_ref().map(|b| &b.cache)
    }

    pub fn capacity(&self) -> usize {
        self.bound.as_ref().map_or(0, |b| b.capacity)
    }

    /// Buffers currently free
    pub fn available(&self) -> usize {
        self.bound.as_ref().map_or(0, |b| {
            b.shared
                .free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        })
    }
}

/// An output buffer on loan from a pool
pub struct PooledBuffer {
    pool: Weak<PoolShared>,
    descriptor: FormatDescriptor,
    slot: usize,
    data: Vec<u8>,
}

impl PooledBuffer {
    /// Pool slot; selects the matching staging buffer on the GPU path
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn descriptor(&self) -> FormatDescriptor {
        self.descriptor
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Whether the originating pool is still bound
    pub fn is_pool_alive(&self) -> bool {
        self.pool.strong_count() > 0
    }

    /// Copy out as an RGBA image, swapping channels for BGRA buffers
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        let mut pixels = self.data.clone();
        if self.descriptor.pixel_format == crate::frame::PixelFormat::Bgra8 {
            crate::frame::swap_red_blue(&mut pixels);
        }
        RgbaImage::from_raw(self.descriptor.width, self.descriptor.height, pixels)
    }

    /// Take the bytes; the pool gets a fresh allocation for this slot
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("slot", &self.slot)
            .field("descriptor", &self.descriptor)
            .field("pool_alive", &self.is_pool_alive())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.release(self.slot, std::mem::take(&mut self.data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn bgra(width: u32, height: u32) -> FormatDescriptor {
        FormatDescriptor::new(PixelFormat::Bgra8, width, height)
    }

    #[test]
    fn test_exhaustion_and_return() {
        let mut pool = FrameBufferPool::new();
        pool.initialize(bgra(4, 4), 2, &PoolBackend::Host).unwrap();

        let a = pool.acquire_output_buffer().unwrap();
        let b = pool.acquire_output_buffer().unwrap();
        assert_ne!(a.slot(), b.slot());
        assert!(pool.acquire_output_buffer().is_none());

        drop(a);
        let c = pool.acquire_output_buffer().unwrap();
        assert_eq!(c.as_bytes().len(), 64);
    }

    #[test]
    fn test_buffer_outlives_reset() {
        let mut pool = FrameBufferPool::new();
        pool.initialize(bgra(2, 2), 1, &PoolBackend::Host).unwrap();
        let buffer = pool.acquire_output_buffer().unwrap();

        pool.reset();
        assert!(!buffer.is_pool_alive());
        assert!(pool.acquire_output_buffer().is_none());
        drop(buffer);

        pool.initialize(bgra(2, 2), 1, &PoolBackend::Host).unwrap();
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_rejects_unsupported_formats() {
        let mut pool = FrameBufferPool::new();
        let nv12 = FormatDescriptor::new(PixelFormat::Nv12, 4, 4);
        assert!(matches!(
            pool.initialize(nv12, 3, &PoolBackend::Host),
            Err(PoolError::UnsupportedFormat(PixelFormat::Nv12))
        ));
        assert!(matches!(
            pool.initialize(bgra(4, 4), 0, &PoolBackend::Host),
            Err(PoolError::EmptyPool)
        ));
        assert!(!pool.is_bound());
    }

    #[test]
    fn test_reinitialize_replaces_binding() {
        let mut pool = FrameBufferPool::new();
        pool.initialize(bgra(4, 4), 3, &PoolBackend::Host).unwrap();
        let old = pool.acquire_output_buffer().unwrap();

        pool.initialize(bgra(8, 2), 3, &PoolBackend::Host).unwrap();
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.descriptor(), Some(bgra(8, 2)));
        assert_eq!(pool.texture_cache().map(|c| c.dimensions()), Some((8, 2)));
        drop(old);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_into_vec_slot_is_refilled() {
        let mut pool = FrameBufferPool::new();
        pool.initialize(bgra(2, 1), 1, &PoolBackend::Host).unwrap();
        let bytes = pool.acquire_output_buffer().unwrap().into_vec();
        assert_eq!(bytes.len(), 8);
        let again = pool.acquire_output_buffer().unwrap();
        assert_eq!(again.as_bytes().len(), 8);
    }
}
