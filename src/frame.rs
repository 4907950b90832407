// SPDX-License-Identifier: GPL-3.0-only

//! Frame types exchanged with the capture and decode side

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel layout of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba8,
    /// 8-bit BGRA, 4 bytes per pixel; the usual camera output
    Bgra8,
    /// Semi-planar 4:2:0; recognised but not filterable
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => Some(4),
            PixelFormat::Nv12 => None,
        }
    }

    pub fn is_filterable(&self) -> bool {
        matches!(self, PixelFormat::Rgba8 | PixelFormat::Bgra8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Rec709,
}

/// Format of an incoming frame; produced by the capture side, only read here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
}

impl FormatDescriptor {
    pub fn new(pixel_format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            pixel_format,
            width,
            height,
            color_space: ColorSpace::default(),
        }
    }

    /// Tightly packed row length in bytes
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.pixel_format.bytes_per_pixel().unwrap_or(1) as usize
    }

    /// Tightly packed frame length in bytes
    pub fn frame_bytes(&self) -> usize {
        self.row_bytes() * self.height as usize
    }
}

/// One raw frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub descriptor: FormatDescriptor,
    /// Row stride in bytes, may include padding
    pub stride: u32,
    pub data: Arc<[u8]>,
}

impl Frame {
    pub fn new(descriptor: FormatDescriptor, stride: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            descriptor,
            stride,
            data: data.into(),
        }
    }

    /// Wrap an RGBA image as a tightly packed frame in `pixel_format`
    pub fn from_rgba_image(image: &RgbaImage, pixel_format: PixelFormat) -> Self {
        let descriptor = FormatDescriptor::new(pixel_format, image.width(), image.height());
        let mut data = image.as_raw().clone();
        if pixel_format == PixelFormat::Bgra8 {
            swap_red_blue(&mut data);
        }
        Self::new(descriptor, descriptor.row_bytes() as u32, data)
    }

    /// Tightly packed RGBA pixels, dropping any row padding
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        let row = self.descriptor.row_bytes();
        let stride = self.stride as usize;
        let mut out = Vec::with_capacity(self.descriptor.frame_bytes());
        for y in 0..self.descriptor.height as usize {
            let start = y * stride;
            out.extend_from_slice(&self.data[start..start + row]);
        }
        if self.descriptor.pixel_format == PixelFormat::Bgra8 {
            swap_red_blue(&mut out);
        }
        out
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if !self.descriptor.pixel_format.is_filterable() || !self.has_valid_layout() {
            return None;
        }
        RgbaImage::from_raw(
            self.descriptor.width,
            self.descriptor.height,
            self.to_rgba_bytes(),
        )
    }

    /// Stride covers a packed row and the data covers every row
    pub fn has_valid_layout(&self) -> bool {
        let row = self.descriptor.row_bytes();
        let stride = self.stride as usize;
        let height = self.descriptor.height as usize;
        stride >= row && (height == 0 || self.data.len() >= stride * (height - 1) + row)
    }
}

/// Swap R and B in place for 4-byte pixels (RGBA <-> BGRA)
pub fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_frame_round_trips_to_rgba() {
        let image = RgbaImage::from_raw(1, 1, vec![10, 20, 30, 40]).unwrap();
        let frame = Frame::from_rgba_image(&image, PixelFormat::Bgra8);
        assert_eq!(&frame.data[..], &[30, 20, 10, 40]);
        assert_eq!(frame.to_rgba_image().unwrap(), image);
    }

    #[test]
    fn test_padded_stride_is_dropped() {
        let descriptor = FormatDescriptor::new(PixelFormat::Rgba8, 1, 2);
        let data = vec![1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8];
        let frame = Frame::new(descriptor, 8, data);
        assert!(frame.has_valid_layout());
        assert_eq!(frame.to_rgba_bytes(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_short_data_is_invalid() {
        let descriptor = FormatDescriptor::new(PixelFormat::Rgba8, 2, 2);
        let frame = Frame::new(descriptor, 8, vec![0u8; 12]);
        assert!(!frame.has_valid_layout());
        assert!(frame.to_rgba_image().is_none());
    }
}
