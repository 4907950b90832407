// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for compute dispatch
//!
//! Tests that need a device print a note and pass when no GPU adapter is
//! present.

use framefx::gpu::wgpu;
use framefx::shaders::{ComputeDispatcher, GridSize, ThreadGroupSize};
use framefx::{FilterLocation, FilterRegistry, FilterType, Frame, ParameterStore, PixelFormat};
use image::{Rgba, RgbaImage};
use std::sync::Arc;

fn gpu_registry() -> Option<FilterRegistry> {
    let dispatcher = match ComputeDispatcher::new() {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            println!("Skipping test (no GPU): {}", e);
            return None;
        }
    };
    let registry = FilterRegistry::new(
        Arc::new(ParameterStore::in_memory()),
        Some(Arc::new(dispatcher)),
    );
    registry.seed_initial_storage();
    Some(registry)
}

#[test]
fn test_grid_for_full_hd() {
    let group = ThreadGroupSize::new(32, 1024);
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
fn test_grid_covers_every_size_with_minimal_overhang() {
    // (max_x, max_y, max_invocations)
    let limits = [
        (256, 256, 256),
        (1024, 1024, 1024),
        (1024, 4, 1024),
        (16, 16, 256),
        (64, 64, 64),
        (1, 1, 1),
    ];
    let sizes = [(1, 1), (32, 32), (64, 48), (17, 31), (1920, 1080), (4000, 3000), (33, 1)];

    for (max_x, max_y, max_invocations) in limits {
        let group = ThreadGroupSize::from_limits(&wgpu::Limits {
            max_compute_workgroup_size_x: max_x,
            max_compute_workgroup_size_y: max_y,
            max_compute_invocations_per_workgroup: max_invocations,
            ..wgpu::Limits::default()
        });
        assert!(group.width >= 1 && group.width <= 32, "{:?}", group);
        assert!(group.width <= max_x);
        assert!(group.height >= 1 && group.height <= max_y, "{:?}", group);
        assert!(group.width * group.height <= max_invocations.max(1));

        for (width, height) in sizes {
            let grid = group.grid(width, height);
            let covered = (grid.width * group.width, grid.height * group.height);
            assert!(covered.0 >= width && covered.1 >= height, "{:?} {:?}", group, grid);
            assert!(covered.0 - width < group.width, "{:?} {:?}", group, grid);
            assert!(covered.1 - height < group.height, "{:?} {:?}", group, grid);
            assert_eq!(grid.depth, 1);
        }
    }
}

#[test]
fn test_exact_multiples_have_no_overhang() {
    let group = ThreadGroupSize::new(32, 1024);
    assert_eq!(
        group.grid(64, 96),
        GridSize {
            width: 2,
            height: 3,
            depth: 1
        }
    );
}

#[test]
fn test_color_inverter_still_image() {
    let Some(registry) = gpu_registry() else {
        return;
    };
    let renderer = registry.get_or_create(FilterType::ColorInverter, FilterLocation::Photo);
    let image = RgbaImage::from_pixel(5, 3, Rgba([10, 20, 30, 200]));

    let out = renderer.render_image(&image, None).unwrap();
    assert_eq!(out.dimensions(), (5, 3));
    for px in out.pixels() {
        assert_eq!(px.0, [245, 235, 225, 200]);
    }
}

#[test]
fn test_pixel_counter_reports_results_on_live_path() {
    let Some(registry) = gpu_registry() else {
        return;
    };
    let image = RgbaImage::from_fn(8, 4, |x, _| {
        if x < 2 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    });
    let frame = Frame::from_rgba_image(&image, PixelFormat::Bgra8);

    let renderer = registry.set_active(FilterType::PixelCounter, FilterLocation::Video);
    renderer.initialize(frame.descriptor, 2).unwrap();
    let done = renderer.render(&frame, None).unwrap().wait().unwrap();

    assert_eq!(done.results()[0], 8);
    assert_eq!(done.results()[1], 24);
    // Bright pixels are painted with the highlight color, channel order preserved
    let rgba = done.to_rgba_image().unwrap();
    assert_eq!(rgba.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(rgba.get_pixel(7, 3).0, [0, 0, 0, 255]);
}

#[test]
fn test_masking_merges_two_images() {
    let Some(registry) = gpu_registry() else {
        return;
    };
    let renderer = registry.get_or_create(FilterType::Masking1, FilterLocation::Photo);
    let base = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
    let overlay = RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]));

    assert!(renderer.merge(&[base.clone()], None).is_none());
    let out = renderer.merge(&[base, overlay], None).unwrap();
    assert_eq!(out.dimensions(), (4, 4));
}

#[test]
fn test_abandoned_live_frames_release_their_slot() {
    let Some(registry) = gpu_registry() else {
        return;
    };
    let image = RgbaImage::from_pixel(8, 4, Rgba([30, 60, 90, 255]));
    let frame = Frame::from_rgba_image(&image, PixelFormat::Bgra8);

    let renderer = registry.set_active(FilterType::ColorInverter, FilterLocation::Video);
    // One slot, so every render reuses the same staging buffer
    renderer.initialize(frame.descriptor, 1).unwrap();
    for _ in 0..5 {
        let pending = renderer.render(&frame, None).expect("slot was released");
        drop(pending);
    }

    let done = renderer.render(&frame, None).unwrap().wait().unwrap();
    let rgba = done.to_rgba_image().unwrap();
    assert_eq!(rgba.get_pixel(0, 0).0, [225, 195, 165, 255]);
}
