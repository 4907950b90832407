// SPDX-License-Identifier: GPL-3.0-only

//! Per-filter renderers
//!
//! A [`FilterRenderer`] owns one output pool and up to two compiled kernel
//! pipelines, one for the live path and one for still images. All of that
//! state sits behind a single mutex, so initialize, render and reset for one
//! renderer never interleave. Live renders of compute filters return a
//! [`PendingFrame`] while the GPU is still working; the consumer decides when
//! to block on it.

mod pending;

pub use pending::{FilteredFrame, PendingFrame};

use crate::composite::composite;
use crate::constants::{FilterType, RESULTS_LEN, RenderMode};
use crate::errors::{PoolError, fatal};
use crate::filters::{FilterProgram, GraphFilter, KernelFilter, program_for};
use crate::frame::{Frame, FormatDescriptor};
use crate::params::{ParameterOverrides, ParameterReader, ParameterStore};
use crate::pool::{FrameBufferPool, GpuTextureCache, PoolBackend};
use crate::registry::FilterDescriptor;
use crate::shaders::{ComputeDispatcher, DispatchMode, DispatchOutput, KernelPipeline};
use image::RgbaImage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Initialized(FormatDescriptor),
    /// A render call holds the lock
    Rendering,
}

/// A filter ready to process frames and still images
pub trait Renderer: Send + Sync {
    fn filter_type(&self) -> FilterType;

    fn descriptor(&self) -> &'static FilterDescriptor;

    fn state(&self) -> RendererState;

    fn is_initialized(&self) -> bool {
        matches!(self.state(), RendererState::Initialized(_))
    }

    /// Bind a fresh pool for `format`, dropping whatever was bound before
    fn initialize(
        &self,
        format: FormatDescriptor,
        buffer_count_hint: usize,
    ) -> Result<(), PoolError>;

    /// Drop the pool and pipelines; safe to call in any state
    fn reset(&self);

    /// Live path. `None` drops the frame.
    fn render(
        &self,
        frame: &Frame,
        overrides: Option<&ParameterOverrides>,
    ) -> Option<PendingFrame>;

    /// Still-image path; blocks until the result is available
    fn render_image(
        &self,
        image: &RgbaImage,
        overrides: Option<&ParameterOverrides>,
    ) -> Option<RgbaImage>;

    /// Multi-image path for filters that consume more than one image
    fn merge(
        &self,
        images: &[RgbaImage],
        overrides: Option<&ParameterOverrides>,
    ) -> Option<RgbaImage>;
}

struct RendererInner {
    state: RendererState,
    pool: FrameBufferPool,
    live_pipeline: Option<KernelPipeline>,
    image_pipeline: Option<KernelPipeline>,
}

impl RendererInner {
    fn clear(&mut self) {
        self.pool.reset();
        self.live_pipeline = None;
        self.image_pipeline = None;
        self.state = RendererState::Uninitialized;
    }
}

/// The renderer used for every filter in the catalogue
pub struct FilterRenderer {
    descriptor: &'static FilterDescriptor,
    program: FilterProgram,
    store: Arc<ParameterStore>,
    dispatcher: Option<Arc<ComputeDispatcher>>,
    inner: Mutex<RendererInner>,
}

impl std::fmt::Debug for FilterRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRenderer")
            .field("filter", &self.descriptor.filter_type)
            .field("program", &self.program)
            .field("gpu", &self.dispatcher.is_some())
            .finish()
    }
}

impl FilterRenderer {
    pub fn new(
        descriptor: &'static FilterDescriptor,
        store: Arc<ParameterStore>,
        dispatcher: Option<Arc<ComputeDispatcher>>,
    ) -> Self {
        Self {
            descriptor,
            program: program_for(descriptor.filter_type),
            store,
            dispatcher,
            inner: Mutex::new(RendererInner {
                state: RendererState::Uninitialized,
                pool: FrameBufferPool::new(),
                live_pipeline: None,
                image_pipeline: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RendererInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reader<'a>(&'a self, overrides: Option<&'a ParameterOverrides>) -> ParameterReader<'a> {
        ParameterReader::new(&self.store, self.descriptor.id, overrides)
    }

    fn backend(&self) -> Option<PoolBackend> {
        match (&self.program, &self.dispatcher) {
            (FilterProgram::Graph(_), _) => Some(PoolBackend::Host),
            (FilterProgram::Kernel(_), Some(dispatcher)) => {
                Some(PoolBackend::Gpu(Arc::clone(dispatcher)))
            }
            (FilterProgram::Kernel(_), None) => None,
        }
    }

    /// Build the pipeline into `slot` on first use
    fn ensure_pipeline<'p>(
        &self,
        dispatcher: &ComputeDispatcher,
        kernel: &dyn KernelFilter,
        slot: &'p mut Option<KernelPipeline>,
    ) -> Option<&'p KernelPipeline> {
        if slot.is_none() {
            match dispatcher.build_pipeline(kernel.kernel_name()) {
                Ok(pipeline) => *slot = Some(pipeline),
                Err(e) => {
                    warn!(filter = %self.descriptor.filter_type, error = %e, "Pipeline unavailable");
                    return None;
                }
            }
        }
        slot.as_ref()
    }

    fn render_graph_live(
        &self,
        graph: &dyn GraphFilter,
        pool: &FrameBufferPool,
        frame: &Frame,
        reader: &ParameterReader<'_>,
    ) -> Option<PendingFrame> {
        let Some(mut buffer) = pool.acquire_output_buffer() else {
            debug!(filter = %self.descriptor.filter_type, "Output pool exhausted, dropping frame");
            return None;
        };
        let original = frame.to_rgba_image()?;
        let rendered = evaluate_graph(graph, &original, reader);
        if !pending::fill_buffer(&mut buffer, rendered.into_raw()) {
            return None;
        }
        Some(PendingFrame::ready(FilteredFrame::new(
            buffer,
            [0; RESULTS_LEN],
        )))
    }

    fn render_kernel_live(
        &self,
        kernel: &dyn KernelFilter,
        inner: &mut RendererInner,
        frame: &Frame,
        reader: &ParameterReader<'_>,
    ) -> Option<PendingFrame> {
        let dispatcher = self.dispatcher.as_deref()?;
        let RendererInner {
            pool,
            live_pipeline,
            ..
        } = inner;
        let pipeline = self.ensure_pipeline(dispatcher, kernel, live_pipeline)?;
        let cache = pool.texture_cache()?.as_gpu()?;

        let Some(buffer) = pool.acquire_output_buffer() else {
            debug!(filter = %self.descriptor.filter_type, "Output pool exhausted, dropping frame");
            return None;
        };

        let (width, height) = cache.dimensions();
        let block = kernel.parameter_block(reader, width, height);
        let original = if kernel.merge_with_background(reader) {
            frame.to_rgba_image()
        } else {
            None
        };

        if !cache.upload_frame(dispatcher.queue(), frame) {
            warn!(filter = %self.descriptor.filter_type, "Frame size differs from the texture cache");
            return None;
        }
        match dispatcher.dispatch(pipeline, cache, &block, DispatchMode::Live, buffer.slot()) {
            Ok(DispatchOutput::Pending(fence)) => Some(PendingFrame::gpu(fence, buffer, original)),
            Ok(DispatchOutput::Complete(readback)) => {
                pending::finish(buffer, readback, original.as_ref()).map(PendingFrame::ready)
            }
            Err(e) => {
                warn!(filter = %self.descriptor.filter_type, error = %e, "Dispatch failed, dropping frame");
                None
            }
        }
    }

    /// Run a kernel over `images` with a transient texture cache
    fn run_kernel_images(
        &self,
        kernel: &dyn KernelFilter,
        inner: &mut RendererInner,
        images: &[&RgbaImage],
        reader: &ParameterReader<'_>,
    ) -> Option<RgbaImage> {
        let Some(dispatcher) = self.dispatcher.as_deref() else {
            warn!(filter = %self.descriptor.filter_type, "No GPU available for compute filter");
            return None;
        };
        let pipeline = self.ensure_pipeline(dispatcher, kernel, &mut inner.image_pipeline)?;

        let cache = match GpuTextureCache::for_images(dispatcher.device(), images) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(filter = %self.descriptor.filter_type, error = %e, "Image texture cache unavailable");
                return None;
            }
        };
        for (index, image) in images.iter().enumerate() {
            cache.upload_image(dispatcher.queue(), index, image);
        }

        let (width, height) = cache.dimensions();
        let block = kernel.parameter_block(reader, width, height);
        let readback = match dispatcher.dispatch(pipeline, &cache, &block, DispatchMode::Image, 0) {
            Ok(DispatchOutput::Complete(readback)) => readback,
            Ok(DispatchOutput::Pending(fence)) => match fence.wait() {
                Ok(readback) => readback,
                Err(e) => {
                    warn!(filter = %self.descriptor.filter_type, error = %e, "Readback failed");
                    return None;
                }
            },
            Err(e) => {
                warn!(filter = %self.descriptor.filter_type, error = %e, "Dispatch failed");
                return None;
            }
        };

        let rendered = RgbaImage::from_raw(readback.width, readback.height, readback.pixels)?;
        match images.first() {
            Some(original) if kernel.merge_with_background(reader) => {
                Some(composite(&rendered, original))
            }
            _ => Some(rendered),
        }
    }

    fn render_images(
        &self,
        images: &[&RgbaImage],
        overrides: Option<&ParameterOverrides>,
    ) -> Option<RgbaImage> {
        let start = Instant::now();
        let mut inner = self.lock();
        let reader = self.reader(overrides);

        let rendered = match &self.program {
            FilterProgram::Graph(graph) => {
                let first = images.first()?;
                Some(evaluate_graph(graph.as_ref(), first, &reader))
            }
            FilterProgram::Kernel(kernel) => {
                self.run_kernel_images(kernel.as_ref(), &mut *inner, images, &reader)
            }
        }?;

        self.store
            .accumulate(self.descriptor.id, RenderMode::Image, start.elapsed());
        Some(rendered)
    }
}

fn evaluate_graph(
    graph: &dyn GraphFilter,
    original: &RgbaImage,
    reader: &ParameterReader<'_>,
) -> RgbaImage {
    let rendered = graph
        .build_graph(reader, original.dimensions())
        .evaluate(original);
    if graph.merge_with_background(reader) {
        composite(&rendered, original)
    } else {
        rendered
    }
}

impl Renderer for FilterRenderer {
    fn filter_type(&self) -> FilterType {
        self.descriptor.filter_type
    }

    fn descriptor(&self) -> &'static FilterDescriptor {
        self.descriptor
    }

    fn state(&self) -> RendererState {
        self.lock().state
    }

    fn initialize(
        &self,
        format: FormatDescriptor,
        buffer_count_hint: usize,
    ) -> Result<(), PoolError> {
        let mut inner = self.lock();
        inner.clear();

        let Some(backend) = self.backend() else {
            warn!(
                filter = %self.descriptor.filter_type,
                "No GPU available, compute filter stays inactive"
            );
            return Ok(());
        };

        match inner.pool.initialize(format, buffer_count_hint, &backend) {
            Ok(()) => {}
            Err(PoolError::TextureCache(message)) => fatal(format!(
                "{}: unable to create texture cache: {}",
                self.descriptor.filter_type, message
            )),
            Err(e) => {
                warn!(filter = %self.descriptor.filter_type, error = %e, "Initialize rejected");
                return Err(e);
            }
        }

        inner.state = RendererState::Initialized(format);
        info!(
            filter = %self.descriptor.filter_type,
            width = format.width,
            height = format.height,
            buffers = buffer_count_hint,
            "Renderer initialized"
        );
        Ok(())
    }

    fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != RendererState::Uninitialized {
            debug!(filter = %self.descriptor.filter_type, "Renderer reset");
        }
        inner.clear();
    }

    fn render(
        &self,
        frame: &Frame,
        overrides: Option<&ParameterOverrides>,
    ) -> Option<PendingFrame> {
        let start = Instant::now();
        let mut inner = self.lock();

        let RendererState::Initialized(format) = inner.state else {
            debug!(filter = %self.descriptor.filter_type, "No pool bound, dropping frame");
            return None;
        };
        if frame.descriptor != format || !frame.has_valid_layout() {
            warn!(
                filter = %self.descriptor.filter_type,
                expected = ?format,
                actual = ?frame.descriptor,
                "Frame does not match the bound format"
            );
            return None;
        }

        inner.state = RendererState::Rendering;
        let reader = self.reader(overrides);
        let pending = match &self.program {
            FilterProgram::Graph(graph) => {
                self.render_graph_live(graph.as_ref(), &inner.pool, frame, &reader)
            }
            FilterProgram::Kernel(kernel) => {
                self.render_kernel_live(kernel.as_ref(), &mut *inner, frame, &reader)
            }
        };
        inner.state = RendererState::Initialized(format);

        if pending.is_some() {
            self.store
                .accumulate(self.descriptor.id, RenderMode::Live, start.elapsed());
        }
        pending
    }

    fn render_image(
        &self,
        image: &RgbaImage,
        overrides: Option<&ParameterOverrides>,
    ) -> Option<RgbaImage> {
        self.render_images(&[image], overrides)
    }

    fn merge(
        &self,
        images: &[RgbaImage],
        overrides: Option<&ParameterOverrides>,
    ) -> Option<RgbaImage> {
        let expected = self.program.input_count();
        if images.len() != expected {
            warn!(
                filter = %self.descriptor.filter_type,
                expected,
                actual = images.len(),
                "merge expects {} images",
                expected
            );
            return None;
        }
        let refs: Vec<&RgbaImage> = images.iter().collect();
        self.render_images(&refs, overrides)
    }
}
