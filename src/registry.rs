// SPDX-License-Identifier: GPL-3.0-only

//! Filter catalogue and renderer instances
//!
//! The catalogue is a static table of [`FilterDescriptor`]s in
//! [`FilterType::ALL`] order. The [`FilterRegistry`] adds the mutable parts:
//! memoized renderers per location, the active filter of each location and
//! which filters are usable on this machine.

use crate::constants::{FilterGroup, FilterLocation, FilterType, KernelKind, RenderMode};
use crate::filters::program_for;
use crate::params::{ParameterStore, storage_key};
use crate::renderer::{FilterRenderer, Renderer};
use crate::shaders::ComputeDispatcher;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};
use uuid::{Uuid, uuid};

/// Static metadata for one filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterDescriptor {
    pub id: Uuid,
    pub filter_type: FilterType,
    pub title: &'static str,
    pub group: FilterGroup,
    pub kernel_kind: KernelKind,
    pub icon_name: &'static str,
}

macro_rules! catalogue {
    ($($filter:ident, $id:literal, $title:literal, $group:ident, $kind:ident, $icon:literal;)*) => {
        static DESCRIPTORS: [FilterDescriptor; FilterType::ALL.len()] = [
            $(FilterDescriptor {
                id: uuid!($id),
                filter_type: FilterType::$filter,
                title: $title,
                group: FilterGroup::$group,
                kernel_kind: KernelKind::$kind,
                icon_name: $icon,
            },)*
        ];
    };
}

catalogue! {
    PassThrough, "e18b32bf-e965-41c6-a1f5-4bb4ed6ba472", "No Filter", Standard, Graph, "camera-photo-symbolic";
    Noir, "7215048f-15ea-46a1-8b11-a03e104a568d", "Noir", PhotoEffects, Graph, "filter-noir-symbolic";
    LineScreen, "03d25ebe-1536-4088-9af6-150490262467", "Line Screen", Effects, Graph, "filter-line-screen-symbolic";
    CircularScreen, "43a29cb4-4f85-40a7-b535-3cd659edd3cb", "Circular Screen", Effects, Graph, "filter-circular-screen-symbolic";
    DotScreen, "48145942-f695-436a-a9bc-94158d3b469a", "Dot Screen", Effects, Graph, "filter-dot-screen-symbolic";
    HatchScreen, "49a3792a-f46a-40c5-8831-51ff7834e8c7", "Hatch Screen", Effects, Graph, "filter-hatch-screen-symbolic";
    CmykHalftone, "13c40f19-3d54-492c-92bc-2680f4cf2a2f", "CMYK Halftone", Effects, Graph, "filter-halftone-symbolic";
    Pixellate, "0f56b55b-0d77-4c3a-98eb-cadc62be7f4d", "Pixellate", Tiles, Graph, "filter-pixellate-symbolic";
    Pointillize, "1d56c7d0-a296-4ca3-be92-0027974421e3", "Pointillize", Tiles, Graph, "filter-pointillize-symbolic";
    CircleAndLines, "0c84fc21-e06a-4b49-ae0e-90594abeeb4a", "Circles and Lines", Combined, Graph, "filter-circles-lines-symbolic";
    Comic, "e730f3ba-c4d7-4d06-8754-b878c92260aa", "Comic", Combined, Graph, "filter-comic-symbolic";
    XRay, "47d5ac1d-7878-4623-b3df-55559b9d7087", "X-Ray", PhotoEffects, Graph, "filter-xray-symbolic";
    LineOverlay, "910d04a3-729d-4fdf-b19e-654904b0eeeb", "Line Overlay", Effects, Graph, "filter-line-overlay-symbolic";
    HueAdjust, "dd8f30bf-e22b-4d8c-afa3-303c15eb1928", "Hue Adjust", Colors, Graph, "filter-hue-symbolic";
    HsbAdjust, "ff3679e7-a415-4562-8032-e07f51a63621", "HSB Adjust", Colors, Graph, "filter-hsb-symbolic";
    EdgeWork, "91cabc39-51fa-4bb9-8533-4371d0bbc74a", "Edge Work", Effects, Graph, "filter-edge-work-symbolic";
    FalseColor, "d8ae3fb2-e3a1-46a3-87e0-9215437b16a7", "False Color", Colors, Graph, "filter-false-color-symbolic";
    Vibrance, "6c1d3a52-8f0e-4b7a-9d25-37e4c0b9a1f6", "Vibrance", Colors, Graph, "filter-vibrance-symbolic";
    TemperatureAndTint, "ae7c6800-45d0-454b-a339-67343685b9b2", "Temperature and Tint", PhotoEffects, Graph, "filter-temperature-symbolic";
    GaussianBlur, "5ccbc7e0-7422-498c-a99a-ff1679399d9b", "Gaussian Blur", Blur, Graph, "filter-blur-symbolic";
    ColorMap, "b2f4e7a9-0c63-4d18-a5e1-9e4f2d7c3b80", "Color Map", Colors, Graph, "filter-color-map-symbolic";
    Checkerboard, "3ce47bfb-30e6-4d24-b5f9-8f10fa2c564c", "Checkerboard", Generator, Graph, "filter-checkerboard-symbolic";
    SmoothLinearGradient, "fb699e7d-b887-4ac5-a3a5-f6e33abe7a45", "Linear Gradient", Generator, Graph, "filter-gradient-symbolic";
    ChannelMixer, "b49e8644-99be-4492-aecc-f9f4430012fd", "Channel Mixer", Colors, Compute, "filter-channel-mixer-symbolic";
    ColorInverter, "11902e06-8516-4697-ae40-f233ab88bf77", "Color Inverter", Colors, Compute, "filter-invert-symbolic";
    DesaturateColors, "e3f8071f-5ece-43b7-af06-5cba81d81693", "Desaturate", Gray, Compute, "filter-desaturate-symbolic";
    GrayscaleAdjust, "6a76fc03-e4e4-4192-82b6-40cf8e520861", "Grayscale", Gray, Compute, "filter-grayscale-symbolic";
    Kuwahara, "241c7331-bb81-4dbe-983f-bb73209eea85", "Kuwahara", Blur, Compute, "filter-kuwahara-symbolic";
    PixellateMetal, "ea2602d1-468e-4ff4-a1ea-1299af4b70aa", "Block Pixellate", Tiles, Compute, "filter-pixellate-symbolic";
    Mirroring, "895f46c2-443d-4ffb-a3c3-bd3dacaf33b2", "Mirror", Effects, Compute, "filter-mirror-symbolic";
    Solarize, "aa7092db-d258-41d6-8779-ba5d358ebbc5", "Solarize", Colors, Compute, "filter-solarize-symbolic";
    Dithering, "bebfc984-efa6-41ec-9461-3608e0affba7", "Dithering", Gray, Compute, "filter-dither-symbolic";
    Threshold, "ab5d654e-93a7-4cd1-a7bc-a48d0800efce", "Threshold", Gray, Compute, "filter-threshold-symbolic";
    MonochromeColors, "2ea4460a-e126-4d5a-b747-6f31a62b41e7", "Monochrome Colors", Colors, Compute, "filter-monochrome-symbolic";
    DilateErode, "2e50a9c2-8c27-40aa-90cc-fbc69927e26a", "Dilate and Erode", Blur, Compute, "filter-dilate-symbolic";
    Sobel, "e935048e-0517-4b5e-91bc-ab24fb1134d2", "Sobel Edges", Effects, Compute, "filter-sobel-symbolic";
    Laplacian, "43040a12-8490-4b94-9e71-b062e2f1b870", "Laplacian", Effects, Compute, "filter-laplacian-symbolic";
    Median, "4d362294-a6b3-4614-b8eb-883c48fab122", "Median", Blur, Compute, "filter-median-symbolic";
    BlockMean, "06e66eec-61b8-4b99-8bf2-788b52b5afce", "Block Mean", Measuration, Compute, "filter-block-mean-symbolic";
    PixelCounter, "509490b1-69a0-48f1-9d04-132b0a48edea", "Pixel Counter", Measuration, Compute, "filter-pixel-counter-symbolic";
    MetalCheckerboard, "574e1f98-a7e3-496a-8e29-801191db5c83", "GPU Checkerboard", Generator, Compute, "filter-checkerboard-symbolic";
    Masking1, "4541eab5-464c-482a-a939-4f922a0ba8e4", "Color Mask", Combined, Compute, "filter-mask-symbolic";
}

/// Descriptor of `filter_type`
pub fn descriptor(filter_type: FilterType) -> &'static FilterDescriptor {
    // The table is written in FilterType::ALL order
    &DESCRIPTORS[filter_type as usize]
}

/// Every descriptor, in catalogue order
pub fn descriptors() -> &'static [FilterDescriptor] {
    &DESCRIPTORS
}

/// Look a filter up by its stable id
pub fn by_id(id: Uuid) -> Option<&'static FilterDescriptor> {
    DESCRIPTORS.iter().find(|d| d.id == id)
}

/// One row of [`RenderDataDump`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderDataRow {
    pub filter_type: FilterType,
    pub title: &'static str,
    pub count: u64,
    /// Seconds
    pub total_duration: f64,
}

impl RenderDataRow {
    /// Mean seconds per render, zero when nothing was rendered
    pub fn mean_duration(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_duration / self.count as f64
        }
    }
}

/// Render statistics of every filter that has rendered at least once
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderDataDump {
    pub image: Vec<RenderDataRow>,
    pub live: Vec<RenderDataRow>,
}

/// Owns the renderers and answers catalogue queries
pub struct FilterRegistry {
    store: Arc<ParameterStore>,
    dispatcher: Option<Arc<ComputeDispatcher>>,
    instances: Mutex<HashMap<(FilterType, FilterLocation), Arc<dyn Renderer>>>,
    active: Mutex<HashMap<FilterLocation, FilterType>>,
    implemented: RwLock<HashSet<FilterType>>,
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("gpu", &self.dispatcher.is_some())
            .field("instances", &self.lock_instances().len())
            .finish_non_exhaustive()
    }
}

impl FilterRegistry {
    /// Compute filters count as implemented only when `dispatcher` is present
    pub fn new(store: Arc<ParameterStore>, dispatcher: Option<Arc<ComputeDispatcher>>) -> Self {
        let implemented: HashSet<FilterType> = DESCRIPTORS
            .iter()
            .filter(|d| d.kernel_kind == KernelKind::Graph || dispatcher.is_some())
            .map(|d| d.filter_type)
            .collect();
        info!(
            filters = DESCRIPTORS.len(),
            implemented = implemented.len(),
            gpu = dispatcher.is_some(),
            "Filter registry ready"
        );
        Self {
            store,
            dispatcher,
            instances: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            implemented: RwLock::new(implemented),
        }
    }

    pub fn store(&self) -> &Arc<ParameterStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> Option<&Arc<ComputeDispatcher>> {
        self.dispatcher.as_ref()
    }

    fn lock_instances(
        &self,
    ) -> MutexGuard<'_, HashMap<(FilterType, FilterLocation), Arc<dyn Renderer>>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_active(&self) -> MutexGuard<'_, HashMap<FilterLocation, FilterType>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Instances ===

    /// A new, uninitialized renderer that nothing else holds
    pub fn create_instance(&self, filter_type: FilterType) -> Arc<dyn Renderer> {
        Arc::new(FilterRenderer::new(
            descriptor(filter_type),
            Arc::clone(&self.store),
            self.dispatcher.clone(),
        ))
    }

    /// The renderer for `filter_type` at `location`, created on first use
    pub fn get_or_create(
        &self,
        filter_type: FilterType,
        location: FilterLocation,
    ) -> Arc<dyn Renderer> {
        let mut instances = self.lock_instances();
        Arc::clone(
            instances
                .entry((filter_type, location))
                .or_insert_with(|| self.create_instance(filter_type)),
        )
    }

    /// Make `filter_type` the active filter at `location`.
    ///
    /// The previously active renderer there is reset first so its pool and
    /// GPU resources are released; frames it still has in flight keep their
    /// buffers until they are dropped.
    pub fn set_active(&self, filter_type: FilterType, location: FilterLocation) -> Arc<dyn Renderer> {
        let previous = self.lock_active().insert(location, filter_type);
        if let Some(previous) = previous.filter(|p| *p != filter_type) {
            let old = self.lock_instances().get(&(previous, location)).cloned();
            if let Some(old) = old {
                old.reset();
            }
            debug!(from = %previous, to = %filter_type, ?location, "Switched active filter");
        }
        self.get_or_create(filter_type, location)
    }

    /// The active renderer at `location`, if one was chosen
    pub fn active(&self, location: FilterLocation) -> Option<Arc<dyn Renderer>> {
        let filter_type = self.lock_active().get(&location).copied()?;
        Some(self.get_or_create(filter_type, location))
    }

    pub fn active_type(&self, location: FilterLocation) -> Option<FilterType> {
        self.lock_active().get(&location).copied()
    }

    /// Reset every renderer created so far
    pub fn reset_all(&self) {
        let instances: Vec<Arc<dyn Renderer>> = self.lock_instances().values().cloned().collect();
        for renderer in &instances {
            renderer.reset();
        }
        debug!(count = instances.len(), "Reset all renderers");
    }

    // === Availability ===

    pub fn is_implemented(&self, filter_type: FilterType) -> bool {
        self.implemented
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&filter_type)
    }

    pub fn set_implemented(&self, filter_type: FilterType, implemented: bool) {
        let mut set = self
            .implemented
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if implemented {
            set.insert(filter_type);
        } else {
            set.remove(&filter_type);
        }
    }

    // === Metadata ===

    pub fn descriptor(&self, filter_type: FilterType) -> &'static FilterDescriptor {
        descriptor(filter_type)
    }

    pub fn by_id(&self, id: Uuid) -> Option<&'static FilterDescriptor> {
        by_id(id)
    }

    pub fn title(&self, filter_type: FilterType) -> &'static str {
        descriptor(filter_type).title
    }

    pub fn group(&self, filter_type: FilterType) -> FilterGroup {
        descriptor(filter_type).group
    }

    pub fn group_title(&self, group: FilterGroup) -> &'static str {
        group.display_name()
    }

    pub fn all(&self) -> &'static [FilterDescriptor] {
        descriptors()
    }

    /// Members of `group`; the rating groups are computed from the store
    pub fn filters_in_group(&self, group: FilterGroup) -> Vec<&'static FilterDescriptor> {
        DESCRIPTORS
            .iter()
            .filter(|d| match group {
                FilterGroup::Favorites => self.store.rating(d.id).favorite,
                FilterGroup::FiveStar => self.store.rating(d.id).stars == 5,
                _ => d.group == group,
            })
            .collect()
    }

    // === Storage ===

    /// Write field defaults and zeroed statistics for every filter
    pub fn seed_initial_storage(&self) {
        for filter_type in FilterType::ALL {
            self.seed_filter(filter_type);
        }
        info!(filters = FilterType::ALL.len(), "Seeded initial filter storage");
    }

    /// Write field defaults and zeroed statistics for one filter
    pub fn seed_filter(&self, filter_type: FilterType) {
        let id = descriptor(filter_type).id;
        self.store.seed_defaults(id, &program_for(filter_type).fields());
        self.store.reset_accumulator(id);
    }

    /// Seed only the fields that have no record yet, keeping stored values.
    ///
    /// Returns how many fields were written.
    pub fn seed_missing_fields(&self) -> usize {
        let mut seeded = 0;
        for d in &DESCRIPTORS {
            let missing: Vec<_> = program_for(d.filter_type)
                .fields()
                .into_iter()
                .filter(|spec| !self.store.has_field(d.id, spec.field))
                .collect();
            if !missing.is_empty() {
                self.store.seed_defaults(d.id, &missing);
                seeded += missing.len();
            }
        }
        if seeded > 0 {
            info!(fields = seeded, "Seeded missing filter fields");
        }
        seeded
    }

    /// Read every stored declared field once so later reads hit the cache.
    ///
    /// Returns the number of values loaded.
    pub fn preload_cache(&self) -> usize {
        let stored: HashSet<String> = self.store.stored_keys().into_iter().collect();
        let mut loaded = 0usize;
        for d in &DESCRIPTORS {
            for spec in program_for(d.filter_type).fields() {
                if !stored.contains(&storage_key(d.id, spec.field)) {
                    continue;
                }
                match self.store.get(d.id, spec.field) {
                    Ok(data) if !data.is_absent() => loaded += 1,
                    Ok(_) => {}
                    Err(e) => warn!(filter = %d.filter_type, error = %e, "Unable to preload field"),
                }
            }
        }
        debug!(fields = loaded, "Preloaded parameter cache");
        loaded
    }

    pub fn reset_performance_statistics(&self) {
        for d in &DESCRIPTORS {
            self.store.reset_accumulator(d.id);
        }
        info!("Reset render statistics");
    }

    /// Snapshot of render counts and durations per mode
    pub fn dump_render_data(&self) -> RenderDataDump {
        let mut dump = RenderDataDump::default();
        for d in &DESCRIPTORS {
            let stats = self.store.render_statistics(d.id);
            for (mode, count, total_duration) in [
                (RenderMode::Image, stats.image_count, stats.image_duration),
                (RenderMode::Live, stats.live_count, stats.live_duration),
            ] {
                if count == 0 {
                    continue;
                }
                let row = RenderDataRow {
                    filter_type: d.filter_type,
                    title: d.title,
                    count,
                    total_duration,
                };
                match mode {
                    RenderMode::Image => dump.image.push(row),
                    RenderMode::Live => dump.live.push(row),
                }
            }
        }
        dump
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_follows_catalogue_order() {
        for (d, filter_type) in DESCRIPTORS.iter().zip(FilterType::ALL) {
            assert_eq!(d.filter_type, filter_type);
            assert_eq!(descriptor(filter_type).filter_type, filter_type);
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<Uuid> = DESCRIPTORS.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), DESCRIPTORS.len());
    }

    #[test]
    fn test_kind_matches_program() {
        for d in &DESCRIPTORS {
            assert_eq!(d.kernel_kind, program_for(d.filter_type).kind(), "{}", d.filter_type);
        }
    }

    #[test]
    fn test_no_filter_sits_in_a_rating_group() {
        assert!(DESCRIPTORS.iter().all(|d| !d.group.is_virtual()));
    }

    #[test]
    fn test_by_id() {
        let d = by_id(uuid!("ea2602d1-468e-4ff4-a1ea-1299af4b70aa")).unwrap();
        assert_eq!(d.filter_type, FilterType::PixellateMetal);
        assert!(by_id(Uuid::nil()).is_none());
    }

    #[test]
    fn test_mean_duration() {
        let row = RenderDataRow {
            filter_type: FilterType::Noir,
            title: "Noir",
            count: 4,
            total_duration: 2.0,
        };
        assert_eq!(row.mean_duration(), 0.5);
        assert_eq!(RenderDataRow { count: 0, ..row }.mean_duration(), 0.0);
    }
}
