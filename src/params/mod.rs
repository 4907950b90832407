// SPDX-License-Identifier: GPL-3.0-only

//! Typed, cached, durable storage for filter settings and render statistics
//!
//! Every record is a string in a [`DurableStore`] under the key
//! `UPPERCASE-FILTER-UUID_FieldName`. Decoded values are mirrored in an
//! in-memory cache that is read-through on `get` and write-through on `set`.
//!
//! Two locks are used:
//! - the store lock serializes every cache/durable read-modify-write for
//!   parameter fields
//! - the accumulator lock serializes statistics updates, which bypass the
//!   cache entirely so they never contend with parameter reads

mod durable;
mod field;
mod value;

pub use durable::{DurableStore, FileStore, MemoryStore};
pub use field::{ParameterField, ParameterType};
pub use value::{Color, ParameterValue, Point};

use crate::constants::RenderMode;
use crate::errors::{ParameterError, fatal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage key for one field of one filter
pub fn storage_key(filter_id: Uuid, field: ParameterField) -> String {
    format!(
        "{}{}",
        filter_id.hyphenated().to_string().to_uppercase(),
        field.storage_suffix()
    )
}

/// A field a filter declares, with its default value
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub field: ParameterField,
    pub default: ParameterValue,
}

impl FieldSpec {
    pub fn new(field: ParameterField, default: ParameterValue) -> Self {
        Self { field, default }
    }
}

/// Result of [`ParameterStore::get`]
#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    /// Declared type, or [`ParameterType::NoType`] when nothing is stored
    pub kind: ParameterType,
    /// Decoded value; `None` when absent or stored empty
    pub value: Option<ParameterValue>,
}

impl FieldData {
    fn absent() -> Self {
        Self {
            kind: ParameterType::NoType,
            value: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.kind == ParameterType::NoType
    }
}

/// Per-filter render counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderStatistics {
    pub image_count: u64,
    pub image_duration: f64,
    pub live_count: u64,
    pub live_duration: f64,
}

/// User rating of a filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRating {
    /// 0 to 5
    pub stars: u8,
    pub favorite: bool,
}

/// Parameter store shared by every renderer
pub struct ParameterStore {
    durable: Arc<dyn DurableStore>,
    cache: Mutex<HashMap<String, ParameterValue>>,
    accumulator: Mutex<()>,
    collect_statistics: AtomicBool,
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("cached", &self.lock_cache().len())
            .field("collect_statistics", &self.collects_statistics())
            .finish()
    }
}

impl ParameterStore {
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            durable,
            cache: Mutex::new(HashMap::new()),
            accumulator: Mutex::new(()),
            collect_statistics: AtomicBool::new(true),
        }
    }

    /// Store backed by memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, ParameterValue>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_accumulator(&self) -> MutexGuard<'_, ()> {
        self.accumulator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read one field, decoding and caching it on a miss
    pub fn get(&self, filter_id: Uuid, field: ParameterField) -> Result<FieldData, ParameterError> {
        let key = storage_key(filter_id, field);
        if field.is_statistic() {
            let _guard = self.lock_accumulator();
            return self.decode_durable(&key, field);
        }

        let mut cache = self.lock_cache();
        if let Some(value) = cache.get(&key) {
            return Ok(FieldData {
                kind: field.kind(),
                value: Some(value.clone()),
            });
        }

        let data = self.decode_durable(&key, field)?;
        if let Some(value) = &data.value {
            cache.insert(key, value.clone());
        }
        Ok(data)
    }

    fn decode_durable(&self, key: &str, field: ParameterField) -> Result<FieldData, ParameterError> {
        let Some(raw) = self.durable.read(key) else {
            return Ok(FieldData::absent());
        };
        let kind = field.kind();
        if raw.is_empty() && kind != ParameterType::String {
            return Ok(FieldData { kind, value: None });
        }
        match ParameterValue::decode(&raw, kind) {
            Some(value) => Ok(FieldData {
                kind,
                value: Some(value),
            }),
            None => Err(ParameterError::Corrupt {
                key: key.to_string(),
                raw,
                expected: kind,
            }),
        }
    }

    /// Whether a durable record exists for the field
    pub fn has_field(&self, filter_id: Uuid, field: ParameterField) -> bool {
        self.durable.read(&storage_key(filter_id, field)).is_some()
    }

    /// Validate, serialize and write one field through to storage and cache
    pub fn set(
        &self,
        filter_id: Uuid,
        field: ParameterField,
        value: ParameterValue,
    ) -> Result<(), ParameterError> {
        let expected = field.kind();
        let actual = value.kind();
        let value = value
            .conform_to(expected)
            .ok_or(ParameterError::TypeMismatch {
                field,
                expected,
                actual,
            })?;
        let key = storage_key(filter_id, field);

        if field.is_statistic() {
            let _guard = self.lock_accumulator();
            self.durable.write(&key, &value.encode());
            return Ok(());
        }

        let mut cache = self.lock_cache();
        self.durable.write(&key, &value.encode());
        cache.insert(key, value);
        Ok(())
    }

    /// Write every default unconditionally, replacing existing values.
    ///
    /// Defaults whose type does not match the field are a programming error.
    pub fn seed_defaults(&self, filter_id: Uuid, defaults: &[FieldSpec]) {
        let mut cache = self.lock_cache();
        for spec in defaults {
            let expected = spec.field.kind();
            let Some(value) = spec.default.clone().conform_to(expected) else {
                fatal(format!(
                    "default for {:?} of filter {} is {}, expected {}",
                    spec.field,
                    filter_id,
                    spec.default.kind(),
                    expected
                ));
            };
            let key = storage_key(filter_id, spec.field);
            self.durable.write(&key, &value.encode());
            if spec.field.is_statistic() {
                continue;
            }
            cache.insert(key, value);
        }
        debug!(filter = %filter_id, fields = defaults.len(), "Seeded default parameters");
    }

    /// Every key with a durable record
    pub fn stored_keys(&self) -> Vec<String> {
        self.durable.keys()
    }

    /// Drop every cached value; the next reads go to durable storage
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn flush(&self) -> Result<(), ParameterError> {
        self.durable.flush()
    }

    fn require(&self, filter_id: Uuid, field: ParameterField) -> ParameterValue {
        match self.get(filter_id, field) {
            Ok(FieldData {
                value: Some(value), ..
            }) => value,
            Ok(FieldData {
                kind: ParameterType::NoType,
                ..
            }) => fatal(format!(
                "field {:?} of filter {} was read before it was seeded",
                field, filter_id
            )),
            Ok(_) => fatal(format!(
                "field {:?} of filter {} is stored empty",
                field, filter_id
            )),
            Err(e) => fatal(format!("parameter store is corrupt: {}", e)),
        }
    }

    fn require_typed<T>(
        &self,
        filter_id: Uuid,
        field: ParameterField,
        extract: impl FnOnce(&ParameterValue) -> Option<T>,
    ) -> T {
        let value = self.require(filter_id, field);
        match extract(&value) {
            Some(v) => v,
            None => fatal(format!(
                "field {:?} holds {}, read with the wrong accessor",
                field,
                value.kind()
            )),
        }
    }

    pub fn double(&self, filter_id: Uuid, field: ParameterField) -> f64 {
        self.require_typed(filter_id, field, ParameterValue::as_f64)
    }

    pub fn normal(&self, filter_id: Uuid, field: ParameterField) -> f64 {
        self.require_typed(filter_id, field, ParameterValue::as_f64)
            .clamp(0.0, 1.0)
    }

    pub fn int(&self, filter_id: Uuid, field: ParameterField) -> i64 {
        self.require_typed(filter_id, field, ParameterValue::as_i64)
    }

    pub fn bool(&self, filter_id: Uuid, field: ParameterField) -> bool {
        self.require_typed(filter_id, field, ParameterValue::as_bool)
    }

    pub fn point(&self, filter_id: Uuid, field: ParameterField) -> Point {
        self.require_typed(filter_id, field, ParameterValue::as_point)
    }

    pub fn color(&self, filter_id: Uuid, field: ParameterField) -> Color {
        self.require_typed(filter_id, field, ParameterValue::as_color)
    }

    pub fn string(&self, filter_id: Uuid, field: ParameterField) -> String {
        self.require_typed(filter_id, field, |v| v.as_str().map(str::to_string))
    }

    // === Statistics ===

    pub fn set_collect_statistics(&self, enabled: bool) {
        self.collect_statistics.store(enabled, Ordering::Relaxed);
    }

    pub fn collects_statistics(&self) -> bool {
        self.collect_statistics.load(Ordering::Relaxed)
    }

    fn mode_fields(mode: RenderMode) -> (ParameterField, ParameterField) {
        match mode {
            RenderMode::Image => (
                ParameterField::RenderImageCount,
                ParameterField::CumulativeImageRenderDuration,
            ),
            RenderMode::Live => (
                ParameterField::RenderLiveCount,
                ParameterField::CumulativeLiveRenderDuration,
            ),
        }
    }

    // Telemetry is never worth a crash: unreadable counters restart from zero
    fn stat_value(&self, filter_id: Uuid, field: ParameterField) -> Option<ParameterValue> {
        let key = storage_key(filter_id, field);
        match self.decode_durable(&key, field) {
            Ok(data) => data.value,
            Err(e) => {
                warn!(error = %e, "Resetting unreadable render statistic");
                None
            }
        }
    }

    fn stat_count(&self, filter_id: Uuid, field: ParameterField) -> u64 {
        self.stat_value(filter_id, field)
            .and_then(|v| v.as_i64())
            .map(|v| v.max(0) as u64)
            .unwrap_or(0)
    }

    fn stat_duration(&self, filter_id: Uuid, field: ParameterField) -> f64 {
        self.stat_value(filter_id, field)
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    }

    /// Add one render of `duration` to the filter's counters for `mode`
    pub fn accumulate(&self, filter_id: Uuid, mode: RenderMode, duration: Duration) {
        if !self.collects_statistics() {
            return;
        }
        let (count_field, duration_field) = Self::mode_fields(mode);
        let _guard = self.lock_accumulator();

        let count = self.stat_count(filter_id, count_field) + 1;
        let total = self.stat_duration(filter_id, duration_field) + duration.as_secs_f64();
        self.durable.write(
            &storage_key(filter_id, count_field),
            &ParameterValue::Int(count as i64).encode(),
        );
        self.durable.write(
            &storage_key(filter_id, duration_field),
            &ParameterValue::Double(total).encode(),
        );
    }

    pub fn render_statistics(&self, filter_id: Uuid) -> RenderStatistics {
        let _guard = self.lock_accumulator();
        let (image_count, image_duration) = Self::mode_fields(RenderMode::Image);
        let (live_count, live_duration) = Self::mode_fields(RenderMode::Live);
        RenderStatistics {
            image_count: self.stat_count(filter_id, image_count),
            image_duration: self.stat_duration(filter_id, image_duration),
            live_count: self.stat_count(filter_id, live_count),
            live_duration: self.stat_duration(filter_id, live_duration),
        }
    }

    /// Zero all four counters of a filter
    pub fn reset_accumulator(&self, filter_id: Uuid) {
        let _guard = self.lock_accumulator();
        for mode in [RenderMode::Image, RenderMode::Live] {
            let (count_field, duration_field) = Self::mode_fields(mode);
            self.durable
                .write(&storage_key(filter_id, count_field), &ParameterValue::Int(0).encode());
            self.durable.write(
                &storage_key(filter_id, duration_field),
                &ParameterValue::Double(0.0).encode(),
            );
        }
    }

    // === Ratings ===

    pub fn rating(&self, filter_id: Uuid) -> FilterRating {
        let stars = self
            .get(filter_id, ParameterField::Stars)
            .ok()
            .and_then(|d| d.value)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let favorite = self
            .get(filter_id, ParameterField::Favorite)
            .ok()
            .and_then(|d| d.value)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        FilterRating {
            stars: stars.clamp(0, 5) as u8,
            favorite,
        }
    }

    pub fn set_rating(&self, filter_id: Uuid, rating: FilterRating) -> Result<(), ParameterError> {
        self.set(
            filter_id,
            ParameterField::Stars,
            ParameterValue::Int(rating.stars.min(5) as i64),
        )?;
        self.set(
            filter_id,
            ParameterField::Favorite,
            ParameterValue::Bool(rating.favorite),
        )
    }
}

/// Explicit values that take precedence over the store for one render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterOverrides {
    values: HashMap<ParameterField, ParameterValue>,
}

impl ParameterOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert) for values known to match
    pub fn with(mut self, field: ParameterField, value: ParameterValue) -> Self {
        if let Err(e) = self.insert(field, value) {
            warn!(error = %e, "Ignoring mismatched override");
        }
        self
    }

    pub fn insert(&mut self, field: ParameterField, value: ParameterValue) -> Result<(), ParameterError> {
        let expected = field.kind();
        let actual = value.kind();
        let value = value
            .conform_to(expected)
            .ok_or(ParameterError::TypeMismatch {
                field,
                expected,
                actual,
            })?;
        self.values.insert(field, value);
        Ok(())
    }

    /// Parse `text` as the field's declared type and insert it
    pub fn insert_text(&mut self, field: ParameterField, text: &str) -> Result<(), ParameterError> {
        let value = ParameterValue::decode(text, field.kind()).ok_or_else(|| ParameterError::Parse {
            raw: text.to_string(),
            expected: field.kind(),
        })?;
        self.insert(field, value)
    }

    pub fn get(&self, field: ParameterField) -> Option<&ParameterValue> {
        self.values.get(&field)
    }

    pub fn has(&self, field: ParameterField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parameter view for one render: overrides first, then the store
#[derive(Clone, Copy)]
pub struct ParameterReader<'a> {
    store: &'a ParameterStore,
    filter_id: Uuid,
    overrides: Option<&'a ParameterOverrides>,
}

impl<'a> ParameterReader<'a> {
    pub fn new(
        store: &'a ParameterStore,
        filter_id: Uuid,
        overrides: Option<&'a ParameterOverrides>,
    ) -> Self {
        Self {
            store,
            filter_id,
            overrides,
        }
    }

    pub fn filter_id(&self) -> Uuid {
        self.filter_id
    }

    fn overridden<T>(
        &self,
        field: ParameterField,
        extract: impl FnOnce(&ParameterValue) -> Option<T>,
    ) -> Option<T> {
        self.overrides.and_then(|o| o.get(field)).and_then(extract)
    }

    pub fn double(&self, field: ParameterField) -> f64 {
        self.overridden(field, ParameterValue::as_f64)
            .unwrap_or_else(|| self.store.double(self.filter_id, field))
    }

    pub fn normal(&self, field: ParameterField) -> f64 {
        self.overridden(field, ParameterValue::as_f64)
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or_else(|| self.store.normal(self.filter_id, field))
    }

    pub fn int(&self, field: ParameterField) -> i64 {
        self.overridden(field, ParameterValue::as_i64)
            .unwrap_or_else(|| self.store.int(self.filter_id, field))
    }

    pub fn bool(&self, field: ParameterField) -> bool {
        self.overridden(field, ParameterValue::as_bool)
            .unwrap_or_else(|| self.store.bool(self.filter_id, field))
    }

    pub fn point(&self, field: ParameterField) -> Point {
        self.overridden(field, ParameterValue::as_point)
            .unwrap_or_else(|| self.store.point(self.filter_id, field))
    }

    pub fn color(&self, field: ParameterField) -> Color {
        self.overridden(field, ParameterValue::as_color)
            .unwrap_or_else(|| self.store.color(self.filter_id, field))
    }

    pub fn string(&self, field: ParameterField) -> String {
        self.overridden(field, |v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| self.store.string(self.filter_id, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn id() -> Uuid {
        Uuid::parse_str("ea2602d1-468e-4ff4-a1ea-1299af4b70aa").unwrap()
    }

    #[test]
    fn test_storage_key_uses_uppercase_id() {
        assert_eq!(
            storage_key(id(), ParameterField::BlockWidth),
            "EA2602D1-468E-4FF4-A1EA-1299AF4B70AA_BlockWidth"
        );
    }

    #[test]
    fn test_missing_field_reports_no_type() {
        let store = ParameterStore::in_memory();
        let data = store.get(id(), ParameterField::Width).unwrap();
        assert!(data.is_absent());
        assert_eq!(data.value, None);
    }

    #[test]
    fn test_empty_record_has_type_but_no_value() {
        let durable = Arc::new(MemoryStore::new());
        durable.write(&storage_key(id(), ParameterField::Width), "");
        let store = ParameterStore::new(durable);

        let data = store.get(id(), ParameterField::Width).unwrap();
        assert_eq!(data.kind, ParameterType::Double);
        assert_eq!(data.value, None);
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let durable = Arc::new(MemoryStore::new());
        durable.write(&storage_key(id(), ParameterField::BlockWidth), "twenty");
        let store = ParameterStore::new(durable);

        assert!(matches!(
            store.get(id(), ParameterField::BlockWidth),
            Err(ParameterError::Corrupt { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "before it was seeded")]
    fn test_typed_read_of_unseeded_field_is_fatal() {
        let store = ParameterStore::in_memory();
        store.int(id(), ParameterField::BlockWidth);
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let store = ParameterStore::in_memory();
        let err = store
            .set(id(), ParameterField::BlockWidth, ParameterValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, ParameterError::TypeMismatch { .. }));
        assert!(!store.has_field(id(), ParameterField::BlockWidth));
    }

    #[test]
    fn test_cache_mirrors_durable_after_clear() {
        let store = ParameterStore::in_memory();
        store
            .set(id(), ParameterField::Color0, ParameterValue::Color(Color::new(2.0, 0.25, 0.5, 1.0)))
            .unwrap();
        let cached = store.color(id(), ParameterField::Color0);
        store.clear_cache();
        let reloaded = store.color(id(), ParameterField::Color0);
        assert_eq!(cached, reloaded);
        assert_eq!(reloaded, Color::new(1.0, 0.25, 0.5, 1.0));
    }

    #[test]
    fn test_seed_clamps_normal_defaults() {
        let store = ParameterStore::in_memory();
        store.seed_defaults(
            id(),
            &[FieldSpec::new(ParameterField::Strength, ParameterValue::Double(3.0))],
        );
        assert_eq!(store.normal(id(), ParameterField::Strength), 1.0);
        store.clear_cache();
        assert_eq!(store.normal(id(), ParameterField::Strength), 1.0);
    }

    #[test]
    fn test_accumulate_disabled_is_noop() {
        let store = ParameterStore::in_memory();
        store.set_collect_statistics(false);
        store.accumulate(id(), RenderMode::Live, Duration::from_millis(5));
        assert_eq!(store.render_statistics(id()), RenderStatistics::default());
    }

    #[test]
    fn test_accumulate_from_many_threads() {
        let store = Arc::new(ParameterStore::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.accumulate(id(), RenderMode::Image, Duration::from_millis(2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = store.render_statistics(id());
        assert_eq!(stats.image_count, 200);
        assert!((stats.image_duration - 0.4).abs() < 1e-9);
        assert_eq!(stats.live_count, 0);

        store.reset_accumulator(id());
        assert_eq!(store.render_statistics(id()), RenderStatistics::default());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let store = ParameterStore::in_memory();
        store.seed_defaults(
            id(),
            &[FieldSpec::new(ParameterField::Width, ParameterValue::Double(5.0))],
        );
        let overrides = ParameterOverrides::new().with(ParameterField::Width, ParameterValue::Double(9.0));

        let plain = ParameterReader::new(&store, id(), None);
        let overridden = ParameterReader::new(&store, id(), Some(&overrides));
        assert_eq!(plain.double(ParameterField::Width), 5.0);
        assert_eq!(overridden.double(ParameterField::Width), 9.0);
    }

    #[test]
    fn test_ratings_default_and_round_trip() {
        let store = ParameterStore::in_memory();
        assert_eq!(store.rating(id()), FilterRating::default());
        store
            .set_rating(
                id(),
                FilterRating {
                    stars: 9,
                    favorite: true,
                },
            )
            .unwrap();
        assert_eq!(
            store.rating(id()),
            FilterRating {
                stars: 5,
                favorite: true
            }
        );
    }
}
